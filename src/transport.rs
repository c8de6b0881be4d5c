use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::protocol::{ClientMessage, SinkMessage};
use crate::types::{Sample, UserInfo};

/// Connection state of the session channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Idle,
    SessionActive,
}

#[derive(Clone, Copy, Debug)]
pub struct TransportConfig {
    /// Delay before a reconnection attempt after the channel drops.
    pub reconnect_delay: Duration,
    /// Bound on the start/end session handshakes.
    pub handshake_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            reconnect_delay: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

enum Command {
    Start {
        user: UserInfo,
        reply: oneshot::Sender<Result<String>>,
    },
    Batch {
        session_id: String,
        samples: Vec<Sample>,
    },
    End {
        session_id: String,
        reply: oneshot::Sender<Result<String>>,
    },
}

/// Client side of the session channel. Owns a background task that keeps a
/// persistent connection to the recording sink, reconnecting after a fixed
/// delay whenever it drops. A drop mid-session invalidates the session:
/// callers must start a new one, the channel never resumes silently.
pub struct SessionTransport {
    cmd_tx: UnboundedSender<Command>,
    state: Arc<Mutex<LinkState>>,
    config: TransportConfig,
}

impl SessionTransport {
    /// Spawn the connection task against `addr` (host:port).
    pub fn connect(addr: String, config: TransportConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(LinkState::Connecting));
        tokio::spawn(run_channel(addr, config, cmd_rx, state.clone()));
        SessionTransport {
            cmd_tx,
            state,
            config,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(LinkState::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), LinkState::Idle | LinkState::SessionActive)
    }

    /// Request a new session and wait for the sink-assigned id.
    pub async fn start_session(&self, user: UserInfo) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Start { user, reply: tx })
            .map_err(|_| Error::NotConnected)?;
        match tokio::time::timeout(self.config.handshake_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => Err(Error::SessionStartTimeout(self.config.handshake_timeout)),
        }
    }

    /// Fire-and-forget delivery of one buffered batch. Batches queued while
    /// the channel is down are dropped, not retried.
    pub fn send_batch(&self, session_id: &str, samples: Vec<Sample>) {
        let sent = self.cmd_tx.send(Command::Batch {
            session_id: session_id.to_string(),
            samples,
        });
        if sent.is_err() {
            warn!("transport task gone, batch dropped");
        }
    }

    /// End the session and wait for the persistence acknowledgment. Returns
    /// the sink-side filename. After a timeout the session is abandoned
    /// client-side.
    pub async fn end_session(&self, session_id: &str) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::End {
                session_id: session_id.to_string(),
                reply: tx,
            })
            .map_err(|_| Error::NotConnected)?;
        match tokio::time::timeout(self.config.handshake_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => Err(Error::SessionEndTimeout(self.config.handshake_timeout)),
        }
    }
}

fn set_state(state: &Arc<Mutex<LinkState>>, value: LinkState) {
    if let Ok(mut s) = state.lock() {
        *s = value;
    }
}

enum ConnEnd {
    /// All transport handles dropped; the task can exit.
    HandleDropped,
    /// The connection died; reconnect.
    Lost,
}

async fn run_channel(
    addr: String,
    config: TransportConfig,
    mut cmd_rx: UnboundedReceiver<Command>,
    state: Arc<Mutex<LinkState>>,
) {
    loop {
        set_state(&state, LinkState::Connecting);
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!("connected to recording sink at {}", addr);
                set_state(&state, LinkState::Idle);
                if let ConnEnd::HandleDropped =
                    serve_connection(stream, &mut cmd_rx, &state).await
                {
                    return;
                }
                warn!("connection to recording sink lost");
            }
            Err(e) => warn!("cannot reach recording sink at {}: {}", addr, e),
        }

        set_state(&state, LinkState::Disconnected);

        // Reject commands while waiting out the retry delay; a queued start
        // must not silently bind to a connection that does not exist yet.
        let retry = tokio::time::sleep(config.reconnect_delay);
        tokio::pin!(retry);
        loop {
            tokio::select! {
                _ = &mut retry => break,
                cmd = cmd_rx.recv() => match cmd {
                    None => return,
                    Some(cmd) => reject(cmd),
                },
            }
        }
    }
}

fn reject(cmd: Command) {
    match cmd {
        Command::Start { reply, .. } => {
            let _ = reply.send(Err(Error::NotConnected));
        }
        Command::End { reply, .. } => {
            let _ = reply.send(Err(Error::NotConnected));
        }
        Command::Batch { samples, .. } => {
            warn!("channel down, dropping batch of {} samples", samples.len());
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    cmd_rx: &mut UnboundedReceiver<Command>,
    state: &Arc<Mutex<LinkState>>,
) -> ConnEnd {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let mut pending_start: Option<oneshot::Sender<Result<String>>> = None;
    let mut pending_end: Option<oneshot::Sender<Result<String>>> = None;
    // Sessions are bound to this connection. A session id handed out on an
    // earlier connection is invalid here; batches carrying one are dropped.
    let mut active_session: Option<String> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    return ConnEnd::HandleDropped;
                };
                match cmd {
                    Command::Start { user, reply } => {
                        let msg = ClientMessage::StartSession { user };
                        if write_line(&mut writer, &msg).await.is_err() {
                            let _ = reply.send(Err(Error::NotConnected));
                            fail_pending(&mut pending_start, &mut pending_end);
                            return ConnEnd::Lost;
                        }
                        pending_start = Some(reply);
                    }
                    Command::Batch { session_id, samples } => {
                        if active_session.as_deref() != Some(session_id.as_str()) {
                            warn!(
                                "dropping batch of {} samples: session {} is not active on this connection",
                                samples.len(),
                                session_id
                            );
                            continue;
                        }
                        let count = samples.len();
                        let msg = ClientMessage::TrainingData { session_id, data: samples };
                        if write_line(&mut writer, &msg).await.is_err() {
                            warn!("send failed, dropping batch of {} samples", count);
                            fail_pending(&mut pending_start, &mut pending_end);
                            return ConnEnd::Lost;
                        }
                        debug!("sent batch of {} samples", count);
                    }
                    Command::End { session_id, reply } => {
                        let msg = ClientMessage::EndSession { session_id };
                        if write_line(&mut writer, &msg).await.is_err() {
                            let _ = reply.send(Err(Error::NotConnected));
                            fail_pending(&mut pending_start, &mut pending_end);
                            return ConnEnd::Lost;
                        }
                        pending_end = Some(reply);
                    }
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        handle_sink_line(
                            &line,
                            &mut pending_start,
                            &mut pending_end,
                            &mut active_session,
                            state,
                        );
                    }
                    Ok(None) | Err(_) => {
                        fail_pending(&mut pending_start, &mut pending_end);
                        return ConnEnd::Lost;
                    }
                }
            }
        }
    }
}

fn handle_sink_line(
    line: &str,
    pending_start: &mut Option<oneshot::Sender<Result<String>>>,
    pending_end: &mut Option<oneshot::Sender<Result<String>>>,
    active_session: &mut Option<String>,
    state: &Arc<Mutex<LinkState>>,
) {
    let msg: SinkMessage = match serde_json::from_str(line) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("unparseable sink message: {}", e);
            return;
        }
    };
    match msg {
        SinkMessage::SessionStarted { session_id } => {
            info!("session started: {}", session_id);
            set_state(state, LinkState::SessionActive);
            *active_session = Some(session_id.clone());
            if let Some(reply) = pending_start.take() {
                let _ = reply.send(Ok(session_id));
            }
        }
        SinkMessage::DataReceived { data_points } => {
            debug!("sink acknowledged {} data points", data_points);
        }
        SinkMessage::SessionEnded { filename } => {
            info!("session persisted as {}", filename);
            set_state(state, LinkState::Idle);
            *active_session = None;
            if let Some(reply) = pending_end.take() {
                let _ = reply.send(Ok(filename));
            }
        }
        SinkMessage::Error { message } => {
            // Sink-side errors are logged and do not alter the state machine.
            warn!("sink reported error: {}", message);
        }
    }
}

fn fail_pending(
    pending_start: &mut Option<oneshot::Sender<Result<String>>>,
    pending_end: &mut Option<oneshot::Sender<Result<String>>>,
) {
    if let Some(reply) = pending_start.take() {
        let _ = reply.send(Err(Error::NotConnected));
    }
    if let Some(reply) = pending_end.take() {
        let _ = reply.send(Err(Error::NotConnected));
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, msg: &ClientMessage) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(msg)?;
    line.push(b'\n');
    writer.write_all(&line).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn user() -> UserInfo {
        UserInfo {
            uid: "u1".to_string(),
            display_name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    fn quick_config() -> TransportConfig {
        TransportConfig {
            reconnect_delay: Duration::from_secs(30),
            handshake_timeout: Duration::from_millis(200),
        }
    }

    /// Sink that accepts the connection and answers the session lifecycle.
    async fn scripted_sink(listener: TcpListener) {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let msg: ClientMessage = serde_json::from_str(&line).unwrap();
            let reply = match msg {
                ClientMessage::StartSession { .. } => Some(SinkMessage::SessionStarted {
                    session_id: "sess-1".to_string(),
                }),
                ClientMessage::TrainingData { data, .. } => Some(SinkMessage::DataReceived {
                    data_points: data.len(),
                }),
                ClientMessage::EndSession { .. } => Some(SinkMessage::SessionEnded {
                    filename: "Alice_20260101_01.json".to_string(),
                }),
            };
            if let Some(reply) = reply {
                let mut out = serde_json::to_vec(&reply).unwrap();
                out.push(b'\n');
                writer.write_all(&out).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(scripted_sink(listener));

        let transport = SessionTransport::connect(addr, quick_config());
        let session_id = transport.start_session(user()).await.unwrap();
        assert_eq!(session_id, "sess-1");
        assert_eq!(transport.state(), LinkState::SessionActive);

        transport.send_batch(&session_id, Vec::new());

        let filename = transport.end_session(&session_id).await.unwrap();
        assert_eq!(filename, "Alice_20260101_01.json");
        assert_eq!(transport.state(), LinkState::Idle);
    }

    #[tokio::test]
    async fn test_start_session_times_out_without_ack() {
        // Sink accepts but never replies.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, _writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(_)) = lines.next_line().await {}
        });

        let transport = SessionTransport::connect(addr, quick_config());
        let result = transport.start_session(user()).await;
        assert!(matches!(result, Err(Error::SessionStartTimeout(_))));
    }

    #[tokio::test]
    async fn test_start_session_fails_when_disconnected() {
        // Nothing listens on this address; the first connect attempt fails
        // and the transport sits in its retry delay.
        let transport =
            SessionTransport::connect("127.0.0.1:9".to_string(), quick_config());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.state(), LinkState::Disconnected);

        let result = transport.start_session(user()).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }
}
