use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

use balance_tracker_rs::protocol::{ClientMessage, SinkMessage};
use balance_tracker_rs::sink::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "sink")]
#[command(about = "Recording sink - accepts training sessions and persists them as JSON", long_about = None)]
struct Args {
    /// TCP bind address
    #[arg(long, default_value = "0.0.0.0:8765")]
    bind: String,

    /// Directory session records are written under
    #[arg(long, default_value = "traindata")]
    base_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let listener = TcpListener::bind(&args.bind).await?;
    info!("recording sink listening on {}", args.bind);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("recorder connected from {}", peer);
        let base_dir = args.base_dir.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_recorder(stream, &base_dir).await {
                warn!("connection from {} ended with error: {}", peer, e);
            } else {
                info!("recorder {} disconnected", peer);
            }
        });
    }
}

/// One recorder connection: a session registry of its own, line-JSON in,
/// line-JSON out. Sessions left open when the connection drops are
/// aborted, never persisted.
async fn handle_recorder(stream: TcpStream, base_dir: &str) -> Result<()> {
    let mut store = SessionStore::new(base_dir)?;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let result = session_loop(&mut store, &mut lines, &mut writer).await;
    store.abort_all();
    result
}

async fn session_loop(
    store: &mut SessionStore,
    lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: &mut OwnedWriteHalf,
) -> Result<()> {
    while let Some(line) = lines.next_line().await? {
        let msg: ClientMessage = match serde_json::from_str(&line) {
            Ok(msg) => msg,
            Err(e) => {
                reply(
                    writer,
                    &SinkMessage::Error {
                        message: format!("invalid message: {}", e),
                    },
                )
                .await?;
                continue;
            }
        };

        let response = match msg {
            ClientMessage::StartSession { user } => match store.start_session(user) {
                Ok(session_id) => SinkMessage::SessionStarted { session_id },
                Err(e) => SinkMessage::Error {
                    message: format!("could not start session: {}", e),
                },
            },
            ClientMessage::TrainingData { session_id, data } => {
                let count = data.len();
                match store.append(&session_id, data) {
                    Some(_) => SinkMessage::DataReceived { data_points: count },
                    None => SinkMessage::Error {
                        message: "invalid session ID".to_string(),
                    },
                }
            }
            ClientMessage::EndSession { session_id } => match store.end_session(&session_id) {
                Ok(Some(path)) => SinkMessage::SessionEnded {
                    filename: path.display().to_string(),
                },
                Ok(None) => SinkMessage::Error {
                    message: "invalid session ID".to_string(),
                },
                Err(e) => SinkMessage::Error {
                    message: format!("could not end session: {}", e),
                },
            },
        };
        reply(writer, &response).await?;
    }

    Ok(())
}

async fn reply(writer: &mut OwnedWriteHalf, msg: &SinkMessage) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(msg)?;
    line.push(b'\n');
    writer.write_all(&line).await
}
