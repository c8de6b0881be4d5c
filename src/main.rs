use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

use balance_tracker_rs::buffer::SessionBuffer;
use balance_tracker_rs::defaults;
use balance_tracker_rs::error::Error;
use balance_tracker_rs::game_state::SharedGameState;
use balance_tracker_rs::orientation::{DeviceProfile, MockJoystick};
use balance_tracker_rs::sampler::SampleClock;
use balance_tracker_rs::transport::{SessionTransport, TransportConfig};
use balance_tracker_rs::types::UserInfo;

#[derive(Parser, Debug)]
#[command(name = "recorder")]
#[command(about = "Balance training recorder - samples tilt input and streams it to a sink", long_about = None)]
struct Args {
    /// Duration in seconds (0 = run until Ctrl-C)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Recording sink address
    #[arg(long, default_value = "127.0.0.1:8765")]
    sink: String,

    /// Sampling period in milliseconds
    #[arg(long, default_value_t = defaults::SAMPLE_PERIOD_MS)]
    period_ms: u64,

    /// Samples per transport batch
    #[arg(long, default_value_t = defaults::BATCH_SIZE)]
    batch_size: usize,

    /// Subject id
    #[arg(long, default_value = "local-subject")]
    uid: String,

    /// Subject display name
    #[arg(long, default_value = "Local Subject")]
    display_name: String,

    /// Subject email
    #[arg(long, default_value = "")]
    email: String,

    /// Reported input device label, used to pick deadzone/sensitivity
    #[arg(long, default_value = "")]
    device: String,

    /// Tilt amplitude of the built-in mock controller, radians
    #[arg(long, default_value = "0.3")]
    mock_tilt: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("[{}] Balance recorder starting", ts_now());
    println!("  Sink: {}", args.sink);
    println!("  Period: {} ms, batch size {}", args.period_ms, args.batch_size);
    println!("  Subject: {} ({})", args.display_name, args.uid);

    let user = UserInfo {
        uid: args.uid.clone(),
        display_name: args.display_name.clone(),
        email: args.email.clone(),
    };
    let profile = DeviceProfile::classify(&args.device);

    let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();
    let buffer = Arc::new(Mutex::new(SessionBuffer::new(args.batch_size, batch_tx)));

    let transport = SessionTransport::connect(
        args.sink.clone(),
        TransportConfig {
            reconnect_delay: Duration::from_secs(defaults::RECONNECT_DELAY_SECS),
            handshake_timeout: Duration::from_secs(defaults::HANDSHAKE_TIMEOUT_SECS),
        },
    );

    // The sink may not be up yet; keep asking until the handshake sticks.
    let session_id = loop {
        match transport.start_session(user.clone()).await {
            Ok(id) => break id,
            Err(Error::NotConnected) => {
                println!("[{}] Waiting for sink at {}...", ts_now(), args.sink);
                sleep(Duration::from_secs(1)).await;
            }
            Err(e) => bail!("could not start session: {}", e),
        }
    };
    println!("[{}] Session {} started", ts_now(), session_id);

    let mut clock = SampleClock::new(
        Arc::new(MockJoystick::new(args.mock_tilt)),
        Arc::new(SharedGameState::new()),
        profile,
        buffer.clone(),
    );
    clock.start(Duration::from_millis(args.period_ms))?;

    let deadline = async {
        if args.duration > 0 {
            sleep(Duration::from_secs(args.duration)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut status = interval(Duration::from_secs(5));
    status.tick().await; // immediate first tick

    loop {
        tokio::select! {
            _ = &mut deadline => {
                println!("[{}] Duration reached, stopping...", ts_now());
                break;
            }
            _ = &mut ctrl_c => {
                println!("[{}] Interrupted, stopping...", ts_now());
                break;
            }
            Some(batch) = batch_rx.recv() => {
                transport.send_batch(&session_id, batch);
            }
            _ = status.tick() => {
                println!(
                    "[{}] {} samples ({} skipped ticks), link {:?}",
                    ts_now(),
                    clock.samples_emitted(),
                    clock.ticks_skipped(),
                    transport.state()
                );
            }
        }
    }

    // Stop sampling, push out the trailing partial batch, then seal.
    clock.stop();
    if let Ok(mut buf) = buffer.lock() {
        buf.flush();
    }
    while let Ok(batch) = batch_rx.try_recv() {
        transport.send_batch(&session_id, batch);
    }

    match transport.end_session(&session_id).await {
        Ok(filename) => {
            println!("[{}] Session saved by sink as {}", ts_now(), filename);
        }
        Err(e) => {
            println!("[{}] Session not confirmed saved: {}", ts_now(), e);
        }
    }

    println!("\n=== Recording Stats ===");
    println!("Samples emitted: {}", clock.samples_emitted());
    println!("Ticks skipped:   {}", clock.ticks_skipped());

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
