use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::info;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::buffer::SessionBuffer;
use crate::error::{Error, Result};
use crate::game_state::GameStateProvider;
use crate::orientation::{DeviceProfile, OrientationSource};
use crate::types::Sample;

/// Drives sampling at a fixed target period for the lifetime of a recording.
/// Each tick polls the orientation source once, snapshots the game counters
/// once, and appends one sample to the session buffer. Ticks never run
/// concurrently with each other.
pub struct SampleClock {
    source: Arc<dyn OrientationSource>,
    game_state: Arc<dyn GameStateProvider>,
    profile: DeviceProfile,
    buffer: Arc<Mutex<SessionBuffer>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    emitted: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
}

impl SampleClock {
    pub fn new(
        source: Arc<dyn OrientationSource>,
        game_state: Arc<dyn GameStateProvider>,
        profile: DeviceProfile,
        buffer: Arc<Mutex<SessionBuffer>>,
    ) -> Self {
        SampleClock {
            source,
            game_state,
            profile,
            buffer,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            emitted: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Begin periodic sampling. Fails when already active.
    pub fn start(&mut self, period: Duration) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        info!("sample clock started, period {:?}", period);
        let source = self.source.clone();
        let game_state = self.game_state.clone();
        let profile = self.profile;
        let buffer = self.buffer.clone();
        let running = self.running.clone();
        let emitted = self.emitted.clone();
        let skipped = self.skipped.clone();

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let started = Instant::now();
            let mut last_tick: Option<Instant> = None;

            loop {
                ticker.tick().await;
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                let now = Instant::now();
                let actual = measured_interval_ms(last_tick, now, period);
                last_tick = Some(now);

                // Source not ready yet: skip the tick, emit nothing.
                let Some(raw) = source.read() else {
                    skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                };

                let input = profile.apply(raw);
                let sample = Sample {
                    timestamp: started.elapsed().as_secs_f64() * 1000.0,
                    localtime: Utc::now().to_rfc3339(),
                    has_valid_input: input.is_active(),
                    input_state: input,
                    game_state: game_state.snapshot(),
                    actual_interval: actual,
                };

                if let Ok(mut buf) = buffer.lock() {
                    buf.append(sample);
                }
                emitted.fetch_add(1, Ordering::Relaxed);
            }
        }));

        Ok(())
    }

    /// Halt sampling. Idempotent; already-buffered samples stay buffered.
    pub fn stop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(
                "sample clock stopped after {} samples ({} skipped ticks)",
                self.emitted.load(Ordering::Relaxed),
                self.skipped.load(Ordering::Relaxed)
            );
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn samples_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// Actual elapsed time since the previous tick in milliseconds. The first
/// tick has no predecessor and reports the nominal period.
fn measured_interval_ms(prev: Option<Instant>, now: Instant, nominal: Duration) -> f64 {
    match prev {
        Some(prev) => now.duration_since(prev).as_secs_f64() * 1000.0,
        None => nominal.as_secs_f64() * 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_state::SharedGameState;
    use crate::orientation::{MockJoystick, UnavailableSource};
    use tokio::sync::mpsc;

    fn clock_with(source: Arc<dyn OrientationSource>) -> (SampleClock, Arc<Mutex<SessionBuffer>>) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let buffer = Arc::new(Mutex::new(SessionBuffer::new(1000, tx)));
        let clock = SampleClock::new(
            source,
            Arc::new(SharedGameState::new()),
            DeviceProfile::default(),
            buffer.clone(),
        );
        (clock, buffer)
    }

    #[test]
    fn test_measured_interval_reflects_jitter() {
        let nominal = Duration::from_millis(10);
        let base = Instant::now();
        let late = base + Duration::from_millis(14);

        // Scheduler ran 4 ms late: the sample must carry 14 ms, not 10.
        let measured = measured_interval_ms(Some(base), late, nominal);
        assert!((measured - 14.0).abs() < 1e-9);

        // First tick falls back to the nominal period.
        let first = measured_interval_ms(None, base, nominal);
        assert!((first - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (mut clock, _buffer) = clock_with(Arc::new(MockJoystick::new(0.2)));
        clock.start(Duration::from_millis(5)).unwrap();
        assert!(matches!(
            clock.start(Duration::from_millis(5)),
            Err(Error::AlreadyRunning)
        ));
        clock.stop();
        clock.stop(); // idempotent
        assert!(!clock.is_running());
    }

    #[tokio::test]
    async fn test_ticks_emit_ordered_samples() {
        let (mut clock, buffer) = clock_with(Arc::new(MockJoystick::new(0.2)));
        clock.start(Duration::from_millis(2)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        clock.stop();

        let emitted = clock.samples_emitted();
        assert!(emitted > 0);
        let buf = buffer.lock().unwrap();
        assert_eq!(buf.appended(), emitted);
    }

    #[tokio::test]
    async fn test_unavailable_source_skips_ticks() {
        let (mut clock, buffer) = clock_with(Arc::new(UnavailableSource));
        clock.start(Duration::from_millis(2)).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        clock.stop();

        assert_eq!(clock.samples_emitted(), 0);
        assert!(clock.ticks_skipped() > 0);
        assert!(buffer.lock().unwrap().is_empty());
    }
}
