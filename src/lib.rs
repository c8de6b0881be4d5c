//! Balance-training motion capture and reachable-space reconstruction.
//!
//! The recording pipeline polls a tilt controller at a fixed rate, batches
//! samples, and streams them to a recording sink over a persistent
//! line-JSON session channel:
//!
//! ```text
//! OrientationSource -> SampleClock -> SessionBuffer -> SessionTransport
//!                                                          |
//!                                  persisted session record (sink)
//!                                                          |
//!                        ReachableSpaceAnalyzer -> report / mesh handoff
//! ```
//!
//! The analyzer is a pure batch pass over a sealed session: sphere
//! projection, per-sector boundary extraction, and extension of the
//! boundary to a common top plane.

pub mod analyzer;
pub mod buffer;
pub mod error;
pub mod game_state;
pub mod modulation;
pub mod orientation;
pub mod protocol;
pub mod report;
pub mod sampler;
pub mod sink;
pub mod transport;
pub mod types;

pub use error::{Error, Result};

/// Design defaults shared by the binaries.
pub mod defaults {
    /// Target sampling period in milliseconds (100 Hz).
    pub const SAMPLE_PERIOD_MS: u64 = 10;

    /// Samples per transport batch.
    pub const BATCH_SIZE: usize = 100;

    /// Delay before reconnecting a dropped session channel, seconds.
    pub const RECONNECT_DELAY_SECS: u64 = 3;

    /// Bound on the start/end session handshakes, seconds.
    pub const HANDSHAKE_TIMEOUT_SECS: u64 = 5;

    /// Azimuth sectors for boundary extraction (2° each).
    pub const SECTORS: usize = 180;

    /// Radius of the projection sphere.
    pub const SPHERE_RADIUS: f64 = 1.0;
}
