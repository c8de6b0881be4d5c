use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instantaneous tilt reading, radians about each axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrientationState {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

impl OrientationState {
    /// True when any axis is deflected from neutral.
    pub fn is_active(&self) -> bool {
        self.pitch != 0.0 || self.roll != 0.0 || self.yaw != 0.0
    }

    /// Combined deflection magnitude from neutral.
    pub fn tilt_angle(&self) -> f64 {
        (self.roll * self.roll + self.pitch * self.pitch).sqrt()
    }
}

/// Snapshot of the game counters taken alongside one orientation poll.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    pub score: u32,
    pub fails: u32,
    pub is_game_over: bool,
}

/// One recorded data point. Immutable once constructed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Milliseconds since the recording started.
    pub timestamp: f64,
    /// Wall-clock time of the poll, RFC 3339.
    pub localtime: String,
    pub input_state: OrientationState,
    pub game_state: GameStateSnapshot,
    pub has_valid_input: bool,
    /// Measured milliseconds since the previous tick, not the nominal period.
    pub actual_interval: f64,
}

/// Subject identity attached to a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub uid: String,
    pub display_name: String,
    pub email: String,
}

/// A sealed training session as persisted by the sink and consumed by the
/// analyzer. `total_data_points` always equals `training_data.len()` and
/// `session_duration_ms` equals end minus start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user: UserInfo,
    pub session_start_time: DateTime<Utc>,
    pub session_end_time: DateTime<Utc>,
    pub session_duration_ms: f64,
    pub total_data_points: usize,
    pub training_data: Vec<Sample>,
}
