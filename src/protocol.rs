//! Wire messages for the session channel. One JSON object per line over a
//! persistent TCP connection, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::types::{Sample, UserInfo};

/// Recorder → sink.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartSession {
        user: UserInfo,
    },
    TrainingData {
        session_id: String,
        data: Vec<Sample>,
    },
    EndSession {
        session_id: String,
    },
}

/// Sink → recorder.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkMessage {
    SessionStarted { session_id: String },
    /// Informational batch acknowledgment; not required for correctness.
    DataReceived { data_points: usize },
    SessionEnded { filename: String },
    Error { message: String },
}
