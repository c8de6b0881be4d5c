//! Sink-side session registry and persistence. One JSON record per sealed
//! session, grouped into per-user folders with date-numbered filenames.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::Result;
use crate::types::{Sample, SessionRecord, UserInfo};

/// One in-flight recording session on the sink.
struct ActiveSession {
    user: UserInfo,
    started_at: DateTime<Utc>,
    samples: Vec<Sample>,
}

/// Registry of active sessions for one client connection. Sessions that are
/// still open when the connection drops are aborted, never persisted.
pub struct SessionStore {
    base_dir: PathBuf,
    sessions: HashMap<String, ActiveSession>,
    next_seq: u64,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(SessionStore {
            base_dir,
            sessions: HashMap::new(),
            next_seq: 0,
        })
    }

    /// Open a session and hand back its freshly assigned id.
    pub fn start_session(&mut self, user: UserInfo) -> Result<String> {
        let started_at = Utc::now();
        self.next_seq += 1;
        let session_id = format!(
            "{}-{:04}",
            started_at.format("%Y%m%d%H%M%S%3f"),
            self.next_seq
        );

        fs::create_dir_all(self.user_dir(&user))?;
        info!(
            "session {} started for {} ({})",
            session_id, user.display_name, user.uid
        );
        self.sessions.insert(
            session_id.clone(),
            ActiveSession {
                user,
                started_at,
                samples: Vec::new(),
            },
        );
        Ok(session_id)
    }

    /// Append a batch to a session. Returns the accumulated sample count,
    /// or `None` for an unknown session id.
    pub fn append(&mut self, session_id: &str, samples: Vec<Sample>) -> Option<usize> {
        let session = self.sessions.get_mut(session_id)?;
        session.samples.extend(samples);
        Some(session.samples.len())
    }

    /// Seal a session and write its record to disk. Returns the file path,
    /// or `None` for an unknown session id.
    pub fn end_session(&mut self, session_id: &str) -> Result<Option<PathBuf>> {
        let Some(session) = self.sessions.remove(session_id) else {
            return Ok(None);
        };

        let ended_at = Utc::now();
        let duration_ms = (ended_at - session.started_at).num_milliseconds() as f64;
        let record = SessionRecord {
            session_id: session_id.to_string(),
            session_start_time: session.started_at,
            session_end_time: ended_at,
            session_duration_ms: duration_ms,
            total_data_points: session.samples.len(),
            user: session.user.clone(),
            training_data: session.samples,
        };

        let path = self.next_record_path(&session.user, ended_at)?;
        fs::write(&path, serde_json::to_vec_pretty(&record)?)?;
        info!(
            "session {} sealed: {} samples -> {}",
            session_id,
            record.total_data_points,
            path.display()
        );
        Ok(Some(path))
    }

    /// Drop every unsealed session, losing its data.
    pub fn abort_all(&mut self) {
        for (id, session) in self.sessions.drain() {
            warn!(
                "aborting unsealed session {} ({} samples lost)",
                id,
                session.samples.len()
            );
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn user_dir(&self, user: &UserInfo) -> PathBuf {
        self.base_dir.join(&user.uid)
    }

    /// `<base>/<uid>/<displayName>_<YYYYMMDD>_<NN>.json`, NN counting up
    /// per user per day.
    fn next_record_path(&self, user: &UserInfo, when: DateTime<Utc>) -> Result<PathBuf> {
        let dir = self.user_dir(user);
        fs::create_dir_all(&dir)?;

        let prefix = format!("{}_{}", user.display_name, when.format("%Y%m%d"));
        let existing = fs::read_dir(&dir)?
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(prefix.as_str())
            })
            .count();

        Ok(dir.join(format!("{}_{:02}.json", prefix, existing + 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameStateSnapshot, OrientationState};

    fn user() -> UserInfo {
        UserInfo {
            uid: "uid-1".to_string(),
            display_name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    fn sample(n: usize) -> Sample {
        Sample {
            timestamp: n as f64 * 10.0,
            localtime: String::new(),
            input_state: OrientationState::default(),
            game_state: GameStateSnapshot::default(),
            has_valid_input: false,
            actual_interval: 10.0,
        }
    }

    fn temp_store(tag: &str) -> (SessionStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "balance_tracker_{}_{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        (SessionStore::new(&dir).unwrap(), dir)
    }

    #[test]
    fn test_sealed_record_invariants() {
        let (mut store, dir) = temp_store("seal");

        let id = store.start_session(user()).unwrap();
        assert_eq!(store.append(&id, vec![sample(0), sample(1)]), Some(2));
        assert_eq!(store.append(&id, vec![sample(2)]), Some(3));

        let path = store.end_session(&id).unwrap().unwrap();
        let record: SessionRecord =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(record.session_id, id);
        assert_eq!(record.total_data_points, record.training_data.len());
        assert_eq!(record.total_data_points, 3);
        assert!(record.session_duration_ms >= 0.0);
        assert_eq!(store.active_sessions(), 0);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_unknown_session_rejected() {
        let (mut store, dir) = temp_store("unknown");
        assert_eq!(store.append("nope", vec![sample(0)]), None);
        assert!(store.end_session("nope").unwrap().is_none());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_filenames_number_per_user_per_day() {
        let (mut store, dir) = temp_store("numbering");

        let first = store.start_session(user()).unwrap();
        let first_path = store.end_session(&first).unwrap().unwrap();
        let second = store.start_session(user()).unwrap();
        let second_path = store.end_session(&second).unwrap().unwrap();

        let first_name = first_path.file_name().unwrap().to_string_lossy().to_string();
        let second_name = second_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert!(first_name.starts_with("Alice_"));
        assert!(first_name.ends_with("_01.json"));
        assert!(second_name.ends_with("_02.json"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_abort_discards_unsealed_sessions() {
        let (mut store, dir) = temp_store("abort");
        let id = store.start_session(user()).unwrap();
        store.append(&id, vec![sample(0)]);
        store.abort_all();
        assert_eq!(store.active_sessions(), 0);
        assert!(store.end_session(&id).unwrap().is_none());
        let _ = fs::remove_dir_all(dir);
    }
}
