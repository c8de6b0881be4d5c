use std::sync::{Arc, Mutex};

use crate::types::GameStateSnapshot;

/// Read-only view of the concurrent game counters. The sample clock takes
/// one snapshot per tick instead of reaching into ambient state.
pub trait GameStateProvider: Send + Sync {
    fn snapshot(&self) -> GameStateSnapshot;
}

/// Shared counters updated by the game loop and snapshotted by sampling.
#[derive(Clone, Default)]
pub struct SharedGameState {
    inner: Arc<Mutex<GameStateSnapshot>>,
}

impl SharedGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_score(&self, points: u32) {
        if let Ok(mut state) = self.inner.lock() {
            state.score += points;
        }
    }

    pub fn add_fail(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.fails += 1;
        }
    }

    pub fn set_game_over(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.is_game_over = true;
        }
    }
}

impl GameStateProvider for SharedGameState {
    fn snapshot(&self) -> GameStateSnapshot {
        self.inner.lock().map(|s| *s).unwrap_or_default()
    }
}
