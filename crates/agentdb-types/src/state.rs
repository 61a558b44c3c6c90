//! Lifecycle state of an AgentDB instance.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Initialization state machine: `Uninitialized -> Initializing -> Ready -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

impl StoreState {
    /// Whether data operations are accepted in this state.
    pub fn is_ready(self) -> bool {
        self == StoreState::Ready
    }
}

impl Default for StoreState {
    fn default() -> Self {
        StoreState::Uninitialized
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreState::Uninitialized => write!(f, "uninitialized"),
            StoreState::Initializing => write!(f, "initializing"),
            StoreState::Ready => write!(f, "ready"),
            StoreState::Closed => write!(f, "closed"),
        }
    }
}
