//! Observable lifecycle state of a launched process

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit code reported by the OS while a process is still running (STILL_ACTIVE)
pub const STILL_ACTIVE: u32 = 259;

/// State of a launched process as seen by its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "exit_code", rename_all = "snake_case")]
pub enum ProcessState {
    /// Created and resumed, no exit observed yet
    Running,
    /// Exited with the given code
    Exited(u32),
    /// Handles released; the process itself may still be running
    Closed,
}

impl ProcessState {
    /// Classify a raw exit code query result
    pub fn from_exit_code(code: u32) -> Self {
        if code == STILL_ACTIVE {
            ProcessState::Running
        } else {
            ProcessState::Exited(code)
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }

    pub fn exit_code(&self) -> Option<u32> {
        match self {
            ProcessState::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Running => write!(f, "running"),
            ProcessState::Exited(code) => write!(f, "exited({})", code),
            ProcessState::Closed => write!(f, "closed"),
        }
    }
}
