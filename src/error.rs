//! Error types for scheduler operations and persistence

use std::path::PathBuf;

use thiserror::Error;

use crate::state::{TimerId, TimerStatus};

/// Errors returned synchronously by scheduler commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("timer {0} not found")]
    NotFound(TimerId),

    #[error("cannot {operation} timer {id} while it is {status}")]
    InvalidState {
        id: TimerId,
        status: TimerStatus,
        operation: &'static str,
    },

    #[error("timer duration must be positive, got {0}s")]
    InvalidDuration(i64),
}

/// Errors inside the persistent store. Logged, never surfaced to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read timer file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write timer file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse timer file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize timers")]
    Serialize(#[from] serde_json::Error),

    #[error("unsupported timer file version {found} in {path}")]
    Version { path: PathBuf, found: u32 },
}
