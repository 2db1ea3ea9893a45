//! Engine error types.
//!
//! None of these ever stop the transport. The engine logs and drops them at
//! the subsystem boundary.

use thiserror::Error;

/// Misuse of a graph node's one-shot start/stop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node no longer exists")]
    UnknownNode,
    #[error("node was already started")]
    AlreadyStarted,
    #[error("node was stopped before it was started")]
    NotStarted,
    #[error("node has already stopped")]
    AlreadyStopped,
}

/// Capture tap errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("a capture is already running")]
    AlreadyActive,
}
