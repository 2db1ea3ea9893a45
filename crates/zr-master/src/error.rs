//! Controller error types.

use thiserror::Error;
use zr_audio::AudioError;
use zr_engine::CaptureError;
use zr_formats::{DecodeError, PatchError};

/// Why an ambient source could not be loaded.
#[derive(Debug, Error)]
pub enum AmbientError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("superseded by a newer request")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("could not spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("audio thread is gone")]
    Disconnected,
}
