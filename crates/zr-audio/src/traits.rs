//! Output trait and error types.

use thiserror::Error;
use zr_ir::StereoFrame;

/// Errors raised while opening or driving an output device.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("device init failed: {0}")]
    DeviceInit(String),
    #[error("stream creation failed: {0}")]
    StreamCreate(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("no audio output device available")]
    NoDevice,
}

/// A sink for rendered stereo frames.
pub trait AudioOutput {
    /// Device sample rate. The engine renders at this rate.
    fn sample_rate(&self) -> u32;

    /// Queue frames for playback. Returns how many were accepted.
    fn write(&mut self, frames: &[StereoFrame]) -> usize;

    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;
}
