//! Master output tap for lossless capture.

use crate::error::CaptureError;
use crate::frame::Frame;

/// Collects 16-bit copies of the master output while active.
#[derive(Debug, Default)]
pub struct CaptureTap {
    active: bool,
    frames: Vec<Frame>,
}

impl CaptureTap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.active {
            return Err(CaptureError::AlreadyActive);
        }
        self.frames.clear();
        self.active = true;
        log::debug!("capture: started");
        Ok(())
    }

    #[inline]
    pub fn push(&mut self, frame: Frame) {
        if self.active {
            self.frames.push(frame);
        }
    }

    /// End the capture. `None` if it was not running or caught nothing.
    pub fn stop(&mut self) -> Option<Vec<Frame>> {
        if !self.active {
            return None;
        }
        self.active = false;
        let frames = std::mem::take(&mut self.frames);
        log::debug!("capture: stopped with {} frames", frames.len());
        (!frames.is_empty()).then_some(frames)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
