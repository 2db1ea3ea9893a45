//! Stereo f32 frames and decoded audio clips.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ops::{Add, AddAssign, Mul};

/// One stereo sample pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0.0, right: 0.0 }
    }

    /// Create a mono frame (same value on both channels).
    pub const fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    /// Larger of the two absolute channel values.
    pub fn peak(self) -> f32 {
        libm::fabsf(self.left).max(libm::fabsf(self.right))
    }
}

impl Add for StereoFrame {
    type Output = StereoFrame;
    fn add(self, rhs: StereoFrame) -> StereoFrame {
        StereoFrame::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl AddAssign for StereoFrame {
    fn add_assign(&mut self, rhs: StereoFrame) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for StereoFrame {
    type Output = StereoFrame;
    fn mul(self, gain: f32) -> StereoFrame {
        StereoFrame::new(self.left * gain, self.right * gain)
    }
}

/// A block of stereo audio at a known sample rate.
///
/// Frames are shared behind an `Arc` so a retained clip can be replayed
/// without copying.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioClip {
    frames: Arc<[StereoFrame]>,
    sample_rate: u32,
}

impl AudioClip {
    pub fn new(frames: Vec<StereoFrame>, sample_rate: u32) -> Self {
        Self { frames: frames.into(), sample_rate }
    }

    /// Build a clip from mono samples, duplicated to both channels.
    pub fn from_mono(samples: &[f32], sample_rate: u32) -> Self {
        Self::new(samples.iter().map(|&s| StereoFrame::mono(s)).collect(), sample_rate)
    }

    pub fn frames(&self) -> &[StereoFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.len() as f64 / self.sample_rate as f64
    }
}
