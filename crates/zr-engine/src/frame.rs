//! 16-bit PCM frame type for capture and export.

use zr_ir::StereoFrame;

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Quantize a float frame. Negative samples scale by 0x8000, positive by
    /// 0x7FFF, after clamping to [-1, 1].
    pub fn from_stereo(frame: StereoFrame) -> Self {
        Self { left: quantize(frame.left), right: quantize(frame.right) }
    }

    /// Back to float, for playback of captured audio.
    pub fn to_stereo(self) -> StereoFrame {
        StereoFrame::new(self.left as f32 / 32768.0, self.right as f32 / 32768.0)
    }
}

fn quantize(sample: f32) -> i16 {
    let s = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_is_asymmetric() {
        let f = Frame::from_stereo(StereoFrame::new(-1.0, 1.0));
        assert_eq!(f.left, -32768);
        assert_eq!(f.right, 32767);
    }

    #[test]
    fn quantize_clamps_and_drops_nan() {
        let f = Frame::from_stereo(StereoFrame::new(3.0, f32::NAN));
        assert_eq!(f.left, 32767);
        assert_eq!(f.right, 0);
    }
}
