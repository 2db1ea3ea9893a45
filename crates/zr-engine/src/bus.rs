//! Module buses and the master section.
//!
//! Each module owns one fixed chain, built once at engine construction:
//!
//! ```text
//! voices -> trim -> volume -> pan -> [low-pass] -+-> master
//!                                                +-> feedback delay -> echo -> master
//!                                                +-> reverb send -> convolver
//! ```
//!
//! Only parameters change afterwards, and every setter goes through
//! [`Param::set_target_at`].

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz};
use core::f32::consts::FRAC_PI_2;
use zr_ir::{Param, StereoFrame};

/// Time constant for bus level, pan and send changes (seconds).
pub const SMOOTHING: f64 = 0.05;

/// Time constant for chord filter changes (seconds).
pub const FILTER_SMOOTHING: f64 = 0.02;

const DELAY_SECONDS: f32 = 0.4;
const DELAY_FEEDBACK: f32 = 0.4;

/// Equal-power stereo panner with the same law as a browser `StereoPannerNode`.
pub fn equal_power_pan(input: StereoFrame, pan: f32) -> StereoFrame {
    let pan = pan.clamp(-1.0, 1.0);
    let x = if pan <= 0.0 { pan + 1.0 } else { pan };
    let gain_l = libm::cosf(x * FRAC_PI_2);
    let gain_r = libm::sinf(x * FRAC_PI_2);
    if pan <= 0.0 {
        StereoFrame::new(input.left + input.right * gain_l, input.right * gain_r)
    } else {
        StereoFrame::new(input.left * gain_l, input.right + input.left * gain_r)
    }
}

/// Fixed-time stereo delay with feedback.
struct FeedbackDelay {
    left: Vec<f32>,
    right: Vec<f32>,
    write: usize,
}

impl FeedbackDelay {
    fn new(sample_rate: u32) -> Self {
        let len = ((sample_rate as f32 * DELAY_SECONDS) as usize).max(1);
        Self { left: vec![0.0; len], right: vec![0.0; len], write: 0 }
    }

    fn process(&mut self, input: StereoFrame) -> StereoFrame {
        // The line is exactly one delay long, so the oldest sample is at `write`.
        let out = StereoFrame::new(self.left[self.write], self.right[self.write]);
        self.left[self.write] = input.left + out.left * DELAY_FEEDBACK;
        self.right[self.write] = input.right + out.right * DELAY_FEEDBACK;
        self.write = (self.write + 1) % self.left.len();
        out
    }
}

/// Resonant low-pass with smoothed cutoff and Q.
pub struct LowPass {
    pub cutoff: Param,
    pub q: Param,
    left: DirectForm2Transposed<f32>,
    right: DirectForm2Transposed<f32>,
    applied: (f32, f32),
    sample_rate: f32,
}

impl LowPass {
    fn new(cutoff: f32, q: f32, sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        let coeffs = lowpass_coefficients(cutoff, q, sample_rate);
        Self {
            cutoff: Param::new(cutoff),
            q: Param::new(q),
            left: DirectForm2Transposed::<f32>::new(coeffs),
            right: DirectForm2Transposed::<f32>::new(coeffs),
            applied: (cutoff, q),
            sample_rate,
        }
    }

    fn process(&mut self, input: StereoFrame, now: f64) -> StereoFrame {
        let target = (self.cutoff.value_at(now), self.q.value_at(now));
        if (target.0 - self.applied.0).abs() > 0.5 || (target.1 - self.applied.1).abs() > 1e-3 {
            let coeffs = lowpass_coefficients(target.0, target.1, self.sample_rate);
            self.left.update_coefficients(coeffs);
            self.right.update_coefficients(coeffs);
            self.applied = target;
        }
        StereoFrame::new(self.left.run(input.left), self.right.run(input.right))
    }
}

fn lowpass_coefficients(cutoff: f32, q: f32, sample_rate: f32) -> Coefficients<f32> {
    let cutoff = cutoff.clamp(10.0, sample_rate * 0.49);
    let q = q.max(0.0001);
    Coefficients::<f32>::from_params(biquad::Type::LowPass, sample_rate.hz(), cutoff.hz(), q)
        .unwrap_or(Coefficients { a1: 0.0, a2: 0.0, b0: 1.0, b1: 0.0, b2: 0.0 })
}

/// What a bus hands to the master section for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BusOutput {
    /// Dry signal plus delay return.
    pub main: StereoFrame,
    /// Reverb send.
    pub reverb: StereoFrame,
}

/// One module's fixed routing chain.
pub struct Bus {
    /// Input trim ahead of the mixer volume (ambient level).
    pub trim: Param,
    /// Mixer volume after mute/solo.
    pub volume: Param,
    pub pan: Param,
    pub filter: Option<LowPass>,
    /// Delay return level.
    pub echo: Param,
    pub reverb_send: Param,
    delay: FeedbackDelay,
}

impl Bus {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            trim: Param::new(1.0),
            volume: Param::new(1.0),
            pan: Param::new(0.0),
            filter: None,
            echo: Param::new(0.0),
            reverb_send: Param::new(0.0),
            delay: FeedbackDelay::new(sample_rate),
        }
    }

    /// A bus with the chord low-pass (wide open, Q 0.5).
    pub fn with_lowpass(sample_rate: u32) -> Self {
        Self { filter: Some(LowPass::new(20_000.0, 0.5, sample_rate)), ..Self::new(sample_rate) }
    }

    pub fn process(&mut self, input: StereoFrame, now: f64) -> BusOutput {
        let level = self.trim.value_at(now) * self.volume.value_at(now);
        let mut x = equal_power_pan(input * level, self.pan.value_at(now));
        if let Some(filter) = &mut self.filter {
            x = filter.process(x, now);
        }
        let echo = self.delay.process(x) * self.echo.value_at(now);
        BusOutput { main: x + echo, reverb: x * self.reverb_send.value_at(now) }
    }

    pub fn prune_automation(&mut self, now: f64) {
        self.trim.prune(now);
        self.volume.prune(now);
        self.pan.prune(now);
        self.echo.prune(now);
        self.reverb_send.prune(now);
        if let Some(filter) = &mut self.filter {
            filter.cutoff.prune(now);
            filter.q.prune(now);
        }
    }
}

/// Feed-forward soft-knee compressor on the master output.
pub struct Compressor {
    threshold_db: f32,
    knee_db: f32,
    ratio: f32,
    attack_coef: f32,
    release_coef: f32,
    /// Current gain reduction in dB (<= 0).
    reduction_db: f32,
}

impl Compressor {
    /// Threshold -24 dB, knee 30 dB, ratio 12, attack 3 ms, release 250 ms.
    pub fn new(sample_rate: u32) -> Self {
        let coef = |seconds: f32| libm::expf(-1.0 / (seconds * sample_rate as f32));
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack_coef: coef(0.003),
            release_coef: coef(0.25),
            reduction_db: 0.0,
        }
    }

    fn curve(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        if 2.0 * over < -self.knee_db {
            level_db
        } else if 2.0 * over.abs() <= self.knee_db {
            let k = over + self.knee_db / 2.0;
            level_db + (1.0 / self.ratio - 1.0) * k * k / (2.0 * self.knee_db)
        } else {
            self.threshold_db + over / self.ratio
        }
    }

    pub fn process(&mut self, input: StereoFrame) -> StereoFrame {
        let level_db = 20.0 * libm::log10f(input.peak().max(1e-6));
        let target = self.curve(level_db) - level_db;
        let coef = if target < self.reduction_db { self.attack_coef } else { self.release_coef };
        self.reduction_db = target + (self.reduction_db - target) * coef;
        input * libm::powf(10.0, self.reduction_db / 20.0)
    }

    /// Current gain reduction in dB.
    #[cfg(test)]
    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }
}

/// Master gain, reverb return and output compressor.
pub struct MasterSection {
    pub volume: Param,
    pub reverb_return: Param,
    compressor: Compressor,
}

impl MasterSection {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            volume: Param::new(0.8),
            reverb_return: Param::new(0.5),
            compressor: Compressor::new(sample_rate),
        }
    }

    pub fn process(&mut self, main: StereoFrame, reverb: StereoFrame, now: f64) -> StereoFrame {
        let mixed = main + reverb * self.reverb_return.value_at(now);
        self.compressor.process(mixed * self.volume.value_at(now))
    }

    pub fn prune_automation(&mut self, now: f64) {
        self.volume.prune(now);
        self.reverb_return.prune(now);
    }
}
