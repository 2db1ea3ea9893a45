//! Band-limited oscillators and noise tables.

use core::f64::consts::TAU;
use rand::Rng;
use zr_ir::Waveform;

/// Phase-accumulator oscillator. Sawtooth and square use PolyBLEP to tame
/// aliasing at the wrap points.
#[derive(Clone, Debug)]
pub struct Oscillator {
    waveform: Waveform,
    /// Normalized phase in [0, 1).
    phase: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self { waveform, phase: 0.0 }
    }

    /// Produce one sample at `frequency` Hz and advance the phase.
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let increment = (frequency as f64 / sample_rate as f64).clamp(-0.5, 0.5);
        let out = render(self.waveform, self.phase, increment.abs());
        self.phase += increment;
        self.phase -= libm::floor(self.phase);
        out
    }
}

fn render(waveform: Waveform, phase: f64, increment: f64) -> f32 {
    match waveform {
        Waveform::Sine => libm::sin(TAU * phase) as f32,
        Waveform::Triangle => {
            let v = if phase < 0.25 {
                4.0 * phase
            } else if phase < 0.75 {
                2.0 - 4.0 * phase
            } else {
                4.0 * phase - 4.0
            };
            v as f32
        }
        Waveform::Sawtooth => {
            // Starts at zero and rises, wrapping at phase 0.5.
            let p = wrap(phase + 0.5);
            (2.0 * p - 1.0 - poly_blep(p, increment)) as f32
        }
        Waveform::Square => {
            let naive = if phase < 0.5 { 1.0 } else { -1.0 };
            let v = naive + poly_blep(phase, increment) - poly_blep(wrap(phase + 0.5), increment);
            v as f32
        }
    }
}

fn wrap(phase: f64) -> f64 {
    phase - libm::floor(phase)
}

fn poly_blep(phase: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        0.0
    } else if phase < increment {
        let t = phase / increment;
        2.0 * t - t * t - 1.0
    } else if phase > 1.0 - increment {
        let t = (phase - 1.0) / increment;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

/// Uniform noise in [-1, 1) scaled by `gain`.
pub fn white_noise<R: Rng>(rng: &mut R, len: usize, gain: f32) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0f32..1.0) * gain).collect()
}

/// Pink noise through Paul Kellet's refined filter, scaled by `gain`.
pub fn pink_noise<R: Rng>(rng: &mut R, len: usize, gain: f32) -> Vec<f32> {
    let mut b = [0.0f32; 6];
    (0..len)
        .map(|_| {
            let white: f32 = rng.gen_range(-1.0..1.0);
            b[0] = 0.99886 * b[0] + white * 0.0555179;
            b[1] = 0.99332 * b[1] + white * 0.0750759;
            b[2] = 0.96900 * b[2] + white * 0.1538520;
            b[3] = 0.86650 * b[3] + white * 0.3104856;
            b[4] = 0.55000 * b[4] + white * 0.5329522;
            b[5] = -0.7616 * b[5] - white * 0.0168980;
            (b.iter().sum::<f32>() + white * 0.5362) * gain
        })
        .collect()
}
