//! Synthetic reverb: a generated impulse response and a partitioned convolver.
//!
//! The impulse response is decaying stereo noise, `(u * 2 - 1) * (1 - i/len)^2.5`,
//! normalized the way a browser `ConvolverNode` normalizes its buffer. The
//! convolver is uniformly partitioned overlap-save with one block of latency.

use std::sync::Arc;

use rand::Rng;
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use zr_ir::StereoFrame;

/// Partition size in frames.
pub const BLOCK_SIZE: usize = 512;

const DECAY_EXPONENT: f32 = 2.5;
const GAIN_CALIBRATION: f32 = 0.00125;
const MIN_POWER: f32 = 0.000125;
const CALIBRATION_RATE: f32 = 44_100.0;

/// A generated stereo impulse response.
#[derive(Clone, Debug)]
pub struct ImpulseResponse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl ImpulseResponse {
    /// `seconds` of decaying noise. Never shorter than one frame.
    pub fn generate<R: Rng>(rng: &mut R, seconds: f32, sample_rate: u32) -> Self {
        let len = ((sample_rate as f32 * seconds.max(0.0)) as usize).max(1);
        let channel = |rng: &mut R| -> Vec<f32> {
            (0..len)
                .map(|i| {
                    let u: f32 = rng.gen();
                    let decay = libm::powf(1.0 - i as f32 / len as f32, DECAY_EXPONENT);
                    (u * 2.0 - 1.0) * decay
                })
                .collect()
        };
        let left = channel(rng);
        let right = channel(rng);
        Self { left, right, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Scale applied to the response so loudness is independent of its length.
    pub fn normalization_scale(&self) -> f32 {
        let sum: f32 = self.left.iter().chain(self.right.iter()).map(|s| s * s).sum();
        let count = (self.left.len() + self.right.len()).max(1) as f32;
        let power = libm::sqrtf(sum / count).max(MIN_POWER);
        (1.0 / power) * GAIN_CALIBRATION * CALIBRATION_RATE / self.sample_rate as f32
    }
}

/// Single-channel uniformly partitioned convolver.
struct PartitionedConvolver {
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    /// Spectrum of each IR partition.
    partitions: Vec<Vec<Complex<f32>>>,
    /// Spectra of past input windows, newest at `head`.
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    /// Last two input blocks, time domain.
    window: Vec<f32>,
    accumulator: Vec<Complex<f32>>,
    scratch: Vec<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
    pos: usize,
}

impl PartitionedConvolver {
    fn new(planner: &mut RealFftPlanner<f32>, ir: &[f32], scale: f32) -> Self {
        let fft_len = BLOCK_SIZE * 2;
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);
        let bins = fft_len / 2 + 1;

        let count = ir.len().div_ceil(BLOCK_SIZE).max(1);
        let mut partitions = Vec::with_capacity(count);
        for chunk_index in 0..count {
            let mut padded = forward.make_input_vec();
            let start = chunk_index * BLOCK_SIZE;
            let end = (start + BLOCK_SIZE).min(ir.len());
            for (dst, src) in padded.iter_mut().zip(ir[start..end].iter()) {
                *dst = src * scale;
            }
            let mut spectrum = forward.make_output_vec();
            if let Err(e) = forward.process(&mut padded, &mut spectrum) {
                log::warn!("reverb: partition {} transform failed: {}", chunk_index, e);
            }
            partitions.push(spectrum);
        }

        Self {
            history: vec![vec![Complex::new(0.0, 0.0); bins]; count],
            head: 0,
            window: vec![0.0; fft_len],
            accumulator: vec![Complex::new(0.0, 0.0); bins],
            scratch: vec![0.0; fft_len],
            input: vec![0.0; BLOCK_SIZE],
            output: vec![0.0; BLOCK_SIZE],
            pos: 0,
            forward,
            inverse,
            partitions,
        }
    }

    fn process(&mut self, sample: f32) -> f32 {
        let out = self.output[self.pos];
        self.input[self.pos] = sample;
        self.pos += 1;
        if self.pos == BLOCK_SIZE {
            self.pos = 0;
            self.process_block();
        }
        out
    }

    fn process_block(&mut self) {
        let fft_len = BLOCK_SIZE * 2;
        self.window.copy_within(BLOCK_SIZE.., 0);
        self.window[BLOCK_SIZE..].copy_from_slice(&self.input);

        let count = self.partitions.len();
        self.head = (self.head + count - 1) % count;
        self.scratch.copy_from_slice(&self.window);
        if let Err(e) = self.forward.process(&mut self.scratch, &mut self.history[self.head]) {
            log::warn!("reverb: forward transform failed: {}", e);
            return;
        }

        for bin in self.accumulator.iter_mut() {
            *bin = Complex::new(0.0, 0.0);
        }
        for (age, partition) in self.partitions.iter().enumerate() {
            let spectrum = &self.history[(self.head + age) % count];
            for ((acc, x), h) in self.accumulator.iter_mut().zip(spectrum).zip(partition) {
                *acc += x * h;
            }
        }

        // The inverse rejects non-zero imaginary parts at DC and Nyquist.
        if let Some(first) = self.accumulator.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = self.accumulator.last_mut() {
            last.im = 0.0;
        }
        if let Err(e) = self.inverse.process(&mut self.accumulator, &mut self.scratch) {
            log::warn!("reverb: inverse transform failed: {}", e);
            return;
        }
        let norm = 1.0 / fft_len as f32;
        for (dst, src) in self.output.iter_mut().zip(&self.scratch[BLOCK_SIZE..]) {
            *dst = src * norm;
        }
    }
}

/// Stereo convolution reverb fed by the bus sends.
pub struct Reverb {
    left: PartitionedConvolver,
    right: PartitionedConvolver,
}

impl Reverb {
    pub fn new(ir: &ImpulseResponse) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let scale = ir.normalization_scale();
        Self {
            left: PartitionedConvolver::new(&mut planner, &ir.left, scale),
            right: PartitionedConvolver::new(&mut planner, &ir.right, scale),
        }
    }

    /// Generate an impulse response of `seconds` and build the convolver.
    pub fn synthetic<R: Rng>(rng: &mut R, seconds: f32, sample_rate: u32) -> Self {
        Self::new(&ImpulseResponse::generate(rng, seconds, sample_rate))
    }

    pub fn process(&mut self, input: StereoFrame) -> StereoFrame {
        StereoFrame::new(self.left.process(input.left), self.right.process(input.right))
    }
}
