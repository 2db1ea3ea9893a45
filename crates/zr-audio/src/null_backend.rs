//! Device-less output that discards frames at wall-clock pace.

use std::time::{Duration, Instant};

use zr_ir::StereoFrame;

use crate::traits::{AudioError, AudioOutput};

/// How far rendering may run ahead of the wall clock.
const LEAD: Duration = Duration::from_millis(50);

/// Output for machines without a sound device.
///
/// Accepts every frame, then blocks just long enough that the caller renders
/// in real time.
pub struct NullOutput {
    sample_rate: u32,
    started: Option<Instant>,
    written: u64,
}

impl NullOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate: sample_rate.max(1), started: None, written: 0 }
    }

    /// Frames accepted since [`AudioOutput::start`].
    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl AudioOutput for NullOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, frames: &[StereoFrame]) -> usize {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.written += frames.len() as u64;
        let due = Duration::from_secs_f64(self.written as f64 / self.sample_rate as f64);
        if let Some(ahead) = due.checked_sub(started.elapsed()) {
            if ahead > LEAD {
                std::thread::sleep(ahead - LEAD);
            }
        }
        frames.len()
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.started = Some(Instant::now());
        self.written = 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.started = None;
        Ok(())
    }
}
