//! Engine construction settings.

use serde::Deserialize;

/// Settings fixed for the lifetime of an [`Engine`](crate::Engine).
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Length of the generated reverb impulse response.
    pub reverb_seconds: f32,
    /// Seed for every random choice the engine makes (reverb noise, plucked
    /// note selection, drum noise). `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { sample_rate: 48_000, reverb_seconds: 3.0, seed: None }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self { sample_rate, ..Self::default() }
    }
}
