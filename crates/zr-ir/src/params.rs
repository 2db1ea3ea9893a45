//! Per-module parameter sets.
//!
//! Every struct here deserializes with `#[serde(default)]`: a missing field
//! takes the rack's factory value instead of failing the import.

use serde::{Deserialize, Serialize};

use crate::division::GateDuration;

/// Upper bound for module and generator volumes.
pub const VOLUME_MAX: f32 = 1.5;

/// Lowest generator frequency (Hz).
pub const FREQ_MIN: f32 = 20.0;

/// Highest generator frequency (Hz).
pub const FREQ_MAX: f32 = 20_000.0;

/// Oscillator shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Attack/decay/sustain/release, in seconds (sustain is a level 0..1).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adsr {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for Adsr {
    fn default() -> Self {
        Self { attack: 0.1, decay: 0.2, sustain: 0.5, release: 0.5 }
    }
}

/// Frequency LFO shared by every pair of a generator voice.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LfoParams {
    pub waveform: Waveform,
    /// Hz, or beats-per-cycle multiplier when synced.
    pub rate: f32,
    /// Frequency deviation in Hz.
    pub depth: f32,
    pub active: bool,
    pub is_synced: bool,
}

impl Default for LfoParams {
    fn default() -> Self {
        Self { waveform: Waveform::Sine, rate: 1.0, depth: 10.0, active: false, is_synced: false }
    }
}

impl LfoParams {
    /// LFO frequency at `bpm`: `(bpm / 60) * rate` when synced, raw Hz otherwise.
    pub fn effective_rate(&self, bpm: f32) -> f32 {
        if self.is_synced {
            (bpm / 60.0) * self.rate
        } else {
            self.rate
        }
    }
}

/// One generator slot's configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorParams {
    pub waveform: Waveform,
    pub frequency: f32,
    /// The patch's reference frequency. Zero means "not given" and is
    /// replaced by `frequency` when a patch is normalized.
    #[serde(default)]
    pub base_frequency: f32,
    pub volume: f32,
    pub adsr: Adsr,
    pub lfo: LfoParams,
    pub gate_duration: GateDuration,
    /// Hz offset of the right oscillator.
    pub binaural_beat: f32,
    pub harmonics_intensity: f32,
    pub multi_saw: bool,
    pub pulse_width: f32,
    pub fifth_intensity: f32,
    pub octave_intensity: f32,
    pub active: bool,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency: 100.0,
            base_frequency: 100.0,
            volume: 0.5,
            adsr: Adsr::default(),
            lfo: LfoParams::default(),
            gate_duration: GateDuration::One,
            binaural_beat: 5.0,
            harmonics_intensity: 0.0,
            multi_saw: false,
            pulse_width: 0.5,
            fifth_intensity: 0.0,
            octave_intensity: 0.0,
            active: false,
        }
    }
}

impl GeneratorParams {
    /// Clamp every numeric field into its playable range, keeping the
    /// previous value for anything that is not finite.
    pub fn clamped(mut self, previous: &GeneratorParams) -> Self {
        self.frequency = finite_or(self.frequency, previous.frequency).clamp(FREQ_MIN, FREQ_MAX);
        self.base_frequency = finite_or(self.base_frequency, previous.base_frequency).max(0.0);
        self.volume = finite_or(self.volume, previous.volume).clamp(0.0, VOLUME_MAX);
        self.binaural_beat = finite_or(self.binaural_beat, previous.binaural_beat).clamp(0.0, 100.0);
        self.harmonics_intensity =
            finite_or(self.harmonics_intensity, previous.harmonics_intensity).clamp(0.0, 1.0);
        self.adsr.attack = finite_or(self.adsr.attack, previous.adsr.attack).clamp(0.0, 10.0);
        self.adsr.decay = finite_or(self.adsr.decay, previous.adsr.decay).clamp(0.0, 10.0);
        self.adsr.sustain = finite_or(self.adsr.sustain, previous.adsr.sustain).clamp(0.0, 1.0);
        self.adsr.release = finite_or(self.adsr.release, previous.adsr.release).clamp(0.0, 10.0);
        self.lfo.rate = finite_or(self.lfo.rate, previous.lfo.rate).clamp(0.0, 50.0);
        self.lfo.depth = finite_or(self.lfo.depth, previous.lfo.depth).clamp(0.0, 1000.0);
        self.pulse_width = finite_or(self.pulse_width, previous.pulse_width).clamp(0.0, 1.0);
        self.fifth_intensity = finite_or(self.fifth_intensity, previous.fifth_intensity).clamp(0.0, 1.0);
        self.octave_intensity =
            finite_or(self.octave_intensity, previous.octave_intensity).clamp(0.0, 1.0);
        self
    }
}

/// The four drum lanes, in pattern order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrumLane {
    Kick,
    Snare,
    Hat,
    OpenHat,
}

impl DrumLane {
    pub const ALL: [DrumLane; 4] = [DrumLane::Kick, DrumLane::Snare, DrumLane::Hat, DrumLane::OpenHat];

    pub fn index(self) -> usize {
        match self {
            DrumLane::Kick => 0,
            DrumLane::Snare => 1,
            DrumLane::Hat => 2,
            DrumLane::OpenHat => 3,
        }
    }
}

/// Per-lane drum shaping. `p1..p3` are 0..1 macro controls whose meaning
/// depends on the lane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrumParams {
    pub p1: f32,
    pub p2: f32,
    pub p3: f32,
    pub volume: f32,
}

impl Default for DrumParams {
    fn default() -> Self {
        Self { p1: 0.5, p2: 0.5, p3: 0.5, volume: 0.6 }
    }
}

impl DrumParams {
    pub fn clamped(self, previous: &DrumParams) -> Self {
        Self {
            p1: finite_or(self.p1, previous.p1).clamp(0.0, 1.0),
            p2: finite_or(self.p2, previous.p2).clamp(0.0, 1.0),
            p3: finite_or(self.p3, previous.p3).clamp(0.0, 1.0),
            volume: finite_or(self.volume, previous.volume).clamp(0.0, VOLUME_MAX),
        }
    }
}

/// Reverb and echo send levels of one module.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSends {
    pub reverb: f32,
    pub echo: f32,
}

impl Default for EffectSends {
    fn default() -> Self {
        Self { reverb: 0.2, echo: 0.1 }
    }
}

impl EffectSends {
    pub fn clamped(self, previous: &EffectSends) -> Self {
        Self {
            reverb: finite_or(self.reverb, previous.reverb).clamp(0.0, 1.0),
            echo: finite_or(self.echo, previous.echo).clamp(0.0, 1.0),
        }
    }
}

/// Chord instrument preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PadPreset {
    #[default]
    Universe,
    Ocean,
    Desert,
    Harp,
    Piano,
}

impl PadPreset {
    /// Harp and Piano play arpeggiated plucks; the rest sustain.
    pub fn is_plucked(self) -> bool {
        matches!(self, PadPreset::Harp | PadPreset::Piano)
    }

    pub fn waveform(self) -> Waveform {
        match self {
            PadPreset::Universe | PadPreset::Piano => Waveform::Sine,
            PadPreset::Ocean | PadPreset::Harp => Waveform::Triangle,
            PadPreset::Desert => Waveform::Sawtooth,
        }
    }
}

/// Chord bus sends and low-pass filter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadParams {
    pub reverb: f32,
    pub echo: f32,
    /// Low-pass cutoff in Hz.
    pub lpf: f32,
    /// Low-pass resonance (Q).
    pub reso: f32,
}

impl Default for PadParams {
    fn default() -> Self {
        Self { reverb: 0.4, echo: 0.3, lpf: 20_000.0, reso: 1.0 }
    }
}

impl PadParams {
    pub fn clamped(self, previous: &PadParams) -> Self {
        Self {
            reverb: finite_or(self.reverb, previous.reverb).clamp(0.0, 1.0),
            echo: finite_or(self.echo, previous.echo).clamp(0.0, 1.0),
            lpf: finite_or(self.lpf, previous.lpf).clamp(FREQ_MIN, FREQ_MAX),
            reso: finite_or(self.reso, previous.reso).clamp(0.0001, 30.0),
        }
    }
}

/// Ambient layer selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvType {
    Forest,
    Ocean,
    Street,
    White,
    Pink,
    #[default]
    None,
}

impl EnvType {
    /// Stock recording for the field-recording types.
    pub fn stock_url(self) -> Option<&'static str> {
        match self {
            EnvType::Forest => Some(
                "https://raw.githubusercontent.com/stelee410/StayFocused/refs/heads/main/public/sounds/forest-night.mp3",
            ),
            EnvType::Ocean => Some(
                "https://raw.githubusercontent.com/stelee410/StayFocused/refs/heads/main/public/sounds/waves.mp3",
            ),
            EnvType::Street => Some(
                "https://raw.githubusercontent.com/stelee410/StayFocused/refs/heads/main/public/sounds/city-traffic.mp3",
            ),
            EnvType::White | EnvType::Pink | EnvType::None => None,
        }
    }
}

/// Ambient bus level and sends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvParams {
    pub level: f32,
    pub reverb: f32,
    pub echo: f32,
}

impl Default for EnvParams {
    fn default() -> Self {
        Self { level: 0.5, reverb: 0.3, echo: 0.2 }
    }
}

impl EnvParams {
    pub fn clamped(self, previous: &EnvParams) -> Self {
        Self {
            level: finite_or(self.level, previous.level).clamp(0.0, VOLUME_MAX),
            reverb: finite_or(self.reverb, previous.reverb).clamp(0.0, 1.0),
            echo: finite_or(self.echo, previous.echo).clamp(0.0, 1.0),
        }
    }
}

/// `value` if finite, otherwise `fallback`.
pub fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synced_lfo_rate_follows_tempo() {
        let lfo = LfoParams { rate: 0.5, is_synced: true, ..LfoParams::default() };
        assert_eq!(lfo.effective_rate(120.0), 1.0);
        let free = LfoParams { rate: 0.5, ..LfoParams::default() };
        assert_eq!(free.effective_rate(120.0), 0.5);
    }

    #[test]
    fn generator_clamp_keeps_previous_for_nan() {
        let prev = GeneratorParams::default();
        let wild = GeneratorParams { frequency: f32::NAN, volume: 9.0, ..prev };
        let fixed = wild.clamped(&prev);
        assert_eq!(fixed.frequency, prev.frequency);
        assert_eq!(fixed.volume, VOLUME_MAX);
    }

    #[test]
    fn missing_generator_fields_take_defaults() {
        let g: GeneratorParams = serde_json::from_str(r#"{"frequency": 432, "gateDuration": "infinite"}"#).unwrap();
        assert_eq!(g.frequency, 432.0);
        assert_eq!(g.gate_duration, GateDuration::Infinite);
        assert_eq!(g.adsr, Adsr::default());
        assert_eq!(g.binaural_beat, 5.0);
    }

    #[test]
    fn preset_modes() {
        assert!(PadPreset::Harp.is_plucked());
        assert!(!PadPreset::Desert.is_plucked());
        assert_eq!(PadPreset::Desert.waveform(), Waveform::Sawtooth);
        assert_eq!(PadPreset::Piano.waveform(), Waveform::Sine);
    }
}
