//! The full rack parameter snapshot and its JSON schema.
//!
//! `Patch` is both the engine's live parameter state and the import/export
//! document. Keys are camelCase. `bpm`, `drumSeq`, `chords` and `genParams`
//! are required; every other field falls back to the factory value.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::division::{ArpSpeed, ChordDuration, DEFAULT_BPM};
use crate::module::{ModuleId, GENERATOR_COUNT, MODULE_COUNT};
use crate::params::{
    DrumParams, EffectSends, EnvParams, EnvType, GeneratorParams, PadParams, PadPreset, Waveform,
};

/// The only schema version this build reads and writes.
pub const PATCH_VERSION: u32 = 1;

/// Number of drum lanes.
pub const DRUM_LANES: usize = 4;

/// Steps per drum lane.
pub const DRUM_STEPS: usize = 16;

/// Step pattern: `[lane][step]`.
pub type DrumPattern = [[bool; DRUM_STEPS]; DRUM_LANES];

/// Complete rack state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    #[serde(default = "default_version")]
    pub version: u32,
    pub bpm: f32,
    pub drum_seq: DrumPattern,
    #[serde(default = "default_drum_settings")]
    pub drum_settings: [DrumParams; DRUM_LANES],
    #[serde(default)]
    pub drum_effects: EffectSends,
    #[serde(default)]
    pub pad_preset: PadPreset,
    pub chords: Vec<String>,
    #[serde(default)]
    pub chord_duration: ChordDuration,
    #[serde(default)]
    pub arp_speed: ArpSpeed,
    #[serde(default = "default_chord_range")]
    pub chord_range: u8,
    #[serde(default)]
    pub chord_is_triplet: bool,
    #[serde(default)]
    pub pad_params: PadParams,
    #[serde(default)]
    pub env_type: EnvType,
    #[serde(default)]
    pub env_params: EnvParams,
    pub gen_params: [GeneratorParams; GENERATOR_COUNT],
    #[serde(default = "default_gen_effects")]
    pub gen_effects: [EffectSends; GENERATOR_COUNT],
    #[serde(default = "default_mixer_volumes")]
    pub mixer_volumes: [f32; MODULE_COUNT],
    #[serde(default)]
    pub mixer_panning: [f32; MODULE_COUNT],
    #[serde(default)]
    pub mixer_mute: [bool; MODULE_COUNT],
    #[serde(default)]
    pub mixer_solo: [bool; MODULE_COUNT],
    #[serde(default = "default_master_reverb")]
    pub master_reverb: f32,
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,
}

fn default_version() -> u32 {
    PATCH_VERSION
}

fn default_drum_settings() -> [DrumParams; DRUM_LANES] {
    [DrumParams::default(); DRUM_LANES]
}

fn default_chord_range() -> u8 {
    2
}

fn default_gen_effects() -> [EffectSends; GENERATOR_COUNT] {
    [EffectSends::default(); GENERATOR_COUNT]
}

fn default_mixer_volumes() -> [f32; MODULE_COUNT] {
    [1.0; MODULE_COUNT]
}

fn default_master_reverb() -> f32 {
    0.5
}

fn default_master_volume() -> f32 {
    0.8
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            version: PATCH_VERSION,
            bpm: DEFAULT_BPM,
            drum_seq: [[false; DRUM_STEPS]; DRUM_LANES],
            drum_settings: default_drum_settings(),
            drum_effects: EffectSends { reverb: 0.2, echo: 0.1 },
            pad_preset: PadPreset::Universe,
            chords: ["Cmaj7", "Fmaj7", "G7", "Am7"].iter().map(|s| String::from(*s)).collect(),
            chord_duration: ChordDuration::One,
            arp_speed: ArpSpeed::Sixteenth,
            chord_range: default_chord_range(),
            chord_is_triplet: false,
            pad_params: PadParams::default(),
            env_type: EnvType::None,
            env_params: EnvParams::default(),
            gen_params: [GeneratorParams::default(); GENERATOR_COUNT],
            gen_effects: default_gen_effects(),
            mixer_volumes: default_mixer_volumes(),
            mixer_panning: [0.0; MODULE_COUNT],
            mixer_mute: [false; MODULE_COUNT],
            mixer_solo: [false; MODULE_COUNT],
            master_reverb: default_master_reverb(),
            master_volume: default_master_volume(),
        }
    }
}

impl Patch {
    /// Fill the fields whose default depends on other fields.
    ///
    /// A generator without a base frequency takes its current frequency, and
    /// an out-of-range chord range falls back to 2.
    pub fn normalize(&mut self) {
        for generator in &mut self.gen_params {
            if generator.base_frequency.is_nan() || generator.base_frequency <= 0.0 {
                generator.base_frequency = generator.frequency;
            }
        }
        if !(1..=3).contains(&self.chord_range) {
            self.chord_range = default_chord_range();
        }
    }

    /// Volume a module actually plays at once mute and solo are applied.
    ///
    /// A muted module is silent. If any module is soloed, every module that
    /// is not soloed is silent too, whatever its own mute state.
    pub fn effective_volume(&self, module: ModuleId) -> f32 {
        let i = module.index();
        let any_solo = self.mixer_solo.iter().any(|&s| s);
        if self.mixer_mute[i] || (any_solo && !self.mixer_solo[i]) {
            0.0
        } else {
            self.mixer_volumes[i]
        }
    }

    /// Reverb and echo sends of a module's bus.
    pub fn sends(&self, module: ModuleId) -> EffectSends {
        match module {
            ModuleId::Drum => self.drum_effects,
            ModuleId::Chord => EffectSends { reverb: self.pad_params.reverb, echo: self.pad_params.echo },
            ModuleId::Env => EffectSends { reverb: self.env_params.reverb, echo: self.env_params.echo },
            ModuleId::Gen(_) => self.gen_effects[module.index() - 3],
        }
    }
}

/// A generator update suggested by the patch-generation service.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGenerator {
    pub active: bool,
    pub frequency: f32,
    pub binaural_beat: f32,
    pub waveform: Waveform,
}

/// Patch suggested by the patch-generation service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiPatch {
    pub bpm: f32,
    pub chords: Vec<String>,
    pub drum_seq: DrumPattern,
    pub generators: Vec<AiGenerator>,
}
