//! Core types for the zenrack instrument rack.
//!
//! This crate defines the data shared by every layer: the patch document,
//! per-module parameters, the fixed musical grid, the chord catalog and the
//! automation timeline used for every smoothed parameter. The engine consumes
//! these types; the format layer reads and writes them.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod automation;
mod chord;
pub mod division;
mod edit;
mod module;
mod params;
mod patch;

pub use audio_buffer::{AudioClip, StereoFrame};
pub use automation::{AutomationEvent, CurveKind, Param};
pub use chord::{chord_tones, chord_tones_or_default, ChordTones, FALLBACK_CHORD, MAX_CHORD_TONES};
pub use division::{ArpSpeed, ChordDuration, GateDuration};
pub use edit::Edit;
pub use module::{ModuleId, GENERATOR_COUNT, MODULE_COUNT};
pub use params::{
    finite_or, Adsr, DrumLane, DrumParams, EffectSends, EnvParams, EnvType, GeneratorParams,
    LfoParams, PadParams, PadPreset, Waveform, FREQ_MAX, FREQ_MIN, VOLUME_MAX,
};
pub use patch::{AiGenerator, AiPatch, DrumPattern, Patch, DRUM_LANES, DRUM_STEPS, PATCH_VERSION};
