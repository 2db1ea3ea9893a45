//! Edit commands for mutating rack parameters during playback.

use alloc::string::String;
use alloc::vec::Vec;

use crate::division::{ArpSpeed, ChordDuration};
use crate::module::ModuleId;
use crate::params::{DrumLane, DrumParams, EffectSends, EnvParams, EnvType, GeneratorParams, PadParams, PadPreset};

/// A parameter edit. The engine clamps every value it receives.
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    /// Flip one step of the drum pattern.
    ToggleDrumStep { lane: DrumLane, step: u8 },
    SetDrumParams { lane: DrumLane, params: DrumParams },
    SetDrumEffects(EffectSends),
    SetPadPreset(PadPreset),
    SetChords(Vec<String>),
    SetChordDuration(ChordDuration),
    SetArpSpeed(ArpSpeed),
    /// Octave range of the plucked arpeggiator (1..=3).
    SetChordRange(u8),
    SetChordTriplet(bool),
    SetPadParams(PadParams),
    SetEnvType(EnvType),
    SetEnvParams(EnvParams),
    /// Replace a generator's configuration. Changes to `active` open or
    /// close the gate.
    SetGenerator { slot: u8, params: GeneratorParams },
    SetGeneratorActive { slot: u8, active: bool },
    SetGeneratorEffects { slot: u8, sends: EffectSends },
    SetVolume { module: ModuleId, volume: f32 },
    SetPan { module: ModuleId, pan: f32 },
    ToggleMute(ModuleId),
    ToggleSolo(ModuleId),
    SetMasterVolume(f32),
    SetMasterReverb(f32),
}
