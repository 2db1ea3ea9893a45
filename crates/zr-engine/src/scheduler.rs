//! Per-tick dispatch decisions.
//!
//! Reads one [`TickSnapshot`] and the patch and decides what fires. Drums,
//! generators and chords are decided independently from the same snapshot;
//! the engine then hands each part to its voice manager.

use arrayvec::ArrayVec;
use zr_ir::{
    chord_tones_or_default, ArpSpeed, ChordTones, DrumLane, DrumParams, Patch, PadPreset,
    DRUM_LANES, GENERATOR_COUNT,
};

use crate::transport::TickSnapshot;

/// A chord to start on this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ChordTrigger {
    /// Index into the progression.
    pub index: usize,
    pub tones: ChordTones,
    pub preset: PadPreset,
    pub duration: f64,
    pub arp_speed: ArpSpeed,
    pub range: u8,
    pub triplet: bool,
    pub bpm: f32,
}

/// Everything that fires on one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickPlan {
    pub drums: ArrayVec<(DrumLane, DrumParams), DRUM_LANES>,
    /// Generator slots to (re)trigger.
    pub generators: ArrayVec<usize, GENERATOR_COUNT>,
    pub chord: Option<ChordTrigger>,
}

impl TickPlan {
    pub fn is_empty(&self) -> bool {
        self.drums.is_empty() && self.generators.is_empty() && self.chord.is_none()
    }
}

/// Decide what fires for `tick`.
pub fn plan_tick(patch: &Patch, chords_playing: bool, tick: &TickSnapshot) -> TickPlan {
    let mut plan = TickPlan::default();
    let step = tick.step_index as usize;

    for lane in DrumLane::ALL {
        let i = lane.index();
        if patch.drum_seq[i].get(step).copied().unwrap_or(false) {
            plan.drums.push((lane, patch.drum_settings[i]));
        }
    }

    for (slot, generator) in patch.gen_params.iter().enumerate() {
        if generator.active && generator.gate_duration.fires_at(tick.total_steps) {
            plan.generators.push(slot);
        }
    }

    plan.chord = plan_chord(patch, chords_playing, tick);
    plan
}

fn plan_chord(patch: &Patch, chords_playing: bool, tick: &TickSnapshot) -> Option<ChordTrigger> {
    if !chords_playing || patch.chords.is_empty() {
        return None;
    }
    let steps = patch.chord_duration.steps();
    if tick.total_steps % steps != 0 {
        return None;
    }
    let index = ((tick.total_steps / steps) % patch.chords.len() as u64) as usize;
    Some(ChordTrigger {
        index,
        tones: chord_tones_or_default(&patch.chords[index]),
        preset: patch.pad_preset,
        duration: patch.chord_duration.seconds(tick.bpm),
        arp_speed: patch.arp_speed,
        range: patch.chord_range,
        triplet: patch.chord_is_triplet,
        bpm: tick.bpm,
    })
}
