//! Chord voices: sustained pads and plucked arpeggios.

use rand::Rng;
use zr_ir::{ModuleId, Param};

use crate::error::GraphError;
use crate::event_queue::{DeferredAction, DeferredQueue};
use crate::generator::{PANIC_STOP_DELAY, PANIC_TIME_CONSTANT};
use crate::graph::{AudioGraph, NodeKey, Route, Source};
use crate::scheduler::ChordTrigger;

const PAD_VOLUME: f32 = 0.15;
const PLUCK_VOLUME: f32 = 0.25;
const PLUCK_LENGTH: f64 = 0.8;
const CROSSFADE_TIME_CONSTANT: f64 = 0.1;
const CROSSFADE_STOP_DELAY: f64 = 0.5;

fn frequency_mut(graph: &mut AudioGraph, key: NodeKey) -> Option<&mut Param> {
    match graph.get_mut(key).map(|n| &mut n.source) {
        Some(Source::Tone { frequency, .. }) => Some(frequency),
        _ => None,
    }
}

/// Chord voice manager.
///
/// Sustained sets are tracked so the next chord can crossfade them out.
/// Plucked notes are scheduled up front and end on their own; they are only
/// remembered so a panic can cut them.
#[derive(Debug, Default)]
pub struct ChordVoices {
    sustained: Vec<NodeKey>,
    plucked: Vec<NodeKey>,
}

impl ChordVoices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sustained voices still in the graph.
    pub fn live_count(&self) -> usize {
        self.sustained.len()
    }

    pub fn trigger<R: Rng>(
        &mut self,
        graph: &mut AudioGraph,
        deferred: &mut DeferredQueue,
        rng: &mut R,
        chord: &ChordTrigger,
        now: f64,
    ) -> Result<(), GraphError> {
        self.fade_out_sustained(graph, deferred, now);
        if chord.tones.is_empty() {
            return Ok(());
        }
        if chord.preset.is_plucked() {
            self.schedule_plucks(graph, rng, chord, now)
        } else {
            self.start_pad(graph, chord, now)
        }
    }

    /// Fade the current sustained set and stop it shortly after.
    fn fade_out_sustained(&mut self, graph: &mut AudioGraph, deferred: &mut DeferredQueue, now: f64) {
        for key in self.sustained.drain(..) {
            // Voices past their own stop time are already gone.
            if let Ok(gain) = graph.gain_mut(key) {
                gain.cancel_scheduled_values(now);
                gain.set_target_at(0.0, now, CROSSFADE_TIME_CONSTANT);
                deferred.push(now + CROSSFADE_STOP_DELAY, DeferredAction::Stop(key));
            }
        }
    }

    fn start_pad(&mut self, graph: &mut AudioGraph, chord: &ChordTrigger, now: f64) -> Result<(), GraphError> {
        let dur = chord.duration;
        for &tone in &chord.tones {
            let key = graph.add(Source::tone(chord.preset.waveform()), Route::Bus(ModuleId::Chord));
            if let Some(freq) = frequency_mut(graph, key) {
                freq.set_value_at(tone, now);
            }
            let gain = graph.gain_mut(key)?;
            gain.set_value_at(0.0, now);
            gain.set_target_at(PAD_VOLUME, now, dur * 0.2);
            gain.set_target_at(0.0, now + dur * 0.7, dur * 0.2);
            graph.start(key, now)?;
            graph.stop(key, now + dur + 0.5, now)?;
            self.sustained.push(key);
        }
        log::debug!("chords: pad {:?} with {} tones for {:.2}s", chord.preset, chord.tones.len(), dur);
        Ok(())
    }

    fn schedule_plucks<R: Rng>(
        &mut self,
        graph: &mut AudioGraph,
        rng: &mut R,
        chord: &ChordTrigger,
        now: f64,
    ) -> Result<(), GraphError> {
        let pool: Vec<f32> = (0..chord.range.max(1))
            .flat_map(|r| {
                let factor = (1u32 << r) as f32;
                chord.tones.iter().map(move |t| t * factor)
            })
            .collect();
        let interval = chord.arp_speed.interval_seconds(chord.bpm, chord.triplet);
        if interval.is_nan() || interval <= 0.0 {
            return Ok(());
        }
        let count = (chord.duration / interval).floor() as usize;
        let waveform = chord.preset.waveform();

        for i in 0..count {
            let t = now + i as f64 * interval;
            let tone = pool[rng.gen_range(0..pool.len())];
            let key = graph.add(Source::tone(waveform), Route::Bus(ModuleId::Chord));
            if let Some(freq) = frequency_mut(graph, key) {
                freq.set_value_at(tone, t);
            }
            let gain = graph.gain_mut(key)?;
            gain.set_value_at(0.0, t);
            gain.set_target_at(PLUCK_VOLUME, t, 0.005);
            gain.set_target_at(0.0, t + 0.02, 0.15);
            graph.start(key, t)?;
            graph.stop(key, t + PLUCK_LENGTH, now)?;
            self.plucked.push(key);
        }
        log::debug!("chords: {} plucks every {:.3}s", count, interval);
        Ok(())
    }

    /// Forget voices the graph has already reaped.
    pub fn reap(&mut self, graph: &AudioGraph) {
        self.sustained.retain(|k| graph.contains(*k));
        self.plucked.retain(|k| graph.contains(*k));
    }

    /// Cut every chord voice, pending plucks included.
    pub fn panic(&mut self, graph: &mut AudioGraph, now: f64) {
        for key in self.sustained.drain(..).chain(self.plucked.drain(..)) {
            if let Ok(gain) = graph.gain_mut(key) {
                gain.cancel_scheduled_values(now);
                gain.set_target_at(0.0, now, PANIC_TIME_CONSTANT);
            }
            if let Err(e) = graph.stop(key, now + PANIC_STOP_DELAY, now) {
                log::debug!("chords panic: stop of {:?} skipped: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use zr_ir::{chord_tones_or_default, ArpSpeed, PadPreset};

    fn chord(preset: PadPreset) -> ChordTrigger {
        ChordTrigger {
            index: 0,
            tones: chord_tones_or_default("Cmaj7"),
            preset,
            duration: 3.0,
            arp_speed: ArpSpeed::Sixteenth,
            range: 2,
            triplet: false,
            bpm: 80.0,
        }
    }

    #[test]
    fn pad_starts_one_voice_per_tone() {
        let mut g = AudioGraph::new(48_000);
        let mut q = DeferredQueue::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut voices = ChordVoices::new();
        voices.trigger(&mut g, &mut q, &mut rng, &chord(PadPreset::Universe), 0.0).unwrap();
        assert_eq!(voices.live_count(), 4);
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn new_chord_crossfades_old_set() {
        let mut g = AudioGraph::new(48_000);
        let mut q = DeferredQueue::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut voices = ChordVoices::new();
        voices.trigger(&mut g, &mut q, &mut rng, &chord(PadPreset::Ocean), 0.0).unwrap();
        voices.trigger(&mut g, &mut q, &mut rng, &chord(PadPreset::Ocean), 1.0).unwrap();
        assert_eq!(voices.live_count(), 4);
        assert_eq!(g.len(), 8);
        assert_eq!(q.len(), 4);
        assert!(q.pop_until(1.5).all(|d| matches!(d.action, DeferredAction::Stop(_))));
    }

    #[test]
    fn plucks_fill_the_chord_duration() {
        let mut g = AudioGraph::new(48_000);
        let mut q = DeferredQueue::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut voices = ChordVoices::new();
        voices.trigger(&mut g, &mut q, &mut rng, &chord(PadPreset::Harp), 0.0).unwrap();
        // Sixteenths at 80 bpm are 0.1875 s; 3 s holds 16 of them.
        assert_eq!(g.len(), 16);
        assert_eq!(voices.live_count(), 0);
    }

    #[test]
    fn triplet_plucks_are_denser() {
        let mut g = AudioGraph::new(48_000);
        let mut q = DeferredQueue::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut voices = ChordVoices::new();
        let mut c = chord(PadPreset::Piano);
        c.triplet = true;
        voices.trigger(&mut g, &mut q, &mut rng, &c, 0.0).unwrap();
        assert_eq!(g.len(), 24);
    }

    #[test]
    fn panic_cuts_pads() {
        let mut g = AudioGraph::new(48_000);
        let mut q = DeferredQueue::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut voices = ChordVoices::new();
        voices.trigger(&mut g, &mut q, &mut rng, &chord(PadPreset::Desert), 0.0).unwrap();
        voices.panic(&mut g, 0.5);
        assert_eq!(voices.live_count(), 0);
        g.reap(0.6);
        assert!(g.is_empty());
    }

    #[test]
    fn panic_cuts_pending_plucks() {
        let mut g = AudioGraph::new(48_000);
        let mut q = DeferredQueue::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut voices = ChordVoices::new();
        voices.trigger(&mut g, &mut q, &mut rng, &chord(PadPreset::Harp), 0.0).unwrap();
        voices.panic(&mut g, 0.5);
        // The last pluck starts at 2.8125 s and now ends as it starts.
        g.reap(2.9);
        assert!(g.is_empty());
    }
}
