//! Generator voices: binaural oscillator pairs with optional harmonics and LFO.
//!
//! Each of the three slots holds at most one live voice. A voice is a
//! fundamental stereo pair (left at `f`, right at `f + binaural`), up to three
//! harmonic pairs at 2x..4x, and an optional LFO feeding every pair's
//! frequency. Voices are retuned in place while live and only rebuilt when
//! the gate mode changes.

use heapless::Vec as HVec;
use zr_ir::{GeneratorParams, ModuleId, Param, Waveform, GENERATOR_COUNT};

use crate::bus::SMOOTHING;
use crate::error::GraphError;
use crate::event_queue::{DeferredAction, DeferredQueue};
use crate::graph::{AudioGraph, NodeKey, Route, Source};

/// Release used when a slot is retriggered or its gate mode changes.
pub const RETRIGGER_RELEASE: f32 = 0.01;

/// Release applied to infinite gates regardless of the ADSR setting.
const INFINITE_RELEASE: f32 = 0.2;

const HARMONICS: [u8; 3] = [2, 3, 4];

/// Panic fade time constant (seconds).
pub const PANIC_TIME_CONSTANT: f64 = 0.01;

/// Hard stop after a panic fade.
pub const PANIC_STOP_DELAY: f64 = 0.1;

/// Nodes and settings of one live voice.
#[derive(Debug)]
struct GeneratorVoice {
    fundamental: NodeKey,
    harmonics: HVec<NodeKey, 3>,
    lfo: Option<NodeKey>,
    params: GeneratorParams,
}

impl GeneratorVoice {
    fn pairs(&self) -> impl Iterator<Item = NodeKey> + '_ {
        core::iter::once(self.fundamental).chain(self.harmonics.iter().copied())
    }
}

fn harmonic_volume(params: &GeneratorParams, n: u8) -> f32 {
    params.volume * params.harmonics_intensity / (n as f32 * 1.5)
}

fn pair_frequencies(graph: &mut AudioGraph, key: NodeKey) -> Option<(&mut Param, &mut Param)> {
    match graph.get_mut(key).map(|n| &mut n.source) {
        Some(Source::StereoPair { left_frequency, right_frequency, .. }) => {
            Some((left_frequency, right_frequency))
        }
        _ => None,
    }
}

/// The three generator slots.
#[derive(Debug, Default)]
pub struct GeneratorBank {
    slots: [Option<GeneratorVoice>; GENERATOR_COUNT],
}

impl GeneratorBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.is_some())
    }

    /// Number of slots with a live voice.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Settings the live voice in `slot` was built or last updated with.
    #[cfg(test)]
    pub fn live_params(&self, slot: usize) -> Option<&GeneratorParams> {
        self.slots.get(slot)?.as_ref().map(|v| &v.params)
    }

    /// Start a voice in `slot`.
    ///
    /// A live infinite voice is left alone. Anything else live in the slot is
    /// released quickly first.
    pub fn trigger(
        &mut self,
        graph: &mut AudioGraph,
        deferred: &mut DeferredQueue,
        slot: usize,
        params: &GeneratorParams,
        bpm: f32,
        now: f64,
    ) -> Result<(), GraphError> {
        let Some(module) = ModuleId::generator(slot) else {
            return Ok(());
        };
        let infinite = params.gate_duration.is_infinite();
        if infinite && self.is_live(slot) {
            return Ok(());
        }
        self.release(graph, deferred, slot, RETRIGGER_RELEASE, now);

        let fundamental = spawn_pair(
            graph,
            module,
            params.waveform,
            params.frequency,
            params.binaural_beat,
            params.volume,
            params,
            now,
        )?;
        let mut harmonics = HVec::new();
        if params.harmonics_intensity > 0.0 {
            for n in HARMONICS {
                let key = spawn_pair(
                    graph,
                    module,
                    Waveform::Sine,
                    params.frequency * n as f32,
                    params.binaural_beat * (n as f32 / 2.0),
                    harmonic_volume(params, n),
                    params,
                    now,
                )?;
                // Capacity matches HARMONICS.
                let _ = harmonics.push(key);
            }
        }

        let lfo = if params.lfo.active {
            let key = graph.add(
                Source::lfo(params.lfo.waveform, params.lfo.effective_rate(bpm), params.lfo.depth),
                Route::Modulator,
            );
            graph.start(key, now)?;
            graph.set_modulator(fundamental, key)?;
            for h in &harmonics {
                graph.set_modulator(*h, key)?;
            }
            Some(key)
        } else {
            None
        };

        log::debug!("generator {}: trigger at {:.3}s ({:?})", slot, now, params.gate_duration);
        self.slots[slot] = Some(GeneratorVoice { fundamental, harmonics, lfo, params: *params });
        Ok(())
    }

    /// Retune a live voice toward `params` without rebuilding it.
    ///
    /// A gate mode change releases the voice and triggers a fresh one. The
    /// release takes [`RETRIGGER_RELEASE`], or the fixed infinite-gate release
    /// when the old voice was infinite. Waveform and harmonic layout changes
    /// take effect on the next trigger.
    pub fn update_live(
        &mut self,
        graph: &mut AudioGraph,
        deferred: &mut DeferredQueue,
        slot: usize,
        params: &GeneratorParams,
        bpm: f32,
        now: f64,
    ) -> Result<(), GraphError> {
        let Some(Some(voice)) = self.slots.get_mut(slot) else {
            return Ok(());
        };
        if voice.params.gate_duration != params.gate_duration {
            self.release(graph, deferred, slot, RETRIGGER_RELEASE, now);
            return self.trigger(graph, deferred, slot, params, bpm, now);
        }
        voice.params.frequency = params.frequency;
        voice.params.base_frequency = params.base_frequency;
        voice.params.binaural_beat = params.binaural_beat;
        voice.params.volume = params.volume;
        voice.params.adsr = params.adsr;
        voice.params.lfo.rate = params.lfo.rate;
        voice.params.lfo.depth = params.lfo.depth;
        voice.params.lfo.is_synced = params.lfo.is_synced;

        let sustain = if params.gate_duration.is_infinite() { 1.0 } else { params.adsr.sustain };

        if let Some((left, right)) = pair_frequencies(graph, voice.fundamental) {
            left.set_target_at(params.frequency, now, SMOOTHING);
            right.set_target_at(params.frequency + params.binaural_beat, now, SMOOTHING);
        }
        graph.gain_mut(voice.fundamental)?.set_target_at(params.volume * sustain, now, SMOOTHING);

        for (key, n) in voice.harmonics.iter().zip(HARMONICS) {
            let freq = params.frequency * n as f32;
            if let Some((left, right)) = pair_frequencies(graph, *key) {
                left.set_target_at(freq, now, SMOOTHING);
                right.set_target_at(freq + params.binaural_beat * (n as f32 / 2.0), now, SMOOTHING);
            }
            graph.gain_mut(*key)?.set_target_at(harmonic_volume(params, n) * sustain, now, SMOOTHING);
        }

        if let Some(lfo) = voice.lfo {
            if let Some(Source::Lfo { frequency, depth, .. }) = graph.get_mut(lfo).map(|n| &mut n.source) {
                frequency.set_target_at(params.lfo.effective_rate(bpm), now, SMOOTHING);
                depth.set_target_at(params.lfo.depth, now, SMOOTHING);
            }
        }
        Ok(())
    }

    /// Fade the voice in `slot` out over `release` seconds and schedule its
    /// disposal. Idle slots are left alone.
    pub fn release(
        &mut self,
        graph: &mut AudioGraph,
        deferred: &mut DeferredQueue,
        slot: usize,
        release: f32,
        now: f64,
    ) {
        let Some(voice) = self.slots.get_mut(slot).and_then(Option::take) else {
            return;
        };
        let base = if voice.params.gate_duration.is_infinite() { INFINITE_RELEASE } else { release };
        let harmonic = base * (1.0 + voice.params.harmonics_intensity * 2.0);

        for (i, key) in voice.pairs().enumerate() {
            let rel = f64::from(if i == 0 { base } else { harmonic });
            match graph.gain_mut(key) {
                Ok(gain) => {
                    gain.cancel_scheduled_values(now);
                    gain.set_target_at(0.0, now, (rel / 3.0).max(0.01));
                }
                Err(e) => log::warn!("generator {}: release of {:?} skipped: {}", slot, key, e),
            }
            deferred.push(now + (rel + 0.05).max(0.010), DeferredAction::Dispose(key));
        }
        if let Some(lfo) = voice.lfo {
            graph.remove(lfo, now);
        }
        log::debug!("generator {}: release over {:.3}s", slot, base);
    }

    /// Silence every voice within a few milliseconds and forget them.
    pub fn panic(&mut self, graph: &mut AudioGraph, now: f64) {
        for voice in self.slots.iter_mut().filter_map(Option::take) {
            for key in voice.pairs() {
                if let Ok(gain) = graph.gain_mut(key) {
                    gain.cancel_scheduled_values(now);
                    gain.set_target_at(0.0, now, PANIC_TIME_CONSTANT);
                }
                if let Err(e) = graph.stop(key, now + PANIC_STOP_DELAY, now) {
                    log::debug!("generator panic: stop of {:?} skipped: {}", key, e);
                }
            }
            if let Some(lfo) = voice.lfo {
                if let Err(e) = graph.stop(lfo, now + PANIC_STOP_DELAY, now) {
                    log::debug!("generator panic: stop of lfo {:?} skipped: {}", lfo, e);
                }
            }
        }
    }
}

/// Build, envelope and start one stereo pair on `module`'s bus.
#[allow(clippy::too_many_arguments)]
fn spawn_pair(
    graph: &mut AudioGraph,
    module: ModuleId,
    waveform: Waveform,
    frequency: f32,
    binaural: f32,
    volume: f32,
    params: &GeneratorParams,
    now: f64,
) -> Result<NodeKey, GraphError> {
    let key = graph.add(Source::stereo_pair(waveform), Route::Bus(module));
    if let Some((left, right)) = pair_frequencies(graph, key) {
        left.set_value_at(frequency, now);
        right.set_value_at(frequency + binaural, now);
    }
    let gain = graph.gain_mut(key)?;
    gain.set_value_at(0.0, now);
    if params.gate_duration.is_infinite() {
        gain.set_target_at(volume, now, SMOOTHING);
    } else {
        let adsr = params.adsr;
        gain.set_target_at(volume, now, f64::from(adsr.attack).max(0.01));
        let sustain_start = now + f64::from(adsr.attack) + f64::from(adsr.decay);
        gain.set_target_at(volume * adsr.sustain, sustain_start, 0.1);
    }
    graph.start(key, now)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zr_ir::division::GateDuration;

    fn setup() -> (AudioGraph, DeferredQueue, GeneratorBank) {
        (AudioGraph::new(48_000), DeferredQueue::new(), GeneratorBank::new())
    }

    fn infinite() -> GeneratorParams {
        GeneratorParams { gate_duration: GateDuration::Infinite, active: true, ..Default::default() }
    }

    #[test]
    fn infinite_trigger_is_idempotent() {
        let (mut g, mut q, mut bank) = setup();
        let p = infinite();
        bank.trigger(&mut g, &mut q, 0, &p, 80.0, 0.0).unwrap();
        let nodes = g.len();
        bank.trigger(&mut g, &mut q, 0, &p, 80.0, 0.5).unwrap();
        assert_eq!(bank.live_count(), 1);
        assert_eq!(g.len(), nodes);
        assert!(q.is_empty());
    }

    #[test]
    fn finite_retrigger_releases_previous() {
        let (mut g, mut q, mut bank) = setup();
        let p = GeneratorParams { active: true, ..Default::default() };
        bank.trigger(&mut g, &mut q, 1, &p, 80.0, 0.0).unwrap();
        bank.trigger(&mut g, &mut q, 1, &p, 80.0, 1.0).unwrap();
        assert_eq!(bank.live_count(), 1);
        assert_eq!(g.len(), 2);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn harmonics_and_lfo_are_built() {
        let (mut g, mut q, mut bank) = setup();
        let mut p = infinite();
        p.harmonics_intensity = 0.5;
        p.lfo.active = true;
        bank.trigger(&mut g, &mut q, 2, &p, 80.0, 0.0).unwrap();
        // Fundamental, three harmonics, one LFO.
        assert_eq!(g.len(), 5);
    }

    #[test]
    fn release_fades_then_disposes() {
        let (mut g, mut q, mut bank) = setup();
        let mut p = GeneratorParams { active: true, ..Default::default() };
        p.harmonics_intensity = 0.5;
        p.lfo.active = true;
        bank.trigger(&mut g, &mut q, 0, &p, 80.0, 0.0).unwrap();
        bank.release(&mut g, &mut q, 0, 0.5, 1.0);

        assert_eq!(bank.live_count(), 0);
        // LFO removed immediately, pairs wait for their fade.
        assert_eq!(g.len(), 4);
        let times: Vec<f64> = q.pop_until(10.0).map(|d| d.time).collect();
        assert!((times[0] - 1.55).abs() < 1e-9);
        // Harmonic release is 0.5 * (1 + 0.5 * 2) = 1.0.
        assert!((times[1] - 2.05).abs() < 1e-9);
    }

    #[test]
    fn release_of_infinite_uses_fixed_time() {
        let (mut g, mut q, mut bank) = setup();
        bank.trigger(&mut g, &mut q, 0, &infinite(), 80.0, 0.0).unwrap();
        bank.release(&mut g, &mut q, 0, 3.0, 1.0);
        let due = q.peek().map(|d| d.time).unwrap();
        assert!((due - 1.25).abs() < 1e-9);
    }

    #[test]
    fn release_of_idle_slot_is_a_no_op() {
        let (mut g, mut q, mut bank) = setup();
        bank.release(&mut g, &mut q, 0, 0.5, 0.0);
        assert!(q.is_empty());
    }

    #[test]
    fn update_live_retargets_in_place() {
        let (mut g, mut q, mut bank) = setup();
        let p = infinite();
        bank.trigger(&mut g, &mut q, 0, &p, 80.0, 0.0).unwrap();
        let mut next = p;
        next.frequency = 200.0;
        next.volume = 1.0;
        bank.update_live(&mut g, &mut q, 0, &next, 80.0, 1.0).unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(bank.live_params(0).map(|p| p.frequency), Some(200.0));
    }

    #[test]
    fn gate_change_rebuilds() {
        let (mut g, mut q, mut bank) = setup();
        let p = infinite();
        bank.trigger(&mut g, &mut q, 0, &p, 80.0, 0.0).unwrap();
        let next = GeneratorParams { gate_duration: GateDuration::Two, ..p };
        bank.update_live(&mut g, &mut q, 0, &next, 80.0, 1.0).unwrap();
        assert_eq!(bank.live_params(0).map(|p| p.gate_duration), Some(GateDuration::Two));
        assert_eq!(q.len(), 1);
        // The outgoing voice was infinite, so it fades over 0.2 s.
        assert!((q.peek().map(|d| d.time).unwrap() - 1.25).abs() < 1e-9);
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn panic_clears_bookkeeping() {
        let (mut g, mut q, mut bank) = setup();
        for slot in 0..3 {
            bank.trigger(&mut g, &mut q, slot, &infinite(), 80.0, 0.0).unwrap();
        }
        bank.panic(&mut g, 1.0);
        assert_eq!(bank.live_count(), 0);
        g.reap(1.2);
        assert!(g.is_empty());
    }
}
