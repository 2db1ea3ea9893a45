//! 808-style drum hits, built fresh for every trigger.
//!
//! Hits are never tracked: the kick carries its own stop time and the noise
//! bursts end when their buffer runs out.

use rand::Rng;
use zr_ir::{AudioClip, DrumLane, DrumParams, ModuleId, Waveform};

use crate::error::GraphError;
use crate::graph::{AudioGraph, HighPass, NodeKey, Route, Source};
use crate::oscillator::white_noise;

/// Gain applied on top of each lane's volume.
pub const DRUM_GAIN: f32 = 1.6;

const NOISE_SECONDS: f32 = 0.5;
const FLOOR: f32 = 0.001;

/// Fire one hit on the drum bus at `now`.
pub fn trigger_drum<R: Rng>(
    graph: &mut AudioGraph,
    rng: &mut R,
    lane: DrumLane,
    params: &DrumParams,
    now: f64,
) -> Result<NodeKey, GraphError> {
    let level = params.volume * DRUM_GAIN;
    let p1 = params.p1;
    let p2 = f64::from(params.p2);
    match lane {
        DrumLane::Kick => {
            let key = graph.add(Source::tone(Waveform::Sine), Route::Bus(ModuleId::Drum));
            if let Some(Source::Tone { frequency, .. }) = graph.get_mut(key).map(|n| &mut n.source) {
                frequency.set_value_at(150.0, now);
                frequency.exponential_ramp_to(40.0 + p1 * 60.0, now + 0.1);
            }
            let gain = graph.gain_mut(key)?;
            gain.set_value_at(level, now);
            gain.exponential_ramp_to(FLOOR, now + 0.1 + p2);
            graph.start(key, now)?;
            graph.stop(key, now + 0.5 + p2, now)?;
            Ok(key)
        }
        DrumLane::Snare => {
            let decay = now + 0.1 + f64::from(params.p3);
            noise_burst(graph, rng, 1000.0 + p1 * 1000.0, level * params.p2, decay, now)
        }
        DrumLane::Hat => noise_burst(graph, rng, 5000.0 + p1 * 5000.0, level, now + 0.05 + p2, now),
        DrumLane::OpenHat => noise_burst(graph, rng, 5000.0 + p1 * 5000.0, level, now + 0.3 + p2, now),
    }
}

fn noise_burst<R: Rng>(
    graph: &mut AudioGraph,
    rng: &mut R,
    cutoff: f32,
    level: f32,
    decay_end: f64,
    now: f64,
) -> Result<NodeKey, GraphError> {
    let sample_rate = graph.sample_rate();
    let len = (sample_rate * NOISE_SECONDS) as usize;
    let clip = AudioClip::from_mono(&white_noise(rng, len, 1.0), sample_rate as u32);
    let filter = HighPass::new(cutoff, sample_rate);
    if filter.is_none() {
        log::warn!("drums: high-pass at {} Hz unavailable, playing unfiltered", cutoff);
    }
    let key = graph.add(Source::buffer(clip, false, filter), Route::Bus(ModuleId::Drum));
    let gain = graph.gain_mut(key)?;
    gain.set_value_at(level, now);
    gain.exponential_ramp_to(FLOOR, decay_end);
    graph.start(key, now)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Playback;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn kick_sweeps_and_stops() {
        let mut g = AudioGraph::new(48_000);
        let mut rng = StdRng::seed_from_u64(0);
        let params = DrumParams::default();
        let key = trigger_drum(&mut g, &mut rng, DrumLane::Kick, &params, 1.0).unwrap();

        let node = g.get(key).unwrap();
        assert!((node.gain.value_at(1.0) - 0.96).abs() < 1e-6);
        assert!((node.gain.value_at(1.6) - 0.001).abs() < 1e-6);
        if let Source::Tone { frequency, .. } = &node.source {
            assert!((frequency.value_at(1.1) - 70.0).abs() < 1e-3);
        }
        assert_eq!(g.state_at(key, 2.0), Some(Playback::Ended));
    }

    #[test]
    fn snare_level_uses_p2() {
        let mut g = AudioGraph::new(8000);
        let mut rng = StdRng::seed_from_u64(0);
        let params = DrumParams { p2: 0.25, ..Default::default() };
        let key = trigger_drum(&mut g, &mut rng, DrumLane::Snare, &params, 0.0).unwrap();
        assert!((g.get(key).unwrap().gain.value_at(0.0) - 0.24).abs() < 1e-6);
    }

    #[test]
    fn noise_hits_end_with_their_buffer() {
        let mut g = AudioGraph::new(8000);
        let mut rng = StdRng::seed_from_u64(0);
        for lane in [DrumLane::Snare, DrumLane::Hat, DrumLane::OpenHat] {
            trigger_drum(&mut g, &mut rng, lane, &DrumParams::default(), 0.0).unwrap();
        }
        let mut buses = [zr_ir::StereoFrame::silence(); zr_ir::MODULE_COUNT];
        for i in 0..4001 {
            g.render(i as f64 / 8000.0, &mut buses);
        }
        assert_eq!(g.reap(0.6), 3);
    }
}
