//! Ambient layer: one looping buffer source on the env bus.
//!
//! Loads happen off the audio thread. Each load carries a [`LoadTicket`];
//! issuing a newer ticket, stopping, or switching to synthesized noise
//! invalidates every older one, and a cancelled load's result is dropped
//! when it arrives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;
use zr_ir::{AudioClip, ModuleId};

use crate::graph::{AudioGraph, NodeKey, Route, Source};
use crate::oscillator::{pink_noise, white_noise};

const NOISE_SECONDS: f32 = 4.0;
const WHITE_GAIN: f32 = 0.05;
const PINK_GAIN: f32 = 0.015;

/// Synthesized noise colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
}

/// Shared generation counter that hands out [`LoadTicket`]s.
#[derive(Clone, Debug, Default)]
pub struct TicketIssuer {
    generation: Arc<AtomicU64>,
}

impl TicketIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// New ticket; every ticket issued before it is cancelled.
    pub fn issue(&self) -> LoadTicket {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        LoadTicket { generation, issuer: Arc::clone(&self.generation) }
    }

    /// Cancel every outstanding ticket.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Cancellation token for one ambient load.
#[derive(Clone, Debug)]
pub struct LoadTicket {
    generation: u64,
    issuer: Arc<AtomicU64>,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a newer load, a stop or noise playback has superseded this one.
    pub fn is_cancelled(&self) -> bool {
        self.issuer.load(Ordering::Acquire) != self.generation
    }
}

/// What happened to a finished load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A newer request won; nothing changed.
    Superseded,
    /// The load failed and pink noise is playing instead.
    FellBack,
    Playing,
}

/// The env module's single source.
#[derive(Debug, Default)]
pub struct AmbientPlayer {
    tickets: TicketIssuer,
    source: Option<NodeKey>,
    last_clip: Option<AudioClip>,
}

impl AmbientPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issuer shared with loader threads.
    pub fn tickets(&self) -> &TicketIssuer {
        &self.tickets
    }

    pub fn is_playing(&self) -> bool {
        self.source.is_some()
    }

    #[cfg(test)]
    pub fn last_clip(&self) -> Option<&AudioClip> {
        self.last_clip.as_ref()
    }

    /// Loop `clip`, replacing whatever was playing.
    pub fn play_clip(&mut self, graph: &mut AudioGraph, clip: AudioClip, now: f64) {
        self.stop_source(graph, now);
        if clip.is_empty() {
            log::warn!("ambient: refusing to loop an empty clip");
            return;
        }
        let key = graph.add(Source::buffer(clip, true, None), Route::Bus(ModuleId::Env));
        match graph.start(key, now) {
            Ok(()) => self.source = Some(key),
            Err(e) => {
                log::warn!("ambient: start failed: {}", e);
                graph.remove(key, now);
            }
        }
    }

    /// Synthesize a 4 s noise loop and play it. Cancels in-flight loads.
    pub fn play_noise<R: Rng>(&mut self, graph: &mut AudioGraph, rng: &mut R, color: NoiseColor, now: f64) {
        self.tickets.invalidate();
        self.play_noise_bed(graph, rng, color, now);
    }

    fn play_noise_bed<R: Rng>(&mut self, graph: &mut AudioGraph, rng: &mut R, color: NoiseColor, now: f64) {
        let sample_rate = graph.sample_rate();
        let len = (sample_rate * NOISE_SECONDS) as usize;
        let samples = match color {
            NoiseColor::White => white_noise(rng, len, WHITE_GAIN),
            NoiseColor::Pink => pink_noise(rng, len, PINK_GAIN),
        };
        let clip = AudioClip::from_mono(&samples, sample_rate as u32);
        self.last_clip = Some(clip.clone());
        self.play_clip(graph, clip, now);
        log::debug!("ambient: {:?} noise bed", color);
    }

    /// Apply the result of the load that was issued `ticket`.
    pub fn complete_load<R: Rng>(
        &mut self,
        graph: &mut AudioGraph,
        rng: &mut R,
        ticket: &LoadTicket,
        result: Result<AudioClip, String>,
        now: f64,
    ) -> LoadOutcome {
        if ticket.is_cancelled() {
            log::debug!("ambient: discarding superseded load #{}", ticket.generation());
            return LoadOutcome::Superseded;
        }
        match result {
            Ok(clip) if !clip.is_empty() => {
                self.last_clip = Some(clip.clone());
                self.play_clip(graph, clip, now);
                LoadOutcome::Playing
            }
            Ok(_) => {
                log::warn!("ambient: load produced no audio, falling back to pink noise");
                self.play_noise_bed(graph, rng, NoiseColor::Pink, now);
                LoadOutcome::FellBack
            }
            Err(reason) => {
                log::warn!("ambient: load failed ({}), falling back to pink noise", reason);
                self.play_noise_bed(graph, rng, NoiseColor::Pink, now);
                LoadOutcome::FellBack
            }
        }
    }

    /// Replay the last clip, if any. Returns whether something started.
    pub fn resume_last(&mut self, graph: &mut AudioGraph, now: f64) -> bool {
        match self.last_clip.clone() {
            Some(clip) => {
                self.play_clip(graph, clip, now);
                self.source.is_some()
            }
            None => false,
        }
    }

    /// Stop and disconnect the source and cancel pending loads. Safe to repeat.
    pub fn stop(&mut self, graph: &mut AudioGraph, now: f64) {
        self.tickets.invalidate();
        self.stop_source(graph, now);
    }

    fn stop_source(&mut self, graph: &mut AudioGraph, now: f64) {
        if let Some(key) = self.source.take() {
            graph.remove(key, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn clip(value: f32) -> AudioClip {
        AudioClip::from_mono(&[value; 64], 8000)
    }

    #[test]
    fn newer_ticket_cancels_older() {
        let issuer = TicketIssuer::new();
        let first = issuer.issue();
        assert!(!first.is_cancelled());
        let second = issuer.issue();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        issuer.invalidate();
        assert!(second.is_cancelled());
    }

    #[test]
    fn last_request_wins() {
        let mut g = AudioGraph::new(8000);
        let mut rng = StdRng::seed_from_u64(0);
        let mut amb = AmbientPlayer::new();
        let first = amb.tickets().issue();
        let second = amb.tickets().issue();

        assert_eq!(amb.complete_load(&mut g, &mut rng, &second, Ok(clip(0.2)), 0.0), LoadOutcome::Playing);
        assert_eq!(amb.complete_load(&mut g, &mut rng, &first, Ok(clip(0.9)), 0.1), LoadOutcome::Superseded);
        assert_eq!(g.len(), 1);
        assert_eq!(amb.last_clip().map(|c| c.frames()[0].left), Some(0.2));
    }

    #[test]
    fn failure_falls_back_to_pink_noise() {
        let mut g = AudioGraph::new(8000);
        let mut rng = StdRng::seed_from_u64(0);
        let mut amb = AmbientPlayer::new();
        let ticket = amb.tickets().issue();
        let outcome = amb.complete_load(&mut g, &mut rng, &ticket, Err("404".into()), 0.0);
        assert_eq!(outcome, LoadOutcome::FellBack);
        assert!(amb.is_playing());
        assert_eq!(amb.last_clip().map(|c| c.len()), Some(32_000));
    }

    #[test]
    fn stop_is_idempotent_and_cancels() {
        let mut g = AudioGraph::new(8000);
        let mut rng = StdRng::seed_from_u64(0);
        let mut amb = AmbientPlayer::new();
        amb.stop(&mut g, 0.0);
        amb.play_noise(&mut g, &mut rng, NoiseColor::White, 0.0);
        let pending = amb.tickets().issue();
        amb.stop(&mut g, 1.0);
        amb.stop(&mut g, 1.0);
        assert!(!amb.is_playing());
        assert!(g.is_empty());
        assert!(pending.is_cancelled());
    }

    #[test]
    fn only_one_source_at_a_time() {
        let mut g = AudioGraph::new(8000);
        let mut rng = StdRng::seed_from_u64(0);
        let mut amb = AmbientPlayer::new();
        amb.play_noise(&mut g, &mut rng, NoiseColor::White, 0.0);
        amb.play_noise(&mut g, &mut rng, NoiseColor::Pink, 0.5);
        amb.play_clip(&mut g, clip(0.1), 1.0);
        assert_eq!(g.len(), 1);
        amb.stop(&mut g, 2.0);
        assert!(amb.resume_last(&mut g, 3.0));
        assert_eq!(g.len(), 1);
    }
}
