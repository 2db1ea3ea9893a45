//! Node arena: every sound-producing primitive currently in the graph.
//!
//! Nodes are sources with a gain stage routed into one module bus, or
//! control-rate LFOs that modulate other nodes' frequency. Each node starts
//! once and stops once. A stop may be moved earlier until it takes effect;
//! after that further stops are rejected.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz};
use slotmap::{SecondaryMap, SlotMap};
use zr_ir::{AudioClip, ModuleId, Param, StereoFrame, Waveform, MODULE_COUNT};

use crate::error::GraphError;
use crate::oscillator::Oscillator;

slotmap::new_key_type! {
    /// Handle to a node in the [`AudioGraph`].
    pub struct NodeKey;
}

/// Where a node's output goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Summed into a module bus input.
    Bus(ModuleId),
    /// Read by nodes that name this one as their modulator.
    Modulator,
}

/// Playback state of a node at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Playback {
    /// Not started, or start time still in the future.
    Scheduled,
    Playing,
    Ended,
}

/// One-shot start/stop bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Lifecycle {
    start: Option<f64>,
    stop: Option<f64>,
}

impl Lifecycle {
    pub fn state_at(&self, time: f64) -> Playback {
        match self.start {
            Some(start) if time >= start => match self.stop {
                Some(stop) if time >= stop => Playback::Ended,
                _ => Playback::Playing,
            },
            _ => Playback::Scheduled,
        }
    }

    fn start(&mut self, at: f64) -> Result<(), GraphError> {
        if self.start.is_some() {
            return Err(GraphError::AlreadyStarted);
        }
        self.start = Some(at);
        Ok(())
    }

    fn stop(&mut self, at: f64, now: f64) -> Result<(), GraphError> {
        let Some(start) = self.start else {
            return Err(GraphError::NotStarted);
        };
        let at = at.max(start);
        self.stop = match self.stop {
            Some(stop) if stop <= now => return Err(GraphError::AlreadyStopped),
            Some(stop) => Some(stop.min(at)),
            None => Some(at),
        };
        Ok(())
    }

    /// Scheduled stop time, if any.
    #[cfg(test)]
    pub fn stop_time(&self) -> Option<f64> {
        self.stop
    }
}

/// Mono high-pass applied to both channels of a buffer source.
pub struct HighPass {
    left: DirectForm2Transposed<f32>,
    right: DirectForm2Transposed<f32>,
}

impl HighPass {
    /// Build a high-pass at `cutoff` Hz. The cutoff is kept below Nyquist.
    pub fn new(cutoff: f32, sample_rate: f32) -> Option<Self> {
        let cutoff = cutoff.clamp(10.0, sample_rate * 0.49);
        let coeffs = Coefficients::<f32>::from_params(
            biquad::Type::HighPass,
            sample_rate.hz(),
            cutoff.hz(),
            biquad::Q_BUTTERWORTH_F32,
        )
        .ok()?;
        Some(Self {
            left: DirectForm2Transposed::<f32>::new(coeffs),
            right: DirectForm2Transposed::<f32>::new(coeffs),
        })
    }

    fn run(&mut self, frame: StereoFrame) -> StereoFrame {
        StereoFrame::new(self.left.run(frame.left), self.right.run(frame.right))
    }
}

/// What a node produces.
pub enum Source {
    /// Independent left/right oscillators, hard-panned.
    StereoPair {
        left: Oscillator,
        right: Oscillator,
        left_frequency: Param,
        right_frequency: Param,
    },
    /// A single centered oscillator.
    Tone { osc: Oscillator, frequency: Param },
    /// Buffer playback, optionally looped and high-passed.
    Buffer { clip: AudioClip, position: usize, looping: bool, filter: Option<HighPass> },
    /// Control-rate oscillator; output is `depth * wave`, in Hz.
    Lfo { osc: Oscillator, frequency: Param, depth: Param },
}

impl Source {
    pub fn stereo_pair(waveform: Waveform) -> Self {
        Source::StereoPair {
            left: Oscillator::new(waveform),
            right: Oscillator::new(waveform),
            left_frequency: Param::new(440.0),
            right_frequency: Param::new(440.0),
        }
    }

    pub fn tone(waveform: Waveform) -> Self {
        Source::Tone { osc: Oscillator::new(waveform), frequency: Param::new(440.0) }
    }

    pub fn buffer(clip: AudioClip, looping: bool, filter: Option<HighPass>) -> Self {
        Source::Buffer { clip, position: 0, looping, filter }
    }

    pub fn lfo(waveform: Waveform, rate: f32, depth: f32) -> Self {
        Source::Lfo {
            osc: Oscillator::new(waveform),
            frequency: Param::new(rate),
            depth: Param::new(depth),
        }
    }

    /// Render one frame. `None` once a one-shot buffer runs out.
    fn render(&mut self, now: f64, sample_rate: f32, fm: f32) -> Option<StereoFrame> {
        match self {
            Source::StereoPair { left, right, left_frequency, right_frequency } => {
                let l = left.next_sample(left_frequency.value_at(now) + fm, sample_rate);
                let r = right.next_sample(right_frequency.value_at(now) + fm, sample_rate);
                Some(StereoFrame::new(l, r))
            }
            Source::Tone { osc, frequency } => {
                Some(StereoFrame::mono(osc.next_sample(frequency.value_at(now) + fm, sample_rate)))
            }
            Source::Buffer { clip, position, looping, filter } => {
                if *position >= clip.len() {
                    if !*looping || clip.is_empty() {
                        return None;
                    }
                    *position = 0;
                }
                let frame = clip.frames()[*position];
                *position += 1;
                Some(match filter {
                    Some(hp) => hp.run(frame),
                    None => frame,
                })
            }
            Source::Lfo { osc, frequency, depth } => {
                let v = osc.next_sample(frequency.value_at(now), sample_rate) * depth.value_at(now);
                Some(StereoFrame::mono(v))
            }
        }
    }

    fn prune(&mut self, now: f64) {
        match self {
            Source::StereoPair { left_frequency, right_frequency, .. } => {
                left_frequency.prune(now);
                right_frequency.prune(now);
            }
            Source::Tone { frequency, .. } => frequency.prune(now),
            Source::Lfo { frequency, depth, .. } => {
                frequency.prune(now);
                depth.prune(now);
            }
            Source::Buffer { .. } => {}
        }
    }
}

/// A node in the graph.
pub struct Node {
    pub source: Source,
    /// Output gain (the voice envelope).
    pub gain: Param,
    route: Route,
    modulator: Option<NodeKey>,
    lifecycle: Lifecycle,
}

impl Node {
    #[cfg(test)]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

/// Arena of live nodes.
pub struct AudioGraph {
    nodes: SlotMap<NodeKey, Node>,
    /// Modulator outputs for the frame being rendered.
    modulation: SecondaryMap<NodeKey, f32>,
    sample_rate: f32,
}

impl AudioGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            modulation: SecondaryMap::new(),
            sample_rate: sample_rate as f32,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Add a node with unity gain. It stays silent until started.
    pub fn add(&mut self, source: Source, route: Route) -> NodeKey {
        self.nodes.insert(Node {
            source,
            gain: Param::new(1.0),
            route,
            modulator: None,
            lifecycle: Lifecycle::default(),
        })
    }

    #[cfg(test)]
    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Gain automation of a node.
    pub fn gain_mut(&mut self, key: NodeKey) -> Result<&mut Param, GraphError> {
        self.nodes.get_mut(key).map(|n| &mut n.gain).ok_or(GraphError::UnknownNode)
    }

    /// Feed `lfo`'s output into `key`'s frequency.
    pub fn set_modulator(&mut self, key: NodeKey, lfo: NodeKey) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(key).ok_or(GraphError::UnknownNode)?;
        node.modulator = Some(lfo);
        Ok(())
    }

    pub fn start(&mut self, key: NodeKey, at: f64) -> Result<(), GraphError> {
        self.nodes.get_mut(key).ok_or(GraphError::UnknownNode)?.lifecycle.start(at)
    }

    /// Schedule a stop at `at`. Only ever moves an existing stop earlier.
    pub fn stop(&mut self, key: NodeKey, at: f64, now: f64) -> Result<(), GraphError> {
        self.nodes.get_mut(key).ok_or(GraphError::UnknownNode)?.lifecycle.stop(at, now)
    }

    /// Disconnect and drop a node. Stops it first if it is still running.
    pub fn remove(&mut self, key: NodeKey, now: f64) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                if node.lifecycle.state_at(now) != Playback::Ended {
                    if let Err(e) = node.lifecycle.stop(now, now) {
                        log::debug!("remove: stop of {:?} skipped: {}", key, e);
                    }
                }
                self.nodes.remove(key);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn state_at(&self, key: NodeKey, time: f64) -> Option<Playback> {
        self.nodes.get(key).map(|n| n.lifecycle.state_at(time))
    }

    /// Render one frame of every playing node into the module bus inputs.
    pub fn render(&mut self, now: f64, buses: &mut [StereoFrame; MODULE_COUNT]) {
        let sample_rate = self.sample_rate;

        self.modulation.clear();
        for (key, node) in self.nodes.iter_mut() {
            if node.route != Route::Modulator || node.lifecycle.state_at(now) != Playback::Playing {
                continue;
            }
            if let Some(v) = node.source.render(now, sample_rate, 0.0) {
                self.modulation.insert(key, v.left);
            }
        }

        for (_, node) in self.nodes.iter_mut() {
            let Route::Bus(module) = node.route else {
                continue;
            };
            if node.lifecycle.state_at(now) != Playback::Playing {
                continue;
            }
            let fm = node
                .modulator
                .and_then(|k| self.modulation.get(k).copied())
                .unwrap_or(0.0);
            match node.source.render(now, sample_rate, fm) {
                Some(frame) => buses[module.index()] += frame * node.gain.value_at(now),
                None => {
                    // One-shot buffer ran out: this is its natural stop.
                    let _ = node.lifecycle.stop(now, now);
                }
            }
        }
    }

    /// Drop every node that has ended. Returns how many were removed.
    pub fn reap(&mut self, now: f64) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|_, node| node.lifecycle.state_at(now) != Playback::Ended);
        before - self.nodes.len()
    }

    /// Fold settled automation on every node.
    pub fn prune_automation(&mut self, now: f64) {
        for (_, node) in self.nodes.iter_mut() {
            node.gain.prune(now);
            node.source.prune(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_for(graph: &mut AudioGraph, from: f64, frames: usize) -> Vec<[StereoFrame; MODULE_COUNT]> {
        let sr = graph.sample_rate() as f64;
        (0..frames)
            .map(|i| {
                let mut buses = [StereoFrame::silence(); MODULE_COUNT];
                graph.render(from + i as f64 / sr, &mut buses);
                buses
            })
            .collect()
    }

    #[test]
    fn node_starts_once() {
        let mut g = AudioGraph::new(48_000);
        let k = g.add(Source::tone(Waveform::Sine), Route::Bus(ModuleId::Chord));
        assert!(g.start(k, 0.0).is_ok());
        assert_eq!(g.start(k, 0.1), Err(GraphError::AlreadyStarted));
    }

    #[test]
    fn stop_only_moves_earlier() {
        let mut g = AudioGraph::new(48_000);
        let k = g.add(Source::tone(Waveform::Sine), Route::Bus(ModuleId::Chord));
        assert_eq!(g.stop(k, 1.0, 0.0), Err(GraphError::NotStarted));
        g.start(k, 0.0).unwrap();
        g.stop(k, 2.0, 0.0).unwrap();
        g.stop(k, 3.0, 0.5).unwrap();
        assert_eq!(g.get(k).unwrap().lifecycle().stop_time(), Some(2.0));
        g.stop(k, 1.0, 0.5).unwrap();
        assert_eq!(g.get(k).unwrap().lifecycle().stop_time(), Some(1.0));
        assert_eq!(g.stop(k, 0.5, 1.5), Err(GraphError::AlreadyStopped));
    }

    #[test]
    fn scheduled_node_is_silent_until_start() {
        let mut g = AudioGraph::new(1000);
        let k = g.add(Source::tone(Waveform::Sine), Route::Bus(ModuleId::Drum));
        g.start(k, 0.01).unwrap();
        let out = render_for(&mut g, 0.0, 20);
        assert_eq!(out[5][0], StereoFrame::silence());
        assert!(out[15][0].peak() > 0.0);
    }

    #[test]
    fn stereo_pair_is_hard_panned() {
        let mut g = AudioGraph::new(48_000);
        let k = g.add(Source::stereo_pair(Waveform::Sine), Route::Bus(ModuleId::Gen(0)));
        if let Some(Node { source: Source::StereoPair { right_frequency, .. }, .. }) = g.get_mut(k) {
            right_frequency.set_value_at(445.0, 0.0);
        }
        g.start(k, 0.0).unwrap();
        let out = render_for(&mut g, 0.0, 2000);
        let differs = out.iter().any(|b| (b[3].left - b[3].right).abs() > 1e-3);
        assert!(differs);
    }

    #[test]
    fn one_shot_buffer_ends_and_is_reaped() {
        let mut g = AudioGraph::new(1000);
        let clip = AudioClip::from_mono(&[0.5; 10], 1000);
        let k = g.add(Source::buffer(clip, false, None), Route::Bus(ModuleId::Env));
        g.start(k, 0.0).unwrap();
        let out = render_for(&mut g, 0.0, 12);
        assert_eq!(out[9][2], StereoFrame::mono(0.5));
        assert_eq!(g.state_at(k, 0.011), Some(Playback::Ended));
        assert_eq!(g.reap(0.011), 1);
        assert!(g.is_empty());
    }

    #[test]
    fn looping_buffer_wraps() {
        let mut g = AudioGraph::new(1000);
        let clip = AudioClip::from_mono(&[0.1, 0.2], 1000);
        let k = g.add(Source::buffer(clip, true, None), Route::Bus(ModuleId::Env));
        g.start(k, 0.0).unwrap();
        let out = render_for(&mut g, 0.0, 5);
        assert_eq!(out[4][2], StereoFrame::mono(0.1));
        assert_eq!(g.state_at(k, 0.005), Some(Playback::Playing));
    }

    #[test]
    fn lfo_modulates_frequency() {
        let mut g = AudioGraph::new(48_000);
        let plain = g.add(Source::tone(Waveform::Sine), Route::Bus(ModuleId::Gen(0)));
        let wobbly = g.add(Source::tone(Waveform::Sine), Route::Bus(ModuleId::Gen(1)));
        let lfo = g.add(Source::lfo(Waveform::Square, 5.0, 200.0), Route::Modulator);
        g.set_modulator(wobbly, lfo).unwrap();
        for k in [plain, wobbly, lfo] {
            g.start(k, 0.0).unwrap();
        }
        let out = render_for(&mut g, 0.0, 4800);
        let diverged = out.iter().any(|b| (b[3].left - b[4].left).abs() > 0.1);
        assert!(diverged);
    }

    #[test]
    fn remove_disconnects() {
        let mut g = AudioGraph::new(48_000);
        let k = g.add(Source::tone(Waveform::Sine), Route::Bus(ModuleId::Chord));
        g.start(k, 0.0).unwrap();
        assert!(g.remove(k, 0.5));
        assert!(!g.remove(k, 0.5));
        assert_eq!(g.gain_mut(k).err(), Some(GraphError::UnknownNode));
    }
}
