//! Main rack engine.

use rand::rngs::StdRng;
use rand::SeedableRng;
use zr_ir::{
    finite_or, AiPatch, AudioClip, Edit, EnvType, ModuleId, Patch, StereoFrame, FREQ_MAX, FREQ_MIN,
    GENERATOR_COUNT, MODULE_COUNT, VOLUME_MAX,
};

use crate::ambient::{AmbientPlayer, LoadOutcome, LoadTicket, NoiseColor, TicketIssuer};
use crate::bus::{Bus, MasterSection, FILTER_SMOOTHING, SMOOTHING};
use crate::capture::CaptureTap;
use crate::chords::ChordVoices;
use crate::config::EngineConfig;
use crate::drums::trigger_drum;
use crate::error::CaptureError;
use crate::event_queue::{DeferredAction, DeferredQueue};
use crate::frame::Frame;
use crate::generator::GeneratorBank;
use crate::graph::AudioGraph;
use crate::reverb::Reverb;
use crate::scheduler::plan_tick;
use crate::transport::{TickSnapshot, Transport};

/// Frames between graph reaping and automation pruning passes.
const HOUSEKEEPING_INTERVAL: u64 = 128;

/// The rack engine.
///
/// Owns the parameter snapshot, the node graph, the module buses and every
/// voice manager. Time is the rendered sample position; every entry point
/// schedules relative to [`Engine::now`].
pub struct Engine {
    config: EngineConfig,
    /// Live parameter snapshot.
    patch: Patch,
    graph: AudioGraph,
    /// Module buses, indexed by `ModuleId::index()`.
    buses: [Bus; MODULE_COUNT],
    master: MasterSection,
    reverb: Reverb,
    deferred: DeferredQueue,
    transport: Transport,
    generators: GeneratorBank,
    chords: ChordVoices,
    chords_playing: bool,
    ambient: AmbientPlayer,
    capture: CaptureTap,
    rng: StdRng,
    frames_rendered: u64,
}

impl Engine {
    /// Build the buses and reverb for `config` and load `patch`.
    pub fn new(config: EngineConfig, mut patch: Patch) -> Self {
        let sample_rate = config.sample_rate.max(1);
        let config = EngineConfig { sample_rate, ..config };
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let reverb = Reverb::synthetic(&mut rng, config.reverb_seconds, sample_rate);
        patch.normalize();

        let buses = core::array::from_fn(|i| {
            if ModuleId::from_index(i) == Some(ModuleId::Chord) {
                Bus::with_lowpass(sample_rate)
            } else {
                Bus::new(sample_rate)
            }
        });

        let mut engine = Self {
            config,
            transport: Transport::new(patch.bpm),
            patch,
            graph: AudioGraph::new(sample_rate),
            buses,
            master: MasterSection::new(sample_rate),
            reverb,
            deferred: DeferredQueue::new(),
            generators: GeneratorBank::new(),
            chords: ChordVoices::new(),
            chords_playing: false,
            ambient: AmbientPlayer::new(),
            capture: CaptureTap::new(),
            rng,
            frames_rendered: 0,
        };
        engine.patch.bpm = engine.transport.bpm();
        engine.sync_mixer(0.0);
        log::debug!("engine: {} Hz, {:.1}s reverb", sample_rate, engine.config.reverb_seconds);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Current engine time in seconds.
    pub fn now(&self) -> f64 {
        self.frames_rendered as f64 / self.config.sample_rate as f64
    }

    /// Live parameter snapshot.
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// Generate one frame of audio.
    pub fn render_frame(&mut self) -> StereoFrame {
        let now = self.now();

        // 1. Pulse
        if let Some(tick) = self.transport.poll(now) {
            self.dispatch(tick, now);
        }

        // 2. Deferred disposal and stops
        self.run_deferred(now);

        // 3. Voices into buses
        let mut inputs = [StereoFrame::silence(); MODULE_COUNT];
        self.graph.render(now, &mut inputs);

        // 4. Buses, reverb, master
        let mut main = StereoFrame::silence();
        let mut send = StereoFrame::silence();
        for (bus, input) in self.buses.iter_mut().zip(inputs) {
            let out = bus.process(input, now);
            main += out.main;
            send += out.reverb;
        }
        let wet = self.reverb.process(send);
        let output = self.master.process(main, wet, now);

        // 5. Capture tap
        self.capture.push(Frame::from_stereo(output));

        self.frames_rendered += 1;
        if self.frames_rendered % HOUSEKEEPING_INTERVAL == 0 {
            self.housekeeping(now);
        }
        output
    }

    /// Fill `out` with consecutive frames.
    pub fn render(&mut self, out: &mut [StereoFrame]) {
        for frame in out.iter_mut() {
            *frame = self.render_frame();
        }
    }

    fn dispatch(&mut self, tick: TickSnapshot, now: f64) {
        let plan = plan_tick(&self.patch, self.chords_playing, &tick);

        for (lane, params) in &plan.drums {
            if let Err(e) = trigger_drum(&mut self.graph, &mut self.rng, *lane, params, now) {
                log::warn!("drums: {:?} hit failed: {}", lane, e);
            }
        }

        for &slot in &plan.generators {
            let params = self.patch.gen_params[slot];
            if let Err(e) =
                self.generators.trigger(&mut self.graph, &mut self.deferred, slot, &params, tick.bpm, now)
            {
                log::warn!("generator {}: trigger failed: {}", slot, e);
            }
        }

        if let Some(chord) = &plan.chord {
            if let Err(e) = self.chords.trigger(&mut self.graph, &mut self.deferred, &mut self.rng, chord, now) {
                log::warn!("chords: trigger failed: {}", e);
            }
        }
    }

    fn run_deferred(&mut self, now: f64) {
        for item in self.deferred.pop_until(now) {
            match item.action {
                DeferredAction::Dispose(key) => {
                    self.graph.remove(key, now);
                }
                DeferredAction::Stop(key) => {
                    if let Err(e) = self.graph.stop(key, now, now) {
                        log::debug!("deferred stop of {:?} skipped: {}", key, e);
                    }
                }
            }
        }
    }

    fn housekeeping(&mut self, now: f64) {
        self.graph.reap(now);
        self.chords.reap(&self.graph);
        self.graph.prune_automation(now);
        for bus in &mut self.buses {
            bus.prune_automation(now);
        }
        self.master.prune_automation(now);
    }

    // --- transport ---

    /// Start the transport. Dispatches the current position immediately.
    pub fn play(&mut self) {
        let now = self.now();
        if let Some(tick) = self.transport.start(now) {
            self.dispatch(tick, now);
        }
    }

    /// Cancel the pulse. Sounding voices are left alone.
    pub fn stop_transport(&mut self) {
        self.transport.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_running()
    }

    /// Change tempo. Returns the clamped value actually applied.
    pub fn set_bpm(&mut self, bpm: f32) -> f32 {
        let applied = self.transport.set_bpm(bpm, self.now());
        self.patch.bpm = applied;
        applied
    }

    /// Return to step zero, re-dispatching it if running.
    pub fn reset_transport(&mut self) {
        let now = self.now();
        if let Some(tick) = self.transport.reset(now) {
            self.dispatch(tick, now);
        }
    }

    pub fn position(&self) -> TickSnapshot {
        self.transport.snapshot()
    }

    pub fn set_chords_playing(&mut self, playing: bool) {
        self.chords_playing = playing;
    }

    pub fn chords_playing(&self) -> bool {
        self.chords_playing
    }

    // --- parameters ---

    /// Apply one parameter edit, clamped.
    pub fn apply_edit(&mut self, edit: Edit) {
        let now = self.now();
        match edit {
            Edit::ToggleDrumStep { lane, step } => {
                match self.patch.drum_seq[lane.index()].get_mut(step as usize) {
                    Some(cell) => *cell = !*cell,
                    None => log::warn!("edit: drum step {} out of range", step),
                }
            }
            Edit::SetDrumParams { lane, params } => {
                let slot = &mut self.patch.drum_settings[lane.index()];
                *slot = params.clamped(slot);
            }
            Edit::SetDrumEffects(sends) => {
                self.patch.drum_effects = sends.clamped(&self.patch.drum_effects);
                self.sync_bus(ModuleId::Drum, now);
            }
            Edit::SetPadPreset(preset) => self.patch.pad_preset = preset,
            Edit::SetChords(chords) => self.patch.chords = chords,
            Edit::SetChordDuration(duration) => self.patch.chord_duration = duration,
            Edit::SetArpSpeed(speed) => self.patch.arp_speed = speed,
            Edit::SetChordRange(range) => self.patch.chord_range = range.clamp(1, 3),
            Edit::SetChordTriplet(triplet) => self.patch.chord_is_triplet = triplet,
            Edit::SetPadParams(params) => {
                self.patch.pad_params = params.clamped(&self.patch.pad_params);
                self.sync_bus(ModuleId::Chord, now);
            }
            Edit::SetEnvType(env) => self.patch.env_type = env,
            Edit::SetEnvParams(params) => {
                self.patch.env_params = params.clamped(&self.patch.env_params);
                self.sync_bus(ModuleId::Env, now);
            }
            Edit::SetGenerator { slot, params } => {
                let Some(current) = self.patch.gen_params.get_mut(slot as usize) else {
                    log::warn!("edit: no generator {}", slot);
                    return;
                };
                let was_active = current.active;
                *current = params.clamped(current);
                self.reconcile_generator(slot as usize, was_active, now);
            }
            Edit::SetGeneratorActive { slot, active } => {
                let Some(current) = self.patch.gen_params.get_mut(slot as usize) else {
                    log::warn!("edit: no generator {}", slot);
                    return;
                };
                let was_active = current.active;
                current.active = active;
                if was_active != active {
                    self.reconcile_generator(slot as usize, was_active, now);
                }
            }
            Edit::SetGeneratorEffects { slot, sends } => {
                let Some(current) = self.patch.gen_effects.get_mut(slot as usize) else {
                    log::warn!("edit: no generator {}", slot);
                    return;
                };
                *current = sends.clamped(current);
                if let Some(module) = ModuleId::generator(slot as usize) {
                    self.sync_bus(module, now);
                }
            }
            Edit::SetVolume { module, volume } => {
                let v = &mut self.patch.mixer_volumes[module.index()];
                *v = finite_or(volume, *v).clamp(0.0, VOLUME_MAX);
                self.sync_bus(module, now);
            }
            Edit::SetPan { module, pan } => {
                let p = &mut self.patch.mixer_panning[module.index()];
                *p = finite_or(pan, *p).clamp(-1.0, 1.0);
                self.sync_bus(module, now);
            }
            Edit::ToggleMute(module) => {
                let m = &mut self.patch.mixer_mute[module.index()];
                *m = !*m;
                self.sync_mixer(now);
            }
            Edit::ToggleSolo(module) => {
                let s = &mut self.patch.mixer_solo[module.index()];
                *s = !*s;
                self.sync_mixer(now);
            }
            Edit::SetMasterVolume(volume) => {
                self.patch.master_volume = finite_or(volume, self.patch.master_volume).clamp(0.0, VOLUME_MAX);
                self.sync_master(now);
            }
            Edit::SetMasterReverb(level) => {
                self.patch.master_reverb = finite_or(level, self.patch.master_reverb).clamp(0.0, 1.0);
                self.sync_master(now);
            }
        }
    }

    /// Replace the whole parameter snapshot, e.g. after an import.
    pub fn load_patch(&mut self, mut patch: Patch) {
        let now = self.now();
        patch.normalize();
        let previous = core::mem::replace(&mut self.patch, patch);
        self.patch.bpm = self.transport.set_bpm(self.patch.bpm, now);
        for slot in 0..GENERATOR_COUNT {
            self.reconcile_generator(slot, previous.gen_params[slot].active, now);
        }
        self.sync_mixer(now);
        log::info!("engine: patch loaded ({} bpm, {} chords)", self.patch.bpm, self.patch.chords.len());
    }

    /// Apply a generated patch. `None` changes nothing and returns false.
    ///
    /// Tempo, progression, drum pattern and each generator's gate, pitch,
    /// binaural offset and waveform are replaced together, then the transport
    /// returns to step zero. With `autoplay` chords and ambience are switched
    /// on and the transport started.
    pub fn apply_ai_patch(&mut self, ai: Option<AiPatch>, autoplay: bool) -> bool {
        let Some(ai) = ai else {
            log::info!("engine: no generated patch, keeping current state");
            return false;
        };
        let now = self.now();
        self.patch.bpm = self.transport.set_bpm(ai.bpm, now);
        self.patch.chords = ai.chords;
        self.patch.drum_seq = ai.drum_seq;

        let mut was_active = [false; GENERATOR_COUNT];
        for (slot, generated) in ai.generators.iter().take(GENERATOR_COUNT).enumerate() {
            let params = &mut self.patch.gen_params[slot];
            was_active[slot] = params.active;
            params.active = generated.active;
            params.frequency = finite_or(generated.frequency, params.frequency).clamp(FREQ_MIN, FREQ_MAX);
            params.base_frequency = params.frequency;
            params.binaural_beat = finite_or(generated.binaural_beat, params.binaural_beat).clamp(0.0, 100.0);
            params.waveform = generated.waveform;
        }

        if autoplay {
            self.chords_playing = true;
            if self.patch.env_type == EnvType::None {
                self.patch.env_type = EnvType::Ocean;
            }
        }
        // Step zero triggers newly active generators, so reconcile afterwards.
        self.reset_transport();
        if autoplay {
            self.play();
        }
        for (slot, &active) in was_active.iter().enumerate().take(ai.generators.len()) {
            self.reconcile_generator(slot, active, now);
        }
        log::info!("engine: generated patch applied ({} bpm, autoplay {})", self.patch.bpm, autoplay);
        true
    }

    /// Replace only the chord progression with a generated one.
    ///
    /// `None` changes nothing and returns false. A playing transport, or one
    /// about to autoplay, returns to step zero; autoplay starts a stopped
    /// transport with chords on.
    pub fn apply_ai_chords(&mut self, chords: Option<Vec<String>>, autoplay: bool) -> bool {
        let Some(chords) = chords else {
            log::info!("engine: no generated chords, keeping current progression");
            return false;
        };
        self.patch.chords = chords;
        let was_playing = self.transport.is_running();
        if was_playing || autoplay {
            self.reset_transport();
            if autoplay && !was_playing {
                self.chords_playing = true;
                self.play();
            }
        }
        log::info!("engine: generated progression applied ({} chords)", self.patch.chords.len());
        true
    }

    /// Bring a generator's live voice in line with its parameters after they changed.
    fn reconcile_generator(&mut self, slot: usize, was_active: bool, now: f64) {
        let params = self.patch.gen_params[slot];
        let bpm = self.transport.bpm();
        let result = match (was_active, params.active) {
            (true, false) => {
                self.generators.release(&mut self.graph, &mut self.deferred, slot, params.adsr.release, now);
                Ok(())
            }
            (false, true) if self.transport.is_running() && !self.generators.is_live(slot) => {
                self.generators.trigger(&mut self.graph, &mut self.deferred, slot, &params, bpm, now)
            }
            (_, true) if self.generators.is_live(slot) => {
                self.generators.update_live(&mut self.graph, &mut self.deferred, slot, &params, bpm, now)
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("generator {}: update failed: {}", slot, e);
        }
    }

    fn sync_mixer(&mut self, now: f64) {
        for module in ModuleId::ALL {
            self.sync_bus(module, now);
        }
        self.sync_master(now);
    }

    /// Push one module's levels, pan, sends and filter toward the patch values.
    fn sync_bus(&mut self, module: ModuleId, now: f64) {
        let i = module.index();
        let volume = self.patch.effective_volume(module);
        let pan = self.patch.mixer_panning[i];
        let sends = self.patch.sends(module);
        let bus = &mut self.buses[i];
        bus.volume.set_target_at(volume, now, SMOOTHING);
        bus.pan.set_target_at(pan, now, SMOOTHING);
        bus.reverb_send.set_target_at(sends.reverb, now, SMOOTHING);
        bus.echo.set_target_at(sends.echo, now, SMOOTHING);
        match module {
            ModuleId::Env => bus.trim.set_target_at(self.patch.env_params.level, now, SMOOTHING),
            ModuleId::Chord => {
                if let Some(filter) = &mut bus.filter {
                    filter.cutoff.set_target_at(self.patch.pad_params.lpf, now, FILTER_SMOOTHING);
                    filter.q.set_target_at(self.patch.pad_params.reso, now, FILTER_SMOOTHING);
                }
            }
            _ => {}
        }
    }

    fn sync_master(&mut self, now: f64) {
        self.master.volume.set_target_at(self.patch.master_volume, now, SMOOTHING);
        self.master.reverb_return.set_target_at(self.patch.master_reverb, now, SMOOTHING);
    }

    // --- ambient ---

    /// Issuer for ambient load tickets, shared with loader threads.
    pub fn ambient_tickets(&self) -> TicketIssuer {
        self.ambient.tickets().clone()
    }

    pub fn play_noise(&mut self, color: NoiseColor) {
        let now = self.now();
        self.ambient.play_noise(&mut self.graph, &mut self.rng, color, now);
    }

    /// Hand a finished ambient load to the player.
    pub fn complete_ambient_load(&mut self, ticket: &LoadTicket, result: Result<AudioClip, String>) -> LoadOutcome {
        let now = self.now();
        self.ambient.complete_load(&mut self.graph, &mut self.rng, ticket, result, now)
    }

    pub fn stop_ambient(&mut self) {
        let now = self.now();
        self.ambient.stop(&mut self.graph, now);
    }

    /// Replay the last ambient clip. Returns false if there is none.
    pub fn resume_ambient(&mut self) -> bool {
        let now = self.now();
        self.ambient.resume_last(&mut self.graph, now)
    }

    pub fn ambient_playing(&self) -> bool {
        self.ambient.is_playing()
    }

    // --- capture ---

    pub fn start_capture(&mut self) -> Result<(), CaptureError> {
        self.capture.start()
    }

    /// Stop capturing. `None` when nothing was captured.
    pub fn stop_capture(&mut self) -> Option<Vec<Frame>> {
        self.capture.stop()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_active()
    }

    // --- panic and queries ---

    /// Silence every voice within a few milliseconds. The transport keeps running.
    pub fn panic(&mut self) {
        let now = self.now();
        self.generators.panic(&mut self.graph, now);
        self.chords.panic(&mut self.graph, now);
        self.ambient.stop(&mut self.graph, now);
        log::info!("engine: panic at {:.3}s", now);
    }

    /// Generator voices, sustained chord voices and the ambient source.
    pub fn live_voice_count(&self) -> usize {
        self.generators.live_count() + self.chords.live_count() + usize::from(self.ambient.is_playing())
    }

    pub fn is_generator_live(&self, slot: usize) -> bool {
        self.generators.is_live(slot)
    }

    /// Nodes currently in the graph, ended-but-unreaped ones included.
    pub fn node_count(&self) -> usize {
        self.graph.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zr_ir::division::GateDuration;
    use zr_ir::{AiGenerator, DrumLane, DRUM_LANES, DRUM_STEPS};

    fn engine() -> Engine {
        let config = EngineConfig { sample_rate: 8000, reverb_seconds: 0.05, seed: Some(7) };
        Engine::new(config, Patch::default())
    }

    fn quiet_engine() -> Engine {
        let config = EngineConfig { sample_rate: 8000, reverb_seconds: 0.05, seed: Some(7) };
        let patch = Patch { drum_seq: [[false; DRUM_STEPS]; DRUM_LANES], ..Patch::default() };
        Engine::new(config, patch)
    }

    fn run(engine: &mut Engine, seconds: f64) {
        let frames = (seconds * engine.sample_rate() as f64) as usize;
        for _ in 0..frames {
            engine.render_frame();
        }
    }

    #[test]
    fn silent_when_idle() {
        let mut e = engine();
        let mut out = vec![StereoFrame::silence(); 256];
        e.render(&mut out);
        assert!(out.iter().all(|f| f.peak() == 0.0));
    }

    #[test]
    fn volume_edit_is_clamped() {
        let mut e = engine();
        e.apply_edit(Edit::SetVolume { module: ModuleId::Drum, volume: 9.0 });
        assert_eq!(e.patch().mixer_volumes[0], VOLUME_MAX);
        e.apply_edit(Edit::SetVolume { module: ModuleId::Drum, volume: f32::NAN });
        assert_eq!(e.patch().mixer_volumes[0], VOLUME_MAX);
        e.apply_edit(Edit::SetPan { module: ModuleId::Env, pan: -4.0 });
        assert_eq!(e.patch().mixer_panning[2], -1.0);
    }

    #[test]
    fn mute_toggles_back() {
        let mut e = engine();
        e.apply_edit(Edit::ToggleMute(ModuleId::Chord));
        e.apply_edit(Edit::ToggleMute(ModuleId::Chord));
        assert!(!e.patch().mixer_mute[1]);
    }

    #[test]
    fn activating_generator_while_playing_triggers() {
        let mut e = engine();
        e.play();
        assert_eq!(e.live_voice_count(), 0);
        e.apply_edit(Edit::SetGeneratorActive { slot: 1, active: true });
        assert!(e.is_generator_live(1));
        e.apply_edit(Edit::SetGeneratorActive { slot: 1, active: false });
        assert!(!e.is_generator_live(1));
    }

    #[test]
    fn released_generator_is_disposed() {
        let mut e = engine();
        let mut params = e.patch().gen_params[0];
        params.active = true;
        params.gate_duration = GateDuration::Infinite;
        e.apply_edit(Edit::SetGenerator { slot: 0, params });
        e.play();
        run(&mut e, 0.2);
        assert_eq!(e.node_count(), 1);
        e.apply_edit(Edit::SetGeneratorActive { slot: 0, active: false });
        run(&mut e, 0.5);
        assert_eq!(e.node_count(), 0);
    }

    #[test]
    fn bpm_edit_is_clamped() {
        let mut e = engine();
        assert_eq!(e.set_bpm(1000.0), 220.0);
        assert_eq!(e.patch().bpm, 220.0);
        assert_eq!(e.set_bpm(f32::NAN), 220.0);
    }

    #[test]
    fn generated_patch_triggers_new_generator_once() {
        let mut by_edit = quiet_engine();
        by_edit.play();
        by_edit.apply_edit(Edit::SetGeneratorActive { slot: 0, active: true });
        let single_voice = by_edit.node_count();
        assert!(single_voice > 0);

        let mut e = quiet_engine();
        e.play();
        run(&mut e, 0.1);
        let ai = AiPatch {
            bpm: 80.0,
            chords: Vec::new(),
            drum_seq: [[false; DRUM_STEPS]; DRUM_LANES],
            generators: vec![AiGenerator {
                active: true,
                frequency: e.patch().gen_params[0].frequency,
                binaural_beat: 4.0,
                waveform: e.patch().gen_params[0].waveform,
            }],
        };
        assert!(e.apply_ai_patch(Some(ai), false));
        assert!(e.is_generator_live(0));
        // A double trigger would leave the first voice fading alongside the second.
        assert_eq!(e.node_count(), single_voice);
    }

    #[test]
    fn generated_chords_leave_the_rest_alone() {
        let mut e = engine();
        e.apply_edit(Edit::SetGeneratorActive { slot: 2, active: true });
        e.apply_edit(Edit::ToggleDrumStep { lane: DrumLane::Snare, step: 3 });
        let before = e.patch().clone();
        let chords: Vec<String> = ["Am7", "Dm7"].iter().map(|s| s.to_string()).collect();

        assert!(e.apply_ai_chords(Some(chords.clone()), true));
        assert_eq!(e.patch().chords, chords);
        assert_eq!(e.patch().gen_params, before.gen_params);
        assert_eq!(e.patch().drum_seq, before.drum_seq);
        assert_eq!(e.patch().bpm, before.bpm);
        assert!(e.is_playing());
        assert!(e.chords_playing());
        assert_eq!(e.position().total_steps, 0);
    }

    #[test]
    fn generated_chords_without_autoplay_stay_stopped() {
        let mut e = engine();
        assert!(!e.apply_ai_chords(None, true));
        assert!(!e.is_playing());
        assert!(e.apply_ai_chords(Some(vec!["G7".to_string()]), false));
        assert!(!e.is_playing());
        assert!(!e.chords_playing());
    }

    #[test]
    fn missing_ai_patch_changes_nothing() {
        let mut e = engine();
        let before = e.patch().clone();
        assert!(!e.apply_ai_patch(None, true));
        assert_eq!(e.patch(), &before);
        assert!(!e.is_playing());
    }
}
