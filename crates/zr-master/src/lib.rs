//! Headless controller for the zenrack instrument rack.
//!
//! The audio thread owns the [`Engine`](zr_engine::Engine) outright. The
//! controller talks to it over a command channel and reads the transport
//! position and voice count back through atomics. Ambient sources are fetched
//! and decoded on worker threads and handed to the audio thread when done.

mod command;
mod error;
mod loader;
mod render;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use zr_audio::{AudioError, AudioOutput, CpalOutput, NullOutput};
use zr_engine::{Engine, NoiseColor};
use zr_ir::{AiPatch, Edit, StereoFrame, GENERATOR_COUNT};

use command::{apply, Command, Flow};

pub use error::{AmbientError, ControllerError};
pub use loader::{load_ambient, AmbientSource};
pub use render::{render_frames, render_to_wav};
pub use zr_engine::{EngineConfig, Frame, TickSnapshot, TicketIssuer};
pub use zr_formats::{export_patch, import_patch, PatchError};
pub use zr_ir::{EnvType, Patch};

/// Frames rendered between command polls.
const BLOCK_FRAMES: usize = 128;

/// Where the audio thread sends its output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// The default output device.
    Device,
    /// No device; render in real time and discard.
    Null,
}

/// Values the audio thread publishes after every block.
#[derive(Debug, Default)]
struct Shared {
    step_index: AtomicU32,
    total_steps: AtomicU64,
    bpm_bits: AtomicU32,
    playing: AtomicBool,
    live_voices: AtomicUsize,
}

impl Shared {
    fn publish(&self, engine: &Engine) {
        let pos = engine.position();
        self.step_index.store(u32::from(pos.step_index), Ordering::Relaxed);
        self.total_steps.store(pos.total_steps, Ordering::Relaxed);
        self.bpm_bits.store(pos.bpm.to_bits(), Ordering::Relaxed);
        self.playing.store(engine.is_playing(), Ordering::Relaxed);
        self.live_voices.store(engine.live_voice_count(), Ordering::Relaxed);
    }
}

/// Running rack: an audio thread plus the state the UI needs to drive it.
pub struct Controller {
    commands: Sender<Command>,
    shared: Arc<Shared>,
    tickets: TicketIssuer,
    sample_rate: u32,
    env_type: EnvType,
    ambient_enabled: bool,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    /// Spawn the audio thread with `patch` loaded. The transport starts stopped.
    pub fn start(patch: Patch, config: EngineConfig, backend: Backend) -> Result<Self, ControllerError> {
        let (commands, rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let shared = Arc::new(Shared::default());
        let env_type = patch.env_type;

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("zr-audio".into())
            .spawn(move || audio_thread(patch, config, backend, rx, thread_shared, ready_tx))
            .map_err(ControllerError::Spawn)?;

        let (tickets, sample_rate) = ready_rx.recv().map_err(|_| ControllerError::Disconnected)??;
        log::info!("controller: running at {} Hz on {:?}", sample_rate, backend);
        Ok(Self { commands, shared, tickets, sample_rate, env_type, ambient_enabled: false, thread: Some(thread) })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn send(&self, command: Command) -> Result<(), ControllerError> {
        self.commands.send(command).map_err(|_| ControllerError::Disconnected)
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> Command) -> Result<T, ControllerError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.send(make(tx))?;
        rx.recv().map_err(|_| ControllerError::Disconnected)
    }

    // --- transport ---

    pub fn play(&self) -> Result<(), ControllerError> {
        self.send(Command::Play)
    }

    pub fn stop(&self) -> Result<(), ControllerError> {
        self.send(Command::Stop)
    }

    pub fn reset(&self) -> Result<(), ControllerError> {
        self.send(Command::Reset)
    }

    pub fn set_bpm(&self, bpm: f32) -> Result<(), ControllerError> {
        self.send(Command::SetBpm(bpm))
    }

    pub fn set_chords_playing(&self, on: bool) -> Result<(), ControllerError> {
        self.send(Command::SetChordsPlaying(on))
    }

    /// Last published transport position.
    pub fn position(&self) -> TickSnapshot {
        TickSnapshot {
            step_index: self.shared.step_index.load(Ordering::Relaxed) as u8,
            total_steps: self.shared.total_steps.load(Ordering::Relaxed),
            bpm: f32::from_bits(self.shared.bpm_bits.load(Ordering::Relaxed)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    pub fn live_voice_count(&self) -> usize {
        self.shared.live_voices.load(Ordering::Relaxed)
    }

    // --- parameters ---

    pub fn apply_edit(&mut self, edit: Edit) -> Result<(), ControllerError> {
        let env = match &edit {
            Edit::SetEnvType(env) => Some(*env),
            _ => None,
        };
        self.send(Command::Edit(edit))?;
        if let Some(env) = env {
            self.env_type = env;
            self.sync_ambient()?;
        }
        Ok(())
    }

    /// Apply a generated patch. Returns whether anything changed.
    pub fn apply_ai_patch(&mut self, patch: Option<AiPatch>, autoplay: bool) -> Result<bool, ControllerError> {
        let applied = self.request(|reply| Command::ApplyAi { patch, autoplay, reply })?;
        if applied && autoplay {
            if self.env_type == EnvType::None {
                self.env_type = EnvType::Ocean;
            }
            self.ambient_enabled = true;
            self.sync_ambient()?;
        }
        Ok(applied)
    }

    /// Replace only the chord progression with a generated one. Returns
    /// whether anything changed.
    pub fn apply_ai_chords(&self, chords: Option<Vec<String>>, autoplay: bool) -> Result<bool, ControllerError> {
        self.request(|reply| Command::ApplyAiChords { chords, autoplay, reply })
    }

    /// Replace the whole rack state from patch JSON. Rejected documents
    /// change nothing.
    pub fn import_patch(&mut self, json: &str) -> Result<(), ControllerError> {
        let patch = zr_formats::import_patch(json)?;
        self.env_type = patch.env_type;
        self.send(Command::LoadPatch(Box::new(patch)))?;
        self.sync_ambient()
    }

    /// The live parameter snapshot as patch JSON.
    pub fn export_patch(&self) -> Result<String, ControllerError> {
        let patch = self.snapshot()?;
        Ok(zr_formats::export_patch(&patch)?)
    }

    pub fn snapshot(&self) -> Result<Patch, ControllerError> {
        self.request(Command::Snapshot)
    }

    // --- ambient ---

    /// Switch the ambient layer on or off for the current env type.
    pub fn set_ambient_playing(&mut self, on: bool) -> Result<(), ControllerError> {
        self.ambient_enabled = on;
        self.sync_ambient()
    }

    pub fn ambient_enabled(&self) -> bool {
        self.ambient_enabled
    }

    /// Load and loop a custom source, replacing the current one.
    pub fn load_ambient(&mut self, source: AmbientSource) -> Result<(), ControllerError> {
        self.ambient_enabled = true;
        self.spawn_load(source)
    }

    fn spawn_load(&self, source: AmbientSource) -> Result<(), ControllerError> {
        let ticket = self.tickets.issue();
        loader::spawn_loader(source, ticket, self.sample_rate, self.commands.clone())
            .map(drop)
            .map_err(ControllerError::Spawn)
    }

    /// Start, switch or stop the ambient source to match the env type and
    /// the on/off switch.
    fn sync_ambient(&mut self) -> Result<(), ControllerError> {
        if !self.ambient_enabled {
            self.tickets.invalidate();
            return self.send(Command::StopAmbient);
        }
        match self.env_type {
            EnvType::White => self.play_noise(NoiseColor::White),
            EnvType::Pink => self.play_noise(NoiseColor::Pink),
            EnvType::None => {
                self.tickets.invalidate();
                self.send(Command::ResumeAmbient)
            }
            stock => match stock.stock_url() {
                Some(url) => self.spawn_load(AmbientSource::Url(url.to_owned())),
                None => Ok(()),
            },
        }
    }

    fn play_noise(&self, color: NoiseColor) -> Result<(), ControllerError> {
        self.tickets.invalidate();
        self.send(Command::PlayNoise(color))
    }

    // --- capture ---

    pub fn start_capture(&self) -> Result<(), ControllerError> {
        Ok(self.request(Command::StartCapture)??)
    }

    /// Stop capturing and encode what was caught as WAV. `None` when no
    /// capture ran or it caught nothing.
    pub fn stop_capture(&self) -> Result<Option<Vec<u8>>, ControllerError> {
        let frames = self.request(Command::StopCapture)?;
        Ok(frames.map(|f| zr_formats::frames_to_wav(&f, self.sample_rate)))
    }

    // --- panic ---

    /// Stop everything: transport, chords, ambient and every generator.
    pub fn panic(&mut self) -> Result<(), ControllerError> {
        self.ambient_enabled = false;
        self.tickets.invalidate();
        self.send(Command::Panic)?;
        self.send(Command::Stop)?;
        self.send(Command::SetChordsPlaying(false))?;
        for slot in 0..GENERATOR_COUNT as u8 {
            self.send(Command::Edit(Edit::SetGeneratorActive { slot, active: false }))?;
        }
        Ok(())
    }

    /// Stop the audio thread and wait for it.
    pub fn shutdown(&mut self) {
        self.tickets.invalidate();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::warn!("controller: audio thread panicked");
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

type Ready = Result<(TicketIssuer, u32), AudioError>;

fn open_output(backend: Backend, config: &EngineConfig) -> Result<Box<dyn AudioOutput>, AudioError> {
    match backend {
        Backend::Device => {
            let (mut output, consumer) = CpalOutput::new()?;
            output.build_stream(consumer)?;
            Ok(Box::new(output))
        }
        Backend::Null => Ok(Box::new(NullOutput::new(config.sample_rate))),
    }
}

fn audio_thread(
    patch: Patch,
    config: EngineConfig,
    backend: Backend,
    commands: Receiver<Command>,
    shared: Arc<Shared>,
    ready: Sender<Ready>,
) {
    let mut output = match open_output(backend, &config).and_then(|mut o| o.start().map(|()| o)) {
        Ok(output) => output,
        Err(e) => {
            log::warn!("audio: {}", e);
            let _ = ready.send(Err(e));
            return;
        }
    };

    let config = EngineConfig { sample_rate: output.sample_rate(), ..config };
    let mut engine = Engine::new(config, patch);
    shared.publish(&engine);
    if ready.send(Ok((engine.ambient_tickets(), engine.sample_rate()))).is_err() {
        return;
    }

    let mut block = [StereoFrame::silence(); BLOCK_FRAMES];
    'run: loop {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    if apply(&mut engine, command) == Flow::Shutdown {
                        break 'run;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'run,
            }
        }
        engine.render(&mut block);
        write_all(output.as_mut(), &block);
        shared.publish(&engine);
    }

    if let Err(e) = output.stop() {
        log::warn!("audio: stop failed: {}", e);
    }
    log::debug!("audio: thread exiting at {:.2}s", engine.now());
}

/// Push a whole block, yielding while the device catches up.
fn write_all(output: &mut dyn AudioOutput, mut frames: &[StereoFrame]) {
    while !frames.is_empty() {
        let written = output.write(frames);
        frames = &frames[written..];
        if written == 0 {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headless() -> Controller {
        let config = EngineConfig { sample_rate: 8000, reverb_seconds: 0.05, seed: Some(1) };
        Controller::start(Patch::default(), config, Backend::Null).unwrap()
    }

    #[test]
    fn edits_round_trip_through_the_audio_thread() {
        let mut c = headless();
        c.apply_edit(Edit::SetMasterVolume(9.0)).unwrap();
        c.set_bpm(300.0).unwrap();
        let patch = c.snapshot().unwrap();
        assert_eq!(patch.master_volume, zr_ir::VOLUME_MAX);
        assert_eq!(patch.bpm, 220.0);
    }

    #[test]
    fn missing_ai_patch_reports_false() {
        let mut c = headless();
        assert!(!c.apply_ai_patch(None, true).unwrap());
        assert!(!c.ambient_enabled());
    }

    #[test]
    fn generated_chords_replace_only_the_progression() {
        let c = headless();
        let before = c.snapshot().unwrap();
        let chords = vec!["Dm7".to_string(), "G7".to_string()];
        assert!(c.apply_ai_chords(Some(chords.clone()), true).unwrap());
        let after = c.snapshot().unwrap();
        assert_eq!(after.chords, chords);
        assert_eq!(after.gen_params, before.gen_params);
        assert_eq!(after.drum_seq, before.drum_seq);
        assert!(!c.ambient_enabled());
        assert!(!c.apply_ai_chords(None, true).unwrap());
    }

    #[test]
    fn rejected_import_changes_nothing() {
        let mut c = headless();
        let before = c.export_patch().unwrap();
        assert!(c.import_patch("{\"bpm\": 90}").is_err());
        assert_eq!(c.export_patch().unwrap(), before);
    }

    #[test]
    fn stop_capture_without_start_is_none() {
        let c = headless();
        assert!(c.stop_capture().unwrap().is_none());
        c.start_capture().unwrap();
        assert!(matches!(c.start_capture(), Err(ControllerError::Capture(_))));
    }

    #[test]
    fn panic_disables_generators() {
        let mut c = headless();
        c.apply_edit(Edit::SetGeneratorActive { slot: 0, active: true }).unwrap();
        c.play().unwrap();
        c.panic().unwrap();
        let patch = c.snapshot().unwrap();
        assert!(patch.gen_params.iter().all(|g| !g.active));
    }
}
