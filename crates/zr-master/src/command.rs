//! Messages from the controller to the audio thread.

use crossbeam_channel::Sender;
use zr_engine::{CaptureError, Engine, Frame, LoadTicket, NoiseColor};
use zr_ir::{AiPatch, AudioClip, Edit, Patch};

pub(crate) enum Command {
    Edit(Edit),
    Play,
    Stop,
    Reset,
    SetBpm(f32),
    SetChordsPlaying(bool),
    LoadPatch(Box<Patch>),
    ApplyAi { patch: Option<AiPatch>, autoplay: bool, reply: Sender<bool> },
    ApplyAiChords { chords: Option<Vec<String>>, autoplay: bool, reply: Sender<bool> },
    PlayNoise(NoiseColor),
    AmbientLoaded { ticket: LoadTicket, result: Result<AudioClip, String> },
    StopAmbient,
    ResumeAmbient,
    StartCapture(Sender<Result<(), CaptureError>>),
    StopCapture(Sender<Option<Vec<Frame>>>),
    Snapshot(Sender<Patch>),
    Panic,
    Shutdown,
}

/// Whether the audio thread keeps running after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Shutdown,
}

/// Apply one command to the engine. Replies to a caller that stopped
/// waiting are dropped.
pub(crate) fn apply(engine: &mut Engine, command: Command) -> Flow {
    match command {
        Command::Edit(edit) => engine.apply_edit(edit),
        Command::Play => engine.play(),
        Command::Stop => engine.stop_transport(),
        Command::Reset => engine.reset_transport(),
        Command::SetBpm(bpm) => {
            engine.set_bpm(bpm);
        }
        Command::SetChordsPlaying(on) => engine.set_chords_playing(on),
        Command::LoadPatch(patch) => engine.load_patch(*patch),
        Command::ApplyAi { patch, autoplay, reply } => {
            let _ = reply.send(engine.apply_ai_patch(patch, autoplay));
        }
        Command::ApplyAiChords { chords, autoplay, reply } => {
            let _ = reply.send(engine.apply_ai_chords(chords, autoplay));
        }
        Command::PlayNoise(color) => engine.play_noise(color),
        Command::AmbientLoaded { ticket, result } => {
            let outcome = engine.complete_ambient_load(&ticket, result);
            log::debug!("ambient: load #{} {:?}", ticket.generation(), outcome);
        }
        Command::StopAmbient => engine.stop_ambient(),
        Command::ResumeAmbient => {
            if !engine.resume_ambient() {
                log::debug!("ambient: nothing to resume");
            }
        }
        Command::StartCapture(reply) => {
            let _ = reply.send(engine.start_capture());
        }
        Command::StopCapture(reply) => {
            let _ = reply.send(engine.stop_capture());
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(engine.patch().clone());
        }
        Command::Panic => engine.panic(),
        Command::Shutdown => return Flow::Shutdown,
    }
    Flow::Continue
}
