//! Ambient source loading on worker threads.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use zr_engine::LoadTicket;
use zr_ir::AudioClip;

use crate::command::Command;
use crate::error::AmbientError;

/// Where an ambient loop comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AmbientSource {
    File(PathBuf),
    /// An `http` or `https` URL.
    Url(String),
    /// A complete encoded file already in memory.
    Bytes(Vec<u8>),
}

impl AmbientSource {
    /// A URL for anything starting with `http://` or `https://`, else a path.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            AmbientSource::Url(s.to_owned())
        } else {
            AmbientSource::File(PathBuf::from(s))
        }
    }

    fn extension(&self) -> Option<&str> {
        let name = match self {
            AmbientSource::File(path) => path.to_str()?,
            AmbientSource::Url(url) => url.split(['?', '#']).next()?,
            AmbientSource::Bytes(_) => return None,
        };
        Path::new(name).extension()?.to_str()
    }
}

fn check(ticket: &LoadTicket) -> Result<(), AmbientError> {
    if ticket.is_cancelled() {
        Err(AmbientError::Cancelled)
    } else {
        Ok(())
    }
}

/// Fetch and decode `source`, bailing out as soon as `ticket` is cancelled.
pub fn load_ambient(source: &AmbientSource, ticket: &LoadTicket, sample_rate: u32) -> Result<AudioClip, AmbientError> {
    check(ticket)?;
    let bytes = match source {
        AmbientSource::File(path) => std::fs::read(path)?,
        AmbientSource::Url(url) => reqwest::blocking::get(url.as_str())?.error_for_status()?.bytes()?.to_vec(),
        AmbientSource::Bytes(bytes) => bytes.clone(),
    };
    check(ticket)?;
    let clip = zr_formats::decode_audio(bytes, source.extension(), sample_rate)?;
    check(ticket)?;
    Ok(clip)
}

/// Load on a new thread and post the result to the audio thread.
///
/// Cancelled loads are dropped silently. Failures are forwarded so the
/// engine can fall back to noise.
pub(crate) fn spawn_loader(
    source: AmbientSource,
    ticket: LoadTicket,
    sample_rate: u32,
    commands: Sender<Command>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new().name("zr-ambient-loader".into()).spawn(move || {
        let result = match load_ambient(&source, &ticket, sample_rate) {
            Err(AmbientError::Cancelled) => {
                log::debug!("ambient: load #{} cancelled", ticket.generation());
                return;
            }
            Err(e) => {
                log::warn!("ambient: load failed: {}", e);
                Err(e.to_string())
            }
            Ok(clip) => Ok(clip),
        };
        if commands.send(Command::AmbientLoaded { ticket, result }).is_err() {
            log::debug!("ambient: audio thread gone, dropping load");
        }
    })
}
