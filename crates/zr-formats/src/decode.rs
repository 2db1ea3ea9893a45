//! Ambient audio decoding.
//!
//! Any container and codec symphonia's default registry knows is accepted.
//! Output is stereo at the engine rate; mono is duplicated and extra
//! channels are dropped.

use std::io::Cursor;

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use zr_ir::{AudioClip, StereoFrame};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized audio format: {0}")]
    Probe(String),
    #[error("no decodable audio track")]
    NoTrack,
    #[error("unsupported codec: {0}")]
    Codec(String),
    #[error("stream did not declare a sample rate")]
    UnknownSampleRate,
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("stream contained no audio")]
    Empty,
}

/// Decode a complete file held in memory and resample it to `target_rate`.
///
/// `extension` is a probe hint such as `"mp3"`; the content is sniffed
/// either way.
pub fn decode_audio(bytes: Vec<u8>, extension: Option<&str>, target_rate: u32) -> Result<AudioClip, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Probe(e.to_string()))?;
    let mut format = probed.format;

    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let source_rate = track.codec_params.sample_rate.ok_or(DecodeError::UnknownSampleRate)?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut sample_buf: Option<(SignalSpec, SampleBuffer<f32>)> = None;
    let mut frames = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("decode: skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };
        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        if !buffer_fits(sample_buf.as_ref(), &spec, decoded.capacity()) {
            sample_buf = Some((spec, SampleBuffer::new(decoded.capacity() as u64, spec)));
        }
        let Some((_, buf)) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        for chunk in buf.samples().chunks(channels) {
            let left = chunk[0];
            let right = chunk.get(1).copied().unwrap_or(left);
            frames.push(StereoFrame::new(left, right));
        }
    }

    if frames.is_empty() {
        return Err(DecodeError::Empty);
    }
    log::debug!("decode: {} frames at {} Hz", frames.len(), source_rate);
    Ok(AudioClip::new(resample_linear(&frames, source_rate, target_rate), target_rate))
}

/// Whether the interleave buffer can take a packet of `frames` frames laid out as `spec`.
fn buffer_fits(current: Option<&(SignalSpec, SampleBuffer<f32>)>, spec: &SignalSpec, frames: usize) -> bool {
    current.is_some_and(|(held, buf)| held == spec && buf.capacity() >= frames * spec.channels.count())
}

/// Linear-interpolation resampler.
pub fn resample_linear(input: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || input.is_empty() || source_rate == 0 || target_rate == 0 {
        return input.to_vec();
    }
    let duration = input.len() as f64 / source_rate as f64;
    let out_len = ((duration * target_rate as f64).round() as usize).max(1);
    let step = source_rate as f64 / target_rate as f64;
    let last = input.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            let a = input[idx];
            let b = input[next];
            StereoFrame::new(a.left + (b.left - a.left) * frac, a.right + (b.right - a.right) * frac)
        })
        .collect()
}
