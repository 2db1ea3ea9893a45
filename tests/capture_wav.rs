//! Integration test: capture the master output and encode it as WAV.

use std::io::{BufWriter, Write};

use zr_engine::{CaptureError, Engine, EngineConfig, Frame};
use zr_formats::{decode_audio, frames_to_wav, write_wav, WAV_HEADER_LEN};
use zr_ir::{EnvType, Patch};

fn engine() -> Engine {
    let mut patch = Patch::default();
    patch.drum_seq[0] = [true; 16];
    patch.env_type = EnvType::White;
    Engine::new(EngineConfig { sample_rate: 8000, reverb_seconds: 0.05, seed: Some(5) }, patch)
}

#[test]
fn captured_frames_become_a_wav_file() {
    let mut e = engine();
    e.play();
    e.start_capture().unwrap();
    for _ in 0..2000 {
        e.render_frame();
    }
    let frames = e.stop_capture().unwrap();
    assert_eq!(frames.len(), 2000);
    assert!(frames.iter().any(|f| f.left != 0));

    let wav = frames_to_wav(&frames, e.sample_rate());
    assert_eq!(wav.len(), WAV_HEADER_LEN + 2000 * 4);
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");

    let clip = decode_audio(wav, Some("wav"), 8000).unwrap();
    assert_eq!(clip.len(), 2000);
}

#[test]
fn capture_only_covers_its_window() {
    let mut e = engine();
    e.play();
    for _ in 0..500 {
        e.render_frame();
    }
    e.start_capture().unwrap();
    for _ in 0..300 {
        e.render_frame();
    }
    assert_eq!(e.stop_capture().map(|f| f.len()), Some(300));
    for _ in 0..300 {
        e.render_frame();
    }
    assert!(!e.is_capturing());
}

#[test]
fn empty_capture_yields_nothing() {
    let mut e = engine();
    e.start_capture().unwrap();
    assert!(e.stop_capture().is_none());
    assert!(e.stop_capture().is_none());
}

#[test]
fn second_start_is_rejected() {
    let mut e = engine();
    e.start_capture().unwrap();
    assert_eq!(e.start_capture(), Err(CaptureError::AlreadyActive));
}

#[test]
fn wav_written_to_disk_reads_back() {
    let frames: Vec<Frame> = (0..800).map(|i| Frame { left: i as i16, right: -(i as i16) }).collect();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    {
        let mut out = BufWriter::new(std::fs::File::create(&path).unwrap());
        write_wav(&mut out, &frames, 8000).unwrap();
        out.flush().unwrap();
    }
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes, frames_to_wav(&frames, 8000));
    assert_eq!(decode_audio(bytes, Some("wav"), 8000).unwrap().len(), 800);
}
