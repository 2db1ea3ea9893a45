//! WAV encoding for 16-bit stereo PCM.

use std::io::Write;

use zr_engine::Frame;

/// Size of the canonical RIFF/WAVE header.
pub const WAV_HEADER_LEN: usize = 44;

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * (BITS_PER_SAMPLE / 8);

/// The 44-byte header for `frame_count` stereo frames.
pub fn wav_header(frame_count: usize, sample_rate: u32) -> [u8; WAV_HEADER_LEN] {
    let data_size = (frame_count as u32).saturating_mul(BLOCK_ALIGN as u32);
    let mut h = [0u8; WAV_HEADER_LEN];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&data_size.saturating_add(36).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes());
    h[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&(sample_rate * BLOCK_ALIGN as u32).to_le_bytes());
    h[32..34].copy_from_slice(&BLOCK_ALIGN.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_size.to_le_bytes());
    h
}

pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> std::io::Result<()> {
    w.write_all(&wav_header(frames.len(), sample_rate))?;
    for frame in frames {
        w.write_all(&frame.left.to_le_bytes())?;
        w.write_all(&frame.right.to_le_bytes())?;
    }
    Ok(())
}

/// Encode `frames` as an in-memory WAV file.
pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + frames.len() * BLOCK_ALIGN as usize);
    buf.extend_from_slice(&wav_header(frames.len(), sample_rate));
    for frame in frames {
        buf.extend_from_slice(&frame.left.to_le_bytes());
        buf.extend_from_slice(&frame.right.to_le_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn header_layout() {
        let frames = [Frame { left: 1, right: -1 }; 10];
        let bytes = frames_to_wav(&frames, 48_000);
        assert_eq!(bytes.len(), 44 + 40);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), 36 + 40);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(u32_at(&bytes, 24), 48_000);
        assert_eq!(u32_at(&bytes, 28), 192_000);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 40);
        assert_eq!(&bytes[44..48], &[1, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn writer_matches_in_memory_encoding() {
        let frames = [Frame { left: -32768, right: 32767 }, Frame::silence()];
        let mut out = Vec::new();
        write_wav(&mut out, &frames, 44_100).unwrap();
        assert_eq!(out, frames_to_wav(&frames, 44_100));
    }
}
