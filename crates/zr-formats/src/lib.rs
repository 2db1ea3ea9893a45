//! Boundary codecs for the zenrack instrument rack.
//!
//! Patch JSON in and out, ambient audio decoding, and 16-bit WAV encoding
//! of captured output.

mod decode;
mod patch_json;
mod wav;

pub use decode::{decode_audio, resample_linear, DecodeError};
pub use patch_json::{export_patch, import_patch, PatchError};
pub use wav::{frames_to_wav, wav_header, write_wav, WAV_HEADER_LEN};
