//! Chord name catalog.
//!
//! A chord name is a root note (`C`, `C#`, `Db`, ... `B`, fourth octave) followed
//! by a quality suffix. Tone frequencies are `root * 2^(semitones / 12)`.

use arrayvec::ArrayVec;

/// Most tones any catalog chord has.
pub const MAX_CHORD_TONES: usize = 6;

/// Chord used when a name is not in the catalog.
pub const FALLBACK_CHORD: &str = "Cmaj7";

/// Tone frequencies of one chord, in Hz.
pub type ChordTones = ArrayVec<f32, MAX_CHORD_TONES>;

const ROOTS: [(&str, f32); 17] = [
    ("C#", 277.18),
    ("Db", 277.18),
    ("D#", 311.13),
    ("Eb", 311.13),
    ("F#", 369.99),
    ("Gb", 369.99),
    ("G#", 415.30),
    ("Ab", 415.30),
    ("A#", 466.16),
    ("Bb", 466.16),
    ("C", 261.63),
    ("D", 293.66),
    ("E", 329.63),
    ("F", 349.23),
    ("G", 392.00),
    ("A", 440.00),
    ("B", 493.88),
];

const QUALITIES: [(&str, &[u8]); 21] = [
    ("", &[0, 4, 7]),
    ("m", &[0, 3, 7]),
    ("maj7", &[0, 4, 7, 11]),
    ("maj9", &[0, 4, 7, 11, 14]),
    ("maj7#11", &[0, 4, 7, 11, 14, 18]),
    ("m7", &[0, 3, 7, 10]),
    ("m9", &[0, 3, 7, 10, 14]),
    ("m11", &[0, 3, 7, 10, 14, 17]),
    ("m6", &[0, 3, 7, 9]),
    ("7", &[0, 4, 7, 10]),
    ("9", &[0, 4, 7, 10, 14]),
    ("11", &[0, 4, 7, 10, 14, 17]),
    ("13", &[0, 4, 7, 10, 14, 21]),
    ("sus2", &[0, 2, 7]),
    ("sus4", &[0, 5, 7]),
    ("7sus4", &[0, 5, 7, 10]),
    ("13sus4", &[0, 5, 7, 10, 14, 21]),
    ("6/9", &[0, 4, 7, 9, 14]),
    ("add9", &[0, 4, 7, 14]),
    ("dim7", &[0, 3, 6, 9]),
    ("aug", &[0, 4, 8]),
];

/// Look up a chord by name. Returns `None` for names outside the catalog.
pub fn chord_tones(name: &str) -> Option<ChordTones> {
    // Two-character roots are listed first so "C#m" never parses as "C" + "#m".
    let (root, quality) = ROOTS
        .iter()
        .find_map(|&(root, freq)| name.strip_prefix(root).map(|rest| (freq, rest)))?;
    let semitones = QUALITIES
        .iter()
        .find(|(suffix, _)| *suffix == quality)
        .map(|(_, s)| *s)?;
    Some(
        semitones
            .iter()
            .map(|&s| root * libm::powf(2.0, s as f32 / 12.0))
            .collect(),
    )
}

/// Look up a chord by name, falling back to [`FALLBACK_CHORD`].
pub fn chord_tones_or_default(name: &str) -> ChordTones {
    chord_tones(name)
        .or_else(|| chord_tones(FALLBACK_CHORD))
        .unwrap_or_default()
}
