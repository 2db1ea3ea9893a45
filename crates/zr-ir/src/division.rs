//! Musical divisions and the fixed step grid.
//!
//! The transport runs sixteenth-note steps, 16 per bar. Gate lengths, chord
//! lengths and arpeggio rates are lookup tables rather than arithmetic so the
//! grid stays exactly what the patch format names.

use serde::{Deserialize, Serialize};

/// Steps per bar (sixteenth notes).
pub const STEPS_PER_BAR: u8 = 16;

/// Lower tempo bound (BPM).
pub const BPM_MIN: f32 = 40.0;

/// Upper tempo bound (BPM).
pub const BPM_MAX: f32 = 220.0;

/// Default tempo (BPM).
pub const DEFAULT_BPM: f32 = 80.0;

/// Milliseconds between step pulses at `bpm`: `60000 / bpm / 4`.
pub fn pulse_interval_ms(bpm: f32) -> f64 {
    60_000.0 / bpm as f64 / 4.0
}

/// Seconds per beat (quarter note) at `bpm`.
pub fn beat_seconds(bpm: f32) -> f64 {
    60.0 / bpm as f64
}

/// How often a generator re-triggers while its gate is open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateDuration {
    #[serde(rename = "1/2")]
    Half,
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "infinite")]
    Infinite,
}

impl GateDuration {
    /// Re-trigger period in steps; `None` for an infinite gate.
    pub fn period_steps(self) -> Option<u64> {
        match self {
            GateDuration::Half => Some(8),
            GateDuration::One => Some(16),
            GateDuration::Two => Some(32),
            GateDuration::Four => Some(64),
            GateDuration::Infinite => None,
        }
    }

    pub fn is_infinite(self) -> bool {
        self == GateDuration::Infinite
    }

    /// Whether a generator with this gate fires at `total_steps`.
    pub fn fires_at(self, total_steps: u64) -> bool {
        match self.period_steps() {
            Some(period) => total_steps % period == 0,
            None => total_steps == 0,
        }
    }
}

/// How many steps each chord in the progression lasts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordDuration {
    #[serde(rename = "1/4")]
    Quarter,
    #[serde(rename = "1/2")]
    Half,
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "4")]
    Four,
}

impl ChordDuration {
    pub fn steps(self) -> u64 {
        match self {
            ChordDuration::Quarter => 4,
            ChordDuration::Half => 8,
            ChordDuration::One => 16,
            ChordDuration::Two => 32,
            ChordDuration::Four => 64,
        }
    }

    /// Chord length in seconds at `bpm`.
    pub fn seconds(self, bpm: f32) -> f64 {
        beat_seconds(bpm) * (self.steps() as f64 / 4.0)
    }
}

/// Note-repeat rate of the plucked chord arpeggiator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArpSpeed {
    #[serde(rename = "1/1")]
    Whole,
    #[serde(rename = "1/2")]
    Half,
    #[serde(rename = "1/4")]
    Quarter,
    #[serde(rename = "1/8")]
    Eighth,
    #[default]
    #[serde(rename = "1/16")]
    Sixteenth,
    #[serde(rename = "1/32")]
    ThirtySecond,
}

impl ArpSpeed {
    /// Fraction of a bar between notes.
    pub fn factor(self) -> f64 {
        match self {
            ArpSpeed::Whole => 1.0,
            ArpSpeed::Half => 0.5,
            ArpSpeed::Quarter => 0.25,
            ArpSpeed::Eighth => 0.125,
            ArpSpeed::Sixteenth => 0.0625,
            ArpSpeed::ThirtySecond => 0.03125,
        }
    }

    /// Seconds between plucked notes: `beat * 4 * factor`, times 2/3 for triplets.
    pub fn interval_seconds(self, bpm: f32, triplet: bool) -> f64 {
        let factor = if triplet { self.factor() * (2.0 / 3.0) } else { self.factor() };
        beat_seconds(bpm) * 4.0 * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_interval_at_80_bpm() {
        assert_eq!(pulse_interval_ms(80.0), 187.5);
    }

    #[test]
    fn gate_periods_match_table() {
        assert_eq!(GateDuration::Half.period_steps(), Some(8));
        assert_eq!(GateDuration::One.period_steps(), Some(16));
        assert_eq!(GateDuration::Two.period_steps(), Some(32));
        assert_eq!(GateDuration::Four.period_steps(), Some(64));
        assert_eq!(GateDuration::Infinite.period_steps(), None);
    }

    #[test]
    fn infinite_gate_fires_only_at_zero() {
        assert!(GateDuration::Infinite.fires_at(0));
        assert!(!GateDuration::Infinite.fires_at(64));
        assert!(GateDuration::Half.fires_at(24));
        assert!(!GateDuration::Half.fires_at(12));
    }

    #[test]
    fn chord_steps_match_table() {
        let steps: [u64; 5] = [4, 8, 16, 32, 64];
        let durations = [
            ChordDuration::Quarter,
            ChordDuration::Half,
            ChordDuration::One,
            ChordDuration::Two,
            ChordDuration::Four,
        ];
        for (d, s) in durations.iter().zip(steps) {
            assert_eq!(d.steps(), s);
        }
        assert_eq!(ChordDuration::One.seconds(60.0), 4.0);
    }

    #[test]
    fn arp_interval_with_triplets() {
        // 1/16 at 120 BPM: 0.5 * 4 * 0.0625
        assert!((ArpSpeed::Sixteenth.interval_seconds(120.0, false) - 0.125).abs() < 1e-12);
        assert!((ArpSpeed::Sixteenth.interval_seconds(120.0, true) - 0.125 * 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn divisions_use_patch_strings() {
        assert_eq!(serde_json::to_string(&GateDuration::Infinite).unwrap(), "\"infinite\"");
        assert_eq!(serde_json::to_string(&ChordDuration::Quarter).unwrap(), "\"1/4\"");
        let speed: ArpSpeed = serde_json::from_str("\"1/32\"").unwrap();
        assert_eq!(speed, ArpSpeed::ThirtySecond);
    }
}
