//! The fixed set of rack modules that own a bus.

use core::fmt;

/// Number of module buses in the rack.
pub const MODULE_COUNT: usize = 6;

/// Number of generator slots.
pub const GENERATOR_COUNT: usize = 3;

/// One of the six rack modules. Each owns exactly one bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Drum,
    Chord,
    Env,
    /// Generator slot 0..3.
    Gen(u8),
}

impl ModuleId {
    /// Every module, in bus order.
    pub const ALL: [ModuleId; MODULE_COUNT] = [
        ModuleId::Drum,
        ModuleId::Chord,
        ModuleId::Env,
        ModuleId::Gen(0),
        ModuleId::Gen(1),
        ModuleId::Gen(2),
    ];

    /// Bus index (0..6). Out-of-range generator slots map to the last generator.
    pub fn index(self) -> usize {
        match self {
            ModuleId::Drum => 0,
            ModuleId::Chord => 1,
            ModuleId::Env => 2,
            ModuleId::Gen(slot) => 3 + (slot as usize).min(GENERATOR_COUNT - 1),
        }
    }

    /// Inverse of [`ModuleId::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Generator module for a slot, if the slot exists.
    pub fn generator(slot: usize) -> Option<Self> {
        (slot < GENERATOR_COUNT).then_some(ModuleId::Gen(slot as u8))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleId::Drum => write!(f, "drum"),
            ModuleId::Chord => write!(f, "chord"),
            ModuleId::Env => write!(f, "env"),
            ModuleId::Gen(slot) => write!(f, "gen{}", slot),
        }
    }
}
