//! Synthesis and scheduling engine for the zenrack instrument rack.
//!
//! Renders the rack sample by sample: the transport pulses the step clock,
//! the scheduler turns each step into voice triggers, the voice managers
//! build nodes in the audio graph, and the buses mix those nodes through
//! echo, reverb and the master compressor.

mod ambient;
mod bus;
mod capture;
mod chords;
mod config;
mod drums;
mod error;
mod event_queue;
mod frame;
mod generator;
mod graph;
mod mixer;
mod oscillator;
mod reverb;
pub mod scheduler;
mod transport;

pub use ambient::{LoadOutcome, LoadTicket, NoiseColor, TicketIssuer};
pub use bus::equal_power_pan;
pub use config::EngineConfig;
pub use error::{CaptureError, GraphError};
pub use frame::Frame;
pub use mixer::Engine;
pub use reverb::{ImpulseResponse, Reverb};
pub use scheduler::{plan_tick, ChordTrigger, TickPlan};
pub use transport::{TickSnapshot, Transport};
