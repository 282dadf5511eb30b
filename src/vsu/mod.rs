//! Virtual Boy VSU
//!
//! Register decoding, channel state, waveform and noise tables, parameter
//! derivation and the engine tying them to an audio backend.

pub mod channel;
pub mod engine;
pub mod noise;
pub mod params;
pub mod registers;
pub mod waveform;

pub use channel::{Channel, ChannelId, NoiseSelector, CHANNEL_COUNT};
pub use engine::{SoundEngine, VOICE_COUNT};
pub use noise::NoiseStore;
pub use registers::{ChannelRegister, Register};
pub use waveform::{WaveSlot, WaveformStore};
