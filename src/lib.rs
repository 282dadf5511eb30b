//! Virtual Boy VSU sound emulation
//!
//! Translates writes to the memory-mapped registers of the Virtual Boy's
//! sound unit into parameters for a real-time audio backend: per-voice
//! frequency, volume, stereo pan, envelope ramps, the CH5 frequency sweep
//! and the selected waveform or noise pattern.
//!
//! The engine never renders samples. It owns 13 looping backend voices
//! (five user waveforms, eight LFSR noise patterns) and only issues
//! parameter changes and timed ramps, which the backend carries out on its
//! own clock.
//!
//! # Features
//! - All six channels, driven from one channel-parameterised code path
//! - Lazy waveform re-conversion on key-on after sound RAM writes
//! - Envelope and sweep timing as single backend ramps
//! - CH6 noise as eight pre-generated voices switched on the fly
//! - Address mirror folding across the whole VSU window
//! - JSON register traces and an in-memory recording backend
//!
//! # Crate feature flags
//! - `cli` (default): the `vsu-trace` trace replayer binary
//!
//! # Quick start
//! ```
//! use vb_vsu::backend::RecordingBackend;
//! use vb_vsu::bus::SoundMemory;
//! use vb_vsu::vsu::{ChannelId, ChannelRegister};
//! use vb_vsu::{SoundConfig, SoundEngine};
//!
//! let mut memory = SoundMemory::new();
//! let mut engine = SoundEngine::new(SoundConfig::default(), RecordingBackend::open);
//!
//! let int = ChannelId::Ch1.register_address(ChannelRegister::Control);
//! memory.write_byte(int, 0x80);
//! engine.notify_register_write(&memory, int);
//!
//! assert!(engine.channel(ChannelId::Ch1).enabled);
//! ```

#![warn(missing_docs)]

pub mod backend; // Audio backend boundary
pub mod bus; // Memory read-back
pub mod config;
pub mod trace; // Register write traces
pub mod vsu; // VSU emulation (core)

/// Error types for VSU emulation
#[derive(thiserror::Error, Debug)]
pub enum VsuError {
    /// Audio backend failure
    #[error("Audio backend error: {0}")]
    Backend(#[from] backend::BackendError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Malformed register trace
    #[error("Trace error: {0}")]
    TraceError(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for VsuError {
    /// Converts a String into `VsuError::Other`.
    ///
    /// Prefer the specific variants where the failure has a category.
    fn from(msg: String) -> Self {
        VsuError::Other(msg)
    }
}

impl From<&str> for VsuError {
    /// Converts a string slice into `VsuError::Other`.
    fn from(msg: &str) -> Self {
        VsuError::Other(msg.to_string())
    }
}

/// Result type for VSU operations
pub type Result<T> = std::result::Result<T, VsuError>;

// Public API exports
pub use backend::{AudioBackend, BackendError, RecordingBackend, SharedBackend};
pub use bus::{MemoryBus, SoundMemory};
pub use config::SoundConfig;
pub use trace::{RegisterTrace, RegisterWrite};
pub use vsu::{ChannelId, SoundEngine};
