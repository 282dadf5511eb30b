//! Audio backend abstraction
//!
//! The engine never mixes samples itself. It drives a set of looping
//! voices through [`AudioBackend`], the only surface it needs from an
//! audio library: create a voice from an 8-bit buffer, start/stop it, set
//! its rate, volume and pan, and ask the backend to run timed linear ramps.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vb_vsu::backend::{AudioBackend, RecordingBackend};
//!
//! let mut backend = RecordingBackend::new();
//! let voice = backend.create_voice(&[0x80; 32]).unwrap();
//! backend.set_frequency(voice, 2441.4);
//! backend.set_volume(voice, 120);
//! backend.ramp_volume(voice, 0, Duration::from_millis(100));
//! backend.start(voice);
//! assert!(backend.voice(voice).unwrap().playing);
//! ```

pub mod recording;
pub mod shared;

pub use recording::{BackendCall, RecordingBackend, VoiceId, VoiceState};
pub use shared::SharedBackend;

use std::time::Duration;

use crate::vsu::waveform::WAVEFORM_LEN;

/// Failures reported by an audio backend
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No output device could be opened
    #[error("no audio device available: {0}")]
    DeviceUnavailable(String),

    /// The backend ran out of voices or sample memory
    #[error("voice allocation failed: {0}")]
    VoiceAllocation(String),
}

/// Capabilities the engine requires from an audio output library
///
/// Voices loop their buffer until stopped. Volume and pan are 0-255 with
/// pan 0 hard left and 255 hard right. Ramps run on the backend's own
/// clock; the engine only issues them.
pub trait AudioBackend {
    /// Opaque handle to one voice
    type Voice: Copy + Eq + std::fmt::Debug;

    /// Allocate a looping voice playing `waveform` (8-bit, signed-biased)
    fn create_voice(&mut self, waveform: &[u8]) -> Result<Self::Voice, BackendError>;

    /// Stop a voice and free its resources
    fn release_voice(&mut self, voice: Self::Voice);

    /// Start (or keep) playing
    fn start(&mut self, voice: Self::Voice);

    /// Stop playing; parameters are kept
    fn stop(&mut self, voice: Self::Voice);

    /// Move the play position to sample `offset`
    fn set_position(&mut self, voice: Self::Voice, offset: usize);

    /// Set the sample playback rate in Hz
    fn set_frequency(&mut self, voice: Self::Voice, hz: f32);

    /// Set volume immediately, cancelling any volume ramp
    fn set_volume(&mut self, voice: Self::Voice, volume: u8);

    /// Set pan immediately
    fn set_pan(&mut self, voice: Self::Voice, pan: u8);

    /// Ramp volume linearly to `target` over `duration`
    fn ramp_volume(&mut self, voice: Self::Voice, target: u8, duration: Duration);

    /// Sweep playback rate linearly to `target_hz` over `duration`
    fn sweep_frequency(&mut self, voice: Self::Voice, duration: Duration, target_hz: f32);

    /// Volume at this instant
    fn get_volume(&self, voice: Self::Voice) -> u8;

    /// Playback rate at this instant
    fn get_frequency(&self, voice: Self::Voice) -> f32;

    /// Replace the 32-sample buffer of a waveform voice
    fn upload_waveform(&mut self, voice: Self::Voice, samples: &[u8; WAVEFORM_LEN]);
}
