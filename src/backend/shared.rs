//! Cross-thread backend handle
//!
//! When the audio library runs its own thread, the host keeps one clone of
//! a [`SharedBackend`] there and gives the other to the engine. Each engine
//! call takes the lock for just that call.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use super::{AudioBackend, BackendError};
use crate::vsu::waveform::WAVEFORM_LEN;

/// A backend behind `Arc<Mutex<_>>`
pub struct SharedBackend<B> {
    inner: Arc<Mutex<B>>,
}

impl<B> SharedBackend<B> {
    /// Wrap a backend
    pub fn new(backend: B) -> Self {
        SharedBackend {
            inner: Arc::new(Mutex::new(backend)),
        }
    }

    /// Lock the backend for direct access
    pub fn lock(&self) -> MutexGuard<'_, B> {
        self.inner.lock()
    }

    /// Shared handle for the audio thread
    pub fn handle(&self) -> Arc<Mutex<B>> {
        Arc::clone(&self.inner)
    }
}

impl<B> Clone for SharedBackend<B> {
    fn clone(&self) -> Self {
        SharedBackend {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> std::fmt::Debug for SharedBackend<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBackend")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

impl<B: AudioBackend> AudioBackend for SharedBackend<B> {
    type Voice = B::Voice;

    fn create_voice(&mut self, waveform: &[u8]) -> Result<Self::Voice, BackendError> {
        self.inner.lock().create_voice(waveform)
    }

    fn release_voice(&mut self, voice: Self::Voice) {
        self.inner.lock().release_voice(voice);
    }

    fn start(&mut self, voice: Self::Voice) {
        self.inner.lock().start(voice);
    }

    fn stop(&mut self, voice: Self::Voice) {
        self.inner.lock().stop(voice);
    }

    fn set_position(&mut self, voice: Self::Voice, offset: usize) {
        self.inner.lock().set_position(voice, offset);
    }

    fn set_frequency(&mut self, voice: Self::Voice, hz: f32) {
        self.inner.lock().set_frequency(voice, hz);
    }

    fn set_volume(&mut self, voice: Self::Voice, volume: u8) {
        self.inner.lock().set_volume(voice, volume);
    }

    fn set_pan(&mut self, voice: Self::Voice, pan: u8) {
        self.inner.lock().set_pan(voice, pan);
    }

    fn ramp_volume(&mut self, voice: Self::Voice, target: u8, duration: Duration) {
        self.inner.lock().ramp_volume(voice, target, duration);
    }

    fn sweep_frequency(&mut self, voice: Self::Voice, duration: Duration, target_hz: f32) {
        self.inner.lock().sweep_frequency(voice, duration, target_hz);
    }

    fn get_volume(&self, voice: Self::Voice) -> u8 {
        self.inner.lock().get_volume(voice)
    }

    fn get_frequency(&self, voice: Self::Voice) -> f32 {
        self.inner.lock().get_frequency(voice)
    }

    fn upload_waveform(&mut self, voice: Self::Voice, samples: &[u8; WAVEFORM_LEN]) {
        self.inner.lock().upload_waveform(voice, samples);
    }
}
