//! In-memory backend
//!
//! Keeps the parameters of every voice and a log of every call, without
//! producing sound. Used by the trace replayer and by tests to observe what
//! the engine asks of a real backend.

use std::fmt;
use std::time::Duration;

use super::{AudioBackend, BackendError};
use crate::vsu::waveform::WAVEFORM_LEN;

/// Handle of a [`RecordingBackend`] voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub usize);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// One backend call as issued by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// `create_voice`
    CreateVoice {
        /// Handle given out
        voice: VoiceId,
        /// Buffer length
        len: usize,
    },
    /// `release_voice`
    ReleaseVoice(VoiceId),
    /// `start`
    Start(VoiceId),
    /// `stop`
    Stop(VoiceId),
    /// `set_position`
    SetPosition {
        /// Target voice
        voice: VoiceId,
        /// Sample offset
        offset: usize,
    },
    /// `set_frequency`
    SetFrequency {
        /// Target voice
        voice: VoiceId,
        /// Playback rate
        hz: f32,
    },
    /// `set_volume`
    SetVolume {
        /// Target voice
        voice: VoiceId,
        /// New volume
        volume: u8,
    },
    /// `set_pan`
    SetPan {
        /// Target voice
        voice: VoiceId,
        /// New pan
        pan: u8,
    },
    /// `ramp_volume`
    RampVolume {
        /// Target voice
        voice: VoiceId,
        /// Final volume
        target: u8,
        /// Ramp time
        duration: Duration,
    },
    /// `sweep_frequency`
    SweepFrequency {
        /// Target voice
        voice: VoiceId,
        /// Sweep time
        duration: Duration,
        /// Final rate
        target_hz: f32,
    },
    /// `upload_waveform`
    UploadWaveform {
        /// Target voice
        voice: VoiceId,
        /// New buffer
        samples: [u8; WAVEFORM_LEN],
    },
}

impl BackendCall {
    /// Voice the call addresses
    pub fn voice(&self) -> VoiceId {
        match *self {
            BackendCall::CreateVoice { voice, .. }
            | BackendCall::SetPosition { voice, .. }
            | BackendCall::SetFrequency { voice, .. }
            | BackendCall::SetVolume { voice, .. }
            | BackendCall::SetPan { voice, .. }
            | BackendCall::RampVolume { voice, .. }
            | BackendCall::SweepFrequency { voice, .. }
            | BackendCall::UploadWaveform { voice, .. } => voice,
            BackendCall::ReleaseVoice(voice) | BackendCall::Start(voice) | BackendCall::Stop(voice) => {
                voice
            }
        }
    }
}

/// Parameters of one recorded voice
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceState {
    /// Current buffer
    pub samples: Vec<u8>,
    /// Voice is playing
    pub playing: bool,
    /// Last position set
    pub position: usize,
    /// Playback rate
    pub frequency: f32,
    /// Volume
    pub volume: u8,
    /// Pan
    pub pan: u8,
    /// Voice was released
    pub released: bool,
    /// Last volume ramp (target, duration)
    pub last_ramp: Option<(u8, Duration)>,
    /// Last frequency sweep (duration, target)
    pub last_sweep: Option<(Duration, f32)>,
}

impl VoiceState {
    fn new(samples: &[u8]) -> Self {
        VoiceState {
            samples: samples.to_vec(),
            playing: false,
            position: 0,
            frequency: 0.0,
            volume: 255,
            pan: 128,
            released: false,
            last_ramp: None,
            last_sweep: None,
        }
    }
}

/// Backend that records instead of playing
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    voices: Vec<VoiceState>,
    calls: Vec<BackendCall>,
    voice_limit: Option<usize>,
}

impl RecordingBackend {
    /// Unlimited voices
    pub fn new() -> Self {
        Self::default()
    }

    /// Open as a device would; never fails
    pub fn open() -> Result<Self, BackendError> {
        Ok(Self::new())
    }

    /// Refuse to allocate more than `limit` voices
    pub fn with_voice_limit(limit: usize) -> Self {
        RecordingBackend {
            voice_limit: Some(limit),
            ..Self::default()
        }
    }

    /// State of a voice
    pub fn voice(&self, voice: VoiceId) -> Option<&VoiceState> {
        self.voices.get(voice.0)
    }

    /// All voices in allocation order
    pub fn voices(&self) -> &[VoiceState] {
        &self.voices
    }

    /// Number of voices currently playing
    pub fn playing_count(&self) -> usize {
        self.voices.iter().filter(|v| v.playing).count()
    }

    /// Every call since creation or the last clear
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Drain the call log
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Forget logged calls, keep voice state
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn with_voice(&mut self, voice: VoiceId, call: BackendCall, f: impl FnOnce(&mut VoiceState)) {
        self.calls.push(call);
        if let Some(state) = self.voices.get_mut(voice.0) {
            f(state);
        }
    }
}

impl AudioBackend for RecordingBackend {
    type Voice = VoiceId;

    fn create_voice(&mut self, waveform: &[u8]) -> Result<VoiceId, BackendError> {
        if let Some(limit) = self.voice_limit {
            if self.voices.len() >= limit {
                return Err(BackendError::VoiceAllocation(format!(
                    "voice limit of {limit} reached"
                )));
            }
        }
        let voice = VoiceId(self.voices.len());
        self.voices.push(VoiceState::new(waveform));
        self.calls.push(BackendCall::CreateVoice {
            voice,
            len: waveform.len(),
        });
        Ok(voice)
    }

    fn release_voice(&mut self, voice: VoiceId) {
        self.with_voice(voice, BackendCall::ReleaseVoice(voice), |v| {
            v.playing = false;
            v.released = true;
        });
    }

    fn start(&mut self, voice: VoiceId) {
        self.with_voice(voice, BackendCall::Start(voice), |v| v.playing = true);
    }

    fn stop(&mut self, voice: VoiceId) {
        self.with_voice(voice, BackendCall::Stop(voice), |v| v.playing = false);
    }

    fn set_position(&mut self, voice: VoiceId, offset: usize) {
        self.with_voice(voice, BackendCall::SetPosition { voice, offset }, |v| {
            v.position = offset
        });
    }

    fn set_frequency(&mut self, voice: VoiceId, hz: f32) {
        self.with_voice(voice, BackendCall::SetFrequency { voice, hz }, |v| {
            v.frequency = hz
        });
    }

    fn set_volume(&mut self, voice: VoiceId, volume: u8) {
        self.with_voice(voice, BackendCall::SetVolume { voice, volume }, |v| {
            v.volume = volume;
            v.last_ramp = None;
        });
    }

    fn set_pan(&mut self, voice: VoiceId, pan: u8) {
        self.with_voice(voice, BackendCall::SetPan { voice, pan }, |v| v.pan = pan);
    }

    fn ramp_volume(&mut self, voice: VoiceId, target: u8, duration: Duration) {
        let call = BackendCall::RampVolume {
            voice,
            target,
            duration,
        };
        self.with_voice(voice, call, |v| v.last_ramp = Some((target, duration)));
    }

    fn sweep_frequency(&mut self, voice: VoiceId, duration: Duration, target_hz: f32) {
        let call = BackendCall::SweepFrequency {
            voice,
            duration,
            target_hz,
        };
        self.with_voice(voice, call, |v| v.last_sweep = Some((duration, target_hz)));
    }

    fn get_volume(&self, voice: VoiceId) -> u8 {
        self.voice(voice).map_or(0, |v| v.volume)
    }

    fn get_frequency(&self, voice: VoiceId) -> f32 {
        self.voice(voice).map_or(0.0, |v| v.frequency)
    }

    fn upload_waveform(&mut self, voice: VoiceId, samples: &[u8; WAVEFORM_LEN]) {
        let call = BackendCall::UploadWaveform {
            voice,
            samples: *samples,
        };
        self.with_voice(voice, call, |v| v.samples = samples.to_vec());
    }
}
