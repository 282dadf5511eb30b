//! Channel state model
//!
//! CH1-CH5 play user waveforms, CH5 additionally owns the sweep/modulation
//! unit, and CH6 plays one of eight noise patterns. Every channel is
//! described by the same table (`ChannelId`), so the register dispatcher
//! runs one code path for all six.

use std::time::Duration;

use super::params::ChannelKind;
use super::registers::{ChannelRegister, CHANNEL_REGS_BASE, CHANNEL_STRIDE};
use super::waveform::WaveSlot;

/// Number of logical channels
pub const CHANNEL_COUNT: usize = 6;
/// Number of channels playing user waveforms
pub const MELODIC_CHANNELS: usize = 5;

/// Logical VSU channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelId {
    /// Waveform channel 1
    Ch1,
    /// Waveform channel 2
    Ch2,
    /// Waveform channel 3
    Ch3,
    /// Waveform channel 4
    Ch4,
    /// Waveform channel 5 (with sweep/modulation)
    Ch5,
    /// Noise channel
    Ch6,
}

impl ChannelId {
    /// All channels in register order
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        ChannelId::Ch1,
        ChannelId::Ch2,
        ChannelId::Ch3,
        ChannelId::Ch4,
        ChannelId::Ch5,
        ChannelId::Ch6,
    ];

    /// Zero-based channel index
    pub fn index(self) -> usize {
        self as usize
    }

    /// One-based channel number as printed in hardware documentation
    pub fn number(self) -> usize {
        self.index() + 1
    }

    /// Look a channel up by zero-based index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Address of SxINT for this channel
    pub fn base_address(self) -> u32 {
        CHANNEL_REGS_BASE + self.index() as u32 * CHANNEL_STRIDE
    }

    /// Address of one of this channel's registers
    pub fn register_address(self, register: ChannelRegister) -> u32 {
        self.base_address() + register.offset()
    }

    /// Frequency domain of the channel
    pub fn kind(self) -> ChannelKind {
        match self {
            ChannelId::Ch6 => ChannelKind::Noise,
            _ => ChannelKind::Melodic,
        }
    }

    /// CH5 is the only channel with an S5SWP register
    pub fn has_sweep_unit(self) -> bool {
        self == ChannelId::Ch5
    }

    /// Waveform channels select their slot through SxRAM
    pub fn has_wave_pointer(self) -> bool {
        self.kind() == ChannelKind::Melodic
    }
}

/// Envelope parameters last applied to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvelopeState {
    /// SxEV0 envelope enable
    pub active: bool,
    /// Ramp direction (false = decay)
    pub growing: bool,
    /// Time per envelope step
    pub step_time: Duration,
    /// 4-bit base level from SxEV0
    pub current_level: u8,
}

/// Sweep/interval parameters last applied to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepState {
    /// CH5 sweep/modulation unit gate
    pub active: bool,
    /// Unit is in modulation mode (accepted, not audible)
    pub is_modulation: bool,
    /// Timed-note length from SxINT, if the interval bit was set on key-on
    pub interval_time: Option<Duration>,
}

/// Waveform last uploaded into a channel's voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoadedWave {
    pub(crate) slot: WaveSlot,
    pub(crate) revision: u32,
}

/// State of one logical channel
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    id: ChannelId,
    /// Channel is keyed on (SxINT bit 7)
    pub enabled: bool,
    /// 11-bit frequency code from SxFQL/SxFQH
    pub frequency_reg: u16,
    /// Derived volume (0-255)
    pub volume: u8,
    /// Derived pan (0 = left, 255 = right)
    pub pan: u8,
    /// Envelope parameters
    pub envelope: EnvelopeState,
    /// Sweep and interval parameters
    pub sweep: SweepState,
    /// Waveform slot selected by SxRAM (unused on CH6)
    pub waveform: WaveSlot,
    pub(crate) loaded: Option<LoadedWave>,
}

impl Channel {
    /// Create a disabled channel
    pub fn new(id: ChannelId) -> Self {
        Channel {
            id,
            enabled: false,
            frequency_reg: 0,
            volume: 0,
            pan: 128,
            envelope: EnvelopeState::default(),
            sweep: SweepState::default(),
            waveform: WaveSlot::default(),
            loaded: None,
        }
    }

    /// Which channel this is
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Waveform slot currently held by the voice buffer, if any
    pub fn loaded_waveform(&self) -> Option<WaveSlot> {
        self.loaded.map(|l| l.slot)
    }

    /// Current output rate for the stored frequency code
    pub fn sample_rate(&self) -> f32 {
        self.id.kind().sample_rate(self.frequency_reg)
    }
}

/// Outcome of a CH6 pattern change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSwitch {
    /// Pattern that was active before
    pub previous: usize,
    /// Pattern that is active now
    pub next: usize,
    /// The new voice must be started
    pub resume: bool,
}

/// Tracks which of the eight noise voices backs CH6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoiseSelector {
    active: usize,
    playing: bool,
}

impl NoiseSelector {
    /// Pattern 0, stopped
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the active noise voice (0-7)
    pub fn active_voice_index(&self) -> usize {
        self.active
    }

    /// CH6 is logically playing
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Record CH6 key-on / key-off
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Select a noise pattern. Returns `None` when the pattern is unchanged.
    pub fn select(&mut self, index: usize) -> Option<VoiceSwitch> {
        let next = index & 0x07;
        if next == self.active {
            return None;
        }
        let previous = self.active;
        self.active = next;
        Some(VoiceSwitch {
            previous,
            next,
            resume: self.playing,
        })
    }
}
