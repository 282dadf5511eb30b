//! Parameter derivation
//!
//! Pure conversions from raw register fields to the values handed to the
//! audio backend. All inputs are bounded bit-fields, so nothing here can
//! fail; every divisor carries a `+ 1`.
//!
//! Time constants are the hardware's: the interval counter ticks every
//! 3.84 ms, envelope steps every 15.36 ms, and the CH5 sweep clock runs at
//! 0.96 ms or 7.68 ms per tick.

use std::time::Duration;

use super::registers::{ControlFlags, Envelope1Flags, SweepFlags};

/// Mask for the 11-bit frequency code
pub const FREQ_CODE_MASK: u16 = 0x07FF;
/// Highest frequency code
pub const FREQ_CODE_MAX: u16 = 0x07FF;
/// Highest melodic code that plays reliably on hardware
pub const MAX_STABLE_FREQ_CODE: u16 = 2038;

/// Waveform channel clock (32 samples per period)
pub const MELODIC_CLOCK_HZ: f32 = 5_000_000.0;
/// Noise channel clock
pub const NOISE_CLOCK_HZ: f32 = 500_000.0;

/// SxINT interval tick
pub const INTERVAL_UNIT: Duration = Duration::from_micros(3_840);
/// Envelope step tick
pub const ENVELOPE_STEP_UNIT: Duration = Duration::from_micros(15_360);
/// S5SWP interval tick, fast clock
pub const SWEEP_UNIT_FAST: Duration = Duration::from_micros(960);
/// S5SWP interval tick, slow clock
pub const SWEEP_UNIT_SLOW: Duration = Duration::from_micros(7_680);

/// Frequency domain of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Wave-table channel
    Melodic,
    /// LFSR noise channel
    Noise,
}

impl ChannelKind {
    /// Voice playback rate for a frequency code
    pub fn sample_rate(self, code: u16) -> f32 {
        match self {
            ChannelKind::Melodic => melodic_sample_rate(code),
            ChannelKind::Noise => noise_sample_rate(code),
        }
    }
}

/// Combine SxFQL/SxFQH into the 11-bit code
#[inline]
pub fn frequency_code(lo: u8, hi: u8) -> u16 {
    (((hi as u16) << 8) | lo as u16) & FREQ_CODE_MASK
}

/// Playback rate of a waveform channel. Codes above 2038 are clamped.
pub fn melodic_sample_rate(code: u16) -> f32 {
    let code = (code & FREQ_CODE_MASK).min(MAX_STABLE_FREQ_CODE);
    MELODIC_CLOCK_HZ / (2048 - code) as f32
}

/// Playback rate of the noise channel
pub fn noise_sample_rate(code: u16) -> f32 {
    NOISE_CLOCK_HZ / (2048 - (code & FREQ_CODE_MASK)) as f32
}

/// Volume and pan handed to a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mix {
    /// 0-255
    pub volume: u8,
    /// 0 = left, 128 = centre, 255 = right
    pub pan: u8,
}

/// Position of the highest set bit among the low four, counted from bit 3
/// (0 = bit 3 ... 3 = bit 0, 4 = no bit set).
#[inline]
fn level_rank(bits: u8) -> u32 {
    match bits & 0x0F {
        0 => 4,
        b => b.leading_zeros() - 4,
    }
}

/// Derive volume and pan from SxLRV and the 4-bit SxEV0 level.
///
/// The louder side picks a power-of-two gain; the level difference picks
/// the pan offset, scaled up as the levels get quieter.
pub fn derive_mix(lrv: u8, envelope_level: u8) -> Mix {
    let left = (lrv >> 4) as i32;
    let right = (lrv & 0x0F) as i32;
    let rank = level_rank((left | right) as u8);

    let volume = if rank < 4 {
        (1u32 << (3 - rank)) * (envelope_level & 0x0F) as u32
    } else {
        0
    };
    let pan = 128 + (right - left) * (8 << rank);

    Mix {
        volume: volume.min(255) as u8,
        pan: pan.clamp(0, 255) as u8,
    }
}

/// A backend volume ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeRamp {
    /// Ramp up to 255 rather than down to 0
    pub growing: bool,
    /// Final volume
    pub target: u8,
    /// Time per envelope step
    pub step_time: Duration,
    /// Total ramp time
    pub duration: Duration,
}

/// Build the envelope ramp for SxEV1, starting from the voice's volume now.
pub fn envelope_ramp(ev1: u8, current_volume: u8) -> EnvelopeRamp {
    let step_time = ENVELOPE_STEP_UNIT * ((ev1 & Envelope1Flags::STEP_MASK) as u32 + 1);
    let growing = Envelope1Flags::from_bits_truncate(ev1).contains(Envelope1Flags::GROW);

    let (target, steps) = if growing {
        (255, (255 - current_volume as u32) / 16)
    } else {
        (0, current_volume as u32 / 16)
    };

    EnvelopeRamp {
        growing,
        target,
        step_time,
        duration: step_time * steps,
    }
}

/// Timed-note length from SxINT, when its interval bit is set
pub fn interval_duration(int: u8) -> Option<Duration> {
    ControlFlags::from_bits_truncate(int)
        .contains(ControlFlags::USE_INTERVAL)
        .then(|| INTERVAL_UNIT * ((int & ControlFlags::INTERVAL_MASK) as u32 + 1))
}

/// CH5 sweep/modulation unit mode, from SxEV1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Unit gated off
    Off,
    /// Frequency sweep
    Sweep,
    /// Modulation table playback (not audible)
    Modulation,
}

impl SweepMode {
    /// Decode the gate and mode bits of SxEV1
    pub fn from_ev1(ev1: u8) -> Self {
        let flags = Envelope1Flags::from_bits_truncate(ev1);
        if !flags.contains(Envelope1Flags::SWEEP_MOD_ENABLE) {
            SweepMode::Off
        } else if flags.contains(Envelope1Flags::MODULATION) {
            SweepMode::Modulation
        } else {
            SweepMode::Sweep
        }
    }
}

/// A backend frequency sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRamp {
    /// Frequency code the sweep ends on
    pub target_code: u16,
    /// Playback rate the sweep ends on
    pub target_hz: f32,
    /// Total sweep time
    pub duration: Duration,
}

/// Collapse the stepped hardware sweep into one linear ramp covering the
/// whole distance to the end of the code range.
pub fn sweep_ramp(swp: u8, current_code: u16) -> SweepRamp {
    let flags = SweepFlags::from_bits_truncate(swp);
    let unit = if flags.contains(SweepFlags::SLOW_CLOCK) {
        SWEEP_UNIT_SLOW
    } else {
        SWEEP_UNIT_FAST
    };
    let tick = unit * ((swp >> SweepFlags::INTERVAL_SHIFT) & 0x07) as u32;
    let per_step = (swp & SweepFlags::STEP_MASK) as u32 + 1;

    let current = current_code & FREQ_CODE_MASK;
    let (target_code, distance) = if flags.contains(SweepFlags::ADD) {
        (FREQ_CODE_MAX, FREQ_CODE_MAX - current)
    } else {
        (0, current)
    };

    SweepRamp {
        target_code,
        target_hz: melodic_sample_rate(target_code),
        duration: tick * distance as u32 / per_step,
    }
}
