//! VSU Register Definitions
//!
//! Address map of the sound unit as seen from the V810 bus, plus the bit
//! layouts of the per-channel control registers.
//!
//! Each channel owns a 0x40-byte block of byte-wide registers spaced four
//! bytes apart:
//!
//! | Offset | Register | Contents |
//! |--------|----------|----------|
//! | +0x00  | SxINT    | enable, interval-enable, interval |
//! | +0x04  | SxLRV    | left level (7-4), right level (3-0) |
//! | +0x08  | SxFQL    | frequency code bits 0-7 |
//! | +0x0C  | SxFQH    | frequency code bits 8-10 |
//! | +0x10  | SxEV0    | envelope level (7-4), repeat, envelope enable |
//! | +0x14  | SxEV1    | sweep/mod enable, noise tap, grow, step rate |
//! | +0x18  | SxRAM    | waveform slot (CH1-CH5) |
//! | +0x1C  | S5SWP    | sweep control (CH5 only) |

use std::fmt;

use bitflags::bitflags;

use super::channel::ChannelId;
use super::waveform::WaveSlot;

/// Start of the VSU window
pub const VSU_BASE: u32 = 0x0100_0000;
/// Last address decoded by the VSU
pub const VSU_WINDOW_END: u32 = 0x01FF_FFFF;
/// The VSU repeats every 2 KiB inside its window
pub const VSU_MIRROR_MASK: u32 = 0x07FF;

/// Wave RAM slot 0; slots follow every [`WAVE_SLOT_STRIDE`] bytes
pub const WAVE_RAM_BASE: u32 = VSU_BASE;
/// Distance between two waveform slots (32 samples, one per word)
pub const WAVE_SLOT_STRIDE: u32 = 0x80;
/// Modulation table shared by the CH5 modulation unit
pub const MOD_RAM_BASE: u32 = 0x0100_0280;
/// First channel register block (S1INT)
pub const CHANNEL_REGS_BASE: u32 = 0x0100_0400;
/// Size of one channel register block
pub const CHANNEL_STRIDE: u32 = 0x40;
/// Stop-all register
pub const SSTOP: u32 = 0x0100_0580;

/// Fold a mirrored VSU address onto its canonical location.
///
/// Addresses outside the VSU window are returned unchanged.
#[inline]
pub fn fold_mirror(address: u32) -> u32 {
    if (VSU_BASE..=VSU_WINDOW_END).contains(&address) {
        VSU_BASE | (address & VSU_MIRROR_MASK)
    } else {
        address
    }
}

/// One of the byte registers inside a channel block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRegister {
    /// Play control / interval (SxINT)
    Control,
    /// Stereo level (SxLRV)
    Level,
    /// Frequency code, low byte (SxFQL)
    FreqLo,
    /// Frequency code, high bits (SxFQH)
    FreqHi,
    /// Envelope level and enable (SxEV0)
    Envelope0,
    /// Envelope direction, rate and sweep/noise control (SxEV1)
    Envelope1,
    /// Waveform slot pointer (SxRAM)
    WavePointer,
    /// Sweep/modulation control (S5SWP)
    Sweep,
}

impl ChannelRegister {
    /// Byte offset of this register inside its channel block
    pub fn offset(self) -> u32 {
        match self {
            ChannelRegister::Control => 0x00,
            ChannelRegister::Level => 0x04,
            ChannelRegister::FreqLo => 0x08,
            ChannelRegister::FreqHi => 0x0C,
            ChannelRegister::Envelope0 => 0x10,
            ChannelRegister::Envelope1 => 0x14,
            ChannelRegister::WavePointer => 0x18,
            ChannelRegister::Sweep => 0x1C,
        }
    }

    fn from_offset(offset: u32) -> Option<Self> {
        match offset {
            0x00 => Some(ChannelRegister::Control),
            0x04 => Some(ChannelRegister::Level),
            0x08 => Some(ChannelRegister::FreqLo),
            0x0C => Some(ChannelRegister::FreqHi),
            0x10 => Some(ChannelRegister::Envelope0),
            0x14 => Some(ChannelRegister::Envelope1),
            0x18 => Some(ChannelRegister::WavePointer),
            0x1C => Some(ChannelRegister::Sweep),
            _ => None,
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            ChannelRegister::Control => "INT",
            ChannelRegister::Level => "LRV",
            ChannelRegister::FreqLo => "FQL",
            ChannelRegister::FreqHi => "FQH",
            ChannelRegister::Envelope0 => "EV0",
            ChannelRegister::Envelope1 => "EV1",
            ChannelRegister::WavePointer => "RAM",
            ChannelRegister::Sweep => "SWP",
        }
    }
}

/// A decoded VSU address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// A byte inside one of the five waveform slots
    WaveRam(WaveSlot),
    /// A byte inside the modulation table
    ModulationRam,
    /// A channel control register
    Channel(ChannelId, ChannelRegister),
    /// SSTOP
    StopAll,
}

impl Register {
    /// Decode a canonical (already mirror-folded) address.
    ///
    /// Returns `None` for addresses the VSU does not define, including
    /// S6RAM and the SWP slot of every channel but CH5.
    pub fn decode(address: u32) -> Option<Self> {
        if address == SSTOP {
            return Some(Register::StopAll);
        }

        if (WAVE_RAM_BASE..MOD_RAM_BASE).contains(&address) {
            let slot = WaveSlot::new(((address - WAVE_RAM_BASE) / WAVE_SLOT_STRIDE) as u8)?;
            return Some(Register::WaveRam(slot));
        }

        if (MOD_RAM_BASE..MOD_RAM_BASE + WAVE_SLOT_STRIDE).contains(&address) {
            return Some(Register::ModulationRam);
        }

        if (CHANNEL_REGS_BASE..SSTOP).contains(&address) {
            let channel = ChannelId::from_index(
                ((address - CHANNEL_REGS_BASE) / CHANNEL_STRIDE) as usize,
            )?;
            let register = ChannelRegister::from_offset((address - CHANNEL_REGS_BASE) % CHANNEL_STRIDE)?;
            return match register {
                ChannelRegister::WavePointer if !channel.has_wave_pointer() => None,
                ChannelRegister::Sweep if !channel.has_sweep_unit() => None,
                _ => Some(Register::Channel(channel, register)),
            };
        }

        None
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::WaveRam(slot) => write!(f, "WAVE{} (Waveform RAM)", slot.index() + 1),
            Register::ModulationRam => write!(f, "MOD (Modulation RAM)"),
            Register::Channel(ch, reg) => write!(f, "S{}{}", ch.number(), reg.mnemonic()),
            Register::StopAll => write!(f, "SSTOP (Stop All)"),
        }
    }
}

bitflags! {
    /// SxINT bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u8 {
        /// Channel plays while set
        const ENABLE = 0x80;
        /// Stop automatically after the interval in bits 0-4
        const USE_INTERVAL = 0x20;
    }
}

impl ControlFlags {
    /// Interval field of SxINT (bits 0-4)
    pub const INTERVAL_MASK: u8 = 0x1F;
}

bitflags! {
    /// SxEV0 bits below the 4-bit envelope level
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Envelope0Flags: u8 {
        /// Repeat the envelope cycle (not modelled)
        const REPEAT = 0x02;
        /// Envelope runs while set
        const ENABLE = 0x01;
    }
}

bitflags! {
    /// SxEV1 bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Envelope1Flags: u8 {
        /// Sweep/modulation unit runs while set (CH5)
        const SWEEP_MOD_ENABLE = 0x40;
        /// Sweep/modulation repeat (CH5, not modelled)
        const SWEEP_MOD_REPEAT = 0x20;
        /// Modulation instead of sweep (CH5)
        const MODULATION = 0x10;
        /// Envelope grows instead of decaying
        const GROW = 0x08;
    }
}

impl Envelope1Flags {
    /// Envelope step rate (bits 0-2)
    pub const STEP_MASK: u8 = 0x07;
    /// Noise tap selector on CH6 (bits 4-6)
    pub const TAP_SHIFT: u8 = 4;
}

bitflags! {
    /// S5SWP bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SweepFlags: u8 {
        /// Interval base is counted in 7.68 ms units instead of 0.96 ms
        const SLOW_CLOCK = 0x80;
        /// Sweep upward
        const ADD = 0x08;
    }
}

impl SweepFlags {
    /// Interval base (bits 4-6)
    pub const INTERVAL_SHIFT: u8 = 4;
    /// Step count (bits 0-2)
    pub const STEP_MASK: u8 = 0x07;
}
