//! Waveform RAM
//!
//! Five 32-sample waveforms live in sound RAM as 6-bit values, one sample
//! per 32-bit word. Games may only rewrite them while every channel is
//! disabled, so a slot is converted to 8-bit voice data lazily: RAM writes
//! mark it dirty and the next key-on (or SxRAM write on an idle channel)
//! re-reads it.

use crate::bus::MemoryBus;

use super::registers::{WAVE_RAM_BASE, WAVE_SLOT_STRIDE};

/// Samples per waveform
pub const WAVEFORM_LEN: usize = 32;
/// Number of waveform slots
pub const WAVEFORM_SLOTS: usize = 5;
/// 8-bit sample at the centre line
pub const SILENT_SAMPLE: u8 = 0x80;

/// Convert a 6-bit RAM sample to an 8-bit signed-biased voice sample.
///
/// Bits above the low six are discarded by the shift.
#[inline]
pub fn convert_sample(raw: u8) -> u8 {
    (raw << 2) ^ 0x80
}

/// Index of a waveform slot (0-4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct WaveSlot(u8);

impl WaveSlot {
    /// All slots in RAM order
    pub const ALL: [WaveSlot; WAVEFORM_SLOTS] = [
        WaveSlot(0),
        WaveSlot(1),
        WaveSlot(2),
        WaveSlot(3),
        WaveSlot(4),
    ];

    /// Slot from a zero-based index; `None` past slot 4
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < WAVEFORM_SLOTS).then_some(WaveSlot(index))
    }

    /// Slot named by an SxRAM value (low three bits)
    pub fn from_register(value: u8) -> Option<Self> {
        Self::new(value & 0x07)
    }

    /// Zero-based index
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Address of the first sample
    pub fn base_address(self) -> u32 {
        WAVE_RAM_BASE + self.0 as u32 * WAVE_SLOT_STRIDE
    }

    /// Address of sample `i`
    pub fn sample_address(self, i: usize) -> u32 {
        self.base_address() + (i as u32) * 4
    }
}

/// Read and convert one slot straight from sound RAM
pub fn convert_waveform<M: MemoryBus + ?Sized>(bus: &M, slot: WaveSlot) -> [u8; WAVEFORM_LEN] {
    let mut samples = [SILENT_SAMPLE; WAVEFORM_LEN];
    for (i, sample) in samples.iter_mut().enumerate() {
        *sample = convert_sample(bus.read_byte(slot.sample_address(i)));
    }
    samples
}

#[derive(Debug, Clone)]
struct Slot {
    samples: [u8; WAVEFORM_LEN],
    dirty: bool,
    /// Bumped on every RAM write so channels can tell stale copies apart
    revision: u32,
}

/// Converted copies of the five waveform slots plus their dirty flags
#[derive(Debug, Clone)]
pub struct WaveformStore {
    slots: [Slot; WAVEFORM_SLOTS],
}

impl WaveformStore {
    /// Every slot starts dirty so the first key-on reads RAM
    pub fn new() -> Self {
        WaveformStore {
            slots: std::array::from_fn(|_| Slot {
                samples: [SILENT_SAMPLE; WAVEFORM_LEN],
                dirty: true,
                revision: 0,
            }),
        }
    }

    /// Note a write inside a slot's RAM
    pub fn mark_dirty(&mut self, slot: WaveSlot) {
        let s = &mut self.slots[slot.index()];
        s.dirty = true;
        s.revision = s.revision.wrapping_add(1);
    }

    /// Slot has RAM writes not yet converted
    pub fn is_dirty(&self, slot: WaveSlot) -> bool {
        self.slots[slot.index()].dirty
    }

    /// RAM write counter for a slot
    pub fn revision(&self, slot: WaveSlot) -> u32 {
        self.slots[slot.index()].revision
    }

    /// Last converted samples of a slot
    pub fn samples(&self, slot: WaveSlot) -> &[u8; WAVEFORM_LEN] {
        &self.slots[slot.index()].samples
    }

    /// Convert a slot from RAM unconditionally and clear its dirty flag
    pub fn recopy<M: MemoryBus + ?Sized>(&mut self, slot: WaveSlot, bus: &M) -> [u8; WAVEFORM_LEN] {
        let s = &mut self.slots[slot.index()];
        s.samples = convert_waveform(bus, slot);
        s.dirty = false;
        s.samples
    }

    /// Convert a slot only if it is dirty
    pub fn recopy_if_dirty<M: MemoryBus + ?Sized>(
        &mut self,
        slot: WaveSlot,
        bus: &M,
    ) -> Option<[u8; WAVEFORM_LEN]> {
        if self.is_dirty(slot) {
            Some(self.recopy(slot, bus))
        } else {
            None
        }
    }
}

impl Default for WaveformStore {
    fn default() -> Self {
        Self::new()
    }
}
