//! Bus read-back
//!
//! The engine is told only *which* address changed; it reads the current
//! register and sound-RAM bytes back through [`MemoryBus`].

use crate::vsu::registers::{fold_mirror, VSU_BASE, VSU_MIRROR_MASK};

/// Byte-addressable view of emulated memory
pub trait MemoryBus {
    /// Read the byte currently stored at `address`
    fn read_byte(&self, address: u32) -> u8;
}

impl<T: MemoryBus + ?Sized> MemoryBus for &T {
    fn read_byte(&self, address: u32) -> u8 {
        (**self).read_byte(address)
    }
}

impl<T: MemoryBus + ?Sized> MemoryBus for &mut T {
    fn read_byte(&self, address: u32) -> u8 {
        (**self).read_byte(address)
    }
}

const SOUND_MEMORY_SIZE: usize = VSU_MIRROR_MASK as usize + 1;

/// Flat 2 KiB backing store for the VSU window.
///
/// Mirrors are folded on both read and write. Addresses outside the window
/// read as zero and ignore writes.
#[derive(Clone)]
pub struct SoundMemory {
    bytes: Box<[u8; SOUND_MEMORY_SIZE]>,
}

impl SoundMemory {
    /// All bytes zero
    pub fn new() -> Self {
        SoundMemory {
            bytes: Box::new([0; SOUND_MEMORY_SIZE]),
        }
    }

    fn offset(address: u32) -> Option<usize> {
        let folded = fold_mirror(address);
        folded
            .checked_sub(VSU_BASE)
            .filter(|&off| off <= VSU_MIRROR_MASK)
            .map(|off| off as usize)
    }

    /// Store a byte
    pub fn write_byte(&mut self, address: u32, value: u8) {
        if let Some(off) = Self::offset(address) {
            self.bytes[off] = value;
        }
    }

    /// Clear everything
    pub fn reset(&mut self) {
        self.bytes.fill(0);
    }
}

impl MemoryBus for SoundMemory {
    fn read_byte(&self, address: u32) -> u8 {
        Self::offset(address).map_or(0, |off| self.bytes[off])
    }
}

impl Default for SoundMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SoundMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundMemory")
            .field("size", &SOUND_MEMORY_SIZE)
            .finish()
    }
}
