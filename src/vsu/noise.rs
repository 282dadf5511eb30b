//! Noise patterns
//!
//! CH6 is driven by a 15-bit LFSR whose feedback taps bit 7 and one of
//! eight selectable bits. Rather than stepping the LFSR at the output rate,
//! each tap setting is unrolled once into a looping voice buffer; switching
//! taps switches voices.

use super::waveform::convert_sample;

/// Number of selectable noise patterns
pub const NOISE_PATTERNS: usize = 8;
/// Feedback tap for each S6EV1 selector value
pub const NOISE_TAPS: [u32; NOISE_PATTERNS] = [14, 10, 13, 4, 8, 6, 9, 11];

const LFSR_SEED: u16 = 0x7FFF;
const LFSR_MASK: u16 = 0x7FFF;
const LFSR_STATES: usize = 1 << 15;

/// Advance the LFSR one step. Returns the new state and the feedback bit.
#[inline]
pub fn lfsr_step(state: u16, tap: u32) -> (u16, u16) {
    let feedback = ((state >> 7) ^ (state >> tap)) & 1;
    (((state << 1) | feedback) & LFSR_MASK, feedback)
}

/// Unroll one full LFSR cycle for `tap` into 8-bit voice samples.
///
/// Short taps do not return to the seed, so the walk records where each
/// state was first seen and keeps only the loop it settles into.
pub fn generate_pattern(tap: u32) -> Vec<u8> {
    let mut first_seen = vec![usize::MAX; LFSR_STATES];
    let mut samples = Vec::new();
    let mut state = LFSR_SEED;

    loop {
        let seen = first_seen[state as usize];
        if seen != usize::MAX {
            return samples.split_off(seen);
        }
        first_seen[state as usize] = samples.len();

        let (next, feedback) = lfsr_step(state, tap);
        let level = if feedback == 0 { 0x3F } else { 0x00 };
        samples.push(convert_sample(level));
        state = next;
    }
}

/// The eight pre-built noise voice buffers
#[derive(Debug, Clone)]
pub struct NoiseStore {
    patterns: [Vec<u8>; NOISE_PATTERNS],
}

impl NoiseStore {
    /// Generate every pattern
    pub fn new() -> Self {
        NoiseStore {
            patterns: std::array::from_fn(|i| generate_pattern(NOISE_TAPS[i])),
        }
    }

    /// Samples of pattern `index` (0-7)
    pub fn pattern(&self, index: usize) -> &[u8] {
        &self.patterns[index & 0x07]
    }

    /// Length of pattern `index`
    pub fn pattern_len(&self, index: usize) -> usize {
        self.pattern(index).len()
    }

    /// Iterate over all patterns in selector order
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.patterns.iter().map(Vec::as_slice)
    }
}

impl Default for NoiseStore {
    fn default() -> Self {
        Self::new()
    }
}
