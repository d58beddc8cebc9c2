//! Bit-packed register families ("multiregisters").
//!
//! The k-th logical bit of a family lives in register `base + 4 * (k / 32)`
//! at bit position `k % 32`.

use crate::consts::PLIC_REG_BITS;
use crate::Toggle;

const REG_BYTES: usize = PLIC_REG_BITS / 8;

/// One family of bit-packed registers, e.g. the pending bits or the enable
/// bits of a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegFamily {
    /// Offset of the first register of the family.
    pub base: usize,
    /// Number of logical bits in the family.
    pub bits: usize,
}

/// Physical position of one logical bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitLocation {
    /// Offset of the containing register.
    pub offset: usize,
    /// Bit position inside that register, `0..32`.
    pub bit: u32,
}

impl RegFamily {
    pub const fn new(base: usize, bits: usize) -> Self {
        Self { base, bits }
    }

    /// Locates `index`, or `None` if it is outside the family.
    pub const fn locate(&self, index: usize) -> Option<BitLocation> {
        if index >= self.bits {
            return None;
        }
        Some(BitLocation {
            offset: self.base + REG_BYTES * (index / PLIC_REG_BITS),
            bit: (index % PLIC_REG_BITS) as u32,
        })
    }

    /// Number of physical registers the family spans.
    pub const fn words(&self) -> usize {
        self.bits.div_ceil(PLIC_REG_BITS)
    }

    pub fn word_offsets(&self) -> impl Iterator<Item = usize> {
        let base = self.base;
        (0..self.words()).map(move |word| base + word * REG_BYTES)
    }

    /// Byte offset one past the last register of the family.
    pub const fn end(&self) -> usize {
        self.base + self.words() * REG_BYTES
    }
}

impl BitLocation {
    pub const fn mask(&self) -> u32 {
        1 << self.bit
    }

    pub const fn is_set(&self, word: u32) -> bool {
        word & self.mask() != 0
    }

    /// Returns `word` with this bit set or cleared, other bits untouched.
    pub const fn apply(&self, word: u32, toggle: Toggle) -> u32 {
        match toggle {
            Toggle::Enabled => word | self.mask(),
            Toggle::Disabled => word & !self.mask(),
        }
    }
}
