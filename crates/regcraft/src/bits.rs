//! Bit range extraction and insertion over fixed-width unsigned words.
//!
//! Words are stored in a `u64` but always interpreted modulo a declared [Width].
//! Bits are numbered LSB-first: bit 0 is the least significant bit of the word.

use std::fmt;

use crate::errors::BitError;

/// Declared width of a word, between 1 and 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Width(u32);

impl Width {
    /// 16-bit words, used by the clock-generator registers and their EEPROM.
    pub const W16: Width = Width(16);

    pub fn new(bits: u32) -> Result<Self, BitError> {
        if bits == 0 || bits > 64 {
            return Err(BitError::InvalidWidth(bits));
        }

        Ok(Width(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// All-ones mask covering the word.
    pub fn mask(self) -> u64 {
        low_mask(self.0)
    }

    /// Fails with [BitError::ValueTooWide] if `value` has bits above the width.
    pub fn check(self, value: u64) -> Result<u64, BitError> {
        if value & !self.mask() != 0 {
            return Err(BitError::ValueTooWide {
                value,
                bits: self.0,
            });
        }

        Ok(value)
    }

    /// Fails with [BitError::IndexOutOfRange] if `bit` is not inside the word.
    pub fn check_index(self, bit: u32) -> Result<u32, BitError> {
        if bit >= self.0 {
            return Err(BitError::IndexOutOfRange { bit, width: self.0 });
        }

        Ok(bit)
    }
}

impl Default for Width {
    fn default() -> Self {
        Width::W16
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.0)
    }
}

/// Mask of the low `n` bits (`n` in 0..=64).
pub fn low_mask(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

fn check_range(width: Width, low: u32, high: u32) -> Result<u32, BitError> {
    width.check_index(low)?;
    width.check_index(high)?;

    if low > high {
        return Err(BitError::InvertedRange { low, high });
    }

    Ok(high - low + 1)
}

/// Returns the inclusive `[low, high]` slice of `word`, right-aligned.
pub fn extract(word: u64, width: Width, low: u32, high: u32) -> Result<u64, BitError> {
    let len = check_range(width, low, high)?;
    Ok(((word & width.mask()) >> low) & low_mask(len))
}

/// Replaces the inclusive `[low, high]` slice of `word` with `value`, keeping every other bit.
pub fn insert(word: u64, width: Width, low: u32, high: u32, value: u64) -> Result<u64, BitError> {
    let len = check_range(width, low, high)?;

    if value & !low_mask(len) != 0 {
        return Err(BitError::ValueTooWide { value, bits: len });
    }

    let mask = low_mask(len) << low;
    Ok(((word & !mask) | (value << low)) & width.mask())
}

/// Reads a single bit. Returns 0 or 1.
pub fn bit(word: u64, width: Width, index: u32) -> Result<u64, BitError> {
    width.check_index(index)?;
    Ok((word >> index) & 1)
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 {
        return 0;
    }
    let shift = 64 - bits.min(64);
    ((value << shift) as i64) >> shift
}
