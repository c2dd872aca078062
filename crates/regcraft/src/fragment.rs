use crate::Address;

/// One contiguous chunk of a field: bits `[bit_low, bit_high]` of a register,
/// placed at bit `offset` of the assembled field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub register: Address,
    pub bit_low: u32,
    pub bit_high: u32,
    pub offset: u32,
}

impl Fragment {
    pub fn new(register: Address, bit_low: u32, bit_high: u32) -> Self {
        Fragment {
            register,
            bit_low,
            bit_high,
            offset: 0,
        }
    }

    pub fn new_with_offset(register: Address, bit_low: u32, bit_high: u32, offset: u32) -> Self {
        Fragment {
            register,
            bit_low,
            bit_high,
            offset,
        }
    }

    pub fn len_bits(&self) -> u32 {
        self.bit_high - self.bit_low + 1
    }

    /// Bits of the assembled field value this fragment owns.
    pub fn field_mask(&self) -> u64 {
        crate::bits::low_mask(self.len_bits()) << self.offset
    }
}
