//! Encoding logical registers into a flat image, and decoding a readback of that image.
//!
//! Encoding walks every target word's [BitSource]s MSB-first, shifting each bit into an
//! accumulator. Decoding walks the same sources against the readback: constant bits are
//! compared, register bits that read back as 1 are XOR-ed into the register deltas.
//! Starting from an all-zero store, decoding an encoded image gives back every register
//! bit the bit map projects.

use std::fmt;

use crate::{
    Address,
    bitmap::{BitSource, BitSourceMap},
    bits::Width,
    descriptor::RegisterMap,
    errors::LayoutError,
    field::Mode,
    image::Image,
    store::{RegisterStore, register_bit},
};

/// What to do when a bit source references a register the store does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingRegisterPolicy {
    /// Read the register as 0.
    #[default]
    Zero,
    /// Fail with [LayoutError::MissingRegister].
    Reject,
}

/// Why a register reference is suspicious.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// The descriptor declares the register without write access.
    NotWritable(Mode),
    /// The descriptor does not declare the register.
    Undeclared,
}

/// A register reference in the bit map that cannot come from a writable register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralWarning {
    /// Target word address.
    pub address: Address,
    /// Bit of the target word.
    pub bit_index: u32,
    pub register: Address,
    pub kind: WarningKind,
}

impl fmt::Display for StructuralWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "word {:#x} bit {} references register {:#x}, ",
            self.address, self.bit_index, self.register
        )?;
        match self.kind {
            WarningKind::NotWritable(mode) => write!(f, "which is {mode}"),
            WarningKind::Undeclared => f.write_str("which the descriptor does not declare"),
        }
    }
}

/// Result of [LayoutEncoder::encode].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub image: Image,
    pub warnings: Vec<StructuralWarning>,
}

/// Builds flat images from a register store. Holds no state besides its inputs.
#[derive(Debug, Clone, Copy)]
pub struct LayoutEncoder<'a> {
    descriptor: &'a RegisterMap,
    bitmap: &'a BitSourceMap,
    missing: MissingRegisterPolicy,
}

impl<'a> LayoutEncoder<'a> {
    pub fn new(descriptor: &'a RegisterMap, bitmap: &'a BitSourceMap) -> Self {
        Self {
            descriptor,
            bitmap,
            missing: MissingRegisterPolicy::default(),
        }
    }

    pub fn missing_registers(mut self, policy: MissingRegisterPolicy) -> Self {
        self.missing = policy;
        self
    }

    /// Register references in the bit map that do not point at writable registers.
    pub fn check(&self) -> Vec<StructuralWarning> {
        let mut warnings = Vec::new();

        for (address, sources) in self.bitmap.iter() {
            for (position, source) in sources.iter().enumerate() {
                let BitSource::RegisterBit { register, .. } = *source else {
                    continue;
                };

                let kind = match self.descriptor.mode(register) {
                    Some(mode) if mode.is_writable() => continue,
                    Some(mode) => WarningKind::NotWritable(mode),
                    None => WarningKind::Undeclared,
                };

                warnings.push(StructuralWarning {
                    address,
                    bit_index: self.bitmap.word_bit(position),
                    register,
                    kind,
                });
            }
        }

        warnings
    }

    /// Builds the image for `registers`, one word per bit map entry in ascending address order.
    pub fn encode(&self, registers: &RegisterStore) -> Result<Encoded, LayoutError> {
        let warnings = self.check();
        for warning in &warnings {
            log::warn!("{warning}");
        }

        let mut image = Image::new(self.bitmap.width());

        for (address, sources) in self.bitmap.iter() {
            let mut word = 0u64;

            for source in sources {
                word <<= 1;
                match *source {
                    BitSource::Constant(bit) => word |= u64::from(bit),
                    BitSource::RegisterBit { register, bit } => {
                        if !registers.contains(register)
                            && self.missing == MissingRegisterPolicy::Reject
                        {
                            return Err(LayoutError::MissingRegister { address, register });
                        }
                        word |= register_bit(registers, register, bit)?;
                    }
                    BitSource::Ignored => {}
                }
            }

            log::debug!("encode word {address:#x} = {word:#x}");
            image.set(address, word)?;
        }

        Ok(Encoded { image, warnings })
    }
}

/// A constant bit that read back with the wrong value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub address: Address,
    /// Bit of the target word, 0 being the least significant.
    pub bit_index: u32,
    pub expected: bool,
    pub actual: bool,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fixed bit mismatch at word {:#x} bit {}: expected {}, read {}",
            self.address,
            self.bit_index,
            u8::from(self.expected),
            u8::from(self.actual)
        )
    }
}

/// Result of [decode].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Register bits that differ from the all-zero baseline.
    pub deltas: RegisterStore,
    pub mismatches: Vec<Mismatch>,
}

/// Builds the image for `registers` with the default [MissingRegisterPolicy].
pub fn encode(
    registers: &RegisterStore,
    descriptor: &RegisterMap,
    bitmap: &BitSourceMap,
) -> Result<Encoded, LayoutError> {
    LayoutEncoder::new(descriptor, bitmap).encode(registers)
}

/// Reconstructs register deltas from a readback of an image built with `bitmap`.
///
/// Every register the bit map references gets an entry in the deltas, starting at 0.
/// Constant-bit mismatches are collected, never fatal.
pub fn decode(
    image: &Image,
    bitmap: &BitSourceMap,
    register_width: Width,
) -> Result<Decoded, LayoutError> {
    let mut deltas = RegisterStore::new(register_width);
    for register in bitmap.referenced_registers() {
        deltas.touch(register);
    }

    let mismatches = decode_into(image, bitmap, &mut deltas)?;
    Ok(Decoded { deltas, mismatches })
}

/// Like [decode], but XOR-accumulates into `store`. The store is left untouched on error.
pub fn decode_into(
    image: &Image,
    bitmap: &BitSourceMap,
    store: &mut RegisterStore,
) -> Result<Vec<Mismatch>, LayoutError> {
    if image.width() != bitmap.width() {
        return Err(LayoutError::WidthMismatch {
            expected: bitmap.width().bits(),
            found: image.width().bits(),
        });
    }

    let mut mismatches = Vec::new();
    let mut toggles: Vec<(Address, u32)> = Vec::new();

    for (address, sources) in bitmap.iter() {
        let word = image.get(address).ok_or(LayoutError::MissingWord(address))?;

        for (position, source) in sources.iter().enumerate() {
            let bit_index = bitmap.word_bit(position);
            let actual = (word >> bit_index) & 1 == 1;

            match *source {
                BitSource::Constant(expected) if expected != actual => {
                    log::debug!("word {address:#x} bit {bit_index}: expected {expected}, read {actual}");
                    mismatches.push(Mismatch {
                        address,
                        bit_index,
                        expected,
                        actual,
                    });
                }
                BitSource::RegisterBit { register, bit } if actual => {
                    store.width().check_index(bit)?;
                    toggles.push((register, bit));
                }
                _ => {}
            }
        }
    }

    for (register, bit) in toggles {
        store.toggle_bit(register, bit)?;
    }

    Ok(mismatches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{FragmentRecord, RegisterRecord},
        errors::BitError,
        transform::TranslationRegistry,
    };

    fn descriptor() -> RegisterMap {
        RegisterMap::compile(
            &[
                RegisterRecord::new("0x0", "RW", vec![FragmentRecord::new("RECAL[4]", 4, 4)]),
                RegisterRecord::new(
                    "0x3",
                    "RW",
                    vec![
                        FragmentRecord::new("REGCOMMIT[10]", 10, 10),
                        FragmentRecord::new("REGCOMMIT_PAGE[9]", 9, 9),
                    ],
                ),
                RegisterRecord::new("0x7", "R", vec![FragmentRecord::new("STATUS[1:0]", 0, 1)]),
            ],
            Width::W16,
            &TranslationRegistry::new(),
        )
        .unwrap()
    }

    fn bitmap() -> BitSourceMap {
        let width = Width::new(4).unwrap();
        BitSourceMap::parse("0 1 0 R3[9] R3[10]\n1 CRC R0[4] 0 1\n", width).unwrap()
    }

    #[test]
    fn test_encode() {
        let descriptor = descriptor();
        let bitmap = bitmap();
        let registers = RegisterStore::from_pairs(Width::W16, [(0, 1 << 4), (3, 1 << 9)]).unwrap();

        let encoded = encode(&registers, &descriptor, &bitmap).unwrap();

        assert_eq!(encoded.image.to_words().unwrap(), vec![0b1010, 0b0101]);
        assert!(encoded.warnings.is_empty());
    }

    #[test]
    fn test_encode_missing_register_is_zero() {
        let registers = RegisterStore::new(Width::W16);
        let encoded = encode(&registers, &descriptor(), &bitmap()).unwrap();
        assert_eq!(encoded.image.to_words().unwrap(), vec![0b1000, 0b0001]);
    }

    #[test]
    fn test_encode_missing_register_rejected() {
        let descriptor = descriptor();
        let bitmap = bitmap();
        let registers = RegisterStore::from_pairs(Width::W16, [(3, 0)]).unwrap();

        let err = LayoutEncoder::new(&descriptor, &bitmap)
            .missing_registers(MissingRegisterPolicy::Reject)
            .encode(&registers)
            .unwrap_err();

        assert_eq!(
            err,
            LayoutError::MissingRegister {
                address: 1,
                register: 0
            }
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let descriptor = descriptor();
        let bitmap = bitmap();
        let registers = RegisterStore::from_pairs(Width::W16, [(0, 0xFFFF), (3, 0x0600)]).unwrap();

        let a = encode(&registers, &descriptor, &bitmap).unwrap();
        let b = encode(&registers, &descriptor, &bitmap).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_structural_warnings() {
        let descriptor = descriptor();
        let bitmap = BitSourceMap::parse("0 R7[0] R9[1] R3[9] 0\n", Width::new(4).unwrap()).unwrap();

        let warnings = LayoutEncoder::new(&descriptor, &bitmap).check();

        assert_eq!(
            warnings,
            vec![
                StructuralWarning {
                    address: 0,
                    bit_index: 3,
                    register: 7,
                    kind: WarningKind::NotWritable(Mode::ReadOnly)
                },
                StructuralWarning {
                    address: 0,
                    bit_index: 2,
                    register: 9,
                    kind: WarningKind::Undeclared
                },
            ]
        );

        // Warnings do not stop encoding.
        let registers = RegisterStore::from_pairs(Width::W16, [(7, 1), (9, 2)]).unwrap();
        let encoded = encode(&registers, &descriptor, &bitmap).unwrap();
        assert_eq!(encoded.image.get(0), Some(0b1100));
        assert_eq!(encoded.warnings.len(), 2);
    }

    #[test]
    fn test_encode_bit_outside_register() {
        let descriptor = descriptor();
        let bitmap = BitSourceMap::parse("0 R3[16] 0 0 0\n", Width::new(4).unwrap()).unwrap();
        let registers = RegisterStore::new(Width::W16);

        assert_eq!(
            encode(&registers, &descriptor, &bitmap).unwrap_err(),
            LayoutError::Bit(BitError::IndexOutOfRange { bit: 16, width: 16 })
        );
    }

    #[test]
    fn test_decode_round_trip() {
        let descriptor = descriptor();
        let bitmap = bitmap();
        let registers = RegisterStore::from_pairs(Width::W16, [(0, 1 << 4), (3, 0x0600)]).unwrap();

        let encoded = encode(&registers, &descriptor, &bitmap).unwrap();
        let decoded = decode(&encoded.image, &bitmap, Width::W16).unwrap();

        assert_eq!(decoded.deltas, registers);
        assert!(decoded.mismatches.is_empty());
    }

    #[test]
    fn test_decode_drops_unprojected_bits() {
        let descriptor = descriptor();
        let bitmap = bitmap();
        let registers = RegisterStore::from_pairs(Width::W16, [(3, 0x0601)]).unwrap();

        let encoded = encode(&registers, &descriptor, &bitmap).unwrap();
        let decoded = decode(&encoded.image, &bitmap, Width::W16).unwrap();

        assert_eq!(decoded.deltas.get(3), 0x0600);
        assert_eq!(decoded.deltas.get(0), 0);
    }

    #[test]
    fn test_decode_reports_every_mismatch() {
        let bitmap = bitmap();
        let image = Image::from_words(Width::new(4).unwrap(), &[0b0110, 0b1100]).unwrap();

        let decoded = decode(&image, &bitmap, Width::W16).unwrap();

        assert_eq!(
            decoded.mismatches,
            vec![
                Mismatch {
                    address: 0,
                    bit_index: 3,
                    expected: true,
                    actual: false
                },
                Mismatch {
                    address: 0,
                    bit_index: 2,
                    expected: false,
                    actual: true
                },
                Mismatch {
                    address: 1,
                    bit_index: 0,
                    expected: true,
                    actual: false
                },
            ]
        );
        // The CRC bit of word 1 is never compared.
        assert_eq!(decoded.deltas.get(3), 1 << 9);
        assert_eq!(decoded.deltas.get(0), 1 << 4);
    }

    #[test]
    fn test_decode_into_accumulates() {
        let bitmap = bitmap();
        let image = Image::from_words(Width::new(4).unwrap(), &[0b1011, 0b0001]).unwrap();
        let mut store = RegisterStore::from_pairs(Width::W16, [(3, 1 << 10), (5, 0xAA)]).unwrap();

        let mismatches = decode_into(&image, &bitmap, &mut store).unwrap();

        assert!(mismatches.is_empty());
        assert_eq!(store.get(3), 1 << 9);
        assert_eq!(store.get(5), 0xAA);
    }

    #[test]
    fn test_decode_missing_word() {
        let bitmap = bitmap();
        let image = Image::from_words(Width::new(4).unwrap(), &[0b1000]).unwrap();
        let mut store = RegisterStore::new(Width::W16);

        assert_eq!(
            decode_into(&image, &bitmap, &mut store).unwrap_err(),
            LayoutError::MissingWord(1)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_decode_width_mismatch() {
        let image = Image::from_words(Width::W16, &[0, 0]).unwrap();
        assert_eq!(
            decode(&image, &bitmap(), Width::W16).unwrap_err(),
            LayoutError::WidthMismatch {
                expected: 4,
                found: 16
            }
        );
    }
}
