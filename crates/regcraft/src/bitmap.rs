//! Declares where every bit of every word in a target image (e.g. an EEPROM) comes from.
//!
//! Each target word is described by `width` [BitSource]s, listed MSB-first: position 0
//! is word bit `width - 1`, the last position is word bit 0.
//!
//! Text tables have one line per target word: the word address followed by one token
//! per bit. Tokens are `0`/`1`, a register reference `R<register>[<bit>]`, or a marker
//! for reserved/CRC bits (`CRC...`, `X`, `-`, `RSVD`, `RESERVED`).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{
    Address,
    bits::Width,
    errors::BitmapError,
    store::{Radix, parse_number},
};

/// Origin of one bit of a target word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitSource {
    /// A fixed bit, checked on readback.
    Constant(bool),
    /// Bit `bit` of logical register `register`.
    RegisterBit { register: Address, bit: u32 },
    /// Reserved or CRC bit: encoded as 0 and not compared on readback.
    Ignored,
}

impl BitSource {
    /// Parses a single table token.
    pub fn parse(token: &str) -> Option<BitSource> {
        match token {
            "0" => return Some(BitSource::Constant(false)),
            "1" => return Some(BitSource::Constant(true)),
            "X" | "x" | "-" => return Some(BitSource::Ignored),
            _ => {}
        }

        let upper = token.to_ascii_uppercase();
        if upper.contains("CRC") || upper == "RSVD" || upper == "RESERVED" {
            return Some(BitSource::Ignored);
        }

        let reference = token.strip_prefix('R').or_else(|| token.strip_prefix('r'))?;
        let (register, rest) = reference.split_once('[')?;
        let bit = rest.strip_suffix(']')?;

        Some(BitSource::RegisterBit {
            register: register.parse().ok()?,
            bit: bit.parse().ok()?,
        })
    }
}

impl fmt::Display for BitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitSource::Constant(bit) => write!(f, "{}", u8::from(*bit)),
            BitSource::RegisterBit { register, bit } => write!(f, "R{register}[{bit}]"),
            BitSource::Ignored => f.write_str("X"),
        }
    }
}

/// Bit sources for every word of a target image, keyed by target address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSourceMap {
    width: Width,
    words: BTreeMap<Address, Vec<BitSource>>,
    /// Every (register, bit) some word already projects.
    references: BTreeSet<(Address, u32)>,
}

impl BitSourceMap {
    pub fn new(width: Width) -> Self {
        Self {
            width,
            words: BTreeMap::new(),
            references: BTreeSet::new(),
        }
    }

    /// Adds the MSB-first sources of the word at `address`.
    ///
    /// A register bit may be projected by at most one position of the whole map.
    pub fn insert(&mut self, address: Address, sources: Vec<BitSource>) -> Result<(), BitmapError> {
        let expected = self.width.bits() as usize;
        if sources.len() != expected {
            return Err(BitmapError::WrongLength {
                address,
                expected,
                found: sources.len(),
            });
        }

        if self.words.contains_key(&address) {
            return Err(BitmapError::DuplicateAddress(address));
        }

        let mut staged = BTreeSet::new();
        for (position, source) in sources.iter().enumerate() {
            let BitSource::RegisterBit { register, bit } = *source else {
                continue;
            };
            if self.references.contains(&(register, bit)) || !staged.insert((register, bit)) {
                return Err(BitmapError::DuplicateReference {
                    address,
                    position,
                    register,
                    bit,
                });
            }
        }

        self.references.append(&mut staged);
        self.words.insert(address, sources);
        Ok(())
    }

    /// Adds a word from its table tokens.
    pub fn insert_tokens<S: AsRef<str>>(
        &mut self,
        address: Address,
        tokens: &[S],
    ) -> Result<(), BitmapError> {
        let sources = tokens
            .iter()
            .enumerate()
            .map(|(position, token)| {
                BitSource::parse(token.as_ref()).ok_or_else(|| BitmapError::InvalidToken {
                    address,
                    position,
                    token: token.as_ref().to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.insert(address, sources)
    }

    /// Parses a whitespace table: `<address> <token> ...` per line.
    pub fn parse(text: &str, width: Width) -> Result<Self, BitmapError> {
        let mut map = Self::new(width);

        for (index, raw_line) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw_line.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }

            let tokens: Vec<&str> = content.split_whitespace().collect();
            let Some((address, bits)) = tokens.split_first() else {
                return Err(BitmapError::Malformed {
                    line,
                    text: raw_line.to_string(),
                });
            };

            let address = parse_number(address, Radix::Decimal)
                .and_then(|a| Address::try_from(a).ok())
                .ok_or_else(|| BitmapError::InvalidAddress {
                    line,
                    text: address.to_string(),
                })?;

            map.insert_tokens(address, bits)?;
        }

        Ok(map)
    }

    /// Loads a JSON bit map: `{"width": 16, "words": [{"address": 0, "bits": [...]}]}`.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, BitmapError> {
        let def: crate::serde::BitmapDef =
            serde_json::from_str(json).map_err(|e| BitmapError::Json(e.to_string()))?;

        let mut map = Self::new(Width::new(def.width)?);
        for word in def.words {
            map.insert_tokens(word.address, word.bits.as_slice())?;
        }

        Ok(map)
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn get(&self, address: Address) -> Option<&[BitSource]> {
        self.words.get(&address).map(Vec::as_slice)
    }

    /// Words in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, &[BitSource])> {
        self.words.iter().map(|(a, s)| (*a, s.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word bit index of sequence position `position`.
    pub fn word_bit(&self, position: usize) -> u32 {
        self.width.bits() - 1 - position as u32
    }

    /// Every logical register some bit source refers to.
    pub fn referenced_registers(&self) -> BTreeSet<Address> {
        self.words
            .values()
            .flatten()
            .filter_map(|source| match source {
                BitSource::RegisterBit { register, .. } => Some(*register),
                _ => None,
            })
            .collect()
    }

    /// Mask of the bits of `register` that some bit source projects.
    pub fn projected_bits(&self, register: Address) -> u64 {
        self.words
            .values()
            .flatten()
            .fold(0u64, |mask, source| match source {
                BitSource::RegisterBit { register: r, bit } if *r == register && *bit < 64 => {
                    mask | (1u64 << *bit)
                }
                _ => mask,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn width4() -> Width {
        Width::new(4).unwrap()
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(BitSource::parse("0"), Some(BitSource::Constant(false)));
        assert_eq!(BitSource::parse("1"), Some(BitSource::Constant(true)));
        assert_eq!(
            BitSource::parse("R12[9]"),
            Some(BitSource::RegisterBit {
                register: 12,
                bit: 9
            })
        );
        assert_eq!(BitSource::parse("CRC[3]"), Some(BitSource::Ignored));
        assert_eq!(BitSource::parse("crc7"), Some(BitSource::Ignored));
        assert_eq!(BitSource::parse("RSVD"), Some(BitSource::Ignored));
        assert_eq!(BitSource::parse("2"), None);
        assert_eq!(BitSource::parse("R12"), None);
        assert_eq!(BitSource::parse("R[3]"), None);
        assert_eq!(BitSource::parse("Q1[2]"), None);
    }

    #[test]
    fn test_display_round_trips_tokens() {
        for token in ["0", "1", "R3[15]", "X"] {
            assert_eq!(BitSource::parse(token).unwrap().to_string(), token);
        }
    }

    #[test]
    fn test_parse_table() {
        let text = "# eeprom map\n0 1 0 R3[9] R3[10]\n1 CRC CRC R0[4] 0\n";
        let map = BitSourceMap::parse(text, width4()).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(0).unwrap(),
            &[
                BitSource::Constant(true),
                BitSource::Constant(false),
                BitSource::RegisterBit { register: 3, bit: 9 },
                BitSource::RegisterBit {
                    register: 3,
                    bit: 10
                },
            ]
        );
        assert_eq!(map.referenced_registers(), BTreeSet::from([0, 3]));
        assert_eq!(map.projected_bits(3), (1 << 9) | (1 << 10));
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(
            BitSourceMap::parse("0 1 0 1", width4()).unwrap_err(),
            BitmapError::WrongLength {
                address: 0,
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn test_duplicate_address() {
        assert_eq!(
            BitSourceMap::parse("0 1 0 1 0\n0 1 1 1 1", width4()).unwrap_err(),
            BitmapError::DuplicateAddress(0)
        );
    }

    #[test]
    fn test_duplicate_reference() {
        assert_eq!(
            BitSourceMap::parse("0 R3[9] R3[9] 0 0", width4()).unwrap_err(),
            BitmapError::DuplicateReference {
                address: 0,
                position: 1,
                register: 3,
                bit: 9
            }
        );

        let err = BitSourceMap::parse("0 1 R3[9] 0 0\n1 0 0 R3[10] R3[9]", width4()).unwrap_err();
        assert_eq!(
            err,
            BitmapError::DuplicateReference {
                address: 1,
                position: 3,
                register: 3,
                bit: 9
            }
        );

        let mut map = BitSourceMap::new(width4());
        map.insert_tokens(0, &["1", "R3[9]", "0", "0"]).unwrap();
        assert!(map.insert_tokens(1, &["R3[9]", "0", "0", "0"]).is_err());
        // The rejected word leaves nothing behind
        assert_eq!(map.len(), 1);
        map.insert_tokens(1, &["R3[8]", "0", "0", "0"]).unwrap();
        assert_eq!(map.projected_bits(3), (1 << 9) | (1 << 8));
    }

    #[test]
    fn test_invalid_token() {
        assert_eq!(
            BitSourceMap::parse("5 1 0 Z 0", width4()).unwrap_err(),
            BitmapError::InvalidToken {
                address: 5,
                position: 2,
                token: "Z".into()
            }
        );
        assert!(matches!(
            BitSourceMap::parse("addr 1 0 1 0", width4()).unwrap_err(),
            BitmapError::InvalidAddress { line: 1, .. }
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        use crate::errors::BitError;

        let json = r#"{"width": 4, "words": [
            {"address": 1, "bits": ["CRC", "R0[4]", "0", "1"]},
            {"address": 0, "bits": ["1", "0", "R3[9]", "R3[10]"]}
        ]}"#;

        let map = BitSourceMap::from_json(json).unwrap();

        let text = "0 1 0 R3[9] R3[10]\n1 CRC R0[4] 0 1\n";
        assert_eq!(map, BitSourceMap::parse(text, width4()).unwrap());
        assert!(matches!(
            BitSourceMap::from_json(r#"{"width": 0, "words": []}"#).unwrap_err(),
            BitmapError::Bit(BitError::InvalidWidth(0))
        ));
    }

    #[test]
    fn test_word_bit() {
        let map = BitSourceMap::new(Width::W16);
        assert_eq!(map.word_bit(0), 15);
        assert_eq!(map.word_bit(15), 0);
    }
}
