//! Flat target images: fixed-width words keyed by target address.

use std::collections::BTreeMap;
use std::fmt;

use crate::{
    Address,
    bits::Width,
    errors::{BitError, ConfigError, LayoutError},
    store::{Radix, parse_pairs},
};

/// A word that differs between two images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordDiff {
    pub address: Address,
    /// Word in the reference image, `None` if it has no word there.
    pub expected: Option<u64>,
    /// Word in the compared image, `None` if it has no word there.
    pub actual: Option<u64>,
}

/// A flat image such as the contents of a configuration EEPROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: Width,
    words: BTreeMap<Address, u64>,
}

impl Image {
    pub fn new(width: Width) -> Self {
        Self {
            width,
            words: BTreeMap::new(),
        }
    }

    /// Image with `words[i]` at address `i`.
    pub fn from_words(width: Width, words: &[u64]) -> Result<Self, BitError> {
        let mut image = Self::new(width);
        for (address, word) in words.iter().enumerate() {
            image.set(address as Address, *word)?;
        }

        Ok(image)
    }

    /// Parses `<address> <word>` lines. Bare addresses and words are hex; an address may
    /// appear only once.
    pub fn parse(text: &str, width: Width) -> Result<Self, ConfigError> {
        let mut image = Self::new(width);

        for (line, address, word) in parse_pairs(text, Radix::Hex, Radix::Hex)? {
            let word = width
                .check(word)
                .map_err(|source| ConfigError::Bit { line, source })?;

            if image.words.insert(address, word).is_some() {
                return Err(ConfigError::DuplicateRegister {
                    line,
                    register: address,
                });
            }
        }

        Ok(image)
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn get(&self, address: Address) -> Option<u64> {
        self.words.get(&address).copied()
    }

    pub fn set(&mut self, address: Address, word: u64) -> Result<(), BitError> {
        self.words.insert(address, self.width.check(word)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, u64)> + '_ {
        self.words.iter().map(|(a, w)| (*a, *w))
    }

    /// Words of an image covering addresses `0..len` without gaps.
    pub fn to_words(&self) -> Result<Vec<u64>, LayoutError> {
        (0..self.words.len() as Address)
            .map(|address| self.get(address).ok_or(LayoutError::MissingWord(address)))
            .collect()
    }

    /// Every address where `other` disagrees with `self`.
    pub fn diff(&self, other: &Image) -> Vec<WordDiff> {
        let mut addresses: Vec<Address> = self.words.keys().chain(other.words.keys()).copied().collect();
        addresses.sort_unstable();
        addresses.dedup();

        addresses
            .into_iter()
            .filter_map(|address| {
                let expected = self.get(address);
                let actual = other.get(address);
                (expected != actual).then_some(WordDiff {
                    address,
                    expected,
                    actual,
                })
            })
            .collect()
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.width.bits().div_ceil(4) as usize;
        for (address, word) in self.iter() {
            writeln!(f, "{address:#04x} {word:#0w$x}", w = digits + 2)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_words_and_back() {
        let image = Image::from_words(Width::W16, &[0x1010, 0x0, 0xFFFF]).unwrap();
        assert_eq!(image.get(2), Some(0xFFFF));
        assert_eq!(image.to_words().unwrap(), vec![0x1010, 0x0, 0xFFFF]);
    }

    #[test]
    fn test_to_words_gap() {
        let mut image = Image::new(Width::W16);
        image.set(0, 1).unwrap();
        image.set(2, 1).unwrap();
        assert_eq!(image.to_words().unwrap_err(), LayoutError::MissingWord(1));
    }

    #[test]
    fn test_rejects_wide_words() {
        assert!(Image::from_words(Width::W16, &[0x1_0000]).is_err());
    }

    #[test]
    fn test_parse_display() {
        let image = Image::from_words(Width::W16, &[0x1010, 0x00AB]).unwrap();
        let text = image.to_string();
        assert_eq!(text, "0x00 0x1010\n0x01 0x00ab\n");
        assert_eq!(Image::parse(&text, Width::W16).unwrap(), image);
    }

    #[test]
    fn test_parse_bare_hex() {
        let image = Image::parse("0 1010\n1 ab\n0a 1234\n10 1\n", Width::W16).unwrap();
        assert_eq!(image.get(1), Some(0xAB));
        assert_eq!(image.get(0x0A), Some(0x1234));
        assert_eq!(image.get(0x10), Some(0x1));
        assert_eq!(image.get(10), Some(0x1234));
    }

    #[test]
    fn test_parse_duplicate() {
        assert!(matches!(
            Image::parse("0 1\n0 2\n", Width::W16).unwrap_err(),
            ConfigError::DuplicateRegister { line: 2, register: 0 }
        ));
    }

    #[test]
    fn test_diff() {
        let written = Image::from_words(Width::W16, &[1, 2, 3]).unwrap();
        let readback = Image::from_words(Width::W16, &[1, 7]).unwrap();

        assert_eq!(
            written.diff(&readback),
            vec![
                WordDiff {
                    address: 1,
                    expected: Some(2),
                    actual: Some(7)
                },
                WordDiff {
                    address: 2,
                    expected: Some(3),
                    actual: None
                },
            ]
        );
    }
}
