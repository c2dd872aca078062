//! The logical register space: register number to current word value.
//!
//! A [RegisterStore] is owned by the caller and passed explicitly to every operation
//! that reads or mutates it. It has no internal locking; concurrent encode/decode on
//! the same store must be serialised by the caller.

use std::collections::BTreeMap;

use crate::{
    Address,
    bits::{self, Width},
    errors::{BitError, ConfigError},
};

/// What to do when a configuration file sets the same register twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The later line overwrites the earlier one.
    #[default]
    LastWins,
    /// A repeated register is an error.
    Reject,
}

/// Radix used for numbers without a `0x` prefix. TICS Pro register dumps write bare hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Radix {
    Decimal,
    #[default]
    Hex,
}

impl Radix {
    fn value(self) -> u32 {
        match self {
            Radix::Decimal => 10,
            Radix::Hex => 16,
        }
    }
}

/// Options for [RegisterStore::parse].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigOptions {
    pub duplicates: DuplicatePolicy,
    pub default_radix: Radix,
}

/// Word values keyed by register number. Registers never set read as 0.
#[derive(Debug, Clone, Default)]
pub struct RegisterStore {
    width: Width,
    registers: BTreeMap<Address, u64>,
}

impl RegisterStore {
    pub fn new(width: Width) -> Self {
        Self {
            width,
            registers: BTreeMap::new(),
        }
    }

    /// Builds a store from `(register, value)` pairs. Later pairs overwrite earlier ones.
    pub fn from_pairs<I>(width: Width, pairs: I) -> Result<Self, BitError>
    where
        I: IntoIterator<Item = (Address, u64)>,
    {
        let mut store = Self::new(width);
        for (register, value) in pairs {
            store.set(register, value)?;
        }

        Ok(store)
    }

    /// Parses a configuration file of `<register> <value>` lines.
    ///
    /// Registers may be written `R12`, `12` or `0x0C`; values take a `0x` prefix for hex
    /// or are read in `options.default_radix`. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str, width: Width, options: ConfigOptions) -> Result<Self, ConfigError> {
        let mut store = Self::new(width);

        for (line, register, value) in parse_pairs(text, Radix::Decimal, options.default_radix)? {
            let value = width
                .check(value)
                .map_err(|source| ConfigError::Bit { line, source })?;

            if let Some(previous) = store.registers.insert(register, value) {
                match options.duplicates {
                    DuplicatePolicy::Reject => {
                        return Err(ConfigError::DuplicateRegister { line, register });
                    }
                    DuplicatePolicy::LastWins => log::warn!(
                        "line {line}: register {register:#x} set again, {previous:#x} replaced by {value:#x}"
                    ),
                }
            }
        }

        Ok(store)
    }

    pub fn width(&self) -> Width {
        self.width
    }

    /// Current value of `register`, 0 if it was never set.
    pub fn get(&self, register: Address) -> u64 {
        self.registers.get(&register).copied().unwrap_or(0)
    }

    pub fn contains(&self, register: Address) -> bool {
        self.registers.contains_key(&register)
    }

    pub fn set(&mut self, register: Address, value: u64) -> Result<(), BitError> {
        self.registers.insert(register, self.width.check(value)?);
        Ok(())
    }

    /// Ensures `register` has an entry, inserting 0 if absent.
    pub fn touch(&mut self, register: Address) {
        self.registers.entry(register).or_insert(0);
    }

    /// Flips `bit` of `register`.
    pub fn toggle_bit(&mut self, register: Address, bit: u32) -> Result<(), BitError> {
        self.width.check_index(bit)?;
        *self.registers.entry(register).or_insert(0) ^= 1u64 << bit;
        Ok(())
    }

    pub fn remove(&mut self, register: Address) -> Option<u64> {
        self.registers.remove(&register)
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Registers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, u64)> + '_ {
        self.registers.iter().map(|(r, v)| (*r, *v))
    }

    /// Registers whose value is not 0.
    pub fn nonzero(&self) -> impl Iterator<Item = (Address, u64)> + '_ {
        self.iter().filter(|(_, v)| *v != 0)
    }
}

/// Stores are equal when they have the same width and agree on every register,
/// counting absent registers as 0.
impl PartialEq for RegisterStore {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.nonzero().eq(other.nonzero())
    }
}

impl Eq for RegisterStore {}

/// Parses `<address> <value>` lines, returning `(line number, address, value)`.
pub(crate) fn parse_pairs(
    text: &str,
    address_radix: Radix,
    default_radix: Radix,
) -> Result<Vec<(usize, Address, u64)>, ConfigError> {
    let mut out = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw_line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }

        let mut tokens = content.split_whitespace();
        let (Some(address), Some(value), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(ConfigError::Malformed {
                line,
                text: raw_line.to_string(),
            });
        };

        let address_token = address
            .strip_prefix('R')
            .or_else(|| address.strip_prefix('r'))
            .unwrap_or(address);
        let address = parse_number(address_token, address_radix)
            .and_then(|a| Address::try_from(a).ok())
            .ok_or_else(|| ConfigError::InvalidNumber {
                line,
                text: address.to_string(),
            })?;
        let value = parse_number(value, default_radix).ok_or_else(|| ConfigError::InvalidNumber {
            line,
            text: value.to_string(),
        })?;

        out.push((line, address, value));
    }

    Ok(out)
}

/// Parses a `0x`-prefixed hex number, or a bare number in `radix`.
pub fn parse_number(s: &str, radix: Radix) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => u64::from_str_radix(s, radix.value()).ok(),
    }
}

/// Reads `bit` of `register` in `store`.
pub(crate) fn register_bit(store: &RegisterStore, register: Address, bit: u32) -> Result<u64, BitError> {
    bits::bit(store.get(register), store.width(), bit)
}
