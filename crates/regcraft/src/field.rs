//! Named register fields and their read/write over a [crate::store::RegisterStore].

use std::fmt;

use crate::{
    Address,
    bits,
    errors::{AccessError, BitError, DescriptorError, FieldError},
    fragment::Fragment,
    store::RegisterStore,
    transform::{Translation, Value},
};

/// Access mode of a register, and by extension of the fields inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Reserved,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Mode {
    /// Parses descriptor mode strings such as `R`, `W`, `RW`, `R/W` or `Reserved`.
    pub fn parse(s: &str) -> Option<Mode> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '/' | '_' | ' ' | '-'))
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "R" | "RO" => Some(Mode::ReadOnly),
            "W" | "WO" => Some(Mode::WriteOnly),
            "RW" | "WR" => Some(Mode::ReadWrite),
            "RESERVED" | "RSVD" => Some(Mode::Reserved),
            _ => None,
        }
    }

    pub fn is_readable(self) -> bool {
        matches!(self, Mode::ReadOnly | Mode::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Mode::WriteOnly | Mode::ReadWrite)
    }

    /// Access allowed by both modes.
    pub fn intersect(self, other: Mode) -> Mode {
        match (
            self.is_readable() && other.is_readable(),
            self.is_writable() && other.is_writable(),
        ) {
            (true, true) => Mode::ReadWrite,
            (true, false) => Mode::ReadOnly,
            (false, true) => Mode::WriteOnly,
            (false, false) => Mode::Reserved,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Reserved => "reserved",
            Mode::ReadOnly => "read-only",
            Mode::WriteOnly => "write-only",
            Mode::ReadWrite => "read-write",
        })
    }
}

/// Where a field's bits live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLayout {
    /// A single bit range inside one register.
    Single(Fragment),
    /// Chunks spread over several registers, ordered from least to most significant.
    Concatenated(Vec<Fragment>),
}

impl FieldLayout {
    pub fn fragments(&self) -> &[Fragment] {
        match self {
            FieldLayout::Single(fragment) => std::slice::from_ref(fragment),
            FieldLayout::Concatenated(fragments) => fragments,
        }
    }
}

/// A named logical configuration value, compiled from one or more descriptor fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub description: Option<String>,
    /// Intersection of the modes of every register the field touches.
    pub mode: Mode,
    pub layout: FieldLayout,
    pub translation: Translation,
}

impl Field {
    pub fn fragments(&self) -> &[Fragment] {
        self.layout.fragments()
    }

    pub fn total_bits(&self) -> u32 {
        self.fragments().iter().map(Fragment::len_bits).sum()
    }

    /// Registers the field touches, in fragment order.
    pub fn registers(&self) -> impl Iterator<Item = Address> + '_ {
        self.fragments().iter().map(|f| f.register)
    }

    pub fn is_readable(&self) -> bool {
        self.mode.is_readable()
    }

    pub fn is_writable(&self) -> bool {
        self.mode.is_writable()
    }

    /// Assembles the raw unsigned value of the field from `store`.
    pub fn read_raw(&self, store: &RegisterStore) -> Result<u64, BitError> {
        let width = store.width();
        let mut value = 0u64;

        for fragment in self.fragments() {
            let part = bits::extract(
                store.get(fragment.register),
                width,
                fragment.bit_low,
                fragment.bit_high,
            )?;
            value |= part << fragment.offset;
        }

        Ok(value)
    }

    /// Reads the field from `store` and applies its translation.
    pub fn read(&self, store: &RegisterStore) -> Result<Value, FieldError> {
        let raw = self.read_raw(store)?;

        self.translation
            .apply(raw, self.total_bits())
            .map_err(|source| {
                FieldError::Descriptor(DescriptorError::Translation {
                    field: self.name.clone(),
                    source,
                })
            })
    }

    /// Splits `raw` over the field's fragments and writes each chunk into `store`.
    ///
    /// Bits of the touched registers outside the field are preserved. Nothing is
    /// written unless every chunk fits.
    pub fn write_raw(&self, store: &mut RegisterStore, raw: u64) -> Result<(), FieldError> {
        if !self.is_writable() {
            return Err(AccessError::NotWritable {
                field: self.name.clone(),
                mode: self.mode,
            }
            .into());
        }

        let total = self.total_bits();
        if raw & !bits::low_mask(total) != 0 {
            return Err(BitError::ValueTooWide {
                value: raw,
                bits: total,
            }
            .into());
        }

        let width = store.width();
        let mut pending: Vec<(Address, u64)> = Vec::with_capacity(self.fragments().len());

        for fragment in self.fragments() {
            let chunk = (raw >> fragment.offset) & bits::low_mask(fragment.len_bits());
            let current = pending
                .iter()
                .rev()
                .find(|(register, _)| *register == fragment.register)
                .map(|(_, word)| *word)
                .unwrap_or_else(|| store.get(fragment.register));

            let word = bits::insert(current, width, fragment.bit_low, fragment.bit_high, chunk)?;
            pending.push((fragment.register, word));
        }

        for (register, word) in pending {
            store.set(register, word)?;
        }

        log::trace!("{} <- {:#x}", self.name, raw);
        Ok(())
    }

    /// Inverts the translation for `value` and writes the result into `store`.
    pub fn write(&self, store: &mut RegisterStore, value: &Value) -> Result<(), FieldError> {
        let raw = self
            .translation
            .invert(value, self.total_bits())
            .map_err(|source| FieldError::InvalidValue {
                field: self.name.clone(),
                source,
            })?;

        self.write_raw(store, raw)
    }
}

/// Reads `field` from `store`, applying its translation.
pub fn read_field(store: &RegisterStore, field: &Field) -> Result<Value, FieldError> {
    field.read(store)
}

/// Writes the domain `value` of `field` into `store`.
pub fn write_field(store: &mut RegisterStore, field: &Field, value: &Value) -> Result<(), FieldError> {
    field.write(store, value)
}
