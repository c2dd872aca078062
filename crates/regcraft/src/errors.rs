//! Error types for bit manipulation, descriptor loading, field access and layout coding.

use thiserror::Error;

use crate::{Address, field::Mode};

/// Errors produced by the low-level bit operations in [crate::bits].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitError {
    /// Word width is 0 or greater than 64 bits.
    #[error("word width {0} is outside 1..=64")]
    InvalidWidth(u32),
    /// Bit index is not inside the word.
    #[error("bit {bit} is outside a {width}-bit word")]
    IndexOutOfRange { bit: u32, width: u32 },
    /// `low` is above `high`.
    #[error("bit range [{high}:{low}] is inverted")]
    InvertedRange { low: u32, high: u32 },
    /// Value does not fit in the destination range.
    #[error("value {value:#x} does not fit in {bits} bits")]
    ValueTooWide { value: u64, bits: u32 },
}

/// Errors produced by a [crate::transform::Translation] in either direction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslationError {
    /// Raw code has no entry in an enumerated translation.
    #[error("no label for raw value {0:#x}")]
    UnknownCode(u64),
    /// Label has no entry in an enumerated translation.
    #[error("unknown label {0:?}")]
    UnknownLabel(String),
    /// The value kind does not match the translation (e.g. a label for a linear field).
    #[error("value kind does not match the translation")]
    TypeMismatch,
    /// The value cannot be represented in the field width.
    #[error("value is out of range for a {bits}-bit field")]
    OutOfRange { bits: u32 },
    /// Scale or offset is NaN, infinite, or the scale is zero.
    #[error("scale/offset must be finite and the scale non-zero")]
    InvalidScaleOffset,
    /// An enumerated translation source has a code that is not a number.
    #[error("invalid raw code {0:?}")]
    InvalidCode(String),
}

/// Errors produced while compiling register descriptors into a [crate::descriptor::RegisterMap].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptorError {
    #[error("invalid register address {0:?}")]
    InvalidAddress(String),
    #[error("register {0:#x} is declared twice")]
    DuplicateRegister(Address),
    #[error("register {address:#x} has no mode")]
    MissingMode { address: Address },
    #[error("register {address:#x} has unrecognised mode {mode:?}")]
    UnknownMode { address: Address, mode: String },
    /// Field name is empty or its bracket annotation does not parse.
    #[error("malformed field name {0:?}")]
    MalformedFieldName(String),
    /// A bracket range disagrees with the width of the declared bits.
    #[error("field {field}: bracket range is {declared} bits but the fragment is {local} bits")]
    WidthMismatch {
        field: String,
        local: u32,
        declared: u32,
    },
    /// A fragment claims bits of its field that another fragment already owns.
    #[error("field {field}: bits [{high}:{low}] overlap an earlier fragment")]
    OverlappingFragment { field: String, low: u32, high: u32 },
    /// The same plain field name appears on more than one fragment.
    #[error("field {0} is declared more than once")]
    DuplicateField(String),
    /// Concatenated fragments leave unassigned bits inside the field.
    #[error("field {0} has gaps between its fragments")]
    FieldGap(String),
    #[error("field {field} is {bits} bits wide, more than 64")]
    FieldTooWide { field: String, bits: u32 },
    #[error("field {0} declares different translations on its fragments")]
    ConflictingTranslation(String),
    #[error("field {field} references unknown translation {name:?}")]
    UnknownTranslation { field: String, name: String },
    /// A translation failed when reading the field.
    #[error("field {field}: translation failed: {source}")]
    Translation {
        field: String,
        #[source]
        source: TranslationError,
    },
    #[error("register {address:#x}: {source}")]
    Bit {
        address: Address,
        #[source]
        source: BitError,
    },
    #[cfg(feature = "serde")]
    #[error("descriptor JSON: {0}")]
    Json(String),
}

/// A write was attempted on a field that cannot be written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("field {field} is {mode} and cannot be written")]
    NotWritable { field: String, mode: Mode },
}

/// Errors produced by [crate::field] read/write operations over a register store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("unknown field {0}")]
    UnknownField(String),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Bit(#[from] BitError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// The domain value cannot be turned back into raw bits.
    #[error("field {field}: {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: TranslationError,
    },
}

/// Errors produced while building a [crate::bitmap::BitSourceMap].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitmapError {
    #[error("line {line}: malformed entry {text:?}")]
    Malformed { line: usize, text: String },
    #[error("line {line}: invalid address {text:?}")]
    InvalidAddress { line: usize, text: String },
    #[error("word {address:#x}, position {position}: invalid bit token {token:?}")]
    InvalidToken {
        address: Address,
        position: usize,
        token: String,
    },
    #[error("word {address:#x} has {found} bit sources, expected {expected}")]
    WrongLength {
        address: Address,
        expected: usize,
        found: usize,
    },
    #[error("word {0:#x} is declared twice")]
    DuplicateAddress(Address),
    #[error("word {address:#x}, position {position}: R{register}[{bit}] is already projected")]
    DuplicateReference {
        address: Address,
        position: usize,
        register: Address,
        bit: u32,
    },
    #[error(transparent)]
    Bit(#[from] BitError),
    #[cfg(feature = "serde")]
    #[error("bitmap JSON: {0}")]
    Json(String),
}

/// Errors produced while parsing `(address, value)` text such as register configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("line {line}: expected `<register> <value>`, got {text:?}")]
    Malformed { line: usize, text: String },
    #[error("line {line}: invalid number {text:?}")]
    InvalidNumber { line: usize, text: String },
    #[error("line {line}: register {register:#x} was already set")]
    DuplicateRegister { line: usize, register: Address },
    #[error("line {line}: {source}")]
    Bit {
        line: usize,
        #[source]
        source: BitError,
    },
}

/// Errors produced while encoding or decoding a flat image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Bit(#[from] BitError),
    /// Strict encode found a reference to a register that the store does not hold.
    #[error("word {address:#x} references register {register:#x}, which is not configured")]
    MissingRegister { address: Address, register: Address },
    #[error("image has no word at address {0:#x}")]
    MissingWord(Address),
    #[error("image is {found} bits wide, the bit map expects {expected}")]
    WidthMismatch { expected: u32, found: u32 },
}

/// Errors reported by a [crate::transport::Transport].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("write of {word:#x} to register {address:#x} failed: {reason}")]
    Write {
        address: Address,
        word: u64,
        reason: String,
    },
    #[error("read of register {address:#x} failed: {reason}")]
    Read { address: Address, reason: String },
    #[error(transparent)]
    Bit(#[from] BitError),
}

/// Errors produced by the EEPROM sequences in [crate::nvm].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NvmError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Bit(#[from] BitError),
    #[error("image has {words} words, the EEPROM holds {capacity}")]
    ImageTooLarge { words: usize, capacity: usize },
}
