//! JSON-deserializable descriptor and bit map sources.
//!
//! The descriptor shape follows TI register exports:
//!
//! ```json
//! {"Registers": [{"Address": "0x00F", "Mode": "RW", "Fields": [
//!     {"Field_Name": "EE_LOCK[15:12]", "Start_Bit": 12, "End_Bit": 15}
//! ]}]}
//! ```
//!
//! These types only describe the source; [crate::descriptor::RegisterMap::from_json] and
//! [crate::bitmap::BitSourceMap::from_json] compile them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level descriptor document.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DescriptorDef {
    #[serde(rename = "Registers")]
    pub registers: Vec<RegisterDef>,
}

/// One register of a descriptor document.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RegisterDef {
    /// Hex address, as a string or a plain number.
    #[serde(rename = "Address")]
    pub address: NumberDef,
    /// Access mode; a register without one fails to compile.
    #[serde(rename = "Mode", default)]
    pub mode: Option<String>,
    #[serde(rename = "Fields", default)]
    pub fields: Vec<FieldDef>,
}

/// One field fragment of a register.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDef {
    #[serde(rename = "Field_Name")]
    pub name: String,
    #[serde(rename = "Start_Bit")]
    pub start_bit: NumberDef,
    #[serde(rename = "End_Bit")]
    pub end_bit: NumberDef,
    #[serde(rename = "Field_Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Translation", default)]
    pub translation: Option<TranslationDef>,
}

/// Exports write numbers either as JSON numbers or as strings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum NumberDef {
    Number(u64),
    Text(String),
}

/// A translation given by registry name or declared inline.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum TranslationDef {
    Named(String),
    Inline(InlineTranslationDef),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "kind")]
pub enum InlineTranslationDef {
    Identity,
    Signed,
    Linear {
        scale: f64,
        #[serde(default)]
        offset: f64,
    },
    /// Raw code to label. Codes are decimal or `0x` hex strings.
    Enumerated { labels: BTreeMap<String, String> },
}

/// A bit map document: `width` bits per word, sources listed MSB-first.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BitmapDef {
    pub width: u32,
    pub words: Vec<WordDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WordDef {
    pub address: u32,
    /// Bit table tokens, e.g. `"1"`, `"R3[9]"`, `"CRC"`.
    pub bits: Vec<String>,
}
