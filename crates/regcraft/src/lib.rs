//! # regcraft
//!
//! Named register fields and flat EEPROM images for configurable chips such as clock
//! generators.
//!
//! A [descriptor::RegisterMap] compiled from a register description maps field names
//! to bit ranges of logical registers, including fields split across several
//! registers. A [bitmap::BitSourceMap] says where every bit of every EEPROM word comes
//! from. [layout::encode] builds the EEPROM image for a set of register values and
//! [layout::decode] recovers the register bits from a readback of it.
//!
//! ## Example
//!
//! ```
//! use regcraft::bitmap::BitSourceMap;
//! use regcraft::bits::Width;
//! use regcraft::descriptor::{FragmentRecord, RegisterMap, RegisterRecord};
//! use regcraft::layout::{decode, encode};
//! use regcraft::store::RegisterStore;
//! use regcraft::transform::{TranslationRegistry, Value};
//!
//! let map = RegisterMap::compile(
//!     &[RegisterRecord::new(
//!         "0x3",
//!         "RW",
//!         vec![
//!             FragmentRecord::new("REGCOMMIT[10]", 10, 10),
//!             FragmentRecord::new("REGCOMMIT_PAGE[9]", 9, 9),
//!         ],
//!     )],
//!     Width::W16,
//!     &TranslationRegistry::new(),
//! )
//! .unwrap();
//!
//! let mut registers = RegisterStore::new(Width::W16);
//! map.write_field(&mut registers, "REGCOMMIT_PAGE", &Value::Unsigned(1))
//!     .unwrap();
//!
//! let bitmap = BitSourceMap::parse("0 1 0 R3[10] R3[9]", Width::new(4).unwrap()).unwrap();
//! let encoded = encode(&registers, &map, &bitmap).unwrap();
//! assert_eq!(encoded.image.get(0), Some(0b1001));
//!
//! let decoded = decode(&encoded.image, &bitmap, Width::W16).unwrap();
//! assert_eq!(decoded.deltas, registers);
//! ```

pub mod bitmap;
pub mod bits;
pub mod descriptor;
pub mod errors;
pub mod field;
pub mod fragment;
pub mod image;
pub mod layout;
pub mod nvm;
#[cfg(feature = "serde")]
pub mod serde;
pub mod store;
pub mod transform;
pub mod transport;

/// Register number or target word address.
pub type Address = u32;
