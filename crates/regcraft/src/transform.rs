//! A [`Translation`] turns the raw unsigned bits of a field into a domain [`Value`]
//! and back again:
//! - **Identity**: the raw value as an unsigned integer.
//! - **Signed**: two's complement over the field width.
//! - **Linear**: `raw * scale + offset` as a float; writing rounds to the nearest code.
//! - **Enumerated**: raw codes mapped to string labels.
//!
//! Translations are plain data resolved when the descriptor is loaded, either declared
//! inline or looked up by name in a [`TranslationRegistry`]. They never run arbitrary code.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::{bits, errors::TranslationError};

/// A translated field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Label(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(v) => write!(f, "{v:#x}"),
            Value::Signed(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Label(v) => f.write_str(v),
        }
    }
}

/// How a field's raw bits map to a [`Value`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Translation {
    #[default]
    Identity,
    Signed,
    Linear {
        scale: f64,
        offset: f64,
    },
    Enumerated(BTreeMap<u64, String>),
}

impl Translation {
    pub fn linear(scale: f64, offset: f64) -> Self {
        Translation::Linear { scale, offset }
    }

    pub fn enumerated<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        Translation::Enumerated(labels.into_iter().map(|(k, v)| (k, v.into())).collect())
    }

    /// Checks the translation's own parameters.
    pub fn validate(&self) -> Result<(), TranslationError> {
        if let Translation::Linear { scale, offset } = self {
            if !scale.is_finite() || !offset.is_finite() || *scale == 0.0 {
                return Err(TranslationError::InvalidScaleOffset);
            }
        }

        Ok(())
    }

    /// Translates the raw `bits`-wide value of a field.
    pub fn apply(&self, raw: u64, bits: u32) -> Result<Value, TranslationError> {
        self.validate()?;

        match self {
            Translation::Identity => Ok(Value::Unsigned(raw)),
            Translation::Signed => Ok(Value::Signed(bits::sign_extend(raw, bits))),
            Translation::Linear { scale, offset } => Ok(Value::Float(raw as f64 * scale + offset)),
            Translation::Enumerated(labels) => labels
                .get(&raw)
                .map(|s| Value::Label(s.clone()))
                .ok_or(TranslationError::UnknownCode(raw)),
        }
    }

    /// Turns a domain value back into the raw bits of a `bits`-wide field.
    ///
    /// A non-negative [`Value::Unsigned`] is accepted by every translation as the raw code.
    pub fn invert(&self, value: &Value, bits: u32) -> Result<u64, TranslationError> {
        self.validate()?;
        let max = bits::low_mask(bits);

        let raw = match (self, value) {
            (_, Value::Unsigned(v)) => *v,
            (Translation::Identity, Value::Signed(v)) => {
                u64::try_from(*v).map_err(|_| TranslationError::OutOfRange { bits })?
            }
            (Translation::Signed, Value::Signed(v)) => {
                let min = -(1i128 << (bits - 1));
                let top = (1i128 << (bits - 1)) - 1;
                if (*v as i128) < min || (*v as i128) > top {
                    return Err(TranslationError::OutOfRange { bits });
                }
                (*v as u64) & max
            }
            (Translation::Linear { scale, offset }, Value::Float(v)) => {
                let code = ((v - offset) / scale).round();
                if !code.is_finite() || code < 0.0 || code >= 2f64.powi(bits as i32) {
                    return Err(TranslationError::OutOfRange { bits });
                }
                code as u64
            }
            (Translation::Enumerated(labels), Value::Label(label)) => labels
                .iter()
                .find(|(_, l)| *l == label)
                .map(|(code, _)| *code)
                .ok_or_else(|| TranslationError::UnknownLabel(label.clone()))?,
            _ => return Err(TranslationError::TypeMismatch),
        };

        if raw > max {
            return Err(TranslationError::OutOfRange { bits });
        }

        Ok(raw)
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::InlineTranslationDef> for Translation {
    type Error = TranslationError;

    fn try_from(value: crate::serde::InlineTranslationDef) -> Result<Self, Self::Error> {
        use crate::serde::InlineTranslationDef;

        Ok(match value {
            InlineTranslationDef::Identity => Translation::Identity,
            InlineTranslationDef::Signed => Translation::Signed,
            InlineTranslationDef::Linear { scale, offset } => Translation::Linear { scale, offset },
            InlineTranslationDef::Enumerated { labels } => Translation::Enumerated(
                labels
                    .into_iter()
                    .map(|(code, label)| {
                        crate::store::parse_number(code.trim(), crate::store::Radix::Decimal)
                            .map(|code| (code, label))
                            .ok_or(TranslationError::InvalidCode(code))
                    })
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

/// Named translations that descriptor sources may refer to.
#[derive(Debug, Clone, Default)]
pub struct TranslationRegistry {
    entries: HashMap<String, Translation>,
}

impl TranslationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, translation: Translation) -> &mut Self {
        self.entries.insert(name.into(), translation);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Translation> {
        self.entries.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_inline_def() {
        use crate::serde::InlineTranslationDef;

        let def = InlineTranslationDef::Enumerated {
            labels: BTreeMap::from([("0x2".to_string(), "HIGH".to_string())]),
        };
        assert_eq!(
            Translation::try_from(def).unwrap(),
            Translation::enumerated([(2, "HIGH")])
        );

        let bad = InlineTranslationDef::Enumerated {
            labels: BTreeMap::from([("two".to_string(), "HIGH".to_string())]),
        };
        assert_eq!(
            Translation::try_from(bad).unwrap_err(),
            TranslationError::InvalidCode("two".into())
        );
    }

    #[test]
    fn test_identity() {
        let t = Translation::Identity;
        assert_eq!(t.apply(0x5, 4).unwrap(), Value::Unsigned(0x5));
        assert_eq!(t.invert(&Value::Unsigned(0x5), 4).unwrap(), 0x5);
        assert_eq!(
            t.invert(&Value::Unsigned(0x10), 4).unwrap_err(),
            TranslationError::OutOfRange { bits: 4 }
        );
    }

    #[test]
    fn test_signed() {
        let t = Translation::Signed;
        assert_eq!(t.apply(0xF, 4).unwrap(), Value::Signed(-1));
        assert_eq!(t.invert(&Value::Signed(-1), 4).unwrap(), 0xF);
        assert_eq!(t.invert(&Value::Signed(-8), 4).unwrap(), 0x8);
        assert!(t.invert(&Value::Signed(8), 4).is_err());
        assert!(t.invert(&Value::Signed(-9), 4).is_err());
    }

    #[test]
    fn test_linear() {
        let t = Translation::linear(0.5, 10.0);
        assert_eq!(t.apply(4, 8).unwrap(), Value::Float(12.0));
        assert_eq!(t.invert(&Value::Float(12.0), 8).unwrap(), 4);
        assert!(t.invert(&Value::Float(9.0), 8).is_err());
        assert_eq!(
            t.invert(&Value::Label("x".into()), 8).unwrap_err(),
            TranslationError::TypeMismatch
        );
    }

    #[test]
    fn test_linear_range_limits() {
        let t = Translation::linear(1.0, 0.0);
        assert_eq!(t.invert(&Value::Float(255.0), 8).unwrap(), 255);
        assert!(t.invert(&Value::Float(256.0), 8).is_err());

        assert_eq!(t.invert(&Value::Float(2f64.powi(63)), 64).unwrap(), 1 << 63);
        assert_eq!(
            t.invert(&Value::Float(2f64.powi(64)), 64).unwrap_err(),
            TranslationError::OutOfRange { bits: 64 }
        );
    }

    #[test]
    fn test_linear_invalid() {
        let t = Translation::linear(0.0, 1.0);
        assert_eq!(t.apply(1, 8).unwrap_err(), TranslationError::InvalidScaleOffset);

        let t = Translation::linear(f64::NAN, 1.0);
        assert_eq!(t.apply(1, 8).unwrap_err(), TranslationError::InvalidScaleOffset);
    }

    #[test]
    fn test_enumerated() {
        let t = Translation::enumerated([(0, "VCO0"), (1, "VCO1"), (2, "OSCin")]);
        assert_eq!(t.apply(2, 2).unwrap(), Value::Label("OSCin".into()));
        assert_eq!(t.apply(3, 2).unwrap_err(), TranslationError::UnknownCode(3));
        assert_eq!(t.invert(&Value::Label("VCO1".into()), 2).unwrap(), 1);
        assert_eq!(
            t.invert(&Value::Label("PLL".into()), 2).unwrap_err(),
            TranslationError::UnknownLabel("PLL".into())
        );
    }

    #[test]
    fn test_registry() {
        let mut registry = TranslationRegistry::new();
        registry.register("twos", Translation::Signed);
        assert_eq!(registry.get("twos"), Some(&Translation::Signed));
        assert_eq!(registry.get("missing"), None);
    }
}
