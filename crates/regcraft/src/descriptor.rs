//! Register descriptors: which named fields live in which register bits.
//!
//! A descriptor source lists, per register, an address, an access mode and an ordered
//! list of field fragments. Fragment names may carry bracket annotations:
//!
//! - `EE_LOCK[15:12]`: a plain field; the bracket repeats the local register bits.
//! - `PLL2_N[17:16][1:0]`: one chunk of a concatenated field. The last bracket gives the
//!   local bits inside this register, the earlier one the bits of the assembled field
//!   this chunk provides.
//!
//! [RegisterMap::compile] turns those records into [Field]s, merging the chunks of a
//! concatenated field. The result is immutable.

use std::collections::BTreeMap;

use crate::{
    Address,
    bits::{self, Width},
    errors::{BitError, DescriptorError, FieldError},
    field::{Field, FieldLayout, Mode},
    fragment::Fragment,
    store::RegisterStore,
    transform::{Translation, TranslationRegistry, Value},
};

/// How a fragment record names its translation.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationRef {
    Inline(Translation),
    Named(String),
}

/// One field fragment as it appears in a descriptor source.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentRecord {
    /// Field name, optionally bracket-annotated.
    pub name: String,
    pub start_bit: u32,
    pub end_bit: u32,
    pub description: Option<String>,
    pub translation: Option<TranslationRef>,
}

impl FragmentRecord {
    pub fn new(name: impl Into<String>, start_bit: u32, end_bit: u32) -> Self {
        FragmentRecord {
            name: name.into(),
            start_bit,
            end_bit,
            description: None,
            translation: None,
        }
    }

    pub fn with_translation(mut self, translation: TranslationRef) -> Self {
        self.translation = Some(translation);
        self
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::FieldDef> for FragmentRecord {
    type Error = DescriptorError;

    fn try_from(value: crate::serde::FieldDef) -> Result<Self, Self::Error> {
        use crate::serde::{NumberDef, TranslationDef};

        let bit = |number: NumberDef| -> Result<u32, DescriptorError> {
            let parsed = match &number {
                NumberDef::Number(n) => u32::try_from(*n).ok(),
                NumberDef::Text(text) => text.trim().parse().ok(),
            };
            parsed.ok_or_else(|| {
                DescriptorError::Json(format!("field {}: invalid bit number {number:?}", value.name))
            })
        };

        let start_bit = bit(value.start_bit.clone())?;
        let end_bit = bit(value.end_bit.clone())?;

        let translation = match value.translation {
            None => None,
            Some(TranslationDef::Named(name)) => Some(TranslationRef::Named(name)),
            Some(TranslationDef::Inline(def)) => Some(TranslationRef::Inline(
                Translation::try_from(def).map_err(|source| DescriptorError::Translation {
                    field: value.name.clone(),
                    source,
                })?,
            )),
        };

        Ok(FragmentRecord {
            name: value.name,
            start_bit,
            end_bit,
            description: value.description,
            translation,
        })
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::RegisterDef> for RegisterRecord {
    type Error = DescriptorError;

    fn try_from(value: crate::serde::RegisterDef) -> Result<Self, Self::Error> {
        let address = match value.address {
            crate::serde::NumberDef::Number(n) => format!("{n:#x}"),
            crate::serde::NumberDef::Text(text) => text,
        };

        Ok(RegisterRecord {
            address,
            mode: value.mode,
            fields: value
                .fields
                .into_iter()
                .map(FragmentRecord::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// One register as it appears in a descriptor source.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRecord {
    /// Hex address, with or without `0x`.
    pub address: String,
    pub mode: Option<String>,
    pub fields: Vec<FragmentRecord>,
}

impl RegisterRecord {
    pub fn new(address: impl Into<String>, mode: impl Into<String>, fields: Vec<FragmentRecord>) -> Self {
        RegisterRecord {
            address: address.into(),
            mode: Some(mode.into()),
            fields,
        }
    }
}

/// A field slot inside a compiled register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    /// Name of the [Field] this slot belongs to.
    pub field: String,
    pub bit_low: u32,
    pub bit_high: u32,
    pub description: Option<String>,
}

/// A compiled register: address, mode and its field slots in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub address: Address,
    pub mode: Mode,
    pub fields: Vec<FieldSlot>,
}

/// Parsed bracket annotations of a fragment name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldName<'a> {
    pub base: &'a str,
    /// `(high, low)` bits of the assembled field this fragment provides.
    pub global: Option<(u32, u32)>,
    /// `(high, low)` bits inside the register.
    pub local: Option<(u32, u32)>,
}

/// Splits `NAME`, `NAME[h:l]` or `NAME[h:l][h:l]` into its parts.
pub fn parse_field_name(name: &str) -> Result<FieldName<'_>, DescriptorError> {
    let malformed = || DescriptorError::MalformedFieldName(name.to_string());
    let trimmed = name.trim();

    let (rest, local) = strip_bracket(trimmed).ok_or_else(malformed)?;
    let (base, global) = match local {
        Some(_) => strip_bracket(rest).ok_or_else(malformed)?,
        None => (rest, None),
    };

    if base.is_empty() || base.contains(['[', ']']) {
        return Err(malformed());
    }

    Ok(FieldName {
        base,
        global,
        local,
    })
}

/// Removes a trailing `[h:l]` or `[n]`. Returns `None` if the bracket is malformed.
fn strip_bracket(s: &str) -> Option<(&str, Option<(u32, u32)>)> {
    let Some(inner_end) = s.strip_suffix(']') else {
        return Some((s, None));
    };

    let open = inner_end.rfind('[')?;
    let range = &inner_end[open + 1..];

    let (high, low) = match range.split_once(':') {
        Some((h, l)) => (h.trim().parse().ok()?, l.trim().parse().ok()?),
        None => {
            let bit = range.trim().parse().ok()?;
            (bit, bit)
        }
    };

    if low > high {
        return None;
    }

    Some((inner_end[..open].trim_end(), Some((high, low))))
}

fn parse_address(s: &str) -> Result<Address, DescriptorError> {
    let t = s.trim();
    let hex = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")).unwrap_or(t);

    Address::from_str_radix(hex, 16).map_err(|_| DescriptorError::InvalidAddress(s.to_string()))
}

struct FieldBuilder {
    concatenated: bool,
    mode: Mode,
    description: Option<String>,
    translation: Option<Translation>,
    fragments: Vec<Fragment>,
    occupied: u64,
}

/// Compiled descriptor: registers by address and fields by name.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMap {
    width: Width,
    registers: BTreeMap<Address, RegisterDescriptor>,
    fields: BTreeMap<String, Field>,
}

impl RegisterMap {
    /// Compiles register records into a map. Fails on the first malformed record.
    pub fn compile(
        records: &[RegisterRecord],
        width: Width,
        translations: &TranslationRegistry,
    ) -> Result<Self, DescriptorError> {
        let mut registers = BTreeMap::new();
        let mut builders: BTreeMap<String, FieldBuilder> = BTreeMap::new();

        for record in records {
            let address = parse_address(&record.address)?;
            if registers.contains_key(&address) {
                return Err(DescriptorError::DuplicateRegister(address));
            }

            let mode_text = record
                .mode
                .as_deref()
                .ok_or(DescriptorError::MissingMode { address })?;
            let mode = Mode::parse(mode_text).ok_or_else(|| DescriptorError::UnknownMode {
                address,
                mode: mode_text.to_string(),
            })?;

            let mut slots = Vec::with_capacity(record.fields.len());

            for fragment in &record.fields {
                let len = check_local_bits(width, address, fragment)?;
                let name = parse_field_name(&fragment.name)?;

                if let Some((high, low)) = name.local {
                    if high - low != len - 1 {
                        return Err(DescriptorError::WidthMismatch {
                            field: name.base.to_string(),
                            local: len,
                            declared: (high - low).saturating_add(1),
                        });
                    }
                }

                let translation = resolve_translation(name.base, fragment, translations)?;

                match name.global {
                    None => {
                        if builders.contains_key(name.base) {
                            return Err(DescriptorError::DuplicateField(name.base.to_string()));
                        }

                        builders.insert(
                            name.base.to_string(),
                            FieldBuilder {
                                concatenated: false,
                                mode,
                                description: fragment.description.clone(),
                                translation,
                                fragments: vec![Fragment::new(
                                    address,
                                    fragment.start_bit,
                                    fragment.end_bit,
                                )],
                                occupied: bits::low_mask(len),
                            },
                        );
                    }
                    Some((high, low)) => {
                        if high - low != len - 1 {
                            return Err(DescriptorError::WidthMismatch {
                                field: name.base.to_string(),
                                local: len,
                                declared: (high - low).saturating_add(1),
                            });
                        }
                        if high >= 64 {
                            return Err(DescriptorError::FieldTooWide {
                                field: name.base.to_string(),
                                bits: high.saturating_add(1),
                            });
                        }

                        let builder = builders.entry(name.base.to_string()).or_insert_with(|| {
                            FieldBuilder {
                                concatenated: true,
                                mode,
                                description: fragment.description.clone(),
                                translation: None,
                                fragments: Vec::new(),
                                occupied: 0,
                            }
                        });

                        if !builder.concatenated {
                            return Err(DescriptorError::DuplicateField(name.base.to_string()));
                        }

                        let chunk = Fragment::new_with_offset(
                            address,
                            fragment.start_bit,
                            fragment.end_bit,
                            low,
                        );
                        let mask = chunk.field_mask();
                        if builder.occupied & mask != 0 {
                            return Err(DescriptorError::OverlappingFragment {
                                field: name.base.to_string(),
                                low,
                                high,
                            });
                        }

                        if let Some(translation) = translation {
                            match &builder.translation {
                                Some(existing) if *existing != translation => {
                                    return Err(DescriptorError::ConflictingTranslation(
                                        name.base.to_string(),
                                    ));
                                }
                                _ => builder.translation = Some(translation),
                            }
                        }

                        builder.occupied |= mask;
                        builder.mode = builder.mode.intersect(mode);
                        builder.fragments.push(chunk);
                    }
                }

                slots.push(FieldSlot {
                    field: name.base.to_string(),
                    bit_low: fragment.start_bit,
                    bit_high: fragment.end_bit,
                    description: fragment.description.clone(),
                });
            }

            registers.insert(
                address,
                RegisterDescriptor {
                    address,
                    mode,
                    fields: slots,
                },
            );
        }

        let mut fields = BTreeMap::new();
        for (name, builder) in builders {
            let field = finish_field(name.clone(), builder)?;
            fields.insert(name, field);
        }

        log::debug!(
            "compiled {} registers, {} fields",
            registers.len(),
            fields.len()
        );

        Ok(Self {
            width,
            registers,
            fields,
        })
    }

    /// Compiles a JSON descriptor in the TI register-export shape.
    #[cfg(feature = "serde")]
    pub fn from_json(
        json: &str,
        width: Width,
        translations: &TranslationRegistry,
    ) -> Result<Self, DescriptorError> {
        let def: crate::serde::DescriptorDef =
            serde_json::from_str(json).map_err(|e| DescriptorError::Json(e.to_string()))?;

        let records = def
            .registers
            .into_iter()
            .map(RegisterRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Self::compile(&records, width, translations)
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn register(&self, address: Address) -> Option<&RegisterDescriptor> {
        self.registers.get(&address)
    }

    /// Mode of the register at `address`, `None` if the descriptor does not declare it.
    pub fn mode(&self, address: Address) -> Option<Mode> {
        self.registers.get(&address).map(|r| r.mode)
    }

    /// Registers in ascending address order.
    pub fn registers(&self) -> impl Iterator<Item = &RegisterDescriptor> {
        self.registers.values()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    fn lookup(&self, name: &str) -> Result<&Field, FieldError> {
        self.field(name)
            .ok_or_else(|| FieldError::UnknownField(name.to_string()))
    }

    /// Reads the field called `name` from `store`.
    pub fn read_field(&self, store: &RegisterStore, name: &str) -> Result<Value, FieldError> {
        self.lookup(name)?.read(store)
    }

    /// Writes `value` into the field called `name`.
    pub fn write_field(
        &self,
        store: &mut RegisterStore,
        name: &str,
        value: &Value,
    ) -> Result<(), FieldError> {
        self.lookup(name)?.write(store, value)
    }

    /// Reads every field from `store`, keyed by field name.
    pub fn decode_fields(&self, store: &RegisterStore) -> Result<BTreeMap<String, Value>, FieldError> {
        let mut map = BTreeMap::new();

        for field in self.fields.values() {
            map.insert(field.name.clone(), field.read(store)?);
        }

        Ok(map)
    }

    /// Splits `store` into the registers that may be written and those that may not.
    ///
    /// Registers the descriptor does not declare, or declares without write access,
    /// are returned in the second list and logged.
    pub fn registers_for_write(&self, store: &RegisterStore) -> (RegisterStore, Vec<Address>) {
        let mut writable = store.clone();
        let mut rejected = Vec::new();

        for (address, _) in store.iter() {
            match self.mode(address) {
                Some(mode) if mode.is_writable() => {}
                Some(mode) => {
                    log::warn!("register {address:#x} is {mode}, not writable");
                    rejected.push(address);
                }
                None => {
                    log::warn!("register {address:#x} is not in the descriptor");
                    rejected.push(address);
                }
            }
        }

        for address in &rejected {
            writable.remove(*address);
        }

        (writable, rejected)
    }
}

fn check_local_bits(width: Width, address: Address, fragment: &FragmentRecord) -> Result<u32, DescriptorError> {
    let bit_error = |source| DescriptorError::Bit { address, source };

    width.check_index(fragment.start_bit).map_err(bit_error)?;
    width.check_index(fragment.end_bit).map_err(bit_error)?;

    if fragment.start_bit > fragment.end_bit {
        return Err(bit_error(BitError::InvertedRange {
            low: fragment.start_bit,
            high: fragment.end_bit,
        }));
    }

    Ok(fragment.end_bit - fragment.start_bit + 1)
}

fn resolve_translation(
    field: &str,
    fragment: &FragmentRecord,
    translations: &TranslationRegistry,
) -> Result<Option<Translation>, DescriptorError> {
    let translation = match &fragment.translation {
        None => return Ok(None),
        Some(TranslationRef::Inline(t)) => t.clone(),
        Some(TranslationRef::Named(name)) => translations
            .get(name)
            .cloned()
            .ok_or_else(|| DescriptorError::UnknownTranslation {
                field: field.to_string(),
                name: name.clone(),
            })?,
    };

    translation
        .validate()
        .map_err(|source| DescriptorError::Translation {
            field: field.to_string(),
            source,
        })?;

    Ok(Some(translation))
}

fn finish_field(name: String, mut builder: FieldBuilder) -> Result<Field, DescriptorError> {
    builder.fragments.sort_by_key(|f| f.offset);

    let total: u32 = builder.fragments.iter().map(Fragment::len_bits).sum();
    if total > 64 {
        return Err(DescriptorError::FieldTooWide { field: name, bits: total });
    }
    if builder.occupied != bits::low_mask(total) {
        return Err(DescriptorError::FieldGap(name));
    }

    let layout = if builder.concatenated {
        FieldLayout::Concatenated(builder.fragments)
    } else {
        match builder.fragments.pop() {
            Some(fragment) => FieldLayout::Single(fragment),
            None => return Err(DescriptorError::MalformedFieldName(name)),
        }
    };

    Ok(Field {
        name,
        description: builder.description,
        mode: builder.mode,
        layout,
        translation: builder.translation.unwrap_or_default(),
    })
}
