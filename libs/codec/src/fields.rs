//! # Field Dictionary - ISO 8583:1987 ASCII Field Registry
//!
//! ## Purpose
//!
//! Single source of truth for every data element the client may put on the wire:
//! its number, meaning, character class and length rule. The packager consults the
//! dictionary for both directions, and the authorization request builder uses the
//! same names for its positional mapping.
//!
//! ## Architecture Role
//!
//! ```text
//! IsoMessage ──> [FieldDictionary] ──> IsoPackager ──> wire bytes
//!                  number -> FieldSpec
//!                  class / length rule
//! ```
//!
//! The dictionary is immutable and built once per process ([`FieldDictionary::iso87`]);
//! callers share it by reference.

use crate::constants::MAX_FIELD;
use crate::error::{ProtocolError, ProtocolResult};
use bytes::{BufMut, BytesMut};
use once_cell::sync::Lazy;
use std::fmt;

/// Character class of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// `n` - ASCII digits only
    Numeric,
    /// `z` - track 2 data: digits and the `=` separator
    Track2,
    /// `an` - letters, digits and space
    AlphaNumeric,
    /// `ans` - any printable ASCII
    AlphaNumericSpecial,
}

impl FieldClass {
    /// Short ISO notation for the class
    pub fn notation(&self) -> &'static str {
        match self {
            FieldClass::Numeric => "n",
            FieldClass::Track2 => "z",
            FieldClass::AlphaNumeric => "an",
            FieldClass::AlphaNumericSpecial => "ans",
        }
    }

    /// Check every character of `value` against the class
    pub fn admits(&self, value: &str) -> bool {
        match self {
            FieldClass::Numeric => value.bytes().all(|b| b.is_ascii_digit()),
            FieldClass::Track2 => value.bytes().all(|b| b.is_ascii_digit() || b == b'='),
            FieldClass::AlphaNumeric => value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b' '),
            FieldClass::AlphaNumericSpecial => value.bytes().all(|b| (0x20..=0x7e).contains(&b)),
        }
    }

    fn pad_byte(&self) -> u8 {
        match self {
            FieldClass::Numeric => b'0',
            _ => b' ',
        }
    }
}

/// Length rule of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLength {
    /// Exactly this many characters, padded on encode when shorter
    Fixed(usize),
    /// Two-digit length prefix, up to the given maximum
    LlVar(usize),
    /// Three-digit length prefix, up to the given maximum
    LllVar(usize),
}

impl FieldLength {
    /// Maximum number of value characters
    pub fn max(&self) -> usize {
        match *self {
            FieldLength::Fixed(n) | FieldLength::LlVar(n) | FieldLength::LllVar(n) => n,
        }
    }

    fn prefix_digits(&self) -> usize {
        match self {
            FieldLength::Fixed(_) => 0,
            FieldLength::LlVar(_) => 2,
            FieldLength::LllVar(_) => 3,
        }
    }
}

/// Dictionary entry for one data element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub number: u8,
    pub name: &'static str,
    pub class: FieldClass,
    pub length: FieldLength,
}

impl FieldSpec {
    const fn new(number: u8, name: &'static str, class: FieldClass, length: FieldLength) -> Self {
        Self {
            number,
            name,
            class,
            length,
        }
    }

    /// Check `value` against the class and length rule without encoding it
    pub fn check(&self, value: &str) -> ProtocolResult<()> {
        if !value.is_ascii() || !self.class.admits(value) {
            return Err(ProtocolError::invalid_characters(
                self.number,
                value,
                self.class.notation(),
            ));
        }
        let max = self.length.max();
        if value.len() > max {
            return Err(ProtocolError::ValueTooLong {
                field: self.number,
                len: value.len(),
                max,
            });
        }
        Ok(())
    }

    /// Append the wire form of `value` to `buf`
    pub fn encode_into(&self, value: &str, buf: &mut BytesMut) -> ProtocolResult<()> {
        self.check(value)?;
        match self.length {
            FieldLength::Fixed(width) => {
                let pad = width - value.len();
                buf.reserve(width);
                if self.class == FieldClass::Numeric {
                    buf.put_bytes(self.class.pad_byte(), pad);
                    buf.put_slice(value.as_bytes());
                } else {
                    buf.put_slice(value.as_bytes());
                    buf.put_bytes(self.class.pad_byte(), pad);
                }
            }
            FieldLength::LlVar(_) => {
                buf.put_slice(format!("{:02}", value.len()).as_bytes());
                buf.put_slice(value.as_bytes());
            }
            FieldLength::LllVar(_) => {
                buf.put_slice(format!("{:03}", value.len()).as_bytes());
                buf.put_slice(value.as_bytes());
            }
        }
        Ok(())
    }

    /// Read one value starting at `offset`; returns the value and the offset past it
    pub fn decode_from(&self, data: &[u8], offset: usize) -> ProtocolResult<(String, usize)> {
        let available = data.len().saturating_sub(offset);
        let prefix_digits = self.length.prefix_digits();

        let (value_len, value_start) = match self.length {
            FieldLength::Fixed(width) => (width, offset),
            FieldLength::LlVar(max) | FieldLength::LllVar(max) => {
                let prefix = data
                    .get(offset..offset + prefix_digits)
                    .ok_or_else(|| {
                        ProtocolError::truncated_field(self.number, offset, prefix_digits, available)
                    })?;
                let declared = parse_length_prefix(prefix).ok_or_else(|| {
                    ProtocolError::InvalidLengthPrefix {
                        field: self.number,
                        offset,
                        prefix: String::from_utf8_lossy(prefix).into_owned(),
                    }
                })?;
                if declared > max {
                    return Err(ProtocolError::ValueTooLong {
                        field: self.number,
                        len: declared,
                        max,
                    });
                }
                (declared, offset + prefix_digits)
            }
        };

        let end = value_start + value_len;
        let raw = data.get(value_start..end).ok_or_else(|| {
            ProtocolError::truncated_field(
                self.number,
                value_start,
                value_len,
                data.len().saturating_sub(value_start),
            )
        })?;

        let value = std::str::from_utf8(raw)
            .map_err(|_| {
                ProtocolError::invalid_characters(
                    self.number,
                    &String::from_utf8_lossy(raw),
                    self.class.notation(),
                )
            })?
            .to_string();
        self.check(&value)?;
        Ok((value, end))
    }
}

fn parse_length_prefix(prefix: &[u8]) -> Option<usize> {
    if prefix.is_empty() || !prefix.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(prefix).ok()?.parse().ok()
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let length = match self.length {
            FieldLength::Fixed(n) => format!("{}", n),
            FieldLength::LlVar(n) => format!("LL..{}", n),
            FieldLength::LllVar(n) => format!("LLL..{}", n),
        };
        write!(
            f,
            "{:>3} {} ({} {})",
            self.number,
            self.name,
            self.class.notation(),
            length
        )
    }
}

use FieldClass::{AlphaNumeric as AN, AlphaNumericSpecial as ANS, Numeric as N, Track2 as Z};
use FieldLength::{Fixed, LlVar, LllVar};

const ISO87_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(2, "primary account number", N, LlVar(19)),
    FieldSpec::new(3, "processing code", N, Fixed(6)),
    FieldSpec::new(4, "transaction amount", N, Fixed(12)),
    FieldSpec::new(7, "transmission date and time", N, Fixed(10)),
    FieldSpec::new(11, "system trace audit number", N, Fixed(6)),
    FieldSpec::new(12, "local transaction time", N, Fixed(6)),
    FieldSpec::new(13, "local transaction date", N, Fixed(4)),
    FieldSpec::new(14, "expiration date", N, Fixed(4)),
    FieldSpec::new(17, "capture date", N, Fixed(4)),
    FieldSpec::new(18, "merchant category code", N, Fixed(4)),
    FieldSpec::new(22, "pos entry mode", N, Fixed(3)),
    FieldSpec::new(24, "network international identifier", N, Fixed(3)),
    FieldSpec::new(25, "pos condition code", N, Fixed(2)),
    FieldSpec::new(27, "approval code length", N, Fixed(1)),
    FieldSpec::new(32, "acquiring institution id", N, LlVar(11)),
    FieldSpec::new(35, "track 2 data", Z, LlVar(37)),
    FieldSpec::new(37, "retrieval reference number", ANS, Fixed(12)),
    FieldSpec::new(39, "response code", AN, Fixed(2)),
    FieldSpec::new(41, "card acceptor terminal id", ANS, Fixed(8)),
    FieldSpec::new(42, "card acceptor id", ANS, Fixed(15)),
    FieldSpec::new(43, "card acceptor name and location", ANS, Fixed(40)),
    FieldSpec::new(48, "additional data", ANS, LllVar(999)),
    FieldSpec::new(49, "currency code", AN, Fixed(3)),
    FieldSpec::new(60, "terminal type", ANS, LllVar(999)),
    FieldSpec::new(61, "card issuer", ANS, LllVar(999)),
    FieldSpec::new(63, "private data", ANS, LllVar(999)),
    FieldSpec::new(70, "network management information code", N, Fixed(3)),
    FieldSpec::new(121, "private use", ANS, LllVar(999)),
    FieldSpec::new(123, "private use", ANS, LllVar(999)),
    FieldSpec::new(126, "private use", ANS, LllVar(999)),
];

static ISO87: Lazy<FieldDictionary> = Lazy::new(|| FieldDictionary::from_specs(ISO87_FIELDS));

/// Immutable lookup table from field number to [`FieldSpec`]
#[derive(Debug)]
pub struct FieldDictionary {
    slots: Vec<Option<FieldSpec>>,
}

impl FieldDictionary {
    /// The process-wide ISO 8583:1987 dictionary used by the front ends
    pub fn iso87() -> &'static FieldDictionary {
        &ISO87
    }

    fn from_specs(specs: &[FieldSpec]) -> Self {
        let mut slots = vec![None; MAX_FIELD as usize + 1];
        for spec in specs {
            slots[spec.number as usize] = Some(*spec);
        }
        Self { slots }
    }

    /// Entry for `field`, if defined
    pub fn get(&self, field: u8) -> Option<&FieldSpec> {
        self.slots.get(field as usize).and_then(Option::as_ref)
    }

    /// Entry for `field`, or `UnknownField`
    pub fn spec(&self, field: u8) -> ProtocolResult<&FieldSpec> {
        self.get(field)
            .ok_or(ProtocolError::UnknownField { field })
    }

    /// Whether `field` has a dictionary entry
    pub fn contains(&self, field: u8) -> bool {
        self.get(field).is_some()
    }

    /// All entries in ascending field order
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.slots.iter().flatten()
    }
}
