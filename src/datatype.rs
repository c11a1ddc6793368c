//! Supported VOTABLE datatypes and their attribute, value and storage rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::arraysize::Arraysize;
use crate::constraint::{Constraint, ConstraintTarget};
use crate::document::Attributes;
use crate::error::{FieldFormatError, FieldValueError};
use crate::field_key::FieldKey;
use crate::precision::Precision;

static BOOLEAN_REGEX: OnceLock<Regex> = OnceLock::new();
static BIT_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_boolean_regex() -> &'static Regex {
    BOOLEAN_REGEX.get_or_init(|| {
        Regex::new(r"^(?:0|1|t|f|true|false| |\?|\x00)$").expect("Failed to compile boolean regex")
    })
}

fn get_bit_regex() -> &'static Regex {
    BIT_REGEX.get_or_init(|| Regex::new(r"^[01 ]*$").expect("Failed to compile bit regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldDatatype {
    #[serde(rename = "char")]
    Char,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "short")]
    Short,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "bit")]
    Bit,
    #[serde(rename = "unsignedByte")]
    UnsignedByte,
}

impl FieldDatatype {
    pub const ALL: [FieldDatatype; 9] = [
        FieldDatatype::Char,
        FieldDatatype::Boolean,
        FieldDatatype::Short,
        FieldDatatype::Int,
        FieldDatatype::Long,
        FieldDatatype::Float,
        FieldDatatype::Double,
        FieldDatatype::Bit,
        FieldDatatype::UnsignedByte,
    ];

    /// The datatype as written in a VOTABLE
    pub fn name(self) -> &'static str {
        match self {
            FieldDatatype::Char => "char",
            FieldDatatype::Boolean => "boolean",
            FieldDatatype::Short => "short",
            FieldDatatype::Int => "int",
            FieldDatatype::Long => "long",
            FieldDatatype::Float => "float",
            FieldDatatype::Double => "double",
            FieldDatatype::Bit => "bit",
            FieldDatatype::UnsignedByte => "unsignedByte",
        }
    }

    /// Look up the datatype declared by a FIELD or PARAM
    pub fn for_attributes(attributes: &Attributes) -> Result<Self, FieldFormatError> {
        match attributes.datatype.as_deref() {
            Some(datatype) if !datatype.trim().is_empty() => datatype.parse(),
            _ => Err(FieldFormatError::new("Attribute 'datatype' is required")),
        }
    }

    /// Check the element against its effective constraint, then the
    /// arraysize, width and precision attributes on their own terms
    pub fn validate_attributes<T: ConstraintTarget>(
        self,
        attributes: &Attributes,
        constraint: &Constraint<T>,
    ) -> Result<(), FieldFormatError> {
        constraint.validate_attributes(attributes)?;
        self.validate_arraysize_attribute(attributes, constraint)?;

        if attributes.width.is_some_and(|width| width < 0) {
            return Err(FieldFormatError::new(format!(
                "Attribute 'width' cannot be negative for datatype '{}'",
                self
            )));
        }

        if let Some(precision) = non_empty(&attributes.precision) {
            if Precision::parse(precision).is_err() {
                return Err(FieldFormatError::new(format!(
                    "Attribute 'precision' ('{}') does not match '{}'",
                    precision,
                    Precision::PATTERN
                )));
            }
        }
        Ok(())
    }

    /// Only CHAR gives arraysize a meaning; other datatypes may carry one
    /// solely when a constraint bounds it
    fn validate_arraysize_attribute<T: ConstraintTarget>(
        self,
        attributes: &Attributes,
        constraint: &Constraint<T>,
    ) -> Result<(), FieldFormatError> {
        let Some(arraysize) = non_empty(&attributes.arraysize) else {
            return Ok(());
        };
        if self != FieldDatatype::Char && constraint.get(FieldKey::Arraysize).is_none() {
            return Err(FieldFormatError::new(format!(
                "Attribute 'arraysize' ('{}') for datatype '{}' is not supported",
                arraysize, self
            )));
        }
        match Arraysize::parse(arraysize) {
            Ok(_) => Ok(()),
            Err(_) => Err(FieldFormatError::new(format!(
                "Attribute 'arraysize' ('{}') does not match '{}'",
                arraysize,
                Arraysize::PATTERN
            ))),
        }
    }

    /// Check a trimmed, non-empty cell or PARAM value
    pub fn validate_value<T: ConstraintTarget>(
        self,
        attributes: &Attributes,
        constraint: &Constraint<T>,
        value: &str,
    ) -> Result<(), FieldValueError> {
        let bound = |key: FieldKey| constraint.get(key);
        match self {
            FieldDatatype::Char => {
                FieldKey::Arraysize.validate_value(attributes, bound(FieldKey::Arraysize), value)
            }
            FieldDatatype::Boolean => {
                if get_boolean_regex().is_match(&value.to_lowercase()) {
                    Ok(())
                } else {
                    Err(self.not_a(value))
                }
            }
            FieldDatatype::Short => self.check_whole(value.parse::<i16>().is_ok(), attributes, constraint, value),
            FieldDatatype::Int => self.check_whole(value.parse::<i32>().is_ok(), attributes, constraint, value),
            FieldDatatype::Long => self.check_whole(value.parse::<i64>().is_ok(), attributes, constraint, value),
            FieldDatatype::UnsignedByte => self.check_whole(
                parse_unsigned_byte(value).is_some(),
                attributes,
                constraint,
                value,
            ),
            FieldDatatype::Float | FieldDatatype::Double => {
                let parsed = match self {
                    FieldDatatype::Float => value.parse::<f32>().is_ok(),
                    _ => value.parse::<f64>().is_ok(),
                };
                if !parsed {
                    return Err(self.not_a(value));
                }
                FieldKey::Width.validate_value(attributes, bound(FieldKey::Width), value)?;
                FieldKey::Precision.validate_value(attributes, bound(FieldKey::Precision), value)
            }
            FieldDatatype::Bit => {
                if !get_bit_regex().is_match(value) {
                    return Err(self.not_a(value));
                }
                let bits = value.replace(' ', "");
                match attributes.width.filter(|width| *width > 0) {
                    Some(width) if bits.len() as i64 > width => Err(FieldValueError::new(format!(
                        "Value '{}' is wider than {} bits",
                        value, width
                    ))),
                    _ => Ok(()),
                }
            }
        }
    }

    fn check_whole<T: ConstraintTarget>(
        self,
        parsed: bool,
        attributes: &Attributes,
        constraint: &Constraint<T>,
        value: &str,
    ) -> Result<(), FieldValueError> {
        if !parsed {
            return Err(self.not_a(value));
        }
        FieldKey::Width.validate_value(attributes, constraint.get(FieldKey::Width), value)
    }

    fn not_a(self, value: &str) -> FieldValueError {
        FieldValueError::new(format!("Value '{}' is not a '{}'", value, self))
    }

    /// Normalise a cell value for storage; `None` stands for null
    pub fn convert_value(self, value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        match self {
            FieldDatatype::Boolean => match trimmed.chars().next().map(|c| c.to_ascii_lowercase()) {
                Some('1') | Some('t') => Some("t".to_string()),
                Some('0') | Some('f') => Some("f".to_string()),
                _ => None,
            },
            FieldDatatype::Bit => Some(trimmed.replace(' ', "")),
            FieldDatatype::UnsignedByte => Some(
                parse_unsigned_byte(trimmed)
                    .map(|byte| byte.to_string())
                    .unwrap_or_else(|| trimmed.to_string()),
            ),
            _ => Some(trimmed.to_string()),
        }
    }

    /// Column width a store would need for this element, when one is known
    pub fn storage_width<T: ConstraintTarget>(
        self,
        attributes: &Attributes,
        constraint: &Constraint<T>,
    ) -> Option<u64> {
        match self {
            FieldDatatype::Char => non_empty(&attributes.arraysize)
                .and_then(|arraysize| Arraysize::parse(arraysize).ok())
                .and_then(|arraysize| arraysize.maximum())
                .or_else(|| {
                    constraint
                        .get(FieldKey::Arraysize)
                        .and_then(|max| Arraysize::parse(max).ok())
                        .and_then(|max| max.maximum())
                }),
            FieldDatatype::Bit => attributes
                .width
                .filter(|width| *width > 0)
                .and_then(|width| u64::try_from(width).ok()),
            _ => None,
        }
    }
}

impl FromStr for FieldDatatype {
    type Err = FieldFormatError;

    /// Case-insensitive lookup by VOTABLE name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FieldDatatype::ALL
            .into_iter()
            .find(|datatype| datatype.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| FieldFormatError::new(format!("Datatype '{}' is not supported", s)))
    }
}

impl fmt::Display for FieldDatatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Decimal or `0x`-prefixed hexadecimal in 0..=255
fn parse_unsigned_byte(value: &str) -> Option<u8> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed.ok().and_then(|number| u8::try_from(number).ok())
}

/// Datatype lookup plus attribute validation for a FIELD or PARAM
pub fn validate_instance<T: ConstraintTarget>(
    instance: &T::Instance,
    constraint: &Constraint<T>,
) -> Result<FieldDatatype, FieldFormatError> {
    let attributes = instance.as_ref();
    let datatype = FieldDatatype::for_attributes(attributes)?;
    datatype.validate_attributes(attributes, constraint)?;
    Ok(datatype)
}
