//! The attributes a constraint can pin down, and how each one is matched,
//! merged and enforced.
//!
//! Every key is described by a row in [`KEY_TABLE`]; the behaviour of a key
//! is fully determined by its row.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::arraysize::Arraysize;
use crate::document::Attributes;
use crate::error::{FieldFormatError, FieldValueError};
use crate::precision::Precision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKey {
    Name,
    Id,
    Ucd,
    Datatype,
    Ref,
    Unit,
    Arraysize,
    Width,
    Precision,
}

type Extractor = fn(&Attributes) -> Option<Cow<'_, str>>;

/// How a key combines across constraints and how it is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Values must agree exactly
    Exact,
    /// Value is an upper bound on the arraysize
    MaxArraysize,
    /// Value is an upper bound on the width
    MaxWidth,
    /// Value is an upper bound on the precision
    MaxPrecision,
}

struct KeyProperties {
    identifying: bool,
    required: bool,
    attribute: &'static str,
    extract: Extractor,
    rule: Rule,
}

const KEY_TABLE: [KeyProperties; 9] = [
    KeyProperties {
        identifying: true,
        required: true,
        attribute: "name",
        extract: extract_name,
        rule: Rule::Exact,
    },
    KeyProperties {
        identifying: true,
        required: true,
        attribute: "id",
        extract: extract_id,
        rule: Rule::Exact,
    },
    KeyProperties {
        identifying: true,
        required: true,
        attribute: "ucd",
        extract: extract_ucd,
        rule: Rule::Exact,
    },
    KeyProperties {
        identifying: true,
        required: false,
        attribute: "datatype",
        extract: extract_datatype,
        rule: Rule::Exact,
    },
    KeyProperties {
        identifying: false,
        required: false,
        attribute: "ref",
        extract: extract_ref,
        rule: Rule::Exact,
    },
    KeyProperties {
        identifying: false,
        required: false,
        attribute: "unit",
        extract: extract_unit,
        rule: Rule::Exact,
    },
    KeyProperties {
        identifying: false,
        required: false,
        attribute: "arraysize",
        extract: extract_arraysize,
        rule: Rule::MaxArraysize,
    },
    KeyProperties {
        identifying: false,
        required: false,
        attribute: "width",
        extract: extract_width,
        rule: Rule::MaxWidth,
    },
    KeyProperties {
        identifying: false,
        required: false,
        attribute: "precision",
        extract: extract_precision,
        rule: Rule::MaxPrecision,
    },
];

fn borrowed(value: &Option<String>) -> Option<Cow<'_, str>> {
    value.as_deref().map(Cow::Borrowed)
}

fn extract_name(attributes: &Attributes) -> Option<Cow<'_, str>> {
    borrowed(&attributes.name)
}

fn extract_id(attributes: &Attributes) -> Option<Cow<'_, str>> {
    borrowed(&attributes.id)
}

fn extract_ucd(attributes: &Attributes) -> Option<Cow<'_, str>> {
    borrowed(&attributes.ucd)
}

fn extract_datatype(attributes: &Attributes) -> Option<Cow<'_, str>> {
    attributes
        .datatype
        .as_deref()
        .map(|datatype| Cow::Owned(datatype.to_lowercase()))
}

fn extract_ref(attributes: &Attributes) -> Option<Cow<'_, str>> {
    borrowed(&attributes.reference)
}

fn extract_unit(attributes: &Attributes) -> Option<Cow<'_, str>> {
    borrowed(&attributes.unit)
}

fn extract_arraysize(attributes: &Attributes) -> Option<Cow<'_, str>> {
    borrowed(&attributes.arraysize)
}

fn extract_width(attributes: &Attributes) -> Option<Cow<'_, str>> {
    attributes.width.map(|width| Cow::Owned(width.to_string()))
}

fn extract_precision(attributes: &Attributes) -> Option<Cow<'_, str>> {
    borrowed(&attributes.precision)
}

/// Outcome of combining two constraint values for the same key
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Merged {
    Keep,
    Replace(String),
    Conflict,
}

impl FieldKey {
    pub const ALL: [FieldKey; 9] = [
        FieldKey::Name,
        FieldKey::Id,
        FieldKey::Ucd,
        FieldKey::Datatype,
        FieldKey::Ref,
        FieldKey::Unit,
        FieldKey::Arraysize,
        FieldKey::Width,
        FieldKey::Precision,
    ];

    fn properties(self) -> &'static KeyProperties {
        &KEY_TABLE[self as usize]
    }

    /// Identifying keys decide whether a constraint applies to an element
    pub fn is_identifying(self) -> bool {
        self.properties().identifying
    }

    /// Required keys must all match for a constraint to apply
    pub fn is_required(self) -> bool {
        self.properties().required
    }

    /// The VOTABLE attribute this key reads
    pub fn attribute_name(self) -> &'static str {
        self.properties().attribute
    }

    /// The key's value on a FIELD or PARAM, normalised for comparison
    pub fn value_of(self, attributes: &Attributes) -> Option<Cow<'_, str>> {
        (self.properties().extract)(attributes)
    }

    /// Combine the value already held for this key with an incoming one
    pub(crate) fn merge(self, held: Option<&str>, incoming: Option<&str>) -> Merged {
        let (held, incoming) = match (held, incoming) {
            (_, None) => return Merged::Keep,
            (None, Some(incoming)) => return Merged::Replace(incoming.to_string()),
            (Some(held), Some(incoming)) => (held, incoming),
        };
        if held == incoming {
            return Merged::Keep;
        }

        match self.properties().rule {
            Rule::Exact => Merged::Conflict,
            Rule::MaxArraysize => match (Arraysize::parse(held), Arraysize::parse(incoming)) {
                (Ok(held), Ok(incoming)) => held
                    .narrowed_by(&incoming)
                    .map_or(Merged::Keep, |narrowed| Merged::Replace(narrowed.value().to_string())),
                _ => Merged::Conflict,
            },
            Rule::MaxWidth => match (held.parse::<u64>(), incoming.parse::<u64>()) {
                (Ok(held), Ok(incoming)) if incoming < held => Merged::Replace(incoming.to_string()),
                (Ok(_), Ok(_)) => Merged::Keep,
                _ => Merged::Conflict,
            },
            Rule::MaxPrecision => match (Precision::parse(held), Precision::parse(incoming)) {
                (Ok(held), Ok(incoming)) => match held.is_more_precise_than(&incoming) {
                    Some(true) => Merged::Replace(incoming.value().to_string()),
                    Some(false) => Merged::Keep,
                    None => Merged::Conflict,
                },
                _ => Merged::Conflict,
            },
        }
    }

    /// Check a FIELD or PARAM attribute against the constraint value `expected`
    pub fn validate_attribute(
        self,
        attributes: &Attributes,
        expected: &str,
    ) -> Result<(), FieldFormatError> {
        let actual = self
            .value_of(attributes)
            .filter(|actual| !actual.trim().is_empty());
        let key = self.attribute_name();

        match self.properties().rule {
            Rule::Exact => match actual {
                None => Err(FieldFormatError::new(format!(
                    "Attribute '{}' is required and must be '{}'",
                    key, expected
                ))),
                Some(actual) if actual != expected => Err(FieldFormatError::new(format!(
                    "Attribute '{}' ('{}') must be '{}'",
                    key, actual, expected
                ))),
                Some(_) => Ok(()),
            },
            Rule::MaxArraysize => {
                let (Some(actual), Ok(max)) = (actual, Arraysize::parse(expected)) else {
                    return Ok(());
                };
                match Arraysize::parse(&actual) {
                    Ok(arraysize) if arraysize.definitely_exceeds(&max) => {
                        Err(FieldFormatError::new(format!(
                            "Attribute 'arraysize' ('{}') exceeds maximum of '{}'",
                            actual, expected
                        )))
                    }
                    _ => Ok(()),
                }
            }
            Rule::MaxWidth => {
                let (Some(width), Ok(max)) = (attributes.width, expected.parse::<i64>()) else {
                    return Ok(());
                };
                if width > max {
                    Err(FieldFormatError::new(format!(
                        "Attribute 'width' ('{}') is greater than maximum of '{}'",
                        width, expected
                    )))
                } else {
                    Ok(())
                }
            }
            Rule::MaxPrecision => {
                let (Some(actual), Ok(max)) = (actual, Precision::parse(expected)) else {
                    return Ok(());
                };
                let Ok(precision) = Precision::parse(&actual) else {
                    return Ok(());
                };
                match precision.is_more_precise_than(&max) {
                    None => Err(FieldFormatError::new(format!(
                        "Attribute 'precision' ('{}') must specify a number of {}",
                        actual,
                        max.kind().description()
                    ))),
                    Some(true) => Err(FieldFormatError::new(format!(
                        "Attribute 'precision' ('{}') is more precise than maximum {}",
                        actual,
                        max.description()
                    ))),
                    Some(false) => Ok(()),
                }
            }
        }
    }

    /// Check a cell or PARAM value for the bound this key imposes.
    ///
    /// The element's own attribute wins; the constraint value `bound` is the
    /// fallback when the element leaves the bound open. Keys with no value
    /// rule accept everything.
    pub fn validate_value(
        self,
        attributes: &Attributes,
        bound: Option<&str>,
        value: &str,
    ) -> Result<(), FieldValueError> {
        match self.properties().rule {
            Rule::Exact => Ok(()),
            Rule::MaxArraysize => {
                let own = attributes
                    .arraysize
                    .as_deref()
                    .filter(|arraysize| !arraysize.is_empty())
                    .and_then(|arraysize| Arraysize::parse(arraysize).ok())
                    .filter(|arraysize| arraysize.has_maximum());
                let (arraysize, prefix) = match own {
                    Some(arraysize) => (arraysize, ""),
                    None => match bound.and_then(|bound| Arraysize::parse(bound).ok()) {
                        Some(arraysize) => (arraysize, "maximum "),
                        None => return Ok(()),
                    },
                };
                if arraysize.exceeded_by_value(value) {
                    Err(FieldValueError::new(format!(
                        "Value '{}' is wider than {}{} chars",
                        value,
                        prefix,
                        arraysize.value()
                    )))
                } else {
                    Ok(())
                }
            }
            Rule::MaxWidth => {
                let (width, prefix) = match attributes.width {
                    Some(width) => (width, ""),
                    None => match bound.and_then(|bound| bound.parse::<i64>().ok()) {
                        Some(width) => (width, "maximum "),
                        None => return Ok(()),
                    },
                };
                if value.chars().count() as i64 > width {
                    Err(FieldValueError::new(format!(
                        "Value '{}' is wider than {}{} chars",
                        value, prefix, width
                    )))
                } else {
                    Ok(())
                }
            }
            Rule::MaxPrecision => {
                let own = attributes
                    .precision
                    .as_deref()
                    .filter(|precision| !precision.is_empty())
                    .and_then(|precision| Precision::parse(precision).ok());
                let (precision, prefix) = match own {
                    Some(precision) => (precision, ""),
                    None => match bound.and_then(|bound| Precision::parse(bound).ok()) {
                        Some(precision) => (precision, "maximum "),
                        None => return Ok(()),
                    },
                };
                if precision.exceeded_by_value(value) {
                    Err(FieldValueError::new(format!(
                        "Value '{}' is more precise than {}{}",
                        value,
                        prefix,
                        precision.description()
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_name())
    }
}
