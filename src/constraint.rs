//! Caller-supplied expectations about FIELDs and PARAMs.
//!
//! A constraint is a sparse map from [`FieldKey`] to a string value. Keys
//! marked identifying decide which elements a constraint applies to; the
//! remaining keys are enforced on the elements it applies to. Every
//! constraint that applies to an element is merged into one effective
//! constraint before validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::warn;

use crate::arraysize::Arraysize;
use crate::document::{Attributes, Field, Param};
use crate::error::{ConstraintError, FieldFormatError, ParseError};
use crate::field_key::{FieldKey, Merged};
use crate::precision::Precision;

/// The kind of element a constraint targets
pub trait ConstraintTarget: Debug + Clone + Copy + Default + PartialEq + Eq {
    type Instance: AsRef<Attributes>;

    /// Element name used in messages, `"FIELD"` or `"PARAM"`
    const ELEMENT: &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldTarget;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParamTarget;

impl ConstraintTarget for FieldTarget {
    type Instance = Field;
    const ELEMENT: &'static str = "FIELD";
}

impl ConstraintTarget for ParamTarget {
    type Instance = Param;
    const ELEMENT: &'static str = "PARAM";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint<T: ConstraintTarget> {
    values: BTreeMap<FieldKey, String>,
    optional: bool,
    target: PhantomData<T>,
}

pub type FieldConstraint = Constraint<FieldTarget>;
pub type ParamConstraint = Constraint<ParamTarget>;

impl<T: ConstraintTarget> Default for Constraint<T> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            optional: false,
            target: PhantomData,
        }
    }
}

impl<T: ConstraintTarget> Constraint<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: FieldKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    /// Set or clear the value for `key`.
    ///
    /// Values are trimmed and a blank value clears the key. Datatypes are
    /// lowercased; bound values must parse as arraysize, width or precision.
    pub fn set(&mut self, key: FieldKey, value: Option<&str>) -> Result<(), ConstraintError> {
        let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
            self.values.remove(&key);
            return Ok(());
        };
        let normalized = match key {
            FieldKey::Datatype => value.to_lowercase(),
            FieldKey::Arraysize => Arraysize::parse(value)
                .map_err(|source| invalid("maxarraysize", source))?
                .value()
                .to_string(),
            FieldKey::Width => value
                .parse::<u64>()
                .map_err(|_| {
                    invalid(
                        "maxwidth",
                        ParseError::Width {
                            value: value.to_string(),
                        },
                    )
                })?
                .to_string(),
            FieldKey::Precision => Precision::parse(value)
                .map_err(|source| invalid("maxprecision", source))?
                .value()
                .to_string(),
            _ => value.to_string(),
        };
        self.values.insert(key, normalized);
        Ok(())
    }

    /// Infallible setter for keys that take free text
    fn with_text(mut self, key: FieldKey, value: &str) -> Self {
        match value.trim() {
            "" => {
                self.values.remove(&key);
            }
            trimmed if key == FieldKey::Datatype => {
                self.values.insert(key, trimmed.to_lowercase());
            }
            trimmed => {
                self.values.insert(key, trimmed.to_string());
            }
        }
        self
    }

    pub fn with_name(self, name: &str) -> Self {
        self.with_text(FieldKey::Name, name)
    }

    pub fn with_id(self, id: &str) -> Self {
        self.with_text(FieldKey::Id, id)
    }

    pub fn with_ucd(self, ucd: &str) -> Self {
        self.with_text(FieldKey::Ucd, ucd)
    }

    pub fn with_datatype(self, datatype: &str) -> Self {
        self.with_text(FieldKey::Datatype, datatype)
    }

    pub fn with_ref(self, reference: &str) -> Self {
        self.with_text(FieldKey::Ref, reference)
    }

    pub fn with_unit(self, unit: &str) -> Self {
        self.with_text(FieldKey::Unit, unit)
    }

    pub fn with_max_arraysize(mut self, arraysize: &str) -> Result<Self, ConstraintError> {
        self.set(FieldKey::Arraysize, Some(arraysize))?;
        Ok(self)
    }

    pub fn with_max_width(mut self, width: &str) -> Result<Self, ConstraintError> {
        self.set(FieldKey::Width, Some(width))?;
        Ok(self)
    }

    pub fn with_max_precision(mut self, precision: &str) -> Result<Self, ConstraintError> {
        self.set(FieldKey::Precision, Some(precision))?;
        Ok(self)
    }

    /// Mark the constraint as one whose absence is not an error
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn set_optional(&mut self, optional: bool) {
        self.optional = optional;
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &str)> {
        self.values.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Whether some identifying and required key is set
    pub fn is_matching_instance_required(&self) -> bool {
        self.values.keys().any(|key| key.is_identifying() && key.is_required())
    }

    /// Whether this constraint applies to `instance`.
    ///
    /// An empty constraint applies to everything. If any required
    /// identifying key is set, all of them must match; otherwise any
    /// matching optional identifying key is enough.
    pub fn is_applicable_to_instance(&self, instance: &T::Instance) -> bool {
        self.is_applicable_to(instance.as_ref())
    }

    pub fn is_applicable_to(&self, attributes: &Attributes) -> bool {
        if self.values.is_empty() {
            return true;
        }
        let matches = |(key, expected): (&FieldKey, &String)| {
            key.value_of(attributes)
                .is_some_and(|actual| actual == expected.as_str())
        };
        if self.is_matching_instance_required() {
            self.values
                .iter()
                .filter(|(key, _)| key.is_identifying() && key.is_required())
                .all(matches)
        } else {
            self.values
                .iter()
                .filter(|(key, _)| key.is_identifying() && !key.is_required())
                .any(matches)
        }
    }

    /// Check every constrained attribute of an instance this constraint
    /// applies to; the first failing key is reported
    pub fn validate_instance(&self, instance: &T::Instance) -> Result<(), FieldFormatError> {
        self.validate_attributes(instance.as_ref())
    }

    pub fn validate_attributes(&self, attributes: &Attributes) -> Result<(), FieldFormatError> {
        for (key, expected) in self.iter() {
            key.validate_attribute(attributes, expected)?;
        }
        Ok(())
    }

    /// Fold `other` into this constraint, narrowing bounds
    pub fn merge_in(&mut self, other: &Self, instance_name: &str) -> Result<(), ConstraintError> {
        for key in FieldKey::ALL {
            match key.merge(self.get(key), other.get(key)) {
                Merged::Keep => {}
                Merged::Replace(value) => {
                    self.values.insert(key, value);
                }
                Merged::Conflict => {
                    return Err(ConstraintError::Incompatible {
                        element: T::ELEMENT,
                        name: instance_name.to_string(),
                        key,
                    });
                }
            }
        }
        Ok(())
    }

    /// The key used to report this constraint as missing: name, else ucd
    pub fn primary_key(&self) -> Option<FieldKey> {
        [FieldKey::Name, FieldKey::Ucd]
            .into_iter()
            .find(|key| self.values.contains_key(key))
    }

    /// `name: 'flux'`, or `ucd: 'phot.flux'` when no name is set
    pub fn simple_description(&self) -> String {
        match self.primary_key().or_else(|| self.values.keys().next().copied()) {
            Some(key) => format!("{}: '{}'", key, self.values[&key]),
            None => "any".to_string(),
        }
    }
}

fn invalid(attribute: &'static str, source: ParseError) -> ConstraintError {
    ConstraintError::InvalidAttribute { attribute, source }
}

/// Serialized form of a single constraint, as found in constraint files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstraintDescriptor {
    pub name: Option<String>,
    pub id: Option<String>,
    pub ucd: Option<String>,
    pub datatype: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub unit: Option<String>,
    pub maxarraysize: Option<String>,
    pub maxwidth: Option<String>,
    pub maxprecision: Option<String>,
    pub optional: bool,
}

impl<T: ConstraintTarget> TryFrom<&ConstraintDescriptor> for Constraint<T> {
    type Error = ConstraintError;

    fn try_from(descriptor: &ConstraintDescriptor) -> Result<Self, Self::Error> {
        let mut constraint = Constraint::new();
        let entries = [
            (FieldKey::Name, &descriptor.name),
            (FieldKey::Id, &descriptor.id),
            (FieldKey::Ucd, &descriptor.ucd),
            (FieldKey::Datatype, &descriptor.datatype),
            (FieldKey::Ref, &descriptor.reference),
            (FieldKey::Unit, &descriptor.unit),
            (FieldKey::Arraysize, &descriptor.maxarraysize),
            (FieldKey::Width, &descriptor.maxwidth),
            (FieldKey::Precision, &descriptor.maxprecision),
        ];
        for (key, value) in entries {
            constraint.set(key, value.as_deref())?;
        }
        constraint.set_optional(descriptor.optional);
        Ok(constraint)
    }
}

/// Constraint lists as loaded from TOML or JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintDescriptors {
    pub params: Vec<ConstraintDescriptor>,
    pub fields: Vec<ConstraintDescriptor>,
}

/// A required PARAM or FIELD constraint nothing in the table satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingConstraint {
    pub key: FieldKey,
    pub value: String,
    pub description: String,
}

/// Immutable set of PARAM and FIELD constraints for one traversal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    params: Vec<ParamConstraint>,
    fields: Vec<FieldConstraint>,
}

impl ConstraintSet {
    /// Build a set, rejecting required constraints that could never be
    /// reported as missing because they have no name or ucd
    pub fn new(
        params: Vec<ParamConstraint>,
        fields: Vec<FieldConstraint>,
    ) -> Result<Self, ConstraintError> {
        check_primary_keys(&params)?;
        check_primary_keys(&fields)?;
        Ok(Self { params, fields })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: &ConstraintDescriptors) -> Result<Self, ConstraintError> {
        let params = descriptors
            .params
            .iter()
            .map(ParamConstraint::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let fields = descriptors
            .fields
            .iter()
            .map(FieldConstraint::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(params, fields)
    }

    pub fn params(&self) -> &[ParamConstraint] {
        &self.params
    }

    pub fn fields(&self) -> &[FieldConstraint] {
        &self.fields
    }

    /// Merge every PARAM constraint applicable to `param`
    pub fn effective_param_constraint(
        &self,
        param: &Param,
    ) -> Result<ParamConstraint, ConstraintError> {
        effective(&self.params, param)
    }

    /// Merge every FIELD constraint applicable to `field`
    pub fn effective_field_constraint(
        &self,
        field: &Field,
    ) -> Result<FieldConstraint, ConstraintError> {
        effective(&self.fields, field)
    }

    pub fn missing_params(&self, params: &[Param]) -> Vec<MissingConstraint> {
        missing(&self.params, params)
    }

    pub fn missing_fields(&self, fields: &[Field]) -> Vec<MissingConstraint> {
        missing(&self.fields, fields)
    }
}

fn check_primary_keys<T: ConstraintTarget>(
    constraints: &[Constraint<T>],
) -> Result<(), ConstraintError> {
    for constraint in constraints {
        if constraint.is_matching_instance_required()
            && !constraint.is_optional()
            && constraint.primary_key().is_none()
        {
            return Err(ConstraintError::MissingPrimaryKey {
                element: T::ELEMENT,
                description: constraint.simple_description(),
            });
        }
    }
    Ok(())
}

fn effective<T: ConstraintTarget>(
    constraints: &[Constraint<T>],
    instance: &T::Instance,
) -> Result<Constraint<T>, ConstraintError> {
    let name = instance.as_ref().name();
    let mut merged = Constraint::new();
    for constraint in constraints
        .iter()
        .filter(|constraint| constraint.is_applicable_to_instance(instance))
    {
        if let Err(err) = merged.merge_in(constraint, name) {
            warn!(element = T::ELEMENT, name, "{}", err);
            return Err(err);
        }
    }
    Ok(merged)
}

fn missing<T: ConstraintTarget>(
    constraints: &[Constraint<T>],
    instances: &[T::Instance],
) -> Vec<MissingConstraint> {
    constraints
        .iter()
        .filter(|constraint| constraint.is_matching_instance_required() && !constraint.is_optional())
        .filter(|constraint| {
            !instances
                .iter()
                .any(|instance| constraint.is_applicable_to_instance(instance))
        })
        .filter_map(|constraint| {
            let key = constraint.primary_key()?;
            Some(MissingConstraint {
                key,
                value: constraint.get(key)?.to_string(),
                description: constraint.simple_description(),
            })
        })
        .collect()
}
