use thiserror::Error;

use crate::diagnostics::{Diagnostic, ErrorCategory};
use crate::field_key::FieldKey;
use crate::visitor::VisitorState;

/// Traversal error returned by the visitor and the document walk
#[derive(Error, Debug)]
pub enum VisitError {
    /// First diagnostic recorded by a fail-fast validator
    #[error("{0}")]
    FailFast(Box<Diagnostic>),

    #[error("Cannot {event} in state: {state}")]
    IllegalTransition {
        state: VisitorState,
        event: &'static str,
    },

    #[error("Can only process DESCRIPTION, PARAM, FIELD, and DATA elements (found {element})")]
    UnsupportedElement { element: String },

    #[error("VOTABLE contains no TABLE")]
    MissingTable,

    #[error("Processing hook failed: {0}")]
    Hook(anyhow::Error),
}

/// Malformed compact attribute grammar (arraysize, precision, width)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Expected value '{value}' to match '{pattern}'")]
    Arraysize {
        value: String,
        pattern: &'static str,
    },

    #[error("Expected value '{value}' to match '{pattern}'")]
    Precision {
        value: String,
        pattern: &'static str,
    },

    #[error("Expected value '{value}' to be a non-negative integer")]
    Width { value: String },
}

/// A FIELD or PARAM attribute is invalid on its own or against its constraint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FieldFormatError {
    pub message: String,
}

impl FieldFormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A cell or PARAM value does not satisfy its datatype or constraint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FieldValueError {
    pub message: String,
}

impl FieldValueError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Building or merging constraints failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error(
        "Multiple field constraints matching {element} '{name}' have incompatible {key} attributes"
    )]
    Incompatible {
        element: &'static str,
        name: String,
        key: FieldKey,
    },

    #[error("Invalid constraint attribute '{attribute}': {source}")]
    InvalidAttribute {
        attribute: &'static str,
        #[source]
        source: ParseError,
    },

    #[error("Required {element} constraint ({description}) needs a 'name' or 'ucd' to report it as missing")]
    MissingPrimaryKey {
        element: &'static str,
        description: String,
    },
}

/// Validation of a single FIELD, PARAM or cell
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstanceError {
    #[error(transparent)]
    Format(#[from] FieldFormatError),

    #[error(transparent)]
    Value(#[from] FieldValueError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}

impl InstanceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            InstanceError::Value(_) => ErrorCategory::Value,
            InstanceError::Format(_) | InstanceError::Constraint(_) => ErrorCategory::Format,
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid constraints: {0}")]
    Constraint(#[from] ConstraintError),
}

impl From<Diagnostic> for VisitError {
    fn from(diagnostic: Diagnostic) -> Self {
        VisitError::FailFast(Box::new(diagnostic))
    }
}

impl From<anyhow::Error> for VisitError {
    /// Hooks that propagate a fail-fast diagnostic keep its identity
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Diagnostic>() {
            Ok(diagnostic) => VisitError::from(diagnostic),
            Err(err) => VisitError::Hook(err),
        }
    }
}

impl VisitError {
    /// The diagnostic that stopped a fail-fast run, if that is what happened
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            VisitError::FailFast(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VisitError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic() -> Diagnostic {
        Diagnostic {
            state: VisitorState::VisitingCell,
            location: "1st TD (FIELD 'flux') of 2nd TR".to_string(),
            category: ErrorCategory::Value,
            message: "Value 'abc' is not a 'double'".to_string(),
        }
    }

    #[test]
    fn test_visit_error_display() {
        let illegal = VisitError::IllegalTransition {
            state: VisitorState::Initial,
            event: "visit(Field)",
        };
        assert_eq!(illegal.to_string(), "Cannot visit(Field) in state: INITIAL");

        let unsupported = VisitError::UnsupportedElement {
            element: "GROUP".to_string(),
        };
        assert!(unsupported.to_string().contains("GROUP"));

        let fail_fast = VisitError::from(diagnostic());
        assert_eq!(
            fail_fast.to_string(),
            "Error in 1st TD (FIELD 'flux') of 2nd TR : Value 'abc' is not a 'double'"
        );
        assert_eq!(fail_fast.diagnostic(), Some(&diagnostic()));
    }

    #[test]
    fn test_constraint_error_display() {
        let incompatible = ConstraintError::Incompatible {
            element: "FIELD",
            name: "flux".to_string(),
            key: FieldKey::Unit,
        };
        assert_eq!(
            incompatible.to_string(),
            "Multiple field constraints matching FIELD 'flux' have incompatible unit attributes"
        );

        let invalid = ConstraintError::InvalidAttribute {
            attribute: "maxarraysize",
            source: ParseError::Arraysize {
                value: "x".to_string(),
                pattern: r"(\d+)?(\*)?",
            },
        };
        assert!(invalid.to_string().contains("maxarraysize"));
        assert!(std::error::Error::source(&invalid).is_some());
    }

    #[test]
    fn test_instance_error_category() {
        let format: InstanceError = FieldFormatError::new("bad").into();
        let value: InstanceError = FieldValueError::new("bad").into();
        assert_eq!(format.category(), ErrorCategory::Format);
        assert_eq!(value.category(), ErrorCategory::Value);
        assert_eq!(value.to_string(), "bad");
    }

    #[test]
    fn test_hook_error_downcasts_diagnostic() {
        let err: VisitError = anyhow::Error::new(diagnostic()).into();
        assert!(matches!(err, VisitError::FailFast(_)));

        let err: VisitError = anyhow::anyhow!("catalogue lookup failed").into();
        match err {
            VisitError::Hook(inner) => assert_eq!(inner.to_string(), "catalogue lookup failed"),
            other => panic!("Expected VisitError::Hook, got {:?}", other),
        }
    }

    #[test]
    fn test_config_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let config_error: ConfigError = json_err.into();
        assert!(config_error.to_string().contains("JSON parsing error"));
    }
}
