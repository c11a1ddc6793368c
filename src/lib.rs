//! # validate-votable Library
//!
//! A validating traversal engine for VOTABLE documents. A
//! [`ValidatingVisitor`] walks a parsed table, checks PARAMs, FIELDs and
//! cells against their declared datatypes and a caller-supplied
//! [`ConstraintSet`], records scoped diagnostics, and hands clean rows to a
//! [`RowProcessor`].

pub mod arraysize;
pub mod config;
pub mod constraint;
pub mod datatype;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod field_key;
pub mod precision;
pub mod report;
pub mod visitor;

pub use arraysize::Arraysize;
pub use config::{Config, ConfigManager, OutputFormatConfig, ValidationConfig};
pub use constraint::{
    ConstraintDescriptor, ConstraintDescriptors, ConstraintSet, FieldConstraint, ParamConstraint,
};
pub use datatype::FieldDatatype;
pub use diagnostics::{Diagnostic, ElementKey, ErrorCategory, ErrorCounts, ErrorLog};
pub use document::{
    Attributes, Cell, Data, Field, Param, Row, Table, TableElement, Visitable, VoTable,
    VoTableVisitor,
};
pub use error::{
    ConfigError, ConstraintError, FieldFormatError, FieldValueError, ParseError, VisitError,
};
pub use field_key::FieldKey;
pub use precision::{Precision, PrecisionKind};
pub use report::{ErrorReporter, ValidationSummary, VerbosityLevel};
pub use visitor::{
    HookContext, RowProcessor, RowValues, ValidatingVisitor, VisitorAction, VisitorState, validate,
};
