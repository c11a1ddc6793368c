//! The validating traversal engine.
//!
//! [`ValidatingVisitor`] is a state machine driven by [`VoTableVisitor`]
//! events. It validates PARAMs and FIELDs as they arrive, checks every cell
//! against its FIELD, and hands clean rows to a [`RowProcessor`]. Errors go
//! to an [`ErrorLog`] scoped by table, PARAM, FIELD, row and cell; in
//! fail-fast mode the first error aborts the traversal instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, trace};

use crate::config::ValidationConfig;
use crate::constraint::{ConstraintSet, FieldConstraint};
use crate::datatype::{self, FieldDatatype};
use crate::diagnostics::{Diagnostic, ElementKey, ErrorCategory, ErrorLog};
use crate::document::{Cell, Field, Param, Row, Table, Visitable, VoTable, VoTableVisitor};
use crate::error::{InstanceError, Result, VisitError};
use crate::report::ValidationSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitorState {
    Initial,
    VisitingTable,
    VisitingFieldsAndParams,
    VisitingRow,
    VisitingCell,
    Stopped,
}

impl fmt::Display for VisitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VisitorState::Initial => "INITIAL",
            VisitorState::VisitingTable => "VISITING_TABLE",
            VisitorState::VisitingFieldsAndParams => "VISITING_FIELDS_AND_PARAMS",
            VisitorState::VisitingRow => "VISITING_ROW",
            VisitorState::VisitingCell => "VISITING_CELL",
            VisitorState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// The event being handled when a diagnostic is raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitorAction {
    VisitTable,
    VisitParam,
    VisitField,
    VisitRow,
    VisitCell,
    Stop,
}

impl VisitorAction {
    pub fn event(self) -> &'static str {
        match self {
            VisitorAction::VisitTable => "visit(Table)",
            VisitorAction::VisitParam => "visit(Param)",
            VisitorAction::VisitField => "visit(Field)",
            VisitorAction::VisitRow => "visit(Tr)",
            VisitorAction::VisitCell => "visit(Td)",
            VisitorAction::Stop => "stop()",
        }
    }
}

/// English ordinal: 1st, 2nd, 3rd, 4th, 11th, 12th, 13th, 21st, ...
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Converted values of one clean row, in FIELD order
#[derive(Debug, Clone, PartialEq)]
pub struct RowValues<'a> {
    index: usize,
    entries: Vec<(&'a Field, Option<String>)>,
}

impl<'a> RowValues<'a> {
    /// Zero-based row index within the table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Converted value of the named FIELD; `None` for null or unknown names
    pub fn get(&self, field_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(field, _)| field.name() == field_name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a Field, Option<&str>)> + '_ {
        self.entries
            .iter()
            .map(|(field, value)| (*field, value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// View of the error log handed to processing hooks
pub struct HookContext<'a> {
    log: &'a mut ErrorLog,
    state: VisitorState,
    row: Option<usize>,
}

impl<'a> HookContext<'a> {
    pub fn state(&self) -> VisitorState {
        self.state
    }

    /// Zero-based index of the row being processed, if any
    pub fn row_index(&self) -> Option<usize> {
        self.row
    }

    pub fn has_table_errors(&self) -> bool {
        self.log.has_table_errors()
    }

    pub fn has_errors_for_param(&self, name: &str) -> bool {
        self.log.has_errors_for_param(&ElementKey::name(name))
    }

    pub fn has_errors_for_param_key(&self, key: &ElementKey) -> bool {
        self.log.has_errors_for_param(key)
    }

    pub fn has_errors_for_field(&self, name: &str) -> bool {
        self.log.has_errors_for_field(&ElementKey::name(name))
    }

    pub fn has_errors_for_field_key(&self, key: &ElementKey) -> bool {
        self.log.has_errors_for_field(key)
    }

    pub fn has_errors_for_row(&self, row: usize) -> bool {
        self.log.has_errors_for_row(row)
    }

    pub fn has_errors_for_cell(&self, row: usize, field_name: &str) -> bool {
        self.log.has_errors_for_cell(row, field_name)
    }

    pub fn record_param_error(
        &mut self,
        name: &str,
        message: impl Into<String>,
    ) -> std::result::Result<(), Diagnostic> {
        let diagnostic = Diagnostic::new(
            self.state,
            format!("PARAM '{}'", name),
            ErrorCategory::Value,
            message,
        );
        self.log.record_param_error(ElementKey::name(name), diagnostic)
    }

    pub fn record_field_error(
        &mut self,
        name: &str,
        message: impl Into<String>,
    ) -> std::result::Result<(), Diagnostic> {
        let diagnostic = Diagnostic::new(
            self.state,
            format!("FIELD '{}'", name),
            ErrorCategory::Value,
            message,
        );
        self.log.record_field_error(ElementKey::name(name), diagnostic)
    }

    /// Record against the current row, or the table outside row processing
    pub fn record_row_error(
        &mut self,
        message: impl Into<String>,
    ) -> std::result::Result<(), Diagnostic> {
        match self.row {
            Some(row) => {
                let diagnostic = Diagnostic::new(
                    self.state,
                    format!("{} TR", ordinal(row + 1)),
                    ErrorCategory::Value,
                    message,
                );
                self.log.record_row_error(row, diagnostic)
            }
            None => {
                let diagnostic =
                    Diagnostic::new(self.state, "TABLE", ErrorCategory::Value, message);
                self.log.record_table_error(diagnostic)
            }
        }
    }
}

/// Consumer of validated PARAMs, FIELDs and rows.
///
/// Each hook runs once per phase: `process_params` and `process_fields`
/// when the PARAM/FIELD section ends, `process_row` for every row without
/// errors. Returning a [`Diagnostic`] through `anyhow` (for instance from a
/// fail-fast `record_*` call) aborts the traversal with that diagnostic.
pub trait RowProcessor {
    fn process_params(
        &mut self,
        _params: &[Param],
        _context: &mut HookContext<'_>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn process_fields(
        &mut self,
        _fields: &[Field],
        _context: &mut HookContext<'_>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn process_row(
        &mut self,
        _row: &RowValues<'_>,
        _context: &mut HookContext<'_>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Validation only
impl RowProcessor for () {}

/// Effective rules for one accepted FIELD
#[derive(Debug, Clone)]
struct FieldRules {
    constraint: FieldConstraint,
    datatype: Option<FieldDatatype>,
}

pub struct ValidatingVisitor<P: RowProcessor = ()> {
    constraints: ConstraintSet,
    processor: P,
    log: ErrorLog,
    state: VisitorState,
    params: Vec<Param>,
    fields: Vec<Field>,
    rules: Vec<FieldRules>,
    header_finished: bool,
    current_row: Vec<String>,
    row_overflowed: bool,
    rows_visited: usize,
    cells_visited: usize,
    rows_processed: usize,
}

impl ValidatingVisitor<()> {
    /// Validation-only visitor that accumulates errors
    pub fn new(constraints: ConstraintSet) -> Self {
        Self::with_processor(constraints, ())
    }
}

impl<P: RowProcessor> ValidatingVisitor<P> {
    pub fn with_processor(constraints: ConstraintSet, processor: P) -> Self {
        Self {
            constraints,
            processor,
            log: ErrorLog::new(false),
            state: VisitorState::Initial,
            params: Vec::new(),
            fields: Vec::new(),
            rules: Vec::new(),
            header_finished: false,
            current_row: Vec::new(),
            row_overflowed: false,
            rows_visited: 0,
            cells_visited: 0,
            rows_processed: 0,
        }
    }

    pub fn from_config(config: &ValidationConfig, constraints: ConstraintSet, processor: P) -> Self {
        Self::with_processor(constraints, processor).fail_fast(config.fail_fast)
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.log = ErrorLog::new(fail_fast);
        self
    }

    /// Walk a whole document through this visitor
    pub fn run(&mut self, votable: &VoTable) -> Result<()> {
        votable.accept(self)
    }

    pub fn state(&self) -> VisitorState {
        self.state
    }

    pub fn is_fail_fast(&self) -> bool {
        self.log.is_fail_fast()
    }

    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.log.errors()
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.log
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn rows_visited(&self) -> usize {
        self.rows_visited
    }

    pub fn rows_processed(&self) -> usize {
        self.rows_processed
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn into_processor(self) -> P {
        self.processor
    }

    /// Storage width of an accepted FIELD, see [`FieldDatatype::storage_width`]
    pub fn storage_width(&self, field_name: &str) -> Option<u64> {
        let position = self.fields.iter().position(|f| f.name() == field_name)?;
        let rules = &self.rules[position];
        rules
            .datatype?
            .storage_width(&self.fields[position].attributes, &rules.constraint)
    }

    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            state: self.state,
            rows_visited: self.rows_visited,
            rows_processed: self.rows_processed,
            counts: self.log.counts(),
            diagnostics: self.log.errors().into_iter().cloned().collect(),
        }
    }

    fn transition(&mut self, next: VisitorState) {
        trace!(from = %self.state, to = %next, "visitor transition");
        self.state = next;
    }

    fn illegal(&self, action: VisitorAction) -> VisitError {
        VisitError::IllegalTransition {
            state: self.state,
            event: action.event(),
        }
    }

    fn location(&self, action: VisitorAction, name: &str) -> String {
        match action {
            VisitorAction::VisitTable => "TABLE".to_string(),
            VisitorAction::VisitParam => format!("PARAM '{}'", name),
            VisitorAction::VisitField => format!("FIELD '{}'", name),
            VisitorAction::VisitRow => format!("{} TR", ordinal(self.rows_visited)),
            VisitorAction::VisitCell => {
                let field_info = match self.cells_visited.checked_sub(1).and_then(|i| self.fields.get(i)) {
                    Some(field) => format!(" (FIELD '{}')", field.name()),
                    None => String::new(),
                };
                format!(
                    "{} TD{} of {} TR",
                    ordinal(self.cells_visited),
                    field_info,
                    ordinal(self.rows_visited)
                )
            }
            VisitorAction::Stop => "VOTABLE".to_string(),
        }
    }

    fn diagnostic(
        &self,
        action: VisitorAction,
        name: &str,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Diagnostic {
        Diagnostic::new(self.state, self.location(action, name), category, message)
    }

    fn current_row_index(&self) -> usize {
        self.rows_visited.saturating_sub(1)
    }

    fn record_multiple_tables(&mut self) -> Result<()> {
        let diagnostic = self.diagnostic(
            VisitorAction::VisitTable,
            "",
            ErrorCategory::Structural,
            "Multiple TABLEs not supported",
        );
        Ok(self.log.record_table_error(diagnostic)?)
    }

    fn accumulate_param(&mut self, param: &Param) -> Result<()> {
        let name = param.name();
        if name.trim().is_empty() {
            let diagnostic = self.diagnostic(
                VisitorAction::VisitTable,
                "",
                ErrorCategory::Structural,
                "Table has one or more PARAMs with a blank 'name' attribute",
            );
            return Ok(self.log.record_table_error(diagnostic)?);
        }
        if self.params.iter().any(|existing| existing.name() == name) {
            let diagnostic = self.diagnostic(
                VisitorAction::VisitTable,
                "",
                ErrorCategory::Structural,
                format!("Table contains more than one PARAM named '{}'", name),
            );
            return Ok(self.log.record_param_error(ElementKey::name(name), diagnostic)?);
        }

        self.params.push(param.clone());
        if let Err(err) = self.check_param(param) {
            let diagnostic =
                self.diagnostic(VisitorAction::VisitParam, name, err.category(), err.to_string());
            self.log.record_param_error(ElementKey::name(name), diagnostic)?;
        }
        Ok(())
    }

    fn check_param(&self, param: &Param) -> std::result::Result<(), InstanceError> {
        let constraint = self.constraints.effective_param_constraint(param)?;
        let datatype = datatype::validate_instance(param, &constraint)?;
        let value = param.value.trim();
        if !value.is_empty() {
            datatype.validate_value(&param.attributes, &constraint, value)?;
        }
        Ok(())
    }

    fn accumulate_field(&mut self, field: &Field) -> Result<()> {
        let name = field.name();
        if name.trim().is_empty() {
            let diagnostic = self.diagnostic(
                VisitorAction::VisitTable,
                "",
                ErrorCategory::Structural,
                "Table has one or more FIELDs with a blank 'name' attribute",
            );
            self.log.record_table_error(diagnostic)?;
        } else if name.eq_ignore_ascii_case("id") {
            let diagnostic = self.diagnostic(
                VisitorAction::VisitTable,
                "",
                ErrorCategory::Structural,
                format!("Table contains a FIELD named '{}'", name),
            );
            self.log.record_field_error(ElementKey::name(name), diagnostic)?;
        } else if self.fields.iter().any(|existing| existing.name() == name) {
            let diagnostic = self.diagnostic(
                VisitorAction::VisitTable,
                "",
                ErrorCategory::Structural,
                format!("Table contains more than one FIELD named '{}'", name),
            );
            return Ok(self.log.record_field_error(ElementKey::name(name), diagnostic)?);
        }

        self.fields.push(field.clone());
        let (rules, outcome) = match self.constraints.effective_field_constraint(field) {
            Ok(constraint) => match datatype::validate_instance(field, &constraint) {
                Ok(datatype) => (
                    FieldRules {
                        constraint,
                        datatype: Some(datatype),
                    },
                    Ok(()),
                ),
                Err(err) => (
                    FieldRules {
                        constraint,
                        datatype: FieldDatatype::for_attributes(&field.attributes).ok(),
                    },
                    Err(InstanceError::from(err)),
                ),
            },
            Err(err) => (
                FieldRules {
                    constraint: FieldConstraint::new(),
                    datatype: FieldDatatype::for_attributes(&field.attributes).ok(),
                },
                Err(InstanceError::from(err)),
            ),
        };
        self.rules.push(rules);

        if let Err(err) = outcome {
            let diagnostic =
                self.diagnostic(VisitorAction::VisitField, name, err.category(), err.to_string());
            self.log.record_field_error(ElementKey::name(name), diagnostic)?;
        }
        Ok(())
    }

    fn header_finished(&mut self) -> Result<()> {
        if self.header_finished {
            return Ok(());
        }
        self.header_finished = true;
        self.params_finished()?;
        self.fields_finished()
    }

    fn params_finished(&mut self) -> Result<()> {
        for missing in self.constraints.missing_params(&self.params) {
            let diagnostic = self.diagnostic(
                VisitorAction::VisitTable,
                "",
                ErrorCategory::Missing,
                format!("Missing PARAM matching {}", missing.description),
            );
            self.log
                .record_param_error(ElementKey::new(missing.key, missing.value), diagnostic)?;
        }
        debug!(params = self.params.len(), "PARAMs finished");

        let mut context = HookContext {
            log: &mut self.log,
            state: self.state,
            row: None,
        };
        self.processor.process_params(&self.params, &mut context)?;
        Ok(())
    }

    fn fields_finished(&mut self) -> Result<()> {
        for missing in self.constraints.missing_fields(&self.fields) {
            let diagnostic = self.diagnostic(
                VisitorAction::VisitTable,
                "",
                ErrorCategory::Missing,
                format!("Missing FIELD matching {}", missing.description),
            );
            self.log
                .record_field_error(ElementKey::new(missing.key, missing.value), diagnostic)?;
        }
        debug!(fields = self.fields.len(), "FIELDs finished");

        let mut context = HookContext {
            log: &mut self.log,
            state: self.state,
            row: None,
        };
        self.processor.process_fields(&self.fields, &mut context)?;
        Ok(())
    }

    fn begin_row(&mut self) {
        self.rows_visited += 1;
        self.cells_visited = 0;
        self.row_overflowed = false;
        self.current_row.clear();
    }

    fn accumulate_cell(&mut self, cell: &Cell) -> Result<()> {
        self.cells_visited += 1;
        let row = self.current_row_index();

        let position = self.current_row.len();
        if position >= self.fields.len() {
            if !self.row_overflowed {
                self.row_overflowed = true;
                let diagnostic = self.diagnostic(
                    VisitorAction::VisitRow,
                    "",
                    ErrorCategory::Structural,
                    "Additional TD",
                );
                self.log.record_row_error(row, diagnostic)?;
            }
            return Ok(());
        }

        self.current_row.push(cell.value.clone());
        let value = cell.value.trim();
        let rules = &self.rules[position];
        let Some(datatype) = rules.datatype else {
            return Ok(());
        };
        if value.is_empty() {
            return Ok(());
        }
        let field = &self.fields[position];
        if let Err(err) = datatype.validate_value(&field.attributes, &rules.constraint, value) {
            let field_name = field.name().to_string();
            let diagnostic = self.diagnostic(
                VisitorAction::VisitCell,
                "",
                ErrorCategory::Value,
                err.to_string(),
            );
            self.log.record_cell_error(row, &field_name, diagnostic)?;
        }
        Ok(())
    }

    fn row_finished(&mut self) -> Result<()> {
        let row = self.current_row_index();
        if self.current_row.len() < self.fields.len() {
            let diagnostic = self.diagnostic(
                VisitorAction::VisitRow,
                "",
                ErrorCategory::Structural,
                "Missing TD",
            );
            self.log.record_row_error(row, diagnostic)?;
            return Ok(());
        }

        let has_errors = self.log.has_errors_for_row(row)
            || self.fields.iter().any(|field| {
                self.log.has_errors_for_field(&ElementKey::name(field.name()))
                    || self.log.has_errors_for_cell(row, field.name())
            });
        if has_errors {
            debug!(row, "skipping row with errors");
            return Ok(());
        }

        let entries = self
            .fields
            .iter()
            .zip(&self.rules)
            .zip(&self.current_row)
            .map(|((field, rules), raw)| {
                let value = match rules.datatype {
                    Some(datatype) => datatype.convert_value(raw),
                    None => Some(raw.trim().to_string()).filter(|v| !v.is_empty()),
                };
                (field, value)
            })
            .collect();
        let values = RowValues {
            index: row,
            entries,
        };
        let mut context = HookContext {
            log: &mut self.log,
            state: self.state,
            row: Some(row),
        };
        self.processor.process_row(&values, &mut context)?;
        self.rows_processed += 1;
        debug!(row, "row processed");
        Ok(())
    }
}

impl<P: RowProcessor> VoTableVisitor for ValidatingVisitor<P> {
    fn visit_table(&mut self, _table: &Table) -> Result<()> {
        match self.state {
            VisitorState::Initial => {
                info!(
                    fail_fast = self.log.is_fail_fast(),
                    "starting VOTABLE validation"
                );
            }
            VisitorState::VisitingTable => self.record_multiple_tables()?,
            VisitorState::VisitingFieldsAndParams => {
                self.header_finished()?;
                self.record_multiple_tables()?;
            }
            VisitorState::VisitingRow | VisitorState::VisitingCell => {
                self.row_finished()?;
                self.record_multiple_tables()?;
            }
            VisitorState::Stopped => return Err(self.illegal(VisitorAction::VisitTable)),
        }
        self.transition(VisitorState::VisitingTable);
        Ok(())
    }

    fn visit_param(&mut self, param: &Param) -> Result<()> {
        match self.state {
            VisitorState::VisitingTable | VisitorState::VisitingFieldsAndParams => {
                self.transition(VisitorState::VisitingFieldsAndParams);
                self.accumulate_param(param)
            }
            _ => Err(self.illegal(VisitorAction::VisitParam)),
        }
    }

    fn visit_field(&mut self, field: &Field) -> Result<()> {
        match self.state {
            VisitorState::VisitingTable | VisitorState::VisitingFieldsAndParams => {
                self.transition(VisitorState::VisitingFieldsAndParams);
                self.accumulate_field(field)
            }
            _ => Err(self.illegal(VisitorAction::VisitField)),
        }
    }

    fn visit_row(&mut self, _row: &Row) -> Result<()> {
        match self.state {
            VisitorState::VisitingTable | VisitorState::VisitingFieldsAndParams => {
                self.header_finished()?;
            }
            VisitorState::VisitingRow | VisitorState::VisitingCell => self.row_finished()?,
            VisitorState::Initial | VisitorState::Stopped => {
                return Err(self.illegal(VisitorAction::VisitRow));
            }
        }
        self.transition(VisitorState::VisitingRow);
        self.begin_row();
        Ok(())
    }

    fn visit_cell(&mut self, cell: &Cell) -> Result<()> {
        match self.state {
            VisitorState::VisitingRow | VisitorState::VisitingCell => {
                self.accumulate_cell(cell)?;
                self.transition(VisitorState::VisitingCell);
                Ok(())
            }
            _ => Err(self.illegal(VisitorAction::VisitCell)),
        }
    }

    fn stop(&mut self) -> Result<()> {
        match self.state {
            VisitorState::VisitingTable | VisitorState::VisitingFieldsAndParams => {
                self.header_finished()?
            }
            VisitorState::VisitingRow | VisitorState::VisitingCell => self.row_finished()?,
            VisitorState::Initial | VisitorState::Stopped => {
                return Err(self.illegal(VisitorAction::Stop));
            }
        }
        self.transition(VisitorState::Stopped);
        info!(
            rows = self.rows_visited,
            processed = self.rows_processed,
            errors = self.log.counts().total(),
            "finished VOTABLE validation"
        );
        Ok(())
    }
}

/// Validate a document without processing hooks.
///
/// In fail-fast mode the first diagnostic comes back as
/// [`VisitError::FailFast`]; otherwise every diagnostic is in the summary.
pub fn validate(
    votable: &VoTable,
    constraints: ConstraintSet,
    config: &ValidationConfig,
) -> Result<ValidationSummary> {
    let mut visitor = ValidatingVisitor::from_config(config, constraints, ());
    visitor.run(votable)?;
    Ok(visitor.summary())
}
