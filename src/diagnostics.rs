//! Diagnostics recorded during a traversal and the scoped store that holds
//! them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::field_key::FieldKey;
use crate::visitor::VisitorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// The table's shape is wrong: extra or missing cells, duplicate names
    Structural,
    /// A FIELD or PARAM attribute is invalid
    Format,
    /// A cell or PARAM value is invalid
    Value,
    /// A required constraint matched nothing
    Missing,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Structural => "structural",
            ErrorCategory::Format => "format",
            ErrorCategory::Value => "value",
            ErrorCategory::Missing => "missing",
        };
        f.write_str(label)
    }
}

/// A single validation finding, tied to where in the document it arose
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Error in {location} : {message}")]
pub struct Diagnostic {
    pub state: VisitorState,
    pub location: String,
    pub category: ErrorCategory,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        state: VisitorState,
        location: impl Into<String>,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            state,
            location: location.into(),
            category,
            message: message.into(),
        }
    }
}

/// Identifies a PARAM or FIELD by one of its attributes, e.g. `NAME:flux`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey {
    pub key: FieldKey,
    pub value: String,
}

impl ElementKey {
    pub fn new(key: FieldKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::new(FieldKey::Name, value)
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.key.attribute_name().to_uppercase(),
            self.value
        )
    }
}

/// Diagnostics grouped by key, keeping first-recorded order of the keys
#[derive(Debug, Clone)]
struct Scoped<K> {
    entries: Vec<(K, Vec<Diagnostic>)>,
}

impl<K> Default for Scoped<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: PartialEq> Scoped<K> {
    fn push(&mut self, key: K, diagnostic: Diagnostic) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, diagnostics)) => diagnostics.push(diagnostic),
            None => self.entries.push((key, vec![diagnostic])),
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.entries.iter().any(|(existing, _)| existing == key)
    }

    fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().flat_map(|(_, diagnostics)| diagnostics)
    }

    fn len(&self) -> usize {
        self.entries.iter().map(|(_, diagnostics)| diagnostics.len()).sum()
    }
}

/// Per-scope counts of recorded diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub table: usize,
    pub params: usize,
    pub fields: usize,
    pub rows: usize,
    pub cells: usize,
}

impl ErrorCounts {
    pub fn total(&self) -> usize {
        self.table + self.params + self.fields + self.rows + self.cells
    }
}

/// Error store for one traversal.
///
/// In fail-fast mode nothing is stored: every `record_*` call hands the
/// diagnostic straight back as an `Err` so the caller can abort.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    fail_fast: bool,
    table: Vec<Diagnostic>,
    params: Scoped<ElementKey>,
    fields: Scoped<ElementKey>,
    rows: BTreeMap<usize, Vec<Diagnostic>>,
    cells: BTreeMap<usize, Scoped<String>>,
}

type Recorded = std::result::Result<(), Diagnostic>;

impl ErrorLog {
    pub fn new(fail_fast: bool) -> Self {
        Self {
            fail_fast,
            ..Self::default()
        }
    }

    pub fn is_fail_fast(&self) -> bool {
        self.fail_fast
    }

    fn intercept(&self, scope: &str, diagnostic: &Diagnostic) -> bool {
        debug!(scope, %diagnostic, "recorded validation error");
        self.fail_fast
    }

    /// Table errors are deduplicated by message
    pub fn record_table_error(&mut self, diagnostic: Diagnostic) -> Recorded {
        if self.intercept("table", &diagnostic) {
            return Err(diagnostic);
        }
        if !self
            .table
            .iter()
            .any(|existing| existing.message == diagnostic.message)
        {
            self.table.push(diagnostic);
        }
        Ok(())
    }

    pub fn record_param_error(&mut self, key: ElementKey, diagnostic: Diagnostic) -> Recorded {
        if self.intercept("param", &diagnostic) {
            return Err(diagnostic);
        }
        self.params.push(key, diagnostic);
        Ok(())
    }

    pub fn record_field_error(&mut self, key: ElementKey, diagnostic: Diagnostic) -> Recorded {
        if self.intercept("field", &diagnostic) {
            return Err(diagnostic);
        }
        self.fields.push(key, diagnostic);
        Ok(())
    }

    pub fn record_row_error(&mut self, row: usize, diagnostic: Diagnostic) -> Recorded {
        if self.intercept("row", &diagnostic) {
            return Err(diagnostic);
        }
        self.rows.entry(row).or_default().push(diagnostic);
        Ok(())
    }

    pub fn record_cell_error(
        &mut self,
        row: usize,
        field_name: &str,
        diagnostic: Diagnostic,
    ) -> Recorded {
        if self.intercept("cell", &diagnostic) {
            return Err(diagnostic);
        }
        self.cells
            .entry(row)
            .or_default()
            .push(format!("name:{}", field_name), diagnostic);
        Ok(())
    }

    pub fn has_table_errors(&self) -> bool {
        !self.table.is_empty()
    }

    pub fn has_errors_for_param(&self, key: &ElementKey) -> bool {
        self.params.contains(key)
    }

    pub fn has_errors_for_field(&self, key: &ElementKey) -> bool {
        self.fields.contains(key)
    }

    pub fn has_errors_for_row(&self, row: usize) -> bool {
        self.rows.contains_key(&row)
    }

    pub fn has_errors_for_cell(&self, row: usize, field_name: &str) -> bool {
        let key = format!("name:{}", field_name);
        self.cells
            .get(&row)
            .is_some_and(|cells| cells.contains(&key))
    }

    pub fn has_cell_errors_in_row(&self, row: usize) -> bool {
        self.cells.contains_key(&row)
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    /// All diagnostics: table, PARAM and FIELD errors, then row by row.
    ///
    /// A row with row-level errors reports only those; otherwise its cell
    /// errors are reported.
    pub fn errors(&self) -> Vec<&Diagnostic> {
        let mut errors: Vec<&Diagnostic> = self.table.iter().collect();
        errors.extend(self.params.diagnostics());
        errors.extend(self.fields.diagnostics());

        let mut rows: Vec<usize> = self.rows.keys().chain(self.cells.keys()).copied().collect();
        rows.sort_unstable();
        rows.dedup();
        for row in rows {
            match self.rows.get(&row) {
                Some(row_errors) => errors.extend(row_errors),
                None => {
                    if let Some(cells) = self.cells.get(&row) {
                        errors.extend(cells.diagnostics());
                    }
                }
            }
        }
        errors
    }

    pub fn counts(&self) -> ErrorCounts {
        ErrorCounts {
            table: self.table.len(),
            params: self.params.len(),
            fields: self.fields.len(),
            rows: self.rows.values().map(Vec::len).sum(),
            cells: self.cells.values().map(Scoped::len).sum(),
        }
    }
}
