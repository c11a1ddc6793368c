//! Validation summaries and their human or JSON rendering.

use serde::{Deserialize, Serialize};

use crate::config::OutputFormatConfig;
use crate::diagnostics::{Diagnostic, ErrorCounts};
use crate::visitor::VisitorState;

/// Verbosity levels for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbosityLevel {
    /// Only list the errors
    Quiet,
    /// Outcome, row counts and errors
    Normal,
    /// Adds per-scope counts and error categories
    Verbose,
    /// Adds the visitor state each error was raised in
    Debug,
}

/// Outcome of one traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub state: VisitorState,
    pub rows_visited: usize,
    pub rows_processed: usize,
    pub counts: ErrorCounts,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationSummary {
    pub fn is_valid(&self) -> bool {
        self.counts.total() == 0
    }

    pub fn error_count(&self) -> usize {
        self.counts.total()
    }

    /// Rows not handed to the row processor because they had errors
    pub fn rows_skipped(&self) -> usize {
        self.rows_visited.saturating_sub(self.rows_processed)
    }
}

/// Error reporter with configurable verbosity
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
}

impl ErrorReporter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
        }
    }

    pub fn with_options(verbosity: VerbosityLevel, show_timestamps: bool) -> Self {
        Self {
            verbosity,
            show_timestamps,
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn render(
        &self,
        summary: &ValidationSummary,
        format: OutputFormatConfig,
    ) -> Result<String, serde_json::Error> {
        match format {
            OutputFormatConfig::Human => Ok(self.format_summary(summary)),
            OutputFormatConfig::Json => self.format_json(summary),
        }
    }

    pub fn format_json(&self, summary: &ValidationSummary) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(summary)
    }

    pub fn format_summary(&self, summary: &ValidationSummary) -> String {
        let mut output = String::new();

        if self.verbosity > VerbosityLevel::Quiet {
            let outcome = if summary.is_valid() { "VALID" } else { "INVALID" };
            output.push_str(&format!(
                "VOTABLE validation: {} ({} error{})\n",
                outcome,
                summary.error_count(),
                if summary.error_count() == 1 { "" } else { "s" }
            ));
            output.push_str(&format!("  Rows visited: {}\n", summary.rows_visited));
            output.push_str(&format!("  Rows processed: {}\n", summary.rows_processed));
        }

        if self.verbosity >= VerbosityLevel::Verbose {
            let counts = &summary.counts;
            output.push_str(&format!(
                "  Errors by scope: table={} params={} fields={} rows={} cells={}\n",
                counts.table, counts.params, counts.fields, counts.rows, counts.cells
            ));
        }

        for diagnostic in &summary.diagnostics {
            output.push_str(&self.format_diagnostic(diagnostic));
            output.push('\n');
        }

        output
    }

    pub fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let timestamp = if self.show_timestamps {
            format!("[{}] ", chrono::Utc::now().format("%H:%M:%S"))
        } else {
            String::new()
        };

        match self.verbosity {
            VerbosityLevel::Quiet | VerbosityLevel::Normal => {
                format!("{}{}", timestamp, diagnostic)
            }
            VerbosityLevel::Verbose => {
                format!("{}[{}] {}", timestamp, diagnostic.category, diagnostic)
            }
            VerbosityLevel::Debug => format!(
                "{}[{}] ({}) {}",
                timestamp, diagnostic.category, diagnostic.state, diagnostic
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorCategory;

    fn summary() -> ValidationSummary {
        ValidationSummary {
            state: VisitorState::Stopped,
            rows_visited: 3,
            rows_processed: 2,
            counts: ErrorCounts {
                cells: 1,
                ..ErrorCounts::default()
            },
            diagnostics: vec![Diagnostic::new(
                VisitorState::VisitingCell,
                "1st TD (FIELD 'mag') of 2nd TR",
                ErrorCategory::Value,
                "Value 'x' is not a 'float'",
            )],
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = summary();
        assert!(!summary.is_valid());
        assert_eq!(summary.error_count(), 1);
        assert_eq!(summary.rows_skipped(), 1);
    }

    #[test]
    fn test_quiet_lists_errors_only() {
        let reporter = ErrorReporter::new(VerbosityLevel::Quiet);
        assert_eq!(
            reporter.format_summary(&summary()),
            "Error in 1st TD (FIELD 'mag') of 2nd TR : Value 'x' is not a 'float'\n"
        );
    }

    #[test]
    fn test_normal_and_verbose_output() {
        let normal = ErrorReporter::new(VerbosityLevel::Normal).format_summary(&summary());
        assert!(normal.starts_with("VOTABLE validation: INVALID (1 error)\n"));
        assert!(normal.contains("Rows processed: 2"));
        assert!(!normal.contains("Errors by scope"));

        let verbose = ErrorReporter::new(VerbosityLevel::Verbose).format_summary(&summary());
        assert!(verbose.contains("cells=1"));
        assert!(verbose.contains("[value] Error in 1st TD"));

        let debug = ErrorReporter::new(VerbosityLevel::Debug).format_summary(&summary());
        assert!(debug.contains("[value] (VISITING_CELL) Error in"));
    }

    #[test]
    fn test_timestamps_prefix() {
        let reporter = ErrorReporter::with_options(VerbosityLevel::Normal, true);
        let line = reporter.format_diagnostic(&summary().diagnostics[0]);
        assert!(line.starts_with('['));
        assert_eq!(line.find("] Error in"), Some(9));
    }

    #[test]
    fn test_json_rendering() {
        let reporter = ErrorReporter::new(VerbosityLevel::Normal);
        let json = reporter.render(&summary(), OutputFormatConfig::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["state"], "STOPPED");
        assert_eq!(value["diagnostics"][0]["category"], "value");
        assert_eq!(value["diagnostics"][0]["state"], "VISITING_CELL");

        let parsed: ValidationSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary());
    }
}
