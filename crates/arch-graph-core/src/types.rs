//! Rule violations and check results.

use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};

use crate::importer::ImportDiagnostic;

/// Severity level for rule violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message, does not fail the check.
    Info,
    /// Warning that should be addressed.
    Warning,
    /// Error that must be fixed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Where a violation was found: a class and, when known, a source line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Binary name of the offending class.
    pub class: String,
    /// Source file name from the class file, e.g. `OrderService.java`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Source line, for violations raised by method bodies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Location {
    /// A location naming only the class.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            class: name.into(),
            source_file: None,
            line: None,
        }
    }

    /// Sets the source file name.
    #[must_use]
    pub fn with_source_file(mut self, file: Option<impl Into<String>>) -> Self {
        self.source_file = file.map(Into::into);
        self
    }

    /// Sets the line; 0 means unknown and is dropped.
    #[must_use]
    pub fn with_line(mut self, line: Option<u32>) -> Self {
        self.line = line.filter(|l| *l > 0);
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class)?;
        match (&self.source_file, self.line) {
            (Some(file), Some(line)) => write!(f, " ({file}:{line})"),
            (Some(file), None) => write!(f, " ({file})"),
            (None, Some(line)) => write!(f, " (line {line})"),
            (None, None) => Ok(()),
        }
    }
}

/// A rule violation found during a check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Rule code (e.g., "LAYER001").
    pub code: String,
    /// Rule name (e.g., "layer-dependency").
    pub rule: String,
    /// Severity of this violation.
    pub severity: Severity,
    /// Offending class.
    pub location: Location,
    /// Human-readable message.
    pub message: String,
    /// Optional hint for fixing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Reference to a design document (e.g., "ARCHITECTURE.md L85").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_ref: Option<String>,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        rule: impl Into<String>,
        severity: Severity,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            rule: rule.into(),
            severity,
            location,
            message: message.into(),
            suggestion: None,
            doc_ref: None,
        }
    }

    /// Adds a design document reference.
    #[must_use]
    pub fn with_doc_ref(mut self, doc_ref: impl Into<String>) -> Self {
        self.doc_ref = Some(doc_ref.into());
        self
    }

    /// Adds a fix hint.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Formats the violation for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = format!("{} {} at {}\n", self.code, self.rule, self.location);
        let _ = writeln!(output, "  {}: {}", self.severity, self.message);
        if let Some(suggestion) = &self.suggestion {
            let _ = writeln!(output, "  = help: {suggestion}");
        }
        if let Some(doc_ref) = &self.doc_ref {
            let _ = writeln!(output, "  = see: {doc_ref}");
        }
        output
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [{}] {}",
            self.location, self.severity, self.code, self.message
        )?;
        if let Some(doc_ref) = &self.doc_ref {
            write!(f, " (see: {doc_ref})")?;
        }
        Ok(())
    }
}

/// A violation as a miette diagnostic, for rich terminal rendering.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{message}")]
pub struct ViolationDiagnostic {
    message: String,
    #[help]
    help: Option<String>,
}

impl From<&Violation> for ViolationDiagnostic {
    fn from(v: &Violation) -> Self {
        let help = match (&v.suggestion, &v.doc_ref) {
            (Some(s), Some(d)) => Some(format!("{s} (see: {d})")),
            (Some(s), None) => Some(s.clone()),
            (None, Some(d)) => Some(format!("see: {d}")),
            (None, None) => None,
        };
        Self {
            message: format!("[{}] {}: {}", v.code, v.location, v.message),
            help,
        }
    }
}

/// Result of checking a graph against a set of rules.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LintResult {
    /// All violations found.
    pub violations: Vec<Violation>,
    /// Number of imported classes checked.
    pub classes_checked: usize,
    /// Problems recorded while importing.
    #[serde(default)]
    pub import_diagnostics: Vec<ImportDiagnostic>,
}

impl LintResult {
    /// Creates a new empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.has_violations_at(Severity::Error)
    }

    /// Returns violations filtered by severity.
    #[must_use]
    pub fn by_severity(&self, severity: Severity) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .collect()
    }

    /// Counts violations by severity: (errors, warnings, infos).
    #[must_use]
    pub fn count_by_severity(&self) -> (usize, usize, usize) {
        self.violations
            .iter()
            .fold((0, 0, 0), |(e, w, i), v| match v.severity {
                Severity::Error => (e + 1, w, i),
                Severity::Warning => (e, w + 1, i),
                Severity::Info => (e, w, i + 1),
            })
    }

    /// Prints a summary report to stdout.
    pub fn print_report(&self) {
        for violation in &self.violations {
            println!("{}", violation.format());
        }
        println!("\n{}", self.summary());
    }

    /// One-line totals.
    #[must_use]
    pub fn summary(&self) -> String {
        let (errors, warnings, infos) = self.count_by_severity();
        format!(
            "Found {errors} error(s), {warnings} warning(s), {infos} info(s) in {} class(es)",
            self.classes_checked
        )
    }

    /// Formats violations at or above `fail_on` as a test failure report,
    /// suitable for `panic!()` messages in `cargo test`.
    #[must_use]
    pub fn format_test_report(&self, fail_on: Severity) -> String {
        use std::fmt::Write;

        let failing: Vec<&Violation> = self
            .violations
            .iter()
            .filter(|v| v.severity >= fail_on)
            .collect();

        let mut report = String::new();
        let _ = writeln!(
            report,
            "\n=== arch-graph: {} violation(s) ===\n",
            failing.len()
        );
        for v in &failing {
            let _ = writeln!(report, "{}", v.format());
        }
        let _ = writeln!(report, "{}", self.summary());
        report
    }

    /// Checks if any violations meet or exceed the given severity threshold.
    #[must_use]
    pub fn has_violations_at(&self, severity: Severity) -> bool {
        self.violations.iter().any(|v| v.severity >= severity)
    }

    /// Adds violations and diagnostics from another result.
    pub fn extend(&mut self, other: Self) {
        self.violations.extend(other.violations);
        self.classes_checked += other.classes_checked;
        self.import_diagnostics.extend(other.import_diagnostics);
    }
}
