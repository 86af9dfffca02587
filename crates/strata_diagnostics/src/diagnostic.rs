//! Structured diagnostic messages with severity, codes, and design loci.

use crate::code::{Category, DiagnosticCode};
use crate::locus::Locus;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A structured diagnostic message.
///
/// Each diagnostic carries a severity, a code, the main message, the
/// [`Locus`] it applies to, and optional notes and help text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The part of the design this diagnostic refers to.
    pub locus: Locus,
    /// Explanatory footnotes (e.g., "note: ...").
    pub notes: Vec<String>,
    /// Actionable suggestions (e.g., "help: ...").
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        locus: Locus,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            locus,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, locus: Locus) -> Self {
        Self::with_severity(Severity::Error, code, message, locus)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, locus: Locus) -> Self {
        Self::with_severity(Severity::Warning, code, message, locus)
    }

    /// Creates a new progress note.
    pub fn note(code: DiagnosticCode, message: impl Into<String>, locus: Locus) -> Self {
        Self::with_severity(Severity::Note, code, message, locus)
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

/// A net exceeded the coordinate ceiling and was left unoptimized.
pub const NET_TOO_LARGE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 101);
/// A site could not be renormalized after relaxation.
pub const RENORMALIZE_SKIPPED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 102);
/// Summary of one partition-refiner iteration.
pub const PARTITION_ITERATION: DiagnosticCode = DiagnosticCode::new(Category::Optimization, 201);
/// A refinement iteration regressed and was rolled back.
pub const ROLLBACK: DiagnosticCode = DiagnosticCode::new(Category::Optimization, 202);
/// Summary of one relaxation-refiner iteration.
pub const RELAX_ITERATION: DiagnosticCode = DiagnosticCode::new(Category::Optimization, 203);
/// Summary of physical realization.
pub const REALIZATION: DiagnosticCode = DiagnosticCode::new(Category::Optimization, 204);
/// A fatal error reported at the command boundary.
pub const FATAL: DiagnosticCode = DiagnosticCode::new(Category::Error, 301);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_warning() {
        let diag = Diagnostic::warning(NET_TOO_LARGE, "net skipped", Locus::Net("n1".into()));
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.message, "net skipped");
        assert_eq!(format!("{}", diag.code), "W101");
    }

    #[test]
    fn create_note() {
        let diag = Diagnostic::note(PARTITION_ITERATION, "spread 40 -> 32", Locus::Design);
        assert_eq!(diag.severity, Severity::Note);
        assert_eq!(format!("{}", diag.code), "O201");
    }

    #[test]
    fn builder_methods() {
        let diag = Diagnostic::error(FATAL, "missing sub-block", Locus::Site { x: 1, y: 1 })
            .with_note("plane 3 must move to plane 5")
            .with_help("check the packing record");
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
        assert!(diag.severity.is_error());
    }
}
