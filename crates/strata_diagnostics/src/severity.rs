//! How much a diagnostic matters to the outcome of a run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic. Later variants compare greater.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Iteration, rollback, and realization summaries.
    Note,
    /// A net or site the optimizer left as loaded.
    Warning,
    /// The run writes no output.
    Error,
}

impl Severity {
    /// Returns `true` for [`Severity::Error`].
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }

    /// Whether the CLI prints this severity under the given verbosity flags.
    ///
    /// Errors always show. `quiet` hides warnings and notes; notes otherwise
    /// need `verbose`.
    pub fn shown(self, quiet: bool, verbose: bool) -> bool {
        match self {
            Severity::Error => true,
            Severity::Warning => !quiet,
            Severity::Note => verbose && !quiet,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn display() {
        assert_eq!(Severity::Error.to_string(), "error");
        assert_eq!(Severity::Note.to_string(), "note");
    }

    #[test]
    fn verbosity_filter() {
        assert!(Severity::Error.shown(true, false));
        assert!(!Severity::Warning.shown(true, true));
        assert!(Severity::Warning.shown(false, false));
        assert!(!Severity::Note.shown(false, false));
        assert!(Severity::Note.shown(false, true));
        assert!(!Severity::Note.shown(true, true));
    }
}
