//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// ```text
/// warning[W101]: net has 80 distinct coordinates (limit 64), left unoptimized
///   --> net 'mem_bus[3]'
///    = note: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint_header(&self, diag: &Diagnostic) -> String {
        let header = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return header;
        }
        let ansi = match diag.severity {
            crate::Severity::Error => "31",
            crate::Severity::Warning => "33",
            crate::Severity::Note => "36",
        };
        format!("\x1b[1;{ansi}m{header}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = format!("{}: {}\n", self.paint_header(diag), diag.message);

        if !diag.locus.is_design() {
            out.push_str(&format!("  --> {}\n", diag.locus));
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

/// Renders each diagnostic as one line of JSON.
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        // Serializing plain data with string keys cannot fail.
        serde_json::to_string(diag).unwrap_or_default() + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{NET_TOO_LARGE, PARTITION_ITERATION};
    use crate::locus::Locus;

    #[test]
    fn render_warning_with_locus_and_notes() {
        let diag = Diagnostic::warning(NET_TOO_LARGE, "net left unoptimized", Locus::Net("n7".into()))
            .with_note("80 distinct coordinates")
            .with_help("raise graph.max_nodes");
        let output = TerminalRenderer::new(false).render(&diag);

        assert!(output.contains("warning[W101]: net left unoptimized"));
        assert!(output.contains("--> net 'n7'"));
        assert!(output.contains("= note: 80 distinct coordinates"));
        assert!(output.contains("= help: raise graph.max_nodes"));
    }

    #[test]
    fn render_design_locus_has_no_location() {
        let diag = Diagnostic::note(PARTITION_ITERATION, "spread 12 -> 9", Locus::Design);
        let output = TerminalRenderer::new(false).render(&diag);
        assert!(output.contains("note[O201]: spread 12 -> 9"));
        assert!(!output.contains("-->"));
    }

    #[test]
    fn color_wraps_header() {
        let diag = Diagnostic::note(PARTITION_ITERATION, "x", Locus::Design);
        let output = TerminalRenderer::new(true).render(&diag);
        assert!(output.starts_with("\x1b[1;36m"));
    }

    #[test]
    fn json_is_one_line_and_parses() {
        let diag = Diagnostic::warning(NET_TOO_LARGE, "skipped", Locus::Site { x: 2, y: 3 });
        let output = JsonRenderer.render(&diag);
        assert_eq!(output.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(value["message"], "skipped");
        assert_eq!(value["severity"], "Warning");
    }
}
