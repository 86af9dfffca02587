//! Diagnostic creation, severity management, and rendering.
//!
//! The optimizer reports policy decisions (skipped nets, rollbacks, per-pass
//! summaries) as structured [`Diagnostic`]s pointing at a [`Locus`] in the
//! design. The thread-safe [`DiagnosticSink`] accumulates them during a run and
//! [`DiagnosticRenderer`] implementations format them for the terminal or JSON.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod locus;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use locus::Locus;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
