//! Collects what the optimizer reports while it runs.
//!
//! Every pass writes to one shared [`DiagnosticSink`]: skipped nets and sites
//! as warnings, iteration and rollback summaries as notes, and fatal design
//! problems as errors. The CLI renders the collection once the run is over.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Diagnostics of one optimizer run, in emission order.
///
/// Errors are also counted on the side so `has_errors` never takes the lock.
/// The sink is `Sync`; the refiners only need `&DiagnosticSink`.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_count: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
        }
    }

    /// Records one diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        if diag.severity.is_error() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.lock().push(diag);
    }

    // A poisoned lock only means another thread panicked mid-push.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether the run hit a fatal problem.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Errors emitted so far. Draining the sink does not reset it.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Nets and sites left unoptimized so far.
    pub fn warning_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Takes all diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Copies out every diagnostic emitted so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// How many diagnostics carry code number `number` (`202` for `O202`).
    pub fn count_code(&self, number: u16) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.code.number == number)
            .count()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{FATAL, NET_TOO_LARGE, ROLLBACK};
    use crate::locus::Locus;

    fn unknown_site() -> Diagnostic {
        Diagnostic::error(FATAL, "no site at (4, 9)", Locus::Site { x: 4, y: 9 })
    }

    fn skipped_net() -> Diagnostic {
        Diagnostic::warning(
            NET_TOO_LARGE,
            "net 'clk' has 5000 nodes",
            Locus::Net("clk".into()),
        )
    }

    #[test]
    fn empty_sink() {
        let sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        assert_eq!(sink.warning_count(), 0);
        assert!(sink.take_all().is_empty());
    }

    #[test]
    fn skipped_net_is_not_an_error() {
        let sink = DiagnosticSink::new();
        sink.emit(skipped_net());
        sink.emit(Diagnostic::note(ROLLBACK, "rolled back", Locus::Design));
        assert!(!sink.has_errors());
        assert_eq!(sink.warning_count(), 1);
        assert_eq!(sink.count_code(101), 1);
        assert_eq!(sink.count_code(202), 1);
    }

    #[test]
    fn take_all_keeps_error_count() {
        let sink = DiagnosticSink::new();
        sink.emit(unknown_site());
        sink.emit(skipped_net());
        assert_eq!(sink.take_all().len(), 2);
        assert!(sink.take_all().is_empty());
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.warning_count(), 0);
    }

    #[test]
    fn shared_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let sink = Arc::new(DiagnosticSink::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for _ in 0..25 {
                        sink.emit(unknown_site());
                        sink.emit(skipped_net());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.error_count(), 100);
        assert_eq!(sink.warning_count(), 100);
    }
}
