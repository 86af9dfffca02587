//! Errors for broken optimizer invariants.

/// An optimizer invariant that did not hold, such as two objects sharing a
/// plane after a move or a node outside the plane range.
///
/// Bad input is never reported this way. It surfaces as a diagnostic or as
/// the domain error of the crate that read it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Which invariant broke and where.
    pub message: String,
}

impl InternalError {
    /// Wraps a description of the broken invariant.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
