use thiserror::Error;

/// Normalization of every failure that is not part of the lex or parse
/// taxonomies: cancellation and broken internal invariants.
///
/// Nothing crosses the library boundary as a panic; fallible entry points
/// return `Result` and fold any unexpected condition into this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    #[error("the operation was cancelled")]
    Cancelled,

    #[error("invariant broken: {0}")]
    Invariant(String),
}

impl CommonError {
    /// Wrap an invariant violation described by `message`.
    ///
    /// Used at the handful of places where a malformed node graph would
    /// otherwise force a panic.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}
