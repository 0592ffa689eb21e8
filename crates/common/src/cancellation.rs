use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::CommonError;

/// A caller-provided cooperative cancellation flag.
///
/// Long-running operations (lexing a line, each parser production, each node
/// visit during inspection) call [`CancellationToken::check`] and unwind with
/// [`CommonError::Cancelled`] once the flag is set. Mutation of library state
/// only happens at well-defined boundaries, so unwinding never leaves a torn
/// data structure behind.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Errors with [`CommonError::Cancelled`] once [`Self::cancel`] was called.
    pub fn check(&self) -> Result<(), CommonError> {
        if self.is_cancelled() {
            Err(CommonError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// [`CancellationToken::check`] lifted over the optional token carried by
/// [`crate::Settings`].
pub fn check(maybe_token: Option<&CancellationToken>) -> Result<(), CommonError> {
    match maybe_token {
        Some(token) => token.check(),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_token_passes() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancelled_token_errors() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert_eq!(token.check(), Err(CommonError::Cancelled));
    }

    #[test]
    fn absent_token_passes() {
        assert!(check(None).is_ok());
    }
}
