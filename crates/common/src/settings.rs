use serde::{Deserialize, Serialize};

use crate::CancellationToken;

pub const DEFAULT_LOCALE: &str = "en-US";

/// Per-call configuration shared by every stage.
///
/// `locale` is consumed solely by the caller's localization collaborator when
/// rendering diagnostics; the library itself only threads it through. The
/// cancellation token, when present, is polled at every suspension point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub locale: String,

    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            cancellation: None,
        }
    }
}

impl Settings {
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Poll the cancellation token, if any.
    pub fn check_cancel(&self) -> Result<(), crate::CommonError> {
        crate::cancellation::check(self.cancellation.as_ref())
    }
}
