//! Shared plumbing for the Power Query language-services crates:
//! per-call settings, cooperative cancellation, and the catch-all
//! error normalization used across the library boundary.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cancellation;
pub mod error;
pub mod settings;

pub use cancellation::CancellationToken;
pub use error::CommonError;
pub use settings::Settings;
