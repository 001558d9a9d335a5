//! Error types for the app activation stack.

use thiserror::Error;

/// Result type alias for activation stack operations.
pub type CoreResult<T> = Result<T, LifetimeError>;

/// Errors that can occur while mutating the activation stack.
#[derive(Error, Debug)]
pub enum LifetimeError {
    #[error("app is not registered: {0}")]
    AppNotRegistered(String),

    #[error("app is already running: {0}")]
    AppAlreadyRunning(String),

    #[error("app is not running: {0}")]
    AppNotRunning(String),

    #[error("no context record for app: {0}")]
    NoContextRecord(String),

    #[error("executor failed for app {id}: {reason}")]
    Executor { id: String, reason: String },
}

impl LifetimeError {
    /// Shorthand for executor-side failures reported by app adapters.
    pub fn executor(id: impl Into<String>, reason: impl Into<String>) -> Self {
        LifetimeError::Executor {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
