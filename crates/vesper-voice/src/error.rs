//! Error types for the voice session core.

use thiserror::Error;

/// Result type alias for voice session operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur in the voice session core. Collaborator failures
/// are caught at the call site, logged, and degraded to best-effort
/// recovery; none of these is fatal to the process.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("feedback sink error: {0}")]
    Feedback(String),

    #[error("command dispatch error: {0}")]
    Dispatch(String),

    #[error("playback recovery error: {0}")]
    Recovery(String),

    #[error("system flow error: {0}")]
    Flow(String),

    #[error("update scheduling error: {0}")]
    Update(String),

    #[error("session queue closed")]
    QueueClosed,

    #[error("lifetime error: {0}")]
    Lifetime(#[from] vesper_core::LifetimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
