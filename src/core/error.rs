//! Error types for script execution.
//!
//! `ScriptError` is the single error type that flows through script bodies.
//! Most variants are terminal for the task that lets them escape;
//! `CliSyntax` is ordinary and may be caught by the body to recover.

use thiserror::Error;

use super::types::FailureKind;

/// Errors surfaced by the transport provider boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Transport connected but the target rejected authentication.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// The channel was closed while a response was pending.
    #[error("channel closed")]
    ChannelClosed,

    /// I/O failure on an open channel.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during script execution.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Input adapter rejected the arguments before the body ran.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Authentication was rejected by the target.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// A command response matched the profile's syntax-error pattern.
    ///
    /// The body may catch this and recover; it becomes terminal only when
    /// it escapes the body.
    #[error("cli syntax error on {command:?}: {output}")]
    CliSyntax { command: String, output: String },

    /// No dispatch chain entry matched the capability signature.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Cancellation was delivered inside a cancelable region.
    #[error("cancelled")]
    Cancelled,

    /// Lower-level transport failure, surfaced verbatim.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Output adapter rejected the result.
    #[error("invalid result: {0}")]
    InvalidResult(String),

    /// Any other uncaught condition, with a diagnostic trace.
    #[error("internal error: {0}")]
    Internal(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ScriptError {
    /// Map this error to the failure kind recorded on the run.
    pub fn kind(&self) -> FailureKind {
        match self {
            ScriptError::InvalidInput(_) => FailureKind::InvalidInput,
            ScriptError::LoginFailed(_) => FailureKind::LoginFailed,
            ScriptError::CliSyntax { .. } => FailureKind::CliSyntax,
            ScriptError::NotSupported(_) => FailureKind::NotSupported,
            ScriptError::Cancelled => FailureKind::Cancelled,
            ScriptError::Transport(TransportError::AuthRejected(_)) => FailureKind::LoginFailed,
            ScriptError::Transport(_) => FailureKind::Transport,
            ScriptError::InvalidResult(_) => FailureKind::InvalidInput,
            ScriptError::Internal(_) | ScriptError::Other(_) => FailureKind::Internal,
        }
    }
}
