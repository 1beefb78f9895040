//! Core identifier types for the script engine.
//!
//! Script names follow the `"<family>.<action>"` convention, where the
//! family identifies a device platform (e.g. `"acme_ios"`) and the action
//! names the operation (e.g. `"get_version"`).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Name of a script, in `"<family>.<action>"` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptName(String);

/// Unique identifier for one script run (a whole hierarchy shares one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl ScriptName {
    /// Create a new ScriptName from a string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The device family part, i.e. everything before the last dot.
    pub fn family(&self) -> &str {
        self.0.rsplit_once('.').map(|(f, _)| f).unwrap_or("")
    }

    /// The action part, i.e. everything after the last dot.
    pub fn action(&self) -> &str {
        self.0.rsplit_once('.').map(|(_, a)| a).unwrap_or(&self.0)
    }

    /// The same action under a different family.
    pub fn with_family(&self, family: &str) -> Self {
        Self(format!("{}.{}", family, self.action()))
    }
}

impl From<&str> for ScriptName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ScriptName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for ScriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RunId {
    /// Generate a new random RunId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal failure classification for a script run.
///
/// Exactly one kind is recorded per run; the first failure encountered wins.
/// `TimedOut` is set by the external supervisor via the handle, never raised
/// from inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Input adapter rejected the arguments before the body ran.
    InvalidInput,
    /// Transport connected but authentication was rejected.
    LoginFailed,
    /// A command response matched the profile's syntax-error pattern and the
    /// body did not recover.
    CliSyntax,
    /// No dispatch chain entry matched the capability signature.
    NotSupported,
    /// Supervisor observed staleness and gave up on the run.
    TimedOut,
    /// Cancellation was delivered inside a cancelable region.
    Cancelled,
    /// Lower-level transport failure, surfaced verbatim.
    Transport,
    /// Any other uncaught condition.
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::InvalidInput => "invalid input",
            FailureKind::LoginFailed => "login failed",
            FailureKind::CliSyntax => "cli syntax error",
            FailureKind::NotSupported => "not supported",
            FailureKind::TimedOut => "timed out",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Transport => "transport error",
            FailureKind::Internal => "internal error",
        };
        write!(f, "{}", s)
    }
}
