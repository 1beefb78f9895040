//! Device-family profiles.
//!
//! A [`Profile`] carries the per-family constants the engine needs to drive
//! a CLI dialogue: config-mode commands, the pager-disable command, the
//! save/exit sequence, a syntax-error pattern and a version comparator.
//! Profiles are process-wide, read-only and populated before any script runs.

use async_trait::async_trait;
use regex::Regex;
use std::cmp::Ordering;

use crate::core::error::ScriptError;
use crate::session::cli::CliSession;

/// Per-device-family constants and hooks.
///
/// All methods have defaults so a minimal profile only needs `name()`.
#[async_trait]
pub trait Profile: Send + Sync {
    /// Profile name, conventionally the device family (e.g. `"acme_ios"`).
    fn name(&self) -> &str;

    /// Command that enters configuration mode.
    fn command_enter_config(&self) -> Option<&str> {
        None
    }

    /// Command that leaves configuration mode.
    fn command_leave_config(&self) -> Option<&str> {
        None
    }

    /// Command that disables output pagination, issued once per session.
    fn command_disable_pager(&self) -> Option<&str> {
        None
    }

    /// Command that persists the running configuration.
    fn command_save_config(&self) -> Option<&str> {
        None
    }

    /// Command that closes the session gracefully.
    fn command_exit(&self) -> Option<&str> {
        None
    }

    /// Pattern flagging a CLI syntax error in a command response.
    fn pattern_syntax_error(&self) -> Option<&Regex> {
        None
    }

    /// Hook run once right after the session channel is opened.
    async fn setup_session(&self, _cli: &mut CliSession) -> Result<(), ScriptError> {
        Ok(())
    }

    /// Hook run when the root tears the session down.
    async fn shutdown_session(&self, _cli: &mut CliSession) -> Result<(), ScriptError> {
        Ok(())
    }

    /// Compare two version strings.
    ///
    /// Version strings are not lexically ordered ("9.1" < "12.0"), so
    /// dispatch ordering operators go through this comparator. The default
    /// compares dot-separated segments numerically where both sides parse,
    /// falling back to string comparison per segment.
    fn cmp_version(&self, a: &str, b: &str) -> Ordering {
        cmp_dotted(a, b)
    }
}

/// Default dotted-segment version comparison.
pub fn cmp_dotted(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(xn), Ok(yn)) => xn.cmp(&yn),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
