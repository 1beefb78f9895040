//! Layered result caching.
//!
//! Two independent caches, both owned by the root of a script hierarchy and
//! shared by every task under it:
//!
//! - [`CallCache`]: whole-call results keyed by (script name, argument
//!   snapshot)
//! - [`CommandCache`]: raw command responses keyed by `"<verb>:<command>"`
//!
//! Arguments are snapshotted to a stable textual form before lookup so
//! structurally-equal-but-distinct argument maps collide correctly.
//! Arguments that cannot be snapshotted silently bypass the cache.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Dynamic argument map passed to scripts.
pub type Args = serde_json::Map<String, Value>;

/// Produce a canonical textual snapshot of an argument map.
///
/// `serde_json::Map` is ordered by key, so the rendered text is stable for
/// structurally equal inputs. Returns `None` when serialization fails; the
/// caller must then bypass the cache rather than error.
pub fn snapshot_args(args: &Args) -> Option<String> {
    serde_json::to_string(args).ok()
}

/// Whole-call result cache, keyed by (script name, argument snapshot).
#[derive(Default)]
pub struct CallCache {
    inner: RwLock<HashMap<(String, String), Value>>,
}

impl CallCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached result.
    pub fn get(&self, name: &str, snapshot: &str) -> Option<Value> {
        let inner = self.inner.read().ok()?;
        let hit = inner.get(&(name.to_string(), snapshot.to_string())).cloned();
        if hit.is_some() {
            debug!(script = name, "call cache hit");
        }
        hit
    }

    /// Store a result.
    pub fn set(&self, name: &str, snapshot: &str, value: Value) {
        if let Ok(mut inner) = self.inner.write() {
            inner.insert((name.to_string(), snapshot.to_string()), value);
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Check whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw command/response cache, keyed by `"<verb>:<command text>"`.
#[derive(Default)]
pub struct CommandCache {
    inner: RwLock<HashMap<String, String>>,
}

impl CommandCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(verb: &str, command: &str) -> String {
        format!("{}:{}", verb, command)
    }

    /// Look up a cached response.
    pub fn get(&self, verb: &str, command: &str) -> Option<String> {
        let inner = self.inner.read().ok()?;
        let hit = inner.get(&Self::key(verb, command)).cloned();
        if hit.is_some() {
            debug!(command, "command cache hit");
        }
        hit
    }

    /// Store a response.
    pub fn set(&self, verb: &str, command: &str, response: String) {
        if let Ok(mut inner) = self.inner.write() {
            inner.insert(Self::key(verb, command), response);
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Check whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
