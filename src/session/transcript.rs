//! Session transcript logging.
//!
//! When enabled for a target+script pair, every command and response on the
//! CLI session is appended to a text file: a timestamp line, then the
//! literal text prefixed with `>` (sent) or `<` (received).

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::core::error::ScriptError;

/// Append-only transcript of one CLI session.
pub struct Transcript {
    path: PathBuf,
    file: File,
}

impl Transcript {
    /// Open (or create) the transcript file in append mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ScriptError::Internal(format!("cannot open transcript {:?}: {}", path, e)))?;
        Ok(Self { path, file })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a sent command.
    pub async fn sent(&mut self, command: &str) {
        self.append('>', command).await;
    }

    /// Record a received response.
    pub async fn received(&mut self, response: &str) {
        self.append('<', response).await;
    }

    // Transcript failures must never fail the script; log and move on.
    async fn append(&mut self, prefix: char, text: &str) {
        let entry = format!("{}\n{} {}\n", Utc::now().to_rfc3339(), prefix, text);
        if let Err(e) = self.file.write_all(entry.as_bytes()).await {
            warn!(path = ?self.path, error = %e, "transcript write failed");
        }
    }
}
