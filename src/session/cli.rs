//! CLI session management.
//!
//! A [`CliSession`] wraps one open [`Channel`] with the text-level concerns
//! of a command dialogue: echoed-command stripping, syntax-error detection
//! via the profile pattern, transcoding of non-UTF-8 device output, optional
//! transcript logging and per-line response parsing.
//!
//! One session is created lazily per script hierarchy and owned by the root;
//! see the engine module for acquisition and sharing.

use encoding_rs::Encoding;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::error::ScriptError;
use crate::core::profile::Profile;
use crate::core::target::Target;
use crate::engine::cancel::CancelController;
use crate::session::transcript::Transcript;
use crate::session::transport::{Channel, Transport};

/// One open CLI dialogue to a target.
pub struct CliSession {
    channel: Box<dyn Channel>,
    profile: Arc<dyn Profile>,
    encoding: Option<&'static Encoding>,
    transcript: Option<Transcript>,
}

impl CliSession {
    /// Open a channel to the target and wrap it.
    ///
    /// Login happens inside the transport; a rejected login surfaces as a
    /// transport error carrying the provider's message.
    pub async fn open(
        transport: &dyn Transport,
        target: &Target,
        profile: Arc<dyn Profile>,
        transcript: Option<Transcript>,
    ) -> Result<Self, ScriptError> {
        debug!(target = %target, "opening cli session");
        let channel = transport.open(target).await?;

        let encoding = match target.encoding.as_deref() {
            None => None,
            Some(label) => match Encoding::for_label(label.as_bytes()) {
                Some(enc) => Some(enc),
                None => {
                    warn!(label, "unknown encoding label, treating output as utf-8");
                    None
                }
            },
        };

        Ok(Self {
            channel,
            profile,
            encoding,
            transcript,
        })
    }

    /// Submit a command and return the response text.
    ///
    /// Strips the echoed command and checks the profile's syntax-error
    /// pattern. Not interruptible; use [`submit_opts`](Self::submit_opts)
    /// with a controller from inside script bodies.
    pub async fn submit(&mut self, command: &str) -> Result<String, ScriptError> {
        self.submit_opts(command, true, None).await
    }

    /// Submit a command with explicit options.
    ///
    /// When `cancel` is given, a deliverable cancellation unblocks the
    /// pending receive immediately instead of waiting out the I/O. The send
    /// itself always runs to completion: interrupting a half-written command
    /// would leave the device channel in an unknowable state.
    pub async fn submit_opts(
        &mut self,
        command: &str,
        expect_echo: bool,
        cancel: Option<&CancelController>,
    ) -> Result<String, ScriptError> {
        debug!(command, "submit");
        if let Some(transcript) = &mut self.transcript {
            transcript.sent(command).await;
        }
        self.channel.send(command).await?;

        let raw = match cancel {
            None => self.channel.recv().await?,
            Some(cancel) => {
                tokio::select! {
                    received = self.channel.recv() => received?,
                    _ = cancel.delivered() => return Err(ScriptError::Cancelled),
                }
            }
        };

        let text = self.decode(raw);
        if let Some(transcript) = &mut self.transcript {
            transcript.received(&text).await;
        }

        // Syntax errors are detected on the full decoded response, before
        // any data is handed back.
        if let Some(pattern) = self.profile.pattern_syntax_error() {
            if pattern.is_match(&text) {
                return Err(ScriptError::CliSyntax {
                    command: command.to_string(),
                    output: text,
                });
            }
        }

        if expect_echo {
            Ok(strip_echo(&text, command).to_string())
        } else {
            Ok(text)
        }
    }

    /// Enter configuration mode, when the profile declares the command.
    pub async fn enter_config(
        &mut self,
        cancel: Option<&CancelController>,
    ) -> Result<(), ScriptError> {
        if let Some(command) = self.profile.command_enter_config().map(str::to_string) {
            self.submit_opts(&command, true, cancel).await?;
        }
        Ok(())
    }

    /// Leave configuration mode, when the profile declares the command.
    pub async fn leave_config(
        &mut self,
        cancel: Option<&CancelController>,
    ) -> Result<(), ScriptError> {
        if let Some(command) = self.profile.command_leave_config().map(str::to_string) {
            self.submit_opts(&command, true, cancel).await?;
        }
        Ok(())
    }

    /// Close the underlying channel.
    pub async fn close(&mut self) -> Result<(), ScriptError> {
        self.channel.close().await?;
        Ok(())
    }

    fn decode(&self, raw: Vec<u8>) -> String {
        match self.encoding {
            Some(encoding) => {
                let (text, _, _) = encoding.decode(&raw);
                text.into_owned()
            }
            None => String::from_utf8_lossy(&raw).into_owned(),
        }
    }
}

/// Strip an echoed copy of `command` from the head of `response`.
///
/// Transports that echo input return the command itself, a line break, then
/// the real output. Responses that do not start with the command are
/// returned unchanged.
pub fn strip_echo<'a>(response: &'a str, command: &str) -> &'a str {
    match response.strip_prefix(command) {
        None => response,
        Some(rest) => rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest),
    }
}

/// Reduce a response to one field map per line using named capture groups.
///
/// Lines that do not match the pattern are skipped.
pub fn parse_lines(text: &str, pattern: &Regex) -> Vec<HashMap<String, String>> {
    let names: Vec<&str> = pattern.capture_names().flatten().collect();
    text.lines()
        .filter_map(|line| pattern.captures(line))
        .map(|caps| {
            names
                .iter()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), m.as_str().to_string()))
                })
                .collect()
        })
        .collect()
}
