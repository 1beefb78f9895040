//! Testing utilities for users of the engine.
//!
//! This module provides mock collaborators for testing scripts without real
//! devices:
//!
//! - [`MockTransport`]: a scripted transport with canned command→response
//!   tables, an echo toggle and a command log for ordering assertions
//! - [`StaticProfile`]: a configurable profile
//! - [`test_environment`]: assembles a [`ScriptEnvironment`] around them

use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::core::error::TransportError;
use crate::core::target::Target;
use crate::core::profile::Profile;
use crate::engine::registry::ScriptRegistry;
use crate::engine::script::ScriptEnvironment;
use crate::session::transport::{Channel, Transport};

/// A configurable profile for tests.
pub struct StaticProfile {
    name: String,
    enter_config: Option<String>,
    leave_config: Option<String>,
    disable_pager: Option<String>,
    save_config: Option<String>,
    exit: Option<String>,
    syntax_error: Option<Regex>,
}

impl StaticProfile {
    /// A profile with a name and nothing else.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enter_config: None,
            leave_config: None,
            disable_pager: None,
            save_config: None,
            exit: None,
            syntax_error: None,
        }
    }

    pub fn with_enter_config(mut self, command: impl Into<String>) -> Self {
        self.enter_config = Some(command.into());
        self
    }

    pub fn with_leave_config(mut self, command: impl Into<String>) -> Self {
        self.leave_config = Some(command.into());
        self
    }

    pub fn with_disable_pager(mut self, command: impl Into<String>) -> Self {
        self.disable_pager = Some(command.into());
        self
    }

    pub fn with_save_config(mut self, command: impl Into<String>) -> Self {
        self.save_config = Some(command.into());
        self
    }

    pub fn with_exit(mut self, command: impl Into<String>) -> Self {
        self.exit = Some(command.into());
        self
    }

    /// Set the syntax-error pattern.
    ///
    /// # Panics
    ///
    /// Panics on an invalid pattern; acceptable in tests.
    pub fn with_syntax_error(mut self, pattern: &str) -> Self {
        self.syntax_error = Some(Regex::new(pattern).expect("valid syntax-error pattern"));
        self
    }
}

#[async_trait]
impl Profile for StaticProfile {
    fn name(&self) -> &str {
        &self.name
    }

    fn command_enter_config(&self) -> Option<&str> {
        self.enter_config.as_deref()
    }

    fn command_leave_config(&self) -> Option<&str> {
        self.leave_config.as_deref()
    }

    fn command_disable_pager(&self) -> Option<&str> {
        self.disable_pager.as_deref()
    }

    fn command_save_config(&self) -> Option<&str> {
        self.save_config.as_deref()
    }

    fn command_exit(&self) -> Option<&str> {
        self.exit.as_deref()
    }

    fn pattern_syntax_error(&self) -> Option<&Regex> {
        self.syntax_error.as_ref()
    }
}

struct MockState {
    responses: RwLock<HashMap<String, String>>,
    default_response: RwLock<String>,
    echo: RwLock<bool>,
    hang: RwLock<HashSet<String>>,
    reject_auth: RwLock<Option<String>>,
    log: Mutex<Vec<String>>,
    open_count: AtomicUsize,
}

/// A scripted in-memory transport.
///
/// Clones share state, so a test can keep one clone for assertions while
/// the engine owns the other.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                responses: RwLock::new(HashMap::new()),
                default_response: RwLock::new("OK".to_string()),
                echo: RwLock::new(false),
                hang: RwLock::new(HashSet::new()),
                reject_auth: RwLock::new(None),
                log: Mutex::new(Vec::new()),
                open_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Script a canned response for a command.
    pub fn respond(&self, command: impl Into<String>, response: impl Into<String>) -> &Self {
        self.state
            .responses
            .write()
            .unwrap()
            .insert(command.into(), response.into());
        self
    }

    /// Response for commands without a scripted entry (default `"OK"`).
    pub fn default_response(&self, response: impl Into<String>) -> &Self {
        *self.state.default_response.write().unwrap() = response.into();
        self
    }

    /// Make channels echo the submitted command before the response.
    pub fn echo(&self, enabled: bool) -> &Self {
        *self.state.echo.write().unwrap() = enabled;
        self
    }

    /// Make `recv` block forever after this command is sent.
    pub fn hang_on(&self, command: impl Into<String>) -> &Self {
        self.state.hang.write().unwrap().insert(command.into());
        self
    }

    /// Reject every login with the given message.
    pub fn reject_auth(&self, message: impl Into<String>) -> &Self {
        *self.state.reject_auth.write().unwrap() = Some(message.into());
        self
    }

    /// All commands sent so far, across every channel, in send order.
    pub fn commands(&self) -> Vec<String> {
        self.state.log.lock().unwrap().clone()
    }

    /// Number of channels opened.
    pub fn open_count(&self) -> usize {
        self.state.open_count.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _target: &Target) -> Result<Box<dyn Channel>, TransportError> {
        if let Some(message) = self.state.reject_auth.read().unwrap().clone() {
            return Err(TransportError::AuthRejected(message));
        }
        self.state.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockChannel {
            state: Arc::clone(&self.state),
            pending: None,
            closed: false,
        }))
    }
}

struct MockChannel {
    state: Arc<MockState>,
    pending: Option<String>,
    closed: bool,
}

#[async_trait]
impl Channel for MockChannel {
    async fn send(&mut self, command: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ChannelClosed);
        }
        self.state.log.lock().unwrap().push(command.to_string());
        self.pending = Some(command.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        let command = self.pending.take().ok_or(TransportError::ChannelClosed)?;
        if self.state.hang.read().unwrap().contains(&command) {
            std::future::pending::<()>().await;
        }
        let response = self
            .state
            .responses
            .read()
            .unwrap()
            .get(&command)
            .cloned()
            .unwrap_or_else(|| self.state.default_response.read().unwrap().clone());
        let text = if *self.state.echo.read().unwrap() {
            format!("{}\n{}", command, response)
        } else {
            response
        };
        Ok(text.into_bytes())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

/// Assemble a [`ScriptEnvironment`] around mock collaborators.
pub fn test_environment(
    transport: MockTransport,
    profile: StaticProfile,
    registry: ScriptRegistry,
) -> Arc<ScriptEnvironment> {
    Arc::new(ScriptEnvironment {
        target: Arc::new(Target::new("10.0.0.1")),
        profile: Arc::new(profile),
        transport: Arc::new(transport),
        registry: Arc::new(registry),
        transcript_path: None,
    })
}
