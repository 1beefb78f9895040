//! Transport provider boundary.
//!
//! The engine never speaks Telnet or SSH itself. A [`Transport`] turns a
//! [`Target`] into an open [`Channel`] that accepts whole commands and
//! yields whole responses; prompt detection and login sequencing happen on
//! the provider's side of this boundary. Telnet and SSH providers are
//! interchangeable implementations of the same shape.

use async_trait::async_trait;

use crate::core::error::TransportError;
use crate::core::target::Target;

/// One open command channel to a target.
#[async_trait]
pub trait Channel: Send {
    /// Send one command line.
    async fn send(&mut self, command: &str) -> Result<(), TransportError>;

    /// Block until the next complete response arrives.
    ///
    /// Responses are raw bytes; the session layer transcodes them when the
    /// target declares a non-default encoding.
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Close the channel.
    async fn close(&mut self) -> Result<(), TransportError>;
}

impl std::fmt::Debug for dyn Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").finish_non_exhaustive()
    }
}

/// Factory for channels.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a channel to the target, performing login.
    ///
    /// A rejected login must surface as [`TransportError::AuthRejected`] so
    /// the engine can record it as a login failure rather than a generic
    /// transport error.
    async fn open(&self, target: &Target) -> Result<Box<dyn Channel>, TransportError>;
}
