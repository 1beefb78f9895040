//! Target connection descriptors.
//!
//! A [`Target`] describes where a script hierarchy connects: address,
//! transport scheme, credentials and other per-device attributes. The engine
//! never interprets credentials itself; they are passed through to the
//! transport provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Transport scheme used to reach the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Telnet,
    Ssh,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Telnet => write!(f, "telnet"),
            Scheme::Ssh => write!(f, "ssh"),
        }
    }
}

/// Connection descriptor for one device-like target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Network address (host or host:port).
    pub address: String,

    /// Transport scheme.
    pub scheme: Scheme,

    /// Credentials and arbitrary per-device attributes.
    attributes: HashMap<String, String>,

    /// Text encoding of device output, when not UTF-8 (e.g. "koi8-r").
    pub encoding: Option<String>,
}

impl Target {
    /// Create a target for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Builder: set the transport scheme.
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Builder: add a credential or attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder: declare a non-default text encoding for device output.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Get an attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    /// All attributes as a reference to the internal map.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.address)
    }
}
