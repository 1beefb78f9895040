//! Capability signatures.
//!
//! A [`Signature`] describes what is actually running on a target —
//! vendor, platform, version and firmware image — and is the value dispatch
//! predicates are evaluated against. It is usually produced by a nested
//! `get_version` script.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::core::error::ScriptError;

/// Capability signature of a target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub vendor: String,
    pub platform: String,
    pub version: String,
    #[serde(default)]
    pub image: String,

    /// Free-form extra attributes reported by the device.
    #[serde(default, flatten)]
    pub attributes: HashMap<String, String>,
}

impl Signature {
    /// Create a signature with the four standard fields.
    pub fn new(
        vendor: impl Into<String>,
        platform: impl Into<String>,
        version: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            platform: platform.into(),
            version: version.into(),
            image: image.into(),
            attributes: HashMap::new(),
        }
    }

    /// Look up a field by name, standard fields first, then extras.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "vendor" => Some(&self.vendor),
            "platform" => Some(&self.platform),
            "version" => Some(&self.version),
            "image" => Some(&self.image),
            other => self.attributes.get(other).map(|s| s.as_str()),
        }
    }

    /// Build a signature from a `get_version` script result.
    pub fn from_value(value: &Value) -> Result<Self, ScriptError> {
        serde_json::from_value(value.clone())
            .map_err(|e| ScriptError::Internal(format!("malformed capability signature: {}", e)))
    }

    /// Serialize back to the dynamic value form.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
