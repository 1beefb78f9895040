//! Common test utilities shared across integration tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use scriptor::{Args, Script, ScriptContext, ScriptError};

/// A cacheable `get_version` script that reads the version from the device.
///
/// Counts body executions so tests can assert how often the cache was
/// bypassed.
pub struct GetVersionScript {
    pub executions: Arc<AtomicUsize>,
}

impl GetVersionScript {
    pub fn new() -> Self {
        Self {
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn executions(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.executions)
    }
}

#[async_trait]
impl Script for GetVersionScript {
    fn name(&self) -> &str {
        "acme.get_version"
    }

    fn is_cacheable(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let version = ctx.submit("show version").await?;
        Ok(json!({
            "vendor": "Acme",
            "platform": "C2960",
            "version": version.trim(),
            "image": "base-image",
        }))
    }
}

/// A script that invokes another script a fixed number of times and
/// returns the collected results.
pub struct FanOutScript {
    pub name: &'static str,
    pub target: &'static str,
    pub times: usize,
}

#[async_trait]
impl Script for FanOutScript {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        let mut results = Vec::new();
        for _ in 0..self.times {
            results.push(ctx.call(self.target, Args::new()).await?);
        }
        Ok(Value::Array(results))
    }
}
