//! Lifecycle adapters, failure classification, child error recovery and
//! supervisor-driven timeouts.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scriptor::testing::{test_environment, MockTransport, StaticProfile};
use scriptor::{
    Args, FailureKind, InputAdapter, OutputAdapter, Script, ScriptContext, ScriptError,
    ScriptHandle, ScriptRegistry,
};

struct RequireHost;

impl InputAdapter for RequireHost {
    fn clean_input(&self, mut args: Args) -> Result<Args, ScriptError> {
        match args.get("host").and_then(Value::as_str) {
            Some(host) => {
                let host = host.trim().to_string();
                args.insert("host".into(), json!(host));
                Ok(args)
            }
            None => Err(ScriptError::InvalidInput("host is required".into())),
        }
    }
}

struct ListWrapper;

impl OutputAdapter for ListWrapper {
    fn clean_result(&self, result: Value) -> Result<Value, ScriptError> {
        match result {
            Value::Array(items) => Ok(json!({ "count": items.len(), "items": items })),
            other => Err(ScriptError::InvalidResult(format!(
                "expected a list, got {other}"
            ))),
        }
    }
}

struct AdaptedScript {
    input: RequireHost,
    output: ListWrapper,
    executions: Arc<AtomicUsize>,
}

impl AdaptedScript {
    fn new() -> Self {
        Self {
            input: RequireHost,
            output: ListWrapper,
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Script for AdaptedScript {
    fn name(&self) -> &str {
        "acme.adapted"
    }

    fn input_adapter(&self) -> Option<&dyn InputAdapter> {
        Some(&self.input)
    }

    fn output_adapter(&self) -> Option<&dyn OutputAdapter> {
        Some(&self.output)
    }

    async fn execute(&self, _ctx: &mut ScriptContext, args: &Args) -> Result<Value, ScriptError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let host = args
            .get("host")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(json!([host]))
    }
}

#[tokio::test]
async fn test_input_adapter_rejection_skips_the_body() {
    let transport = MockTransport::new();
    let script = Arc::new(AdaptedScript::new());
    let executions = Arc::clone(&script.executions);

    let registry = ScriptRegistry::builder().register(script).build();
    let env = test_environment(transport.clone(), StaticProfile::named("acme"), registry);

    let report = ScriptHandle::spawn(env, "acme.adapted", Args::new())
        .join()
        .await;

    assert_eq!(report.failure, Some(FailureKind::InvalidInput));
    assert_eq!(executions.load(Ordering::SeqCst), 0);
    // No session was ever opened.
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test]
async fn test_adapters_normalize_input_and_wrap_output() {
    let transport = MockTransport::new();
    let registry = ScriptRegistry::builder()
        .register(Arc::new(AdaptedScript::new()))
        .build();
    let env = test_environment(transport, StaticProfile::named("acme"), registry);

    let mut args = Args::new();
    args.insert("host".into(), json!("  r1  "));
    let report = ScriptHandle::spawn(env, "acme.adapted", args).join().await;

    assert!(report.is_success());
    let value: Value = serde_json::from_str(&report.result.unwrap()).unwrap();
    assert_eq!(value, json!({ "count": 1, "items": ["r1"] }));
}

#[tokio::test]
async fn test_unknown_script_reports_internal_failure() {
    let transport = MockTransport::new();
    let registry = ScriptRegistry::builder().build();
    let env = test_environment(transport, StaticProfile::named("acme"), registry);

    let report = ScriptHandle::spawn(env, "acme.missing", Args::new())
        .join()
        .await;

    assert_eq!(report.failure, Some(FailureKind::Internal));
    assert!(report.result.is_none());
}

struct NeverFinishes;

#[async_trait]
impl Script for NeverFinishes {
    fn name(&self) -> &str {
        "acme.never"
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(10)
    }

    async fn execute(&self, ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        let _region = ctx.cancelable();
        let out = ctx.submit("slow command").await?;
        Ok(json!(out))
    }
}

#[tokio::test]
async fn test_stale_run_is_reported_as_timed_out() {
    let transport = MockTransport::new();
    transport.hang_on("slow command");

    let registry = ScriptRegistry::builder()
        .register(Arc::new(NeverFinishes))
        .build();
    let env = test_environment(transport, StaticProfile::named("acme"), registry);

    let handle = ScriptHandle::spawn(env, "acme.never", Args::new());
    assert!(!handle.is_finished());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.is_stale());
    assert!(handle.cancel_stale());

    let report = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("stale run did not finish");
    assert_eq!(report.failure, Some(FailureKind::TimedOut));
    assert!(report.result.is_none());
}

#[tokio::test]
async fn test_cancel_stale_refuses_a_fresh_run() {
    let transport = MockTransport::new();
    transport.respond("show version", "12.1");

    let registry = ScriptRegistry::builder()
        .register(Arc::new(crate::common::GetVersionScript::new()))
        .build();
    let env = test_environment(transport, StaticProfile::named("acme"), registry);

    let handle = ScriptHandle::spawn(env, "acme.get_version", Args::new());
    // Default timeout is far away; staleness cancel must decline.
    assert!(!handle.cancel_stale());

    let report = handle.join().await;
    assert!(report.is_success());
}

struct FailingChild;

#[async_trait]
impl Script for FailingChild {
    fn name(&self) -> &str {
        "acme.failing"
    }

    async fn execute(&self, _ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        Err(ScriptError::InvalidInput("bad child input".into()))
    }
}

struct CatchingParent;

#[async_trait]
impl Script for CatchingParent {
    fn name(&self) -> &str {
        "acme.catching"
    }

    async fn execute(&self, ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        match ctx.call("acme.failing", Args::new()).await {
            Ok(value) => Ok(value),
            Err(_) => Ok(json!("recovered")),
        }
    }
}

struct PropagatingParent;

#[async_trait]
impl Script for PropagatingParent {
    fn name(&self) -> &str {
        "acme.propagating"
    }

    async fn execute(&self, ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        ctx.call("acme.failing", Args::new()).await
    }
}

#[tokio::test]
async fn test_parent_may_catch_a_child_failure() {
    let transport = MockTransport::new();
    let registry = ScriptRegistry::builder()
        .register(Arc::new(FailingChild))
        .register(Arc::new(CatchingParent))
        .build();
    let env = test_environment(transport, StaticProfile::named("acme"), registry);

    let report = ScriptHandle::spawn(env, "acme.catching", Args::new())
        .join()
        .await;

    assert!(report.is_success());
    assert_eq!(report.result.unwrap(), "\"recovered\"");
}

#[tokio::test]
async fn test_uncaught_child_failure_keeps_its_kind() {
    let transport = MockTransport::new();
    let registry = ScriptRegistry::builder()
        .register(Arc::new(FailingChild))
        .register(Arc::new(PropagatingParent))
        .build();
    let env = test_environment(transport, StaticProfile::named("acme"), registry);

    let report = ScriptHandle::spawn(env, "acme.propagating", Args::new())
        .join()
        .await;

    assert_eq!(report.failure, Some(FailureKind::InvalidInput));
    assert!(report.result.is_none());
}
