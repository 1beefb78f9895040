//! Cooperative cancellation: delivery only inside cancelable regions,
//! interruption of a blocked receive, and scoping across the hierarchy.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use scriptor::testing::{test_environment, MockTransport, StaticProfile};
use scriptor::{Args, FailureKind, Script, ScriptContext, ScriptError, ScriptHandle, ScriptRegistry};

struct PlainShow;

#[async_trait]
impl Script for PlainShow {
    fn name(&self) -> &str {
        "acme.show"
    }

    async fn execute(&self, ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        let out = ctx.submit("show clock").await?;
        Ok(json!(out))
    }
}

#[tokio::test]
async fn test_cancel_outside_region_lets_the_run_complete() {
    let transport = MockTransport::new();
    transport.respond("show clock", "12:00");

    let registry = ScriptRegistry::builder().register(Arc::new(PlainShow)).build();
    let env = test_environment(transport, StaticProfile::named("acme"), registry);

    let handle = ScriptHandle::spawn(env, "acme.show", Args::new());
    // The body never declares a cancelable region, so the request is
    // recorded but not delivered.
    assert!(!handle.cancel());

    let report = handle.join().await;
    assert!(report.is_success());
    assert_eq!(report.result.unwrap(), "\"12:00\"");
}

struct BlockingShow;

#[async_trait]
impl Script for BlockingShow {
    fn name(&self) -> &str {
        "acme.blocking"
    }

    async fn execute(&self, ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        let _region = ctx.cancelable();
        let out = ctx.submit("slow command").await?;
        Ok(json!(out))
    }
}

#[tokio::test]
async fn test_cancel_interrupts_a_blocked_receive() {
    let transport = MockTransport::new();
    transport.hang_on("slow command");

    let registry = ScriptRegistry::builder()
        .register(Arc::new(BlockingShow))
        .build();
    let env = test_environment(transport.clone(), StaticProfile::named("acme"), registry);

    let handle = ScriptHandle::spawn(env, "acme.blocking", Args::new());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.cancel());

    let report = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("cancelled run did not finish");
    assert_eq!(report.failure, Some(FailureKind::Cancelled));
    // The command went out before the run was interrupted.
    assert_eq!(transport.commands(), vec!["slow command"]);
}

struct WaitsThenSubmits;

#[async_trait]
impl Script for WaitsThenSubmits {
    fn name(&self) -> &str {
        "acme.waits"
    }

    async fn execute(&self, ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        let _region = ctx.cancelable();
        let cancel = Arc::clone(ctx.cancel_controller());
        cancel.delivered().await;
        // The checkpoint at the head of submit raises before anything hits
        // the wire.
        let out = ctx.submit("show clock").await?;
        Ok(json!(out))
    }
}

#[tokio::test]
async fn test_recorded_cancel_is_raised_at_the_next_checkpoint() {
    let transport = MockTransport::new();

    let registry = ScriptRegistry::builder()
        .register(Arc::new(WaitsThenSubmits))
        .build();
    let env = test_environment(transport.clone(), StaticProfile::named("acme"), registry);

    let handle = ScriptHandle::spawn(env, "acme.waits", Args::new());
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("cancelled run did not finish");
    assert_eq!(report.failure, Some(FailureKind::Cancelled));
    assert!(transport.commands().is_empty());
}

struct CallsBlockingChild;

#[async_trait]
impl Script for CallsBlockingChild {
    fn name(&self) -> &str {
        "acme.parent"
    }

    async fn execute(&self, ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        ctx.call("acme.blocking", Args::new()).await
    }
}

#[tokio::test]
async fn test_root_cancel_interrupts_a_blocked_descendant() {
    let transport = MockTransport::new();
    transport.hang_on("slow command");

    let registry = ScriptRegistry::builder()
        .register(Arc::new(CallsBlockingChild))
        .register(Arc::new(BlockingShow))
        .build();
    let env = test_environment(transport, StaticProfile::named("acme"), registry);

    let handle = ScriptHandle::spawn(env, "acme.parent", Args::new());
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("cancelled run did not finish");
    assert_eq!(report.failure, Some(FailureKind::Cancelled));
}

#[tokio::test]
async fn test_cancelled_run_skips_save_and_exit() {
    let transport = MockTransport::new();
    transport.hang_on("slow command");

    let registry = ScriptRegistry::builder()
        .register(Arc::new(BlockingShow))
        .build();
    let profile = StaticProfile::named("acme")
        .with_save_config("write memory")
        .with_exit("exit");
    let env = test_environment(transport.clone(), profile, registry);

    let handle = ScriptHandle::spawn(env, "acme.blocking", Args::new());
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("cancelled run did not finish");
    assert_eq!(report.failure, Some(FailureKind::Cancelled));
    // Teardown is skipped on an interrupted session: no save, no exit.
    assert_eq!(transport.commands(), vec!["slow command"]);
}
