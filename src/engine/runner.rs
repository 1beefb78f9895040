//! Task lifecycle execution.
//!
//! [`run_task`] drives one task through its whole lifecycle: input
//! adapters, call-cache lookup, dispatch resolution, body execution, output
//! adapters and cache store. [`run_to_report`] wraps a *root* task with the
//! pieces only the root performs: failure classification, the best-effort
//! save/exit sequence and session teardown.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cache::{snapshot_args, Args};
use crate::core::error::ScriptError;
use crate::core::signature::Signature;
use crate::core::types::{FailureKind, RunId, ScriptName};
use crate::dispatch::DispatchError;
use crate::engine::script::{Script, ScriptContext, ScriptEnvironment};

/// Final outcome of one root run, consumed by the host scheduler.
#[derive(Debug, Clone)]
pub struct ScriptReport {
    /// Run id shared by the whole hierarchy.
    pub run_id: RunId,
    /// Root script name.
    pub name: ScriptName,
    /// Serialized result, present when the run produced one.
    pub result: Option<String>,
    /// The single failure recorded for the run, if any.
    pub failure: Option<FailureKind>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl ScriptReport {
    /// A run is successful when it produced a result and recorded no
    /// failure.
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.result.is_some()
    }
}

/// Execute one task (root or nested) through its lifecycle.
///
/// Errors propagate to the caller: for a nested task that is the parent
/// body, which may catch and recover; for the root it is
/// [`run_to_report`], which classifies it as the run's failure.
pub(crate) async fn run_task(
    script: &dyn Script,
    ctx: &mut ScriptContext,
    args: Args,
) -> Result<Value, ScriptError> {
    debug!(task = %ctx.debug_name(), "task started");

    let args = match script.input_adapter() {
        Some(adapter) => adapter.clean_input(args)?,
        None => args,
    };

    // Whole-call cache: nested cacheable tasks only; the root always runs.
    let snapshot = if script.is_cacheable() && !ctx.is_root() {
        let snapshot = snapshot_args(&args);
        if let Some(snapshot) = &snapshot {
            if let Some(hit) = ctx.root_state().call_cache.get(script.name(), snapshot) {
                debug!(task = %ctx.debug_name(), "served from call cache");
                return Ok(hit);
            }
        }
        snapshot
    } else {
        None
    };

    let result = match script.dispatch_chain() {
        Some(chain) => {
            let signature = resolve_signature(ctx).await?;
            let handler = chain
                .resolve(&signature, ctx.profile())
                .map(Arc::clone)
                .map_err(|e| match e {
                    DispatchError::NotSupported(detail) => ScriptError::NotSupported(detail),
                    other => ScriptError::Internal(other.to_string()),
                })?;
            handler.run(ctx, &args).await?
        }
        None => script.execute(ctx, &args).await?,
    };

    let result = match script.output_adapter() {
        Some(adapter) => adapter.clean_result(result)?,
        None => result,
    };

    if let Some(snapshot) = snapshot {
        ctx.root_state()
            .call_cache
            .set(script.name(), &snapshot, result.clone());
    }

    debug!(task = %ctx.debug_name(), "task finished");
    Ok(result)
}

/// Resolve the hierarchy's capability signature, at most once per root.
///
/// The signature comes from a nested `get_version` call in the current
/// script's family (falling back to the generic family through the
/// registry) and is memoized on the root.
async fn resolve_signature(ctx: &mut ScriptContext) -> Result<Signature, ScriptError> {
    if let Ok(cached) = ctx.root_state().signature.read() {
        if let Some(signature) = cached.clone() {
            return Ok(signature);
        }
    }

    let name = ScriptName::new(format!("{}.get_version", ctx.name().family()));
    let value = ctx.call(name, Args::new()).await?;
    let signature = Signature::from_value(&value)?;

    if let Ok(mut cached) = ctx.root_state().signature.write() {
        *cached = Some(signature.clone());
    }
    Ok(signature)
}

/// Run a root task to completion and produce its report.
///
/// Classifies the first failure, performs the root-only save/exit sequence
/// (skipped after login failure or cancellation) and tears the shared
/// session down.
pub(crate) async fn run_to_report(mut ctx: ScriptContext, args: Args) -> ScriptReport {
    let env = Arc::clone(ctx.env());
    let name = ctx.name().clone();
    let run_id = ctx.run_id();

    let outcome = match env.registry.resolve(&name) {
        Ok(script) => run_task(script.as_ref(), &mut ctx, args).await,
        Err(e) => Err(e),
    };

    let (result, failure) = match outcome {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(serialized) => {
                info!(task = %ctx.debug_name(), "run succeeded");
                (Some(serialized), None)
            }
            Err(e) => {
                error!(task = %ctx.debug_name(), error = %e, "result serialization failed");
                (None, Some(FailureKind::Internal))
            }
        },
        Err(e) => {
            let kind = e.kind();
            if kind == FailureKind::Internal {
                // Full diagnostic for operator inspection.
                error!(task = %ctx.debug_name(), error = ?e, "run failed");
            } else {
                warn!(task = %ctx.debug_name(), error = %e, kind = %kind, "run failed");
            }
            (None, Some(kind))
        }
    };

    teardown(&ctx, &env, failure).await;

    ScriptReport {
        run_id,
        name,
        result,
        failure,
        duration: ctx.started().elapsed(),
    }
}

// Root-only completion side effects, all best effort.
async fn teardown(ctx: &ScriptContext, env: &ScriptEnvironment, failure: Option<FailureKind>) {
    let mut guard = ctx.root_state().session.lock().await;
    let Some(session) = guard.as_mut() else {
        return;
    };

    let skip_commands = matches!(
        failure,
        Some(FailureKind::LoginFailed) | Some(FailureKind::Cancelled)
    );
    if !skip_commands {
        if ctx.root_state().save_config_requested() {
            if let Some(command) = env.profile.command_save_config().map(str::to_string) {
                if let Err(e) = session.submit(&command).await {
                    warn!(task = %ctx.debug_name(), error = %e, "save config failed");
                }
            }
        }
        if let Some(command) = env.profile.command_exit().map(str::to_string) {
            // The device may close the channel on exit; that is not a
            // failure.
            if let Err(e) = session.submit_opts(&command, false, None).await {
                debug!(task = %ctx.debug_name(), error = %e, "exit command not acknowledged");
            }
        }
    }

    if let Err(e) = env.profile.shutdown_session(session).await {
        warn!(task = %ctx.debug_name(), error = %e, "shutdown hook failed");
    }
    if let Err(e) = session.close().await {
        debug!(task = %ctx.debug_name(), error = %e, "session close failed");
    }
    *guard = None;
}
