//! Script trait and execution context.
//!
//! A [`Script`] is one unit of automation work: it logs into a device-like
//! target, issues CLI commands and/or invokes other scripts, and returns a
//! dynamic result value. The [`ScriptContext`] passed to its body carries
//! the target, the profile and — shared with every task under the same root
//! — the CLI session, both caches and the save-config request flag.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{Args, CallCache, CommandCache};
use crate::core::error::ScriptError;
use crate::core::profile::Profile;
use crate::core::signature::Signature;
use crate::core::target::Target;
use crate::core::types::{RunId, ScriptName};
use crate::dispatch::DispatchChain;
use crate::engine::cancel::{CancelController, OwnedCancelableRegion};
use crate::engine::registry::ScriptRegistry;
use crate::engine::runner;
use crate::session::cli::{parse_lines, CliSession};
use crate::session::transcript::Transcript;
use crate::session::transport::Transport;

/// Default per-script timeout, advisory only (see [`ScriptHandle::is_stale`]).
///
/// [`ScriptHandle::is_stale`]: crate::engine::handle::ScriptHandle::is_stale
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter normalizing and validating script arguments before the body runs.
pub trait InputAdapter: Send + Sync {
    fn clean_input(&self, args: Args) -> Result<Args, ScriptError>;
}

/// Adapter validating the result after the body returns.
pub trait OutputAdapter: Send + Sync {
    fn clean_result(&self, result: Value) -> Result<Value, ScriptError>;
}

/// A handler body selected through a dispatch chain.
#[async_trait]
pub trait ScriptBody: Send + Sync {
    async fn run(&self, ctx: &mut ScriptContext, args: &Args) -> Result<Value, ScriptError>;
}

/// Handler payload stored in script dispatch chains.
pub type Handler = Arc<dyn ScriptBody>;

/// Dispatch chain specialized to script handlers.
pub type ScriptChain = DispatchChain<Handler>;

/// The core trait for defining scripts.
#[async_trait]
pub trait Script: Send + Sync {
    /// Declared name, in `"<family>.<action>"` form.
    fn name(&self) -> &str;

    /// Advisory timeout, polled by the external supervisor.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Whether whole-call results may be served from the root's call cache.
    ///
    /// Only nested invocations consult the cache; a root run always
    /// executes.
    fn is_cacheable(&self) -> bool {
        false
    }

    /// Input validation adapter, applied before the body runs.
    fn input_adapter(&self) -> Option<&dyn InputAdapter> {
        None
    }

    /// Result validation adapter, applied after the body returns.
    fn output_adapter(&self) -> Option<&dyn OutputAdapter> {
        None
    }

    /// Dispatch chain for families with several device variants.
    ///
    /// When declared, the engine resolves the target's capability signature
    /// (through a nested `get_version` call) and runs the matching handler
    /// instead of [`execute`](Self::execute).
    fn dispatch_chain(&self) -> Option<&ScriptChain> {
        None
    }

    /// Script body for scripts without a dispatch chain.
    async fn execute(&self, _ctx: &mut ScriptContext, _args: &Args) -> Result<Value, ScriptError> {
        Err(ScriptError::Internal(format!(
            "script {} has neither a body nor a dispatch chain",
            self.name()
        )))
    }
}

impl std::fmt::Debug for dyn Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script").field("name", &self.name()).finish()
    }
}

/// External collaborators a hierarchy runs against.
pub struct ScriptEnvironment {
    pub target: Arc<Target>,
    pub profile: Arc<dyn Profile>,
    pub transport: Arc<dyn Transport>,
    pub registry: Arc<ScriptRegistry>,
    /// Transcript file for this target+script pair, when the host enabled
    /// session logging.
    pub transcript_path: Option<PathBuf>,
}

/// State owned by the root task and shared by its whole hierarchy.
pub(crate) struct RootState {
    pub(crate) session: Mutex<Option<CliSession>>,
    pub(crate) call_cache: CallCache,
    pub(crate) command_cache: CommandCache,
    /// Depth of nested cached regions; > 0 enables both caches.
    cached_depth: AtomicUsize,
    save_config_requested: AtomicBool,
    /// Capability signature, resolved at most once per hierarchy.
    pub(crate) signature: RwLock<Option<Signature>>,
}

impl RootState {
    fn new() -> Self {
        Self {
            session: Mutex::new(None),
            call_cache: CallCache::new(),
            command_cache: CommandCache::new(),
            cached_depth: AtomicUsize::new(0),
            save_config_requested: AtomicBool::new(false),
            signature: RwLock::new(None),
        }
    }

    pub(crate) fn is_cached(&self) -> bool {
        self.cached_depth.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn save_config_requested(&self) -> bool {
        self.save_config_requested.load(Ordering::SeqCst)
    }
}

/// RAII guard enabling the hierarchy's cache scope.
pub struct CachedRegion {
    root: Arc<RootState>,
}

impl Drop for CachedRegion {
    fn drop(&mut self) {
        self.root.cached_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Execution context passed to script bodies.
pub struct ScriptContext {
    name: ScriptName,
    debug_name: String,
    run_id: RunId,
    env: Arc<ScriptEnvironment>,
    root: Arc<RootState>,
    cancel: Arc<CancelController>,
    depth: usize,
    started: Instant,
}

impl ScriptContext {
    /// Create the context for a root task.
    pub(crate) fn new_root(name: ScriptName, env: Arc<ScriptEnvironment>) -> Self {
        let debug_name = format!("{}({})", name, env.target.address);
        Self {
            name,
            debug_name,
            run_id: RunId::new(),
            env,
            root: Arc::new(RootState::new()),
            cancel: Arc::new(CancelController::new()),
            depth: 0,
            started: Instant::now(),
        }
    }

    /// Create a child context sharing this hierarchy's root state.
    pub(crate) fn child(&self, name: ScriptName) -> Self {
        let debug_name = format!("{}({})", name, self.env.target.address);
        Self {
            name,
            debug_name,
            run_id: self.run_id,
            env: Arc::clone(&self.env),
            root: Arc::clone(&self.root),
            cancel: Arc::new(self.cancel.child()),
            depth: self.depth + 1,
            started: Instant::now(),
        }
    }

    /// Declared script name.
    pub fn name(&self) -> &ScriptName {
        &self.name
    }

    /// Human-readable name for logging: script name plus target address.
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// Run id shared by the whole hierarchy.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Target this hierarchy is bound to.
    pub fn target(&self) -> &Target {
        &self.env.target
    }

    /// Profile of the target's device family.
    pub fn profile(&self) -> &dyn Profile {
        self.env.profile.as_ref()
    }

    /// Whether this task is the root of its hierarchy.
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    pub(crate) fn started(&self) -> Instant {
        self.started
    }

    pub(crate) fn root_state(&self) -> &Arc<RootState> {
        &self.root
    }

    pub(crate) fn env(&self) -> &Arc<ScriptEnvironment> {
        &self.env
    }

    /// This task's cancellation controller.
    pub fn cancel_controller(&self) -> &Arc<CancelController> {
        &self.cancel
    }

    /// Enter a cancelable region; cancellation is deliverable until the
    /// returned guard drops.
    pub fn cancelable(&self) -> OwnedCancelableRegion {
        OwnedCancelableRegion::enter(Arc::clone(&self.cancel))
    }

    /// Enable the hierarchy's cache scope (both caches, root-resolved)
    /// until the returned guard drops.
    pub fn cached(&self) -> CachedRegion {
        self.root.cached_depth.fetch_add(1, Ordering::SeqCst);
        CachedRegion {
            root: Arc::clone(&self.root),
        }
    }

    /// Ask the root to save the device configuration on completion.
    pub fn request_save_config(&self) {
        self.root
            .save_config_requested
            .store(true, Ordering::SeqCst);
    }

    /// Submit a CLI command and return the response text.
    ///
    /// Lazily opens the hierarchy's shared session on first use. When the
    /// cache scope is enabled the response may be served from, and is
    /// stored into, the root's command cache.
    pub async fn submit(&mut self, command: &str) -> Result<String, ScriptError> {
        self.submit_opts(command, true).await
    }

    /// [`submit`](Self::submit) with explicit echo handling.
    pub async fn submit_opts(
        &mut self,
        command: &str,
        expect_echo: bool,
    ) -> Result<String, ScriptError> {
        self.cancel.checkpoint()?;

        let use_cache = self.root.is_cached();
        if use_cache {
            if let Some(hit) = self.root.command_cache.get("cli", command) {
                return Ok(hit);
            }
        }

        let cancel = Arc::clone(&self.cancel);
        let mut guard = self.root.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_session(&cancel).await?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(ScriptError::Internal("session slot empty".into()));
        };
        let text = session
            .submit_opts(command, expect_echo, Some(&cancel))
            .await?;
        drop(guard);

        if use_cache {
            self.root.command_cache.set("cli", command, text.clone());
        }
        Ok(text)
    }

    /// Submit a command and reduce the response to per-line field maps
    /// using the pattern's named capture groups.
    pub async fn submit_parsed(
        &mut self,
        command: &str,
        line_pattern: &Regex,
    ) -> Result<Vec<HashMap<String, String>>, ScriptError> {
        let text = self.submit(command).await?;
        Ok(parse_lines(&text, line_pattern))
    }

    /// Enter configuration mode, when the profile declares the command.
    pub async fn enter_config(&mut self) -> Result<(), ScriptError> {
        if let Some(command) = self.env.profile.command_enter_config().map(str::to_string) {
            self.submit(&command).await?;
        }
        Ok(())
    }

    /// Leave configuration mode, when the profile declares the command.
    pub async fn leave_config(&mut self) -> Result<(), ScriptError> {
        if let Some(command) = self.env.profile.command_leave_config().map(str::to_string) {
            self.submit(&command).await?;
        }
        Ok(())
    }

    /// Invoke a sibling script as a child of this task.
    ///
    /// The child inherits this hierarchy's session, caches and environment,
    /// runs synchronously on the same worker and returns its result — which
    /// may come from the call cache, from a freshly opened session, or from
    /// a different handler in the child's dispatch chain. The child's
    /// failure surfaces as an ordinary error this body may catch.
    ///
    /// Returns a boxed future: nested calls recurse through the task
    /// runner, and the indirection keeps the future type finite.
    pub fn call<'a>(
        &'a mut self,
        name: impl Into<ScriptName>,
        args: Args,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ScriptError>> + Send + 'a>> {
        let name = name.into();
        Box::pin(async move {
            self.cancel.checkpoint()?;
            let script = self.env.registry.resolve(&name)?;
            debug!(parent = %self.name, child = %name, "nested call");
            let mut child = self.child(ScriptName::new(script.name()));
            runner::run_task(script.as_ref(), &mut child, args).await
        })
    }

    // Opens the shared session: transport open, setup hook, pager disable.
    // Runs exactly once per hierarchy, under the session lock.
    async fn open_session(
        &self,
        cancel: &CancelController,
    ) -> Result<CliSession, ScriptError> {
        let transcript = match &self.env.transcript_path {
            Some(path) => Some(Transcript::open(path).await?),
            None => None,
        };
        let mut session = CliSession::open(
            self.env.transport.as_ref(),
            &self.env.target,
            Arc::clone(&self.env.profile),
            transcript,
        )
        .await?;
        self.env.profile.setup_session(&mut session).await?;
        if let Some(command) = self.env.profile.command_disable_pager().map(str::to_string) {
            session.submit_opts(&command, true, Some(cancel)).await?;
        }
        debug!(task = %self.debug_name, "cli session ready");
        Ok(session)
    }
}
