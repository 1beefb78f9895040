//! Script execution engine for automated interaction with remote
//! infrastructure over line-oriented CLI sessions.
//!
//! Each unit of work logs into a device-like target, runs a body of logic
//! that may issue CLI commands and invoke other scripts, and returns a
//! structured result. One root task owns the CLI session and both caches;
//! nested tasks share them transparently, run synchronously on the same
//! worker and may resolve their real handler at run time through a
//! version-based dispatch chain.

pub mod cache;
pub mod core;
pub mod dispatch;
pub mod engine;
pub mod session;
pub mod testing;

pub use cache::{snapshot_args, Args, CallCache, CommandCache};
pub use self::core::error::{ScriptError, TransportError};
pub use self::core::profile::Profile;
pub use self::core::signature::Signature;
pub use self::core::target::{Scheme, Target};
pub use self::core::types::{FailureKind, RunId, ScriptName};
pub use dispatch::{DispatchChain, DispatchError, Lookup, Predicate, PredicateBuilder};
pub use engine::{
    CancelController, Handler, InputAdapter, OutputAdapter, Script, ScriptBody, ScriptChain,
    ScriptContext, ScriptEnvironment, ScriptHandle, ScriptRegistry, ScriptReport, DEFAULT_TIMEOUT,
};
pub use session::{CliSession, Transcript};
