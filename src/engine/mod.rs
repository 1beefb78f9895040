//! Task engine: script trait, lifecycle runner, registry, cancellation and
//! the supervisor handle.

pub mod cancel;
pub mod handle;
pub mod registry;
pub mod runner;
pub mod script;

pub use cancel::{CancelController, CancelableRegion, OwnedCancelableRegion};
pub use handle::ScriptHandle;
pub use registry::{ScriptRegistry, ScriptRegistryBuilder, GENERIC_FAMILY};
pub use runner::ScriptReport;
pub use script::{
    CachedRegion, Handler, InputAdapter, OutputAdapter, Script, ScriptBody, ScriptChain,
    ScriptContext, ScriptEnvironment, DEFAULT_TIMEOUT,
};
