//! # Script Backend
//!
//! Actors whose behaviour lives in a [rhai](https://rhai.rs) script that can
//! be edited while the actor runs.
//!
//! A script defines a constructor (a function named after the file stem, or
//! `new`) returning an object map. That map is the actor instance, and the
//! host calls its methods with the instance bound as `this`:
//!
//! ```rhai
//! fn ping() { #{ timeout: 500, seen: 0 } }
//!
//! fn handleTimer(kind, name, uuid) { ["/alive", [this.seen]] }
//!
//! fn handleSocket(address, args, kind, name, uuid) {
//!     this.seen += 1;
//!     [address, args]
//! }
//!
//! fn handleStop(kind, name, uuid) { print("bye"); }
//! ```
//!
//! Saving the file reloads it in place, deleting or moving it unloads the
//! actor. Returning `SystemExit()` from a handler terminates the process.

pub mod backend;
pub mod cache;
pub mod codec;
pub mod host;
pub mod reload;
pub mod watch;

pub use backend::ScriptBackend;
pub use cache::ModuleCache;
pub use codec::Reply;
pub use host::{ScriptHost, SystemExit};
pub use reload::{ReloadOutcome, ScriptPhase, ScriptRuntime};
pub use watch::{FileWatch, WatchChange};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use troupe::{ActorTypeRegistry, TroupeError, WireError};

/// Type name under which [`register`] installs the backend.
pub const SCRIPT_ACTOR_TYPE: &str = "Script";

pub const SCRIPT_CAPABILITIES: &str = "\
capabilities
    data
        name = \"script\"
        type = \"filename\"
        valid_files = \".rhai\"
        help = \"Load a rhai script as an actor\"
        value = \"\"
        api_call = \"SET FILE\"
        api_value = \"s\"
inputs
    input
        type = \"OSC\"
outputs
    output
        type = \"OSC\"
";

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("failed to compile {path}: {message}")]
    Compile { path: PathBuf, message: String },

    #[error("{path} defines neither `{stem}()` nor `new()`")]
    MissingConstructor { path: PathBuf, stem: String },

    #[error("constructor in {path} returned {found}, expected an object map")]
    NotAnObject { path: PathBuf, found: String },

    #[error("error calling {method}: {message}")]
    Call { method: String, message: String },

    #[error("{command}: empty value rejected")]
    EmptyArgument { command: &'static str },

    #[error("no script loaded")]
    NotLoaded,

    #[error("unsupported value of type {0}")]
    UnsupportedValue(String),

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("undecodable frame: {0}")]
    Frame(#[from] WireError),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Register the script backend. Every actor spawned from the type shares
/// `host`'s engine.
pub fn register(registry: &mut ActorTypeRegistry, host: Arc<ScriptHost>) -> Result<(), TroupeError> {
    registry.register(SCRIPT_ACTOR_TYPE, Some(SCRIPT_CAPABILITIES), move || {
        ScriptBackend::new(host.clone())
    })
}
