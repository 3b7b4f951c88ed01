//! # Actor System
//!
//! An actor is one independently addressable unit hosting exactly one live
//! backend. This module holds the pieces around that backend: the runtime
//! task that feeds it events, the handle it uses to talk back to the host,
//! and the reference the host uses to drive it.

pub mod actor_ref;
pub mod handle;
pub mod runtime;
pub mod types;

// Public re-exports
pub use actor_ref::ActorRef;
pub use handle::{ActorHandle, SourceNotifier, TIMER_NEVER};
pub use types::{ActorControl, ActorOperation};
