//! # Troupe Actor Runtime
//!
//! Troupe runs actors whose behaviour comes from very different places (plain
//! Rust state machines, hot-reloadable scripts, media pipelines with their
//! own event loops) behind one event-dispatch contract. From the host's side
//! every actor looks the same: same lifecycle, same message shapes, same
//! error semantics.
//!
//! ## Architecture
//!
//! * [`Stage`]: the host. Spawns actors from registered types, routes
//!   outbound messages downstream, shuts everything down.
//! * [`Backend`]: the contract each actor implementation fulfils. Events go
//!   in, an optional [`Message`] comes out, nothing is ever thrown.
//! * [`CapabilityDescriptor`]: the declarative surface of an actor type:
//!   configurable parameters and slot types. Controllers write values through
//!   [`ActorRef::apply_change`], which turns them into API calls.
//! * [`Envelope`]: ordered typed values, the wire form of a message frame.
//! * [`InteropLock`]: scoped exclusive access to an embedded runtime.
//!
//! Backends live in their own crates: `troupe-handler-native`,
//! `troupe-handler-script` and `troupe-handler-media`.

pub mod actor;
pub mod capabilities;
pub mod config;
pub mod errors;
pub mod events;
pub mod handler;
pub mod id;
pub mod interop;
pub mod logging;
pub mod message;
pub mod report;
pub mod shutdown;
pub mod stage;

pub use actor::{ActorHandle, ActorRef, SourceNotifier, TIMER_NEVER};
pub use capabilities::{
    ActorRecord, ApiCall, CapabilityDescriptor, CapabilityError, DataEntry, DataKind, SlotType,
};
pub use config::{ActorConfig, StageConfig};
pub use errors::TroupeError;
pub use events::{Event, EventKind};
pub use handler::{ActorType, ActorTypeRegistry, Backend};
pub use id::{ActorId, SourceToken};
pub use interop::InteropLock;
pub use message::{DecodeError, Envelope, EnvelopeReader, Frame, Message, Value, WireError};
pub use report::ActorReport;
pub use shutdown::{Termination, TerminationRequest};
pub use stage::Stage;
