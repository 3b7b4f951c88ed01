use crate::capabilities::{CapabilityError, SlotType};
use thiserror::Error;

/// Errors surfaced by the host: registration, spawning, routing and
/// stage configuration. Backends never produce these; their failures stay
/// behind the dispatch contract.
#[derive(Error, Debug)]
pub enum TroupeError {
    #[error("unknown actor type '{0}'")]
    UnknownActorType(String),

    #[error("actor type '{0}' is already registered")]
    DuplicateActorType(String),

    /// Authoring error in a capability declaration; the type is not registered
    #[error("actor type '{actor_type}' failed registration: {source}")]
    Registration {
        actor_type: String,
        #[source]
        source: CapabilityError,
    },

    #[error("actor '{0}' not found")]
    ActorNotFound(String),

    #[error("an actor named '{0}' already exists")]
    DuplicateActorName(String),

    #[error("actor '{0}' is not running")]
    ActorStopped(String),

    #[error("cannot connect '{from}' to '{to}': no {to} input accepts any {from} output ({outputs:?} -> {inputs:?})")]
    IncompatibleSlots {
        from: String,
        to: String,
        outputs: Vec<SlotType>,
        inputs: Vec<SlotType>,
    },

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("invalid stage configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to write stage configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
