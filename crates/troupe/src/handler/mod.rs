//! # Backend Contract
//!
//! Every actor implementation, whatever runs inside it, implements
//! [`Backend`]. The host never calls anything else: it builds an
//! [`Event`], hands it to [`dispatch`], and forwards whatever message comes
//! back. Backends do not return errors. An internal failure is logged and
//! the call produces no message.
//!
//! Actor types are registered in an [`ActorTypeRegistry`] together with their
//! capability declaration, which is validated at registration time.

use crate::capabilities::CapabilityDescriptor;
use crate::errors::TroupeError;
use crate::events::{Event, EventKind};
use crate::message::Message;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The uniform behaviour surface of an actor.
///
/// Every method consumes its event. Defaults ignore the event, so a backend
/// only implements what it reacts to.
pub trait Backend: Send + 'static {
    /// One-time setup, delivered before any other event.
    fn on_init(&mut self, _event: Event) -> Option<Message> {
        None
    }

    /// Control command named by the first string of the payload. Unknown
    /// commands must be ignored with a warning.
    fn on_api(&mut self, event: Event) -> Option<Message> {
        match event.decode_api() {
            Ok(call) => warn!(actor = %event.name, command = %call.command, "unhandled api command"),
            Err(e) => warn!(actor = %event.name, "malformed api payload: {}", e),
        }
        None
    }

    /// The actor's timer fired.
    fn on_timer(&mut self, _event: Event) -> Option<Message> {
        None
    }

    /// Inbound data.
    fn on_socket(&mut self, _event: Event) -> Option<Message> {
        None
    }

    /// An auxiliary source registered through the handle became ready.
    fn on_custom_fd(&mut self, _event: Event) -> Option<Message> {
        None
    }

    /// Graceful shutdown notice. Sources must be unregistered here; the
    /// host clears any that remain afterwards.
    fn on_stop(&mut self, _event: Event) -> Option<Message> {
        None
    }

    /// Release everything. Consumes the backend.
    fn on_destroy(self: Box<Self>, _event: Event) -> Option<Message> {
        None
    }
}

/// Route one event to the matching entry point.
///
/// DESTROY needs ownership of the backend and is delivered by the actor
/// runtime directly; passing it here is logged and ignored.
pub fn dispatch(backend: &mut dyn Backend, event: Event) -> Option<Message> {
    match event.kind {
        EventKind::Init => backend.on_init(event),
        EventKind::Api => backend.on_api(event),
        EventKind::Timer => backend.on_timer(event),
        EventKind::Socket => backend.on_socket(event),
        EventKind::CustomFd => backend.on_custom_fd(event),
        EventKind::Stop => backend.on_stop(event),
        EventKind::Destroy => {
            warn!(actor = %event.name, "DESTROY must be delivered by value");
            None
        }
    }
}

/// Produces a fresh backend instance per actor.
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn Backend> + Send + Sync>;

/// A registered actor type.
#[derive(Clone)]
pub struct ActorType {
    name: String,
    capabilities: CapabilityDescriptor,
    factory: BackendFactory,
}

impl ActorType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared descriptor, as every new actor of this type starts with.
    pub fn capabilities(&self) -> &CapabilityDescriptor {
        &self.capabilities
    }

    pub fn instantiate(&self) -> Box<dyn Backend> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorType")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ActorTypeRegistry {
    types: BTreeMap<String, ActorType>,
}

impl ActorTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor type.
    ///
    /// ## Parameters
    ///
    /// * `name` - Type name used by stage files and [`Stage::spawn`](crate::Stage::spawn).
    /// * `capabilities` - Capability declaration text. `None` gives the
    ///   default surface: no parameters, one OSC input and output.
    /// * `factory` - Builds a fresh backend for each actor.
    ///
    /// ## Returns
    ///
    /// An error if the name is taken or the declaration has an authoring
    /// error. Nothing is registered in that case.
    pub fn register<F, B>(
        &mut self,
        name: &str,
        capabilities: Option<&str>,
        factory: F,
    ) -> Result<(), TroupeError>
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: Backend,
    {
        if self.types.contains_key(name) {
            return Err(TroupeError::DuplicateActorType(name.to_string()));
        }
        let capabilities = match capabilities {
            Some(text) => CapabilityDescriptor::parse(text).map_err(|source| {
                TroupeError::Registration {
                    actor_type: name.to_string(),
                    source,
                }
            })?,
            None => CapabilityDescriptor::default(),
        };
        debug!(
            actor_type = name,
            entries = capabilities.data().len(),
            "registering actor type"
        );
        self.types.insert(
            name.to_string(),
            ActorType {
                name: name.to_string(),
                capabilities,
                factory: Arc::new(move || Box::new(factory()) as Box<dyn Backend>),
            },
        );
        info!("Registered actor type '{}'", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ActorType> {
        self.types.get(name)
    }

    /// Registered types in name order.
    pub fn types(&self) -> impl Iterator<Item = &ActorType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
