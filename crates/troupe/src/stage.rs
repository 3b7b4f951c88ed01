//! # Stage
//!
//! The host. A stage owns the actor type registry and every running actor,
//! spawns actors from types, wires outputs to inputs and shuts everything
//! down in an orderly way.

use crate::actor::actor_ref::ActorShared;
use crate::actor::runtime::ActorRuntime;
use crate::actor::{ActorHandle, ActorRef};
use crate::config::{ActorConfig, StageConfig};
use crate::errors::TroupeError;
use crate::handler::ActorTypeRegistry;
use crate::id::ActorId;
use crate::shutdown::{Termination, DEFAULT_SHUTDOWN_TIMEOUT};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of each actor's control channel.
const CONTROL_CHANNEL_SIZE: usize = 8;

struct ActorProcess {
    actor: ActorRef,
    task: JoinHandle<()>,
}

pub struct Stage {
    registry: ActorTypeRegistry,
    termination: Termination,
    actors: Vec<ActorProcess>,
}

impl Stage {
    pub fn new(registry: ActorTypeRegistry) -> Self {
        Self {
            registry,
            termination: Termination::default(),
            actors: Vec::new(),
        }
    }

    /// Replace the process termination channel handed to every actor
    /// spawned from now on.
    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn registry(&self) -> &ActorTypeRegistry {
        &self.registry
    }

    /// Spawn an actor of a registered type. Must be called from within a
    /// tokio runtime.
    ///
    /// The actor receives INIT before anything queued through the returned
    /// reference.
    pub fn spawn(&mut self, type_name: &str, name: &str) -> Result<ActorRef, TroupeError> {
        if self.actor(name).is_some() {
            return Err(TroupeError::DuplicateActorName(name.to_string()));
        }
        let actor_type = self
            .registry
            .get(type_name)
            .ok_or_else(|| TroupeError::UnknownActorType(type_name.to_string()))?;

        let (operation_tx, operation_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_SIZE);
        let handle = ActorHandle::new(
            ActorId::generate(),
            name.to_string(),
            operation_tx.clone(),
            self.termination.clone(),
        );
        let shared = Arc::new(ActorShared::new(
            handle,
            type_name.to_string(),
            actor_type.capabilities().clone(),
            operation_tx,
            control_tx,
        ));

        let runtime = ActorRuntime::new(
            shared.clone(),
            actor_type.instantiate(),
            operation_rx,
            control_rx,
        );
        let task = tokio::spawn(runtime.run());
        let actor = ActorRef::new(shared);
        info!(actor = %name, actor_type = %type_name, id = %actor.id(), "spawned actor");

        self.actors.push(ActorProcess {
            actor: actor.clone(),
            task,
        });
        Ok(actor)
    }

    pub fn actor(&self, name: &str) -> Option<ActorRef> {
        self.actors
            .iter()
            .find(|p| p.actor.name() == name)
            .map(|p| p.actor.clone())
    }

    /// Actors in spawn order.
    pub fn actors(&self) -> impl Iterator<Item = &ActorRef> {
        self.actors.iter().map(|p| &p.actor)
    }

    /// Forward every outbound message of `from` to `to` as a SOCK event.
    ///
    /// Some output of `from` must be accepted by some input of `to`; `Any`
    /// on either side matches everything.
    pub fn connect(&self, from: &str, to: &str) -> Result<(), TroupeError> {
        let source = self
            .actor(from)
            .ok_or_else(|| TroupeError::ActorNotFound(from.to_string()))?;
        let target = self
            .actor(to)
            .ok_or_else(|| TroupeError::ActorNotFound(to.to_string()))?;

        let outputs = source.capabilities().outputs().to_vec();
        let inputs = target.capabilities().inputs().to_vec();
        let compatible = outputs
            .iter()
            .any(|output| inputs.iter().any(|input| output.accepts(input)));
        if !compatible {
            return Err(TroupeError::IncompatibleSlots {
                from: from.to_string(),
                to: to.to_string(),
                outputs,
                inputs,
            });
        }

        source.add_downstream(&target);
        debug!(from, to, "connected actors");
        Ok(())
    }

    /// Spawn, restore and connect everything a stage file declares.
    ///
    /// Actors are spawned in file order, each one's record is restored right
    /// after it is spawned, and connections are made once all actors exist.
    pub fn load(&mut self, config: &StageConfig) -> Result<(), TroupeError> {
        for actor in &config.actors {
            let spawned = self.spawn(&actor.actor_type, &actor.name)?;
            spawned.restore(&actor.record())?;
        }
        for actor in &config.actors {
            for target in &actor.connect {
                self.connect(&actor.name, target)?;
            }
        }
        Ok(())
    }

    /// Snapshot the running actors into `base`'s logging and script
    /// settings.
    pub fn to_config(&self, base: &StageConfig) -> StageConfig {
        let actors = self
            .actors()
            .map(|actor| {
                let record = actor.record();
                ActorConfig {
                    actor_type: actor.type_name().to_string(),
                    name: actor.name().to_string(),
                    position: record.position,
                    values: record.values,
                    connect: actor.downstream(),
                }
            })
            .collect();
        StageConfig {
            logging: base.logging.clone(),
            script: base.script.clone(),
            actors,
        }
    }

    /// Stop one actor and remove it from the stage.
    pub async fn stop(&mut self, name: &str) -> Result<(), TroupeError> {
        let index = self
            .actors
            .iter()
            .position(|p| p.actor.name() == name)
            .ok_or_else(|| TroupeError::ActorNotFound(name.to_string()))?;
        let process = self.actors.remove(index);
        let result = process.actor.stop().await;
        if let Err(e) = process.task.await {
            warn!(actor = %name, "actor task ended abnormally: {}", e);
        }
        result
    }

    /// Stop every actor: STOP then DESTROY, in spawn order, each given
    /// [`DEFAULT_SHUTDOWN_TIMEOUT`] before its task is aborted.
    pub async fn shutdown(&mut self) {
        info!(actors = self.actors.len(), "shutting down stage");
        for process in self.actors.drain(..) {
            let name = process.actor.name().to_string();
            match tokio::time::timeout(DEFAULT_SHUTDOWN_TIMEOUT, process.actor.stop()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(actor = %name, "{}", e),
                Err(_) => {
                    warn!(actor = %name, "shutdown timed out, aborting");
                    process.task.abort();
                }
            }
            if let Err(e) = process.task.await {
                if !e.is_cancelled() {
                    warn!(actor = %name, "actor task ended abnormally: {}", e);
                }
            }
        }
        info!("stage shut down");
    }
}
