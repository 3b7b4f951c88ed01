//! # Actor Reference
//!
//! The host's view of a running actor. Everything a controller may do to an
//! actor goes through [`ActorRef`]: send API commands and data, change
//! capability values, take snapshots, persist and restore, stop.

use crate::capabilities::{ActorRecord, ApiCall, CapabilityDescriptor};
use crate::errors::TroupeError;
use crate::id::ActorId;
use crate::message::{Message, Value};
use crate::report::ActorReport;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::handle::ActorHandle;
use super::types::{ActorControl, ActorOperation, Outlet};

pub(crate) struct ActorShared {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) handle: ActorHandle,
    capabilities: RwLock<CapabilityDescriptor>,
    position: Mutex<[f32; 2]>,
    operation_tx: mpsc::UnboundedSender<ActorOperation>,
    control_tx: mpsc::Sender<ActorControl>,
    outlets: Mutex<Vec<Outlet>>,
}

impl ActorShared {
    pub(crate) fn new(
        handle: ActorHandle,
        type_name: String,
        capabilities: CapabilityDescriptor,
        operation_tx: mpsc::UnboundedSender<ActorOperation>,
        control_tx: mpsc::Sender<ActorControl>,
    ) -> Self {
        Self {
            id: handle.id(),
            name: handle.name().to_string(),
            type_name,
            handle,
            capabilities: RwLock::new(capabilities),
            position: Mutex::new([0.0, 0.0]),
            operation_tx,
            control_tx,
            outlets: Mutex::new(Vec::new()),
        }
    }

    /// Hand an outbound message to every outlet, dropping closed ones.
    pub(crate) fn forward(&self, message: Message) {
        let mut outlets = self.outlets.lock();
        outlets.retain(|outlet| {
            let delivered = outlet.deliver(message.clone());
            if !delivered {
                debug!(actor = %self.name, "dropping closed outlet");
            }
            delivered
        });
    }
}

/// Host-facing reference to a running actor. Cheap to clone.
#[derive(Clone)]
pub struct ActorRef {
    shared: Arc<ActorShared>,
}

impl ActorRef {
    pub(crate) fn new(shared: Arc<ActorShared>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> ActorId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn type_name(&self) -> &str {
        &self.shared.type_name
    }

    pub fn is_running(&self) -> bool {
        !self.shared.control_tx.is_closed()
    }

    fn enqueue(&self, operation: ActorOperation) -> Result<(), TroupeError> {
        self.shared
            .operation_tx
            .send(operation)
            .map_err(|_| TroupeError::ActorStopped(self.shared.name.clone()))
    }

    /// Queue an API command with zero or one argument.
    pub fn send_api(&self, command: &str, argument: Option<Value>) -> Result<(), TroupeError> {
        self.send_call(ApiCall {
            command: command.to_string(),
            argument,
        })
    }

    pub fn send_call(&self, call: ApiCall) -> Result<(), TroupeError> {
        debug!(actor = %self.shared.name, command = %call.command, "queue api call");
        self.enqueue(ActorOperation::Api(call.into_message()))
    }

    /// Queue inbound data, delivered as a SOCK event.
    pub fn send_socket(&self, message: Message) -> Result<(), TroupeError> {
        self.enqueue(ActorOperation::Socket(message))
    }

    /// Change a capability value and queue the resulting API call, if the
    /// entry declares one.
    pub fn apply_change(&self, entry: &str, text: &str) -> Result<(), TroupeError> {
        let call = self.shared.capabilities.write().apply_change(entry, text)?;
        match call {
            Some(call) => self.send_call(call),
            None => Ok(()),
        }
    }

    /// Read snapshot of the capability descriptor.
    pub fn capabilities(&self) -> CapabilityDescriptor {
        self.shared.capabilities.read().clone()
    }

    pub fn set_position(&self, x: f32, y: f32) {
        *self.shared.position.lock() = [x, y];
    }

    pub fn record(&self) -> ActorRecord {
        ActorRecord {
            position: *self.shared.position.lock(),
            values: self.shared.capabilities.read().dump_values(),
        }
    }

    /// Restore a persisted record. Every value is re-applied, so the
    /// backend receives the same API calls a live edit would send.
    pub fn restore(&self, record: &ActorRecord) -> Result<(), TroupeError> {
        *self.shared.position.lock() = record.position;
        let calls = self
            .shared
            .capabilities
            .write()
            .restore_values(&record.values)?;
        for call in calls {
            self.send_call(call)?;
        }
        Ok(())
    }

    pub fn report(&self) -> ActorReport {
        self.shared.handle.report()
    }

    /// Current timer interval in ms, `-1` for never.
    pub fn timeout(&self) -> i64 {
        self.shared.handle.timeout()
    }

    /// Auxiliary sources the backend currently has registered.
    pub fn sources(&self) -> Vec<crate::id::SourceToken> {
        self.shared.handle.registered_sources()
    }

    /// Receive a copy of every message this actor emits from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.outlets.lock().push(Outlet::Subscriber(tx));
        rx
    }

    pub(crate) fn add_downstream(&self, downstream: &ActorRef) {
        self.shared.outlets.lock().push(Outlet::Actor {
            name: downstream.name().to_string(),
            operation_tx: downstream.shared.operation_tx.clone(),
        });
    }

    pub fn downstream(&self) -> Vec<String> {
        self.shared
            .outlets
            .lock()
            .iter()
            .filter_map(|outlet| match outlet {
                Outlet::Actor { name, .. } => Some(name.clone()),
                Outlet::Subscriber(_) => None,
            })
            .collect()
    }

    /// Deliver STOP and DESTROY and wait for the actor task to finish them.
    pub async fn stop(&self) -> Result<(), TroupeError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.shared
            .control_tx
            .send(ActorControl::Shutdown { response_tx })
            .await
            .map_err(|_| TroupeError::ActorStopped(self.shared.name.clone()))?;
        response_rx
            .await
            .map_err(|_| TroupeError::ActorStopped(self.shared.name.clone()))
    }
}

impl std::fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("type", &self.shared.type_name)
            .finish()
    }
}
