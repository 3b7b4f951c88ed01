//! # Actor Types
//!
//! Channel message types shared by the actor runtime, the backend-facing
//! [`ActorHandle`](super::ActorHandle) and the host-facing
//! [`ActorRef`](super::ActorRef).

use crate::id::SourceToken;
use crate::message::Message;
use tokio::sync::{mpsc, oneshot};

/// # ActorOperation
///
/// Work queued for an actor. Operations are dispatched strictly in the order
/// they were sent.
#[derive(Debug)]
pub enum ActorOperation {
    /// Out-of-band control command, `[s command, argument?]`
    Api(Message),
    /// Inbound data from upstream actors or the host
    Socket(Message),
    /// An auxiliary source registered by the backend became ready
    SourceReady(SourceToken),
}

/// # ActorControl
///
/// Lifecycle requests. Control messages take priority over queued
/// operations.
#[derive(Debug)]
pub enum ActorControl {
    /// Deliver STOP then DESTROY and end the actor task
    Shutdown {
        /// Channel to confirm shutdown completion
        response_tx: oneshot::Sender<()>,
    },
}

/// A destination for an actor's outbound messages.
#[derive(Debug, Clone)]
pub enum Outlet {
    /// Delivered to another actor as a SOCK event
    Actor {
        name: String,
        operation_tx: mpsc::UnboundedSender<ActorOperation>,
    },
    /// Handed to a host-side listener as is
    Subscriber(mpsc::UnboundedSender<Message>),
}

impl Outlet {
    /// Returns `false` once the receiving side is gone.
    pub(crate) fn deliver(&self, message: Message) -> bool {
        match self {
            Outlet::Actor { operation_tx, .. } => {
                operation_tx.send(ActorOperation::Socket(message)).is_ok()
            }
            Outlet::Subscriber(tx) => tx.send(message).is_ok(),
        }
    }
}
