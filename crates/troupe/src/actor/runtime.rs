//! # Actor Runtime
//!
//! One tokio task per actor. The task owns the receiving ends of the
//! actor's channels and turns everything that happens to the actor into
//! events for its backend:
//!
//! * INIT, once, before anything else
//! * API / SOCK / FDSOCK, in the order the operations were queued
//! * TIME, whenever the backend's timer interval elapses
//! * STOP then DESTROY, when shutdown is requested
//!
//! Each dispatch runs on the blocking pool while holding the actor's cell
//! lock, so a backend is never entered twice at once even though different
//! actors run fully in parallel.

use crate::events::{source_payload, Event, EventKind};
use crate::handler::{self, Backend};
use crate::id::SourceToken;
use crate::message::Message;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, error, info};

use super::actor_ref::ActorShared;
use super::handle::ActorHandle;
use super::types::{ActorControl, ActorOperation};

/// The live backend of an actor. `None` once DESTROY has run.
pub(crate) type BackendCell = Arc<Mutex<Option<Box<dyn Backend>>>>;

pub(crate) struct ActorRuntime {
    shared: Arc<ActorShared>,
    cell: BackendCell,
    operation_rx: mpsc::UnboundedReceiver<ActorOperation>,
    control_rx: mpsc::Receiver<ActorControl>,
}

fn deadline_after(timeout: i64) -> Instant {
    Instant::now() + Duration::from_millis(timeout.max(0) as u64)
}

impl ActorRuntime {
    pub(crate) fn new(
        shared: Arc<ActorShared>,
        backend: Box<dyn Backend>,
        operation_rx: mpsc::UnboundedReceiver<ActorOperation>,
        control_rx: mpsc::Receiver<ActorControl>,
    ) -> Self {
        Self {
            shared,
            cell: Arc::new(Mutex::new(Some(backend))),
            operation_rx,
            control_rx,
        }
    }

    fn handle(&self) -> &ActorHandle {
        &self.shared.handle
    }

    pub(crate) async fn run(mut self) {
        info!(actor = %self.shared.name, actor_type = %self.shared.type_name, "actor starting");
        self.dispatch(EventKind::Init, None).await;

        let mut armed = self.handle().timeout();
        let mut deadline = deadline_after(armed);

        loop {
            let current = self.handle().timeout();
            if current != armed {
                armed = current;
                deadline = deadline_after(armed);
            }

            tokio::select! {
                biased;

                control = self.control_rx.recv() => {
                    let response_tx = match control {
                        Some(ActorControl::Shutdown { response_tx }) => Some(response_tx),
                        None => None,
                    };
                    self.shutdown().await;
                    if let Some(response_tx) = response_tx {
                        let _ = response_tx.send(());
                    }
                    break;
                }

                Some(operation) = self.operation_rx.recv() => {
                    self.process_operation(operation).await;
                }

                _ = sleep_until(deadline), if armed >= 0 => {
                    self.dispatch(EventKind::Timer, None).await;
                    if self.handle().timeout() == armed {
                        deadline = deadline_after(armed);
                    }
                }

                _ = self.shared.handle.timer_changed() => {}
            }
        }

        info!(actor = %self.shared.name, "actor stopped");
    }

    async fn process_operation(&mut self, operation: ActorOperation) {
        match operation {
            ActorOperation::Api(message) => self.dispatch(EventKind::Api, Some(message)).await,
            ActorOperation::Socket(message) => {
                self.dispatch(EventKind::Socket, Some(message)).await
            }
            ActorOperation::SourceReady(token) => self.source_ready(token).await,
        }
    }

    async fn source_ready(&mut self, token: SourceToken) {
        if !self.handle().is_source_registered(token) {
            debug!(actor = %self.shared.name, %token, "dropping event for unregistered source");
            return;
        }
        self.dispatch(EventKind::CustomFd, Some(source_payload(token)))
            .await;
    }

    async fn dispatch(&mut self, kind: EventKind, payload: Option<Message>) {
        let event = Event::new(kind, self.handle().clone(), payload);
        let cell = self.cell.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut backend = cell.lock();
            match backend.as_mut() {
                Some(backend) => handler::dispatch(backend.as_mut(), event),
                None => None,
            }
        })
        .await;
        self.handle().stamp_active();

        match result {
            Ok(Some(message)) => self.shared.forward(message),
            Ok(None) => {}
            Err(e) => {
                error!(actor = %self.shared.name, event = %kind, "backend dispatch failed: {}", e)
            }
        }
    }

    async fn shutdown(&mut self) {
        debug!(actor = %self.shared.name, "shutting down");
        self.dispatch(EventKind::Stop, None).await;

        let leftover = self.handle().unregister_all_sources();
        if leftover > 0 {
            debug!(actor = %self.shared.name, leftover, "cleared sources left after STOP");
        }
        self.handle().set_timeout(-1);

        let event = Event::new(EventKind::Destroy, self.handle().clone(), None);
        let cell = self.cell.clone();
        let result = tokio::task::spawn_blocking(move || {
            let backend = cell.lock().take();
            backend.and_then(|backend| backend.on_destroy(event))
        })
        .await;

        match result {
            Ok(Some(message)) => self.shared.forward(message),
            Ok(None) => {}
            Err(e) => error!(actor = %self.shared.name, "backend destroy failed: {}", e),
        }
    }
}
