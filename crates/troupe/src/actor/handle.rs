//! # Actor Handle
//!
//! The backend's view of its owning actor. Every [`Event`](crate::events::Event)
//! carries one. Through it a backend changes its timer, registers auxiliary
//! event sources, publishes a report and, in the extreme case, asks for the
//! whole process to terminate. It deliberately offers no way to reach other
//! actors.

use crate::id::{ActorId, SourceToken};
use crate::message::Envelope;
use crate::report::{monotonic_ms, ActorReport};
use crate::shutdown::{Termination, TerminationRequest};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use super::types::ActorOperation;

/// Timer value meaning "never fire".
pub const TIMER_NEVER: i64 = -1;

/// # ActorHandle
///
/// Cheap to clone; all clones refer to the same actor.
#[derive(Clone)]
pub struct ActorHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: ActorId,
    name: String,
    timeout: AtomicI64,
    timer_changed: Notify,
    sources: Mutex<HashSet<SourceToken>>,
    report: Mutex<ActorReport>,
    operation_tx: mpsc::UnboundedSender<ActorOperation>,
    termination: Termination,
}

impl ActorHandle {
    pub(crate) fn new(
        id: ActorId,
        name: String,
        operation_tx: mpsc::UnboundedSender<ActorOperation>,
        termination: Termination,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                name,
                timeout: AtomicI64::new(TIMER_NEVER),
                timer_changed: Notify::new(),
                sources: Mutex::new(HashSet::new()),
                report: Mutex::new(ActorReport::default()),
                operation_tx,
                termination,
            }),
        }
    }

    pub fn id(&self) -> ActorId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current timer interval in milliseconds, `-1` for never.
    pub fn timeout(&self) -> i64 {
        self.inner.timeout.load(Ordering::Acquire)
    }

    /// Change the timer interval. Any negative value disables the timer.
    /// A changed interval restarts the countdown.
    pub fn set_timeout(&self, ms: i64) {
        let ms = if ms < 0 { TIMER_NEVER } else { ms };
        let previous = self.inner.timeout.swap(ms, Ordering::AcqRel);
        if previous != ms {
            debug!(actor = %self.inner.name, timeout = ms, "timer changed");
            self.inner.timer_changed.notify_one();
        }
    }

    pub(crate) async fn timer_changed(&self) {
        self.inner.timer_changed.notified().await
    }

    /// Register an auxiliary event source.
    ///
    /// The returned notifier may be moved to any thread. Each
    /// [`SourceNotifier::ready`] call produces one FDSOCK event carrying
    /// `token`, for as long as the token stays registered.
    pub fn register_source(&self, token: SourceToken) -> SourceNotifier {
        if !self.inner.sources.lock().insert(token) {
            warn!(actor = %self.inner.name, %token, "source registered twice");
        }
        SourceNotifier {
            token,
            operation_tx: self.inner.operation_tx.clone(),
        }
    }

    /// Returns whether the token was registered.
    pub fn unregister_source(&self, token: SourceToken) -> bool {
        self.inner.sources.lock().remove(&token)
    }

    pub fn is_source_registered(&self, token: SourceToken) -> bool {
        self.inner.sources.lock().contains(&token)
    }

    pub fn registered_sources(&self) -> Vec<SourceToken> {
        let mut tokens: Vec<_> = self.inner.sources.lock().iter().copied().collect();
        tokens.sort();
        tokens
    }

    pub(crate) fn unregister_all_sources(&self) -> usize {
        let mut sources = self.inner.sources.lock();
        let count = sources.len();
        sources.clear();
        count
    }

    /// Publish backend-specific report fields, as name/value pairs.
    /// A malformed envelope is logged and the previous fields are kept.
    pub fn set_report(&self, envelope: Envelope) {
        match ActorReport::from_envelope(&envelope) {
            Ok(fields) => self.inner.report.lock().replace_fields(fields),
            Err(e) => warn!(actor = %self.inner.name, "ignoring malformed report: {}", e),
        }
    }

    pub fn report(&self) -> ActorReport {
        self.inner.report.lock().clone()
    }

    pub(crate) fn stamp_active(&self) {
        self.inner.report.lock().stamp(monotonic_ms());
    }

    /// Raise the process-level termination signal.
    pub fn terminate_process(&self, reason: &str) {
        self.inner.termination.raise(TerminationRequest {
            actor: self.inner.name.clone(),
            reason: reason.to_string(),
        });
    }
}

impl fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("timeout", &self.timeout())
            .finish()
    }
}

/// Wakes the owning actor with an FDSOCK event for one source.
#[derive(Debug, Clone)]
pub struct SourceNotifier {
    token: SourceToken,
    operation_tx: mpsc::UnboundedSender<ActorOperation>,
}

impl SourceNotifier {
    pub fn token(&self) -> SourceToken {
        self.token
    }

    /// Returns `false` once the actor has shut down.
    pub fn ready(&self) -> bool {
        self.operation_tx
            .send(ActorOperation::SourceReady(self.token))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ActorHandle, mpsc::UnboundedReceiver<ActorOperation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ActorHandle::new(ActorId::generate(), "test".to_string(), tx, Termination::signal());
        (handle, rx)
    }

    #[test]
    fn timer_defaults_to_never_and_normalises_negatives() {
        let (handle, _rx) = handle();
        assert_eq!(handle.timeout(), TIMER_NEVER);
        handle.set_timeout(250);
        assert_eq!(handle.timeout(), 250);
        handle.set_timeout(-7);
        assert_eq!(handle.timeout(), TIMER_NEVER);
    }

    #[test]
    fn sources_register_and_notify() {
        let (handle, mut rx) = handle();
        let token = SourceToken::next();
        let notifier = handle.register_source(token);
        assert_eq!(handle.registered_sources(), vec![token]);

        assert!(notifier.ready());
        match rx.try_recv().unwrap() {
            ActorOperation::SourceReady(t) => assert_eq!(t, token),
            other => panic!("unexpected operation {:?}", other),
        }

        assert!(handle.unregister_source(token));
        assert!(!handle.unregister_source(token));
        assert!(handle.registered_sources().is_empty());
    }

    #[test]
    fn report_keeps_stamp_across_field_updates() {
        let (handle, _rx) = handle();
        handle.stamp_active();
        handle.set_report(Envelope::new().with("count").with(2i64));
        let report = handle.report();
        assert!(report.last_active().is_some());
        assert_eq!(report.fields().len(), 1);

        handle.set_report(Envelope::new().with("dangling"));
        assert_eq!(handle.report().fields().len(), 1);
    }
}
