use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use troupe::{
    Backend, Envelope, Event, EventKind, Message, SourceNotifier, SourceToken,
};

/// One delivered event, as seen by a [`Recorder`].
#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub kind: EventKind,
    pub envelope: Option<Envelope>,
}

pub type Journal = Arc<Mutex<Vec<Seen>>>;

/// Backend that records every event and reacts to a few test commands:
///
/// * `TIMER <ms>` sets the timer, and every tick is echoed as `[/tick, i n]`
///   until `STOP_AFTER` ticks have fired
/// * `WATCH` registers a source and publishes its notifier
/// * `UNWATCH` unregisters it
/// * `EXIT` asks for process termination
/// * `PANIC` panics inside the dispatch
///
/// Socket payloads are echoed back unchanged.
pub struct Recorder {
    journal: Journal,
    notifiers: Option<mpsc::UnboundedSender<SourceNotifier>>,
    token: Option<SourceToken>,
    ticks: i32,
    stop_after: i32,
}

impl Recorder {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            notifiers: None,
            token: None,
            ticks: 0,
            stop_after: 3,
        }
    }

    pub fn with_notifiers(mut self, tx: mpsc::UnboundedSender<SourceNotifier>) -> Self {
        self.notifiers = Some(tx);
        self
    }

    fn record(&self, event: &Event) {
        let envelope = event
            .payload
            .as_ref()
            .and_then(Message::first_envelope)
            .cloned();
        self.journal.lock().push(Seen {
            kind: event.kind,
            envelope,
        });
    }
}

impl Backend for Recorder {
    fn on_init(&mut self, event: Event) -> Option<Message> {
        self.record(&event);
        None
    }

    fn on_api(&mut self, event: Event) -> Option<Message> {
        self.record(&event);
        let call = event.decode_api().ok()?;
        match call.command.as_str() {
            "TIMER" => {
                let ms = call.argument.and_then(|v| v.as_i64()).unwrap_or(-1);
                event.handle.set_timeout(ms);
            }
            "WATCH" => {
                let token = SourceToken::next();
                let notifier = event.handle.register_source(token);
                self.token = Some(token);
                if let Some(tx) = &self.notifiers {
                    let _ = tx.send(notifier);
                }
            }
            "UNWATCH" => {
                if let Some(token) = self.token.take() {
                    event.handle.unregister_source(token);
                }
            }
            "EXIT" => event.handle.terminate_process("test exit"),
            "PANIC" => panic!("backend panicked on purpose"),
            _ => {}
        }
        None
    }

    fn on_timer(&mut self, event: Event) -> Option<Message> {
        self.record(&event);
        self.ticks += 1;
        if self.ticks >= self.stop_after {
            event.handle.set_timeout(-1);
        }
        Some(Message::from(Envelope::new().with("/tick").with(self.ticks)))
    }

    fn on_socket(&mut self, mut event: Event) -> Option<Message> {
        self.record(&event);
        event.take_payload()
    }

    fn on_custom_fd(&mut self, event: Event) -> Option<Message> {
        self.record(&event);
        let token = event.source_token()?;
        Some(Message::from(
            Envelope::new().with("/ready").with(token.raw() as i64),
        ))
    }

    fn on_stop(&mut self, event: Event) -> Option<Message> {
        self.record(&event);
        None
    }

    fn on_destroy(self: Box<Self>, event: Event) -> Option<Message> {
        self.record(&event);
        None
    }
}

/// Receive with a deadline so a broken test fails instead of hanging.
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed")
}

/// Assert nothing arrives within `ms`.
pub async fn assert_silent<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>, ms: u64) {
    if let Ok(Some(value)) = tokio::time::timeout(Duration::from_millis(ms), rx.recv()).await {
        panic!("expected no message, got {:?}", value);
    }
}

pub fn kinds(journal: &Journal) -> Vec<EventKind> {
    journal.lock().iter().map(|seen| seen.kind).collect()
}

/// Poll the journal until `count` events of `kind` have been recorded.
pub async fn wait_for(journal: &Journal, kind: EventKind, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while journal.lock().iter().filter(|seen| seen.kind == kind).count() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} {:?} event(s)",
            count,
            kind
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
