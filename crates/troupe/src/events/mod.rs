//! # Events
//!
//! The host talks to a backend with exactly one kind of value: an [`Event`].
//! The tag set is closed. Actors cannot define their own event kinds; they
//! get custom behaviour through API commands and auxiliary sources instead.

use crate::actor::ActorHandle;
use crate::capabilities::ApiCall;
use crate::id::{ActorId, SourceToken};
use crate::message::{DecodeError, Envelope, Message};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Init,
    Api,
    Timer,
    Socket,
    CustomFd,
    Stop,
    Destroy,
}

impl EventKind {
    /// Wire name, as passed to script handlers.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Init => "INIT",
            EventKind::Api => "API",
            EventKind::Timer => "TIME",
            EventKind::Socket => "SOCK",
            EventKind::CustomFd => "FDSOCK",
            EventKind::Stop => "STOP",
            EventKind::Destroy => "DESTROY",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dispatch. Built by the host, consumed by exactly one backend call.
#[derive(Debug)]
pub struct Event {
    pub kind: EventKind,
    /// Name of the owning actor
    pub name: String,
    pub correlation_id: ActorId,
    pub payload: Option<Message>,
    /// Back-reference for timer changes and source registration
    pub handle: ActorHandle,
}

impl Event {
    pub fn new(kind: EventKind, handle: ActorHandle, payload: Option<Message>) -> Self {
        Self {
            kind,
            name: handle.name().to_string(),
            correlation_id: handle.id(),
            payload,
            handle,
        }
    }

    /// Move the payload out, leaving `None`.
    pub fn take_payload(&mut self) -> Option<Message> {
        self.payload.take()
    }

    /// Read an API payload as `[s command, argument?]`.
    ///
    /// Commands take zero or one argument; anything beyond that is a decode
    /// error.
    pub fn decode_api(&self) -> Result<ApiCall, DecodeError> {
        let envelope = self
            .payload
            .as_ref()
            .and_then(Message::first_envelope)
            .ok_or(DecodeError::Truncated { position: 0 })?;
        decode_api_envelope(envelope)
    }

    /// Token of the auxiliary source that became ready (FDSOCK only).
    pub fn source_token(&self) -> Option<SourceToken> {
        let envelope = self.payload.as_ref()?.first_envelope()?;
        let mut reader = envelope.reader();
        let raw = reader.pop_int64().ok()?;
        reader.finish().ok()?;
        Some(SourceToken::from_raw(raw as u64))
    }
}

fn decode_api_envelope(envelope: &Envelope) -> Result<ApiCall, DecodeError> {
    let mut reader = envelope.reader();
    let command = reader.pop_str()?;
    let argument = match reader.remaining() {
        0 => None,
        _ => Some(reader.pop()?.clone()),
    };
    reader.finish()?;
    Ok(ApiCall { command, argument })
}

/// Payload of an FDSOCK event.
pub(crate) fn source_payload(token: SourceToken) -> Message {
    Message::from(Envelope::new().with(token.raw() as i64))
}
