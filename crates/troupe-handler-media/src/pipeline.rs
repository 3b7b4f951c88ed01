//! The seam between the media backend and a playback engine.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("media engine unavailable: {0}")]
    Unavailable(String),

    #[error("state change to {0} rejected")]
    StateChange(PipelineState),

    #[error("stream is not seekable")]
    NotSeekable,

    #[error("seek failed")]
    Seek,

    #[error("no pipeline")]
    NotBuilt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Null => "null",
            PipelineState::Ready => "ready",
            PipelineState::Paused => "paused",
            PipelineState::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Something the engine reported on its bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Error {
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    EndOfStream,
    SegmentDone,
    StateChanged {
        old: PipelineState,
        new: PipelineState,
    },
}

/// A playback engine with its own internal loop.
///
/// The engine is expected to be thread-safe on its own; the backend only
/// guarantees it is driven from one dispatch at a time.
pub trait MediaPipeline: Send {
    fn set_uri(&mut self, uri: &str) -> Result<(), PipelineError>;

    /// Request a state change. Rejection must be reported, not swallowed.
    fn set_state(&mut self, state: PipelineState) -> Result<(), PipelineError>;

    fn is_seekable(&self) -> bool;

    fn seek_to_start(&mut self) -> Result<(), PipelineError>;

    /// Run every pending iteration of the engine's loop without blocking
    /// and return what it posted.
    fn pump(&mut self) -> Vec<BusMessage>;
}

impl<P: MediaPipeline + ?Sized> MediaPipeline for Box<P> {
    fn set_uri(&mut self, uri: &str) -> Result<(), PipelineError> {
        (**self).set_uri(uri)
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), PipelineError> {
        (**self).set_state(state)
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn seek_to_start(&mut self) -> Result<(), PipelineError> {
        (**self).seek_to_start()
    }

    fn pump(&mut self) -> Vec<BusMessage> {
        (**self).pump()
    }
}
