//! GStreamer `playbin3` pipeline.

use crate::pipeline::{BusMessage, MediaPipeline, PipelineError, PipelineState};
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::debug;

pub struct PlaybinPipeline {
    playbin: gst::Element,
    bus: gst::Bus,
}

impl PlaybinPipeline {
    /// Initialise GStreamer (once per process) and build a `playbin3`.
    pub fn new() -> Result<Self, PipelineError> {
        gst::init().map_err(|e| PipelineError::Unavailable(e.to_string()))?;
        let playbin = gst::ElementFactory::make("playbin3")
            .name("playbin3")
            .property("instant-uri", true)
            .build()
            .map_err(|e| PipelineError::Unavailable(e.to_string()))?;
        let bus = playbin
            .bus()
            .ok_or_else(|| PipelineError::Unavailable("playbin3 has no bus".to_string()))?;
        Ok(Self { playbin, bus })
    }
}

fn to_gst(state: PipelineState) -> gst::State {
    match state {
        PipelineState::Null => gst::State::Null,
        PipelineState::Ready => gst::State::Ready,
        PipelineState::Paused => gst::State::Paused,
        PipelineState::Playing => gst::State::Playing,
    }
}

fn from_gst(state: gst::State) -> PipelineState {
    match state {
        gst::State::Ready => PipelineState::Ready,
        gst::State::Paused => PipelineState::Paused,
        gst::State::Playing => PipelineState::Playing,
        _ => PipelineState::Null,
    }
}

impl MediaPipeline for PlaybinPipeline {
    fn set_uri(&mut self, uri: &str) -> Result<(), PipelineError> {
        self.playbin.set_property("uri", uri);
        self.playbin.set_property("connection-speed", 56u64);
        Ok(())
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), PipelineError> {
        self.playbin
            .set_state(to_gst(state))
            .map(|_| ())
            .map_err(|_| PipelineError::StateChange(state))
    }

    fn is_seekable(&self) -> bool {
        let mut query = gst::query::Seeking::new(gst::Format::Time);
        if !self.playbin.query(&mut query) {
            return false;
        }
        let (_, seekable, _, _) = query.result();
        seekable
    }

    fn seek_to_start(&mut self) -> Result<(), PipelineError> {
        self.playbin
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::SEGMENT | gst::SeekFlags::ACCURATE,
                gst::ClockTime::ZERO,
            )
            .map_err(|_| PipelineError::Seek)
    }

    fn pump(&mut self) -> Vec<BusMessage> {
        let mut messages = Vec::new();
        while let Some(msg) = self.bus.pop() {
            use gst::MessageView;
            match msg.view() {
                MessageView::Error(err) => messages.push(BusMessage::Error {
                    source: msg.src().map(|s| s.name().to_string()),
                    message: err.error().to_string(),
                    debug: err.debug().map(|d| d.to_string()),
                }),
                MessageView::Eos(_) => messages.push(BusMessage::EndOfStream),
                MessageView::SegmentDone(_) => messages.push(BusMessage::SegmentDone),
                MessageView::StateChanged(change) => {
                    if msg.src() == Some(self.playbin.upcast_ref::<gst::Object>()) {
                        messages.push(BusMessage::StateChanged {
                            old: from_gst(change.old()),
                            new: from_gst(change.current()),
                        });
                    }
                }
                other => debug!("bus message: {:?}", other),
            }
        }
        messages
    }
}

impl Drop for PlaybinPipeline {
    fn drop(&mut self) {
        let _ = self.playbin.set_state(gst::State::Null);
    }
}
