//! # Media Backend
//!
//! Actors that drive a playback engine. The engine runs its own loop and
//! posts state changes and errors on a bus; the backend translates API
//! commands into pipeline transitions and drains the bus after every
//! dispatch.
//!
//! The engine sits behind the [`MediaPipeline`] trait. With the `gstreamer`
//! feature, [`PlaybinPipeline`] implements it over GStreamer's `playbin3`.
//!
//! | command | argument | effect |
//! |---|---|---|
//! | `SET URL` | uri | set the source; plays at once with autoplay on |
//! | `PLAY` | | play, pump every 500 ms |
//! | `PAUSE` | | pause |
//! | `BACK` | | seek to the start |
//! | `SET LOOPPLAY` | `True` / `False` | restart at end of stream |
//! | `SET AUTOPLAY` | `True` / `False` | play on every new source |

pub mod backend;
pub mod pipeline;
#[cfg(feature = "gstreamer")]
pub mod playbin;

pub use backend::{MediaBackend, PLAYING_TIMEOUT_MS};
pub use pipeline::{BusMessage, MediaPipeline, PipelineError, PipelineState};
#[cfg(feature = "gstreamer")]
pub use playbin::PlaybinPipeline;

use std::sync::Arc;
use troupe::{ActorTypeRegistry, TroupeError};

pub const MEDIA_ACTOR_TYPE: &str = "MediaPlayer";

pub const MEDIA_CAPABILITIES: &str = "\
capabilities
    data
        name = \"URL\"
        type = \"string\"
        help = \"Load a video from url\"
        value = \"\"
        api_call = \"SET URL\"
        api_value = \"s\"
    data
        name = \"playback\"
        type = \"mediacontrol\"
    data
        name = \"loop\"
        type = \"bool\"
        help = \"Loop the stream\"
        value = \"False\"
        api_call = \"SET LOOPPLAY\"
        api_value = \"s\"
    data
        name = \"autoplay\"
        type = \"bool\"
        help = \"Start playing as soon as a source is set\"
        value = \"False\"
        api_call = \"SET AUTOPLAY\"
        api_value = \"s\"
inputs
    input
        type = \"OSC\"
outputs
    output
        type = \"OSC\"
";

/// Register a media actor type over any pipeline.
///
/// ## Parameters
///
/// * `type_name` - Name of the actor type.
/// * `build` - Builds one pipeline per actor, on INIT.
pub fn register_with<F, P>(
    registry: &mut ActorTypeRegistry,
    type_name: &str,
    build: F,
) -> Result<(), TroupeError>
where
    F: Fn() -> Result<P, PipelineError> + Send + Sync + 'static,
    P: MediaPipeline + 'static,
{
    let build = Arc::new(build);
    registry.register(type_name, Some(MEDIA_CAPABILITIES), move || {
        let build = build.clone();
        MediaBackend::new(move || (*build)())
    })
}

/// Register [`MEDIA_ACTOR_TYPE`] over GStreamer.
#[cfg(feature = "gstreamer")]
pub fn register(registry: &mut ActorTypeRegistry) -> Result<(), TroupeError> {
    register_with(registry, MEDIA_ACTOR_TYPE, PlaybinPipeline::new)
}
