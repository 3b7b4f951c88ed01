pub mod stage_manifest;

pub use stage_manifest::{ActorConfig, LogOutput, LoggingConfig, ScriptConfig, StageConfig};
