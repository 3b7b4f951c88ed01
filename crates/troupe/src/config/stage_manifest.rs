use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::capabilities::ActorRecord;
use crate::errors::TroupeError;

/// # StageConfig
///
/// A stage file: logging setup, script resolution paths and the actors to
/// spawn, with their persisted records and their downstream connections.
///
/// ```toml
/// [logging]
/// level = "debug"
///
/// [script]
/// search_paths = ["scripts"]
///
/// [[actor]]
/// type = "Pulse"
/// name = "clock"
/// position = [40.0, 80.0]
/// values = ["250", "/tick"]
/// connect = ["counter"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default, rename = "actor", skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<ActorConfig>,
}

impl Display for StageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StageConfig(logging: {:?}, script: {:?}, actors: {})",
            self.logging,
            self.script,
            self.actors.len()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub output: LogOutput,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    File,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    /// Log file used when `output = "file"`.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"))
            .join("troupe.log")
    }

    /// The configured level, falling back to `info` for unknown names.
    pub fn tracing_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptConfig {
    /// Directories searched by `import` statements inside scripts
    pub search_paths: Vec<PathBuf>,
}

/// One `[[actor]]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorConfig {
    #[serde(rename = "type")]
    pub actor_type: String,
    pub name: String,
    #[serde(default)]
    pub position: [f32; 2],
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connect: Vec<String>,
}

impl ActorConfig {
    pub fn new(actor_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            actor_type: actor_type.into(),
            name: name.into(),
            position: [0.0, 0.0],
            values: Vec::new(),
            connect: Vec::new(),
        }
    }

    pub fn record(&self) -> ActorRecord {
        ActorRecord {
            position: self.position,
            values: self.values.clone(),
        }
    }
}

impl StageConfig {
    /// Loads a stage configuration from a TOML file.
    ///
    /// ## Parameters
    ///
    /// * `path` - Path to the TOML stage file
    ///
    /// ## Returns
    ///
    /// * `Ok(StageConfig)` - The successfully parsed configuration
    /// * `Err(TroupeError)` - If the file cannot be read or contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TroupeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, TroupeError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, TroupeError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn actor(&self, name: &str) -> Option<&ActorConfig> {
        self.actors.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STAGE: &str = r#"
[logging]
level = "debug"
output = "file"
log_dir = "/tmp/troupe-logs"

[script]
search_paths = ["scripts", "/opt/shared"]

[[actor]]
type = "Pulse"
name = "clock"
position = [40.0, 80.5]
values = ["250", "/tick"]
connect = ["counter"]

[[actor]]
type = "Count"
name = "counter"
"#;

    #[test]
    fn parses_stage_file() {
        let config = StageConfig::from_str(STAGE).unwrap();
        assert_eq!(config.logging.tracing_level(), tracing::Level::DEBUG);
        assert_eq!(config.logging.output, LogOutput::File);
        assert_eq!(
            config.logging.log_path(),
            PathBuf::from("/tmp/troupe-logs/troupe.log")
        );
        assert_eq!(config.script.search_paths.len(), 2);

        let clock = config.actor("clock").unwrap();
        assert_eq!(clock.actor_type, "Pulse");
        assert_eq!(
            clock.record(),
            ActorRecord {
                position: [40.0, 80.5],
                values: vec!["250".to_string(), "/tick".to_string()],
            }
        );
        assert_eq!(clock.connect, vec!["counter"]);

        let counter = config.actor("counter").unwrap();
        assert_eq!(counter.position, [0.0, 0.0]);
        assert!(counter.values.is_empty());
    }

    #[test]
    fn defaults_and_round_trip() {
        let config = StageConfig::from_str("").unwrap();
        assert_eq!(config, StageConfig::default());
        assert_eq!(config.logging.output, LogOutput::Stdout);

        let config = StageConfig::from_str(STAGE).unwrap();
        let again = StageConfig::from_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stage.toml");
        std::fs::write(&path, STAGE).unwrap();
        assert_eq!(StageConfig::from_file(&path).unwrap().actors.len(), 2);
        assert!(matches!(
            StageConfig::from_file(dir.path().join("missing.toml")),
            Err(TroupeError::Io(_))
        ));
        assert!(matches!(
            StageConfig::from_str("[[actor]]\nname = 3"),
            Err(TroupeError::Config(_))
        ));
    }
}
