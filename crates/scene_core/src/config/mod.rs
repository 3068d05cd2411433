//! Configuration system
//!
//! Scene configuration is plain serde data loaded from TOML or RON. It covers
//! logging, the default way meshes submit geometry, and how aggressively each
//! context drains its deferred task queue.

pub use serde::{Serialize, Deserialize};

use crate::scene::DataMode;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Parse configuration from a TOML string
    fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values that parse but make no sense
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Core behavior: logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// How meshes hand geometry to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Data mode used by spatials whose hint is `Inherit` all the way up
    pub default_data_mode: DataMode,
    /// Submit positions only (no normals, colors or texture coordinates)
    pub render_vertex_only: bool,
    /// Lights kept per mesh after sorting
    pub max_lights: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_data_mode: DataMode::Arrays,
            render_vertex_only: false,
            max_lights: 8,
        }
    }
}

/// Execution policy of each context's deferred task queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskQueueConfig {
    /// Run as many queued tasks per call as the time budget allows
    pub execute_all: bool,
    /// Time budget in milliseconds; `None` with `execute_all` means unbounded
    pub execution_time_ms: Option<u64>,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            execute_all: true,
            execution_time_ms: None,
        }
    }
}

/// Top-level scene configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Rendering configuration
    pub render: RenderConfig,
    /// Deferred task configuration
    pub tasks: TaskQueueConfig,
}

impl SceneConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log level cannot be empty".to_string()));
        }
        if self.render.max_lights == 0 {
            return Err(ConfigError::Invalid("max lights must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Config for SceneConfig {}
