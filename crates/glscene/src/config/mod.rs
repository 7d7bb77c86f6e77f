//! Configuration system
//!
//! Renderer settings are plain serde structs. Any type implementing
//! [`Config`] can be loaded from or saved to TOML or RON, picked by file
//! extension.

pub use serde::{Serialize, Deserialize};

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

    /// A value is outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Tessellation settings used when decomposing curved geometries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Number of segments around a full cylinder
    pub cylinder_subdivisions: u32,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            cylinder_subdivisions: 24,
        }
    }
}

/// # Renderer Configuration
///
/// Tunables for the interactive renderer. Everything has a sensible
/// default, so a config file only needs to name the values it changes:
///
/// ```toml
/// vbo_budget_bytes = 16777216
/// shadows_enabled = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Memory budget for cached vertex buffers, in bytes
    pub vbo_budget_bytes: usize,
    /// Maximum number of simultaneously enabled lights
    pub max_lights: usize,
    /// Fragments with alpha at or below this value are discarded
    pub alpha_threshold: f32,
    /// Whether shadow-casting lights get their own render pass
    pub shadows_enabled: bool,
    /// Whether the anti-alias style may enable line/point smoothing
    pub line_smoothing: bool,
    /// Tessellation settings for curved geometries
    pub decomposition: DecompositionConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            vbo_budget_bytes: 64 * 1024 * 1024,
            max_lights: 8,
            alpha_threshold: 0.0,
            shadows_enabled: false,
            line_smoothing: true,
            decomposition: DecompositionConfig::default(),
        }
    }
}

impl Config for RendererConfig {}

impl RendererConfig {
    /// Reject values the renderer cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vbo_budget_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "vbo_budget_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_lights == 0 {
            return Err(ConfigError::Invalid {
                field: "max_lights",
                reason: "at least one light slot is required".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.alpha_threshold) {
            return Err(ConfigError::Invalid {
                field: "alpha_threshold",
                reason: format!("{} is outside [0, 1)", self.alpha_threshold),
            });
        }
        if self.decomposition.cylinder_subdivisions < 3 {
            return Err(ConfigError::Invalid {
                field: "decomposition.cylinder_subdivisions",
                reason: "a cylinder needs at least 3 segments".to_string(),
            });
        }
        Ok(())
    }
}
