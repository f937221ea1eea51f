//! Configuration for generation budgets and forbidden phrases.
//!
//! The configuration system supports:
//! - Bundled defaults (include_str! from storyloom.toml)
//! - User overrides (~/.config/storyloom/storyloom.toml, then ./storyloom.toml)
//! - Automatic merging with user values taking precedence

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use storyloom_core::ChatConfig;
use storyloom_error::{ConfigError, StoryloomError, StoryloomResult};
use storyloom_validation::{PhraseMatcher, PhraseSet, default_phrase_sets};
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../storyloom.toml");

/// Budgets and model parameters for generation.
///
/// # Example
///
/// ```toml
/// [generation]
/// max_attempts = 3
/// min_frame_difference = 4
/// model = "deepseek-chat"
/// temperature = 0.4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Model calls per unit, generation included
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,

    /// Calls allowed for one narrow continuity repair
    #[serde(default = "default_attempts")]
    pub continuity_repair_attempts: u32,

    /// Calls allowed for one secondary-attribute repair
    #[serde(default = "default_attempts")]
    pub secondary_repair_attempts: u32,

    /// Minimum differentiation score between adjacent frames
    #[serde(default = "default_min_frame_difference")]
    pub min_frame_difference: u32,

    /// Model identifier override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens per call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_attempts() -> u32 {
    2
}

fn default_min_frame_difference() -> u32 {
    3
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_attempts(),
            continuity_repair_attempts: default_attempts(),
            secondary_repair_attempts: default_attempts(),
            min_frame_difference: default_min_frame_difference(),
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl GenerationSettings {
    /// Reject budgets that would make generation impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let budgets = [
            ("max_attempts", self.max_attempts),
            ("continuity_repair_attempts", self.continuity_repair_attempts),
            ("secondary_repair_attempts", self.secondary_repair_attempts),
            ("min_frame_difference", self.min_frame_difference),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(ConfigError::new(format!(
                    "generation.{} must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Base chat configuration carrying the model parameters.
    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..ChatConfig::default()
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryloomConfig {
    /// Generation budgets
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Locale-tagged forbidden-phrase sets
    #[serde(default = "default_phrase_sets")]
    pub phrases: Vec<PhraseSet>,
}

impl Default for StoryloomConfig {
    fn default() -> Self {
        Self {
            generation: GenerationSettings::default(),
            phrases: default_phrase_sets(),
        }
    }
}

impl StoryloomConfig {
    /// Load configuration from a single file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> StoryloomResult<Self> {
        debug!("Loading configuration from file");
        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to read configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML text.
    ///
    /// # Examples
    ///
    /// ```
    /// use storyloom_narrative::StoryloomConfig;
    ///
    /// let config = StoryloomConfig::from_toml_str("[generation]\nmax_attempts = 3\n").unwrap();
    /// assert_eq!(config.generation.max_attempts, 3);
    /// assert_eq!(config.generation.min_frame_difference, 3);
    /// ```
    pub fn from_toml_str(text: &str) -> StoryloomResult<Self> {
        let config: Self = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to read configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: current dir > home dir > bundled defaults.
    #[instrument]
    pub fn load() -> StoryloomResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/storyloom/storyloom.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("storyloom").required(false));

        let config: Self = builder
            .build()
            .map_err(|e| {
                StoryloomError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                StoryloomError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// The bundled defaults alone.
    pub fn bundled() -> StoryloomResult<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Validate budgets and compile phrase patterns.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generation.validate()?;
        PhraseMatcher::new(&self.phrases).map(|_| ())
    }

    /// Compile the configured phrase sets.
    pub fn phrase_matcher(&self) -> Result<PhraseMatcher, ConfigError> {
        PhraseMatcher::new(&self.phrases)
    }
}
