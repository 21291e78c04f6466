//! Engine configuration.
//!
//! All tunables for a verification engine instance live in one
//! [`EngineConfig`] tree, deserialized from TOML. Every section and field
//! has a default, so an empty document yields a working configuration and
//! operators only override what they need.
//!
//! Validation is fail-fast: [`EngineConfig::from_toml`] rejects unknown
//! fields, out-of-range values, and extraction patterns that do not
//! compile, so a misconfigured engine never starts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::DEFAULT_MAX_ARTIFACT_SIZE;
use crate::assistant::{DEFAULT_ASSISTANT_TIMEOUT_MS, DEFAULT_MAX_TAGS};
use crate::extract::{ExtractSettings, SettingsError};

/// Default number of worker threads for the extraction stage.
pub const DEFAULT_MAX_EXTRACT_WORKERS: usize = 4;

/// Errors raised while loading or validating engine configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document is not valid TOML or does not match the
    /// expected shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Extraction settings failed to compile.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// A field value is outside its permitted range.
    #[error("invalid configuration: {detail}")]
    Validation {
        /// Human-readable description of the rejected field.
        detail: String,
    },
}

/// Artifact store limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Maximum accepted artifact size in bytes.
    pub max_artifact_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_artifact_size: DEFAULT_MAX_ARTIFACT_SIZE,
        }
    }
}

/// Narrative assistant stage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssistantConfig {
    /// Whether writeups are sent to the narrative assistant at all. When
    /// disabled the engine behaves as if no assistant were wired.
    pub enabled: bool,

    /// Hard deadline for a single annotation call, in milliseconds.
    pub timeout_ms: u64,

    /// Maximum number of tags accepted from one annotation call.
    pub max_tags: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: DEFAULT_ASSISTANT_TIMEOUT_MS,
            max_tags: DEFAULT_MAX_TAGS,
        }
    }
}

/// Pipeline concurrency settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Upper bound on concurrently extracting artifacts per evaluation.
    pub max_extract_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_extract_workers: DEFAULT_MAX_EXTRACT_WORKERS,
        }
    }
}

/// Root configuration for a verification engine instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Artifact store limits.
    pub store: StoreConfig,

    /// Evidence extraction settings.
    pub extract: ExtractSettings,

    /// Narrative assistant stage settings.
    pub assistant: AssistantConfig,

    /// Pipeline concurrency settings.
    pub pipeline: PipelineConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parses and validates configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, names unknown
    /// fields, or fails [`EngineConfig::validate`].
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for out-of-range values and
    /// [`ConfigError::Settings`] when extraction patterns do not compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_artifact_size == 0 {
            return Err(ConfigError::Validation {
                detail: "store.max_artifact_size must be positive".to_string(),
            });
        }
        if self.pipeline.max_extract_workers == 0 {
            return Err(ConfigError::Validation {
                detail: "pipeline.max_extract_workers must be positive".to_string(),
            });
        }
        if self.assistant.enabled {
            if self.assistant.timeout_ms == 0 {
                return Err(ConfigError::Validation {
                    detail: "assistant.timeout_ms must be positive when enabled".to_string(),
                });
            }
            if self.assistant.max_tags == 0 {
                return Err(ConfigError::Validation {
                    detail: "assistant.max_tags must be positive when enabled".to_string(),
                });
            }
        }
        // Surfaces invalid regex patterns at load time rather than first use.
        self.extract.compile()?;
        Ok(())
    }
}
