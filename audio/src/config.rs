//! Presentation configuration.
//!
//! Stored as YAML, by default in `~/.narrata/config.yaml`:
//!
//! ```yaml
//! storage:
//!   kind: file
//!   content_dir: ./content
//! default_format:
//!   sample_rate: 44100
//!   bits_per_sample: 16
//!   channels: 1
//! mime_type: audio/x-wav
//! ```

use std::path::{Path, PathBuf};

use narrata_data::{MIME_AUDIO_WAV, Storage};
use serde::{Deserialize, Serialize};

use crate::pcm::PcmFormat;
use crate::{AudioError, AudioResult};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".narrata";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Settings of one presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    /// Where provider payloads are kept.
    pub storage: StorageConfig,

    /// Format of newly created audio media.
    pub default_format: PcmFormat,

    /// Mime type of audio providers.
    pub mime_type: String,
}

/// Serialized form of [`Storage`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    #[default]
    Memory,
    File {
        /// Relative paths are resolved against the config file's directory.
        content_dir: PathBuf,
    },
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::Memory,
            default_format: PcmFormat::CD_MONO,
            mime_type: MIME_AUDIO_WAV.to_string(),
        }
    }
}

impl PresentationConfig {
    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(DEFAULT_CONFIG_FILE))
    }

    pub fn from_yaml(content: &str) -> AudioResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> AudioResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Saves the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> AudioResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// The storage to open, with a relative content directory resolved
    /// against `base`.
    pub fn storage(&self, base: Option<&Path>) -> Storage {
        match &self.storage {
            StorageConfig::Memory => Storage::Memory,
            StorageConfig::File { content_dir } => {
                let content_dir = match base {
                    Some(base) if content_dir.is_relative() => base.join(content_dir),
                    _ => content_dir.clone(),
                };
                Storage::File { content_dir }
            }
        }
    }

    fn validate(&self) -> AudioResult<()> {
        if self.mime_type.trim().is_empty() {
            return Err(AudioError::MissingArgument("mime type"));
        }
        Ok(())
    }
}

impl From<&Storage> for StorageConfig {
    fn from(storage: &Storage) -> Self {
        match storage {
            Storage::Memory => StorageConfig::Memory,
            Storage::File { content_dir } => StorageConfig::File {
                content_dir: content_dir.clone(),
            },
        }
    }
}

/// Loads the configuration from `custom_path` or the default location.
///
/// A missing file yields the defaults.
pub fn load_config(custom_path: Option<&Path>) -> AudioResult<PresentationConfig> {
    let path = match custom_path {
        Some(p) => p.to_path_buf(),
        None => match PresentationConfig::default_config_path() {
            Some(p) => p,
            None => return Ok(PresentationConfig::default()),
        },
    };
    if !path.exists() {
        return Ok(PresentationConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    PresentationConfig::from_yaml(&content)
}
