//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{UniqError, UniqResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base directory under which `runs/` is created.
    pub output_dir: PathBuf,

    /// Oversized-input splitting.
    pub chunking: ChunkingConfig,

    /// Batch generation defaults.
    pub batch: BatchDefaults,

    /// Encoder settings shared by both execution backends.
    pub encoding: EncodingConfig,

    /// Re-encode pass for inputs that are too large to handle directly.
    pub compression: CompressionConfig,

    /// Where per-frame neural math runs.
    pub device: ComputeDevice,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Chunk splitting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Split inputs longer than `max_chunk_duration_secs`.
    pub enabled: bool,

    /// Upper bound for a single chunk, in seconds.
    pub max_chunk_duration_secs: f64,
}

/// Batch generation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchDefaults {
    /// Hard cap on concurrent version workers.
    pub max_workers: usize,

    /// Versions generated when the caller does not say.
    pub default_versions: usize,
}

/// Output encoder settings (H.264 + AAC in MP4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// x264 constant rate factor.
    pub crf: u32,

    /// x264 preset name.
    pub preset: String,

    /// AAC bitrate in kbps.
    pub audio_bitrate_kbps: u32,
}

/// Compression pre-pass applied before splitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,

    /// Inputs at or below this size are used as-is.
    pub max_size_mb: f64,

    pub crf: u32,

    pub preset: String,

    /// Output height cap; width follows the aspect ratio.
    pub max_height: u32,

    pub audio_bitrate_kbps: u32,
}

/// Device selection for the neural stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// Use the accelerator when more than one core is available.
    #[default]
    Auto,
    /// Single-threaded CPU.
    Cpu,
    /// Data-parallel worker pool.
    Accelerator,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "uniquify=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated_videos"),
            chunking: ChunkingConfig::default(),
            batch: BatchDefaults::default(),
            encoding: EncodingConfig::default(),
            compression: CompressionConfig::default(),
            device: ComputeDevice::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chunk_duration_secs: 30.0,
        }
    }
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            max_workers: 4,
            default_versions: 3,
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            crf: 23,
            preset: "medium".to_string(),
            audio_bitrate_kbps: 128,
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_mb: 2000.0,
            crf: 30,
            preset: "fast".to_string(),
            max_height: 720,
            audio_bitrate_kbps: 96,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> UniqResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> UniqResult<()> {
        if self.chunking.max_chunk_duration_secs <= 0.0 {
            return Err(UniqError::config(
                "chunking.max_chunk_duration_secs must be positive",
            ));
        }
        if self.batch.max_workers == 0 {
            return Err(UniqError::config("batch.max_workers must be at least 1"));
        }
        if self.encoding.crf > 51 || self.compression.crf > 51 {
            return Err(UniqError::config("crf must be within 0..=51"));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("uniquify").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.max_chunk_duration_secs, 30.0);
        assert_eq!(config.batch.max_workers, 4);
        assert_eq!(config.compression.max_height, 720);
        assert_eq!(config.device, ComputeDevice::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "chunking": { "max_chunk_duration_secs": 12.5 }, "device": "cpu" }"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.chunking.max_chunk_duration_secs, 12.5);
        assert!(config.chunking.enabled);
        assert_eq!(config.device, ComputeDevice::Cpu);
        assert_eq!(config.encoding.preset, "medium");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "batch": { "max_workers": 0 } }"#).unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(UniqError::Config { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.encoding.crf = 18;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.encoding.crf, 18);
    }
}
