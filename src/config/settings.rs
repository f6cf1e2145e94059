//! Configuration settings for Lectern.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub pipeline: PipelineSettings,
    pub fetch: FetchSettings,
    pub media: MediaSettings,
    pub describer: DescriberSettings,
    pub store: StoreSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory under which each run creates its working directory.
    pub work_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.lectern".to_string(),
            work_dir: "/tmp/lectern".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Pipeline scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Target length of each segment in seconds.
    pub segment_seconds: u32,
    /// Maximum number of segments described concurrently.
    pub max_concurrent_segments: usize,
    /// Hard timeout for a single segment description call.
    pub segment_timeout_secs: u64,
    /// Upper bound on a whole run, from download to the last chunk.
    pub run_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            segment_seconds: 120,
            max_concurrent_segments: 3,
            segment_timeout_secs: 180, // 3 minutes
            run_timeout_secs: 7200,    // 2 hours
        }
    }
}

impl PipelineSettings {
    pub fn segment_timeout(&self) -> Duration {
        Duration::from_secs(self.segment_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

/// Source download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Accept `file://` sources in addition to http(s).
    pub allow_file_urls: bool,
    /// TCP connect timeout for downloads.
    pub connect_timeout_secs: u64,
    /// Abort downloads larger than this many bytes.
    pub max_bytes: Option<u64>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            allow_file_urls: false,
            connect_timeout_secs: 30,
            max_bytes: None,
        }
    }
}

/// External media tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    /// ffmpeg binary used for segmenting.
    pub ffmpeg: String,
    /// ffprobe binary used for duration probing.
    pub ffprobe: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

/// Description provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DescriberProvider {
    /// OpenAI audio transcription, rendered as timestamp markers.
    #[default]
    Whisper,
    /// Generic multimodal HTTP endpoint.
    Http,
}

impl std::str::FromStr for DescriberProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whisper" | "openai" => Ok(DescriberProvider::Whisper),
            "http" => Ok(DescriberProvider::Http),
            _ => Err(format!("Unknown describer provider: {}", s)),
        }
    }
}

impl std::fmt::Display for DescriberProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriberProvider::Whisper => write!(f, "whisper"),
            DescriberProvider::Http => write!(f, "http"),
        }
    }
}

/// Segment description capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriberSettings {
    /// Provider (whisper, http).
    pub provider: DescriberProvider,
    /// Model name passed to the provider.
    pub model: String,
    /// Endpoint URL for the http provider.
    pub endpoint: Option<String>,
    /// Environment variable holding the API token.
    pub api_key_env: String,
    /// Optional language hint.
    pub language: Option<String>,
}

impl Default for DescriberSettings {
    fn default() -> Self {
        Self {
            provider: DescriberProvider::Whisper,
            model: "whisper-1".to_string(),
            endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            language: None,
        }
    }
}

/// Chunk and status storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.lectern/lectern.db".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings: Settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::LecternError;

        if self.pipeline.segment_seconds == 0 {
            return Err(LecternError::Config(
                "pipeline.segment_seconds must be greater than zero".to_string(),
            ));
        }
        if self.pipeline.max_concurrent_segments == 0 {
            return Err(LecternError::Config(
                "pipeline.max_concurrent_segments must be at least 1".to_string(),
            ));
        }
        if self.pipeline.segment_timeout_secs == 0 || self.pipeline.run_timeout_secs == 0 {
            return Err(LecternError::Config(
                "pipeline.segment_timeout_secs and pipeline.run_timeout_secs must be greater than zero"
                    .to_string(),
            ));
        }
        if self.describer.provider == DescriberProvider::Http && self.describer.endpoint.is_none() {
            return Err(LecternError::Config(
                "describer.endpoint is required for the http provider".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::LecternError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lectern")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded working directory root.
    pub fn work_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.work_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.pipeline.segment_seconds, 120);
        assert_eq!(settings.pipeline.segment_timeout(), Duration::from_secs(180));
        assert!(!settings.fetch.allow_file_urls);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [pipeline]
            max_concurrent_segments = 8

            [describer]
            provider = "http"
            endpoint = "https://describe.example.com/v1/segments"
            "#,
        )
        .unwrap();

        assert_eq!(settings.pipeline.max_concurrent_segments, 8);
        assert_eq!(settings.pipeline.segment_seconds, 120);
        assert_eq!(settings.describer.provider, DescriberProvider::Http);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.pipeline.max_concurrent_segments = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.describer.provider = DescriberProvider::Http;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.pipeline.run_timeout_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.pipeline.segment_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.media.ffmpeg, "ffmpeg");
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("openai".parse::<DescriberProvider>().unwrap(), DescriberProvider::Whisper);
        assert_eq!("HTTP".parse::<DescriberProvider>().unwrap(), DescriberProvider::Http);
        assert!("gemini".parse::<DescriberProvider>().is_err());
    }
}
