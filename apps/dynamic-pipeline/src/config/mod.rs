use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{DynamicPipelineError, Result};

pub const DEFAULT_URI: &str =
    "https://gstreamer.freedesktop.org/data/media/sintel_trailer-480p.webm";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub audio: AudioConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub factory: String,
    pub uri: String,
}

/// Factories of the `convert ! resample ! sink` audio chain
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    pub convert: String,
    pub resample: String,
    pub sink: String,
}

/// Factories of the `convert ! sink` video chain
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VideoConfig {
    pub convert: String,
    pub sink: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "dynamic-pipeline".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "test-pipeline".to_string(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            factory: "uridecodebin".to_string(),
            uri: DEFAULT_URI.to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            convert: "audioconvert".to_string(),
            resample: "audioresample".to_string(),
            sink: "autoaudiosink".to_string(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            convert: "videoconvert".to_string(),
            sink: "autovideosink".to_string(),
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.pipeline.name.trim().is_empty() {
            return Err("pipeline name must not be empty".to_string());
        }

        match self.source.uri.split_once("://") {
            Some((scheme, _)) if !scheme.is_empty() => {}
            _ => {
                return Err(format!(
                    "source uri {:?} is not a valid URI (expected <scheme>://...)",
                    self.source.uri
                ))
            }
        }

        for (role, factory) in self.factories() {
            if factory.trim().is_empty() {
                return Err(format!("factory for {} must not be empty", role));
            }
        }

        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DynamicPipelineError::ConfigError(format!(
                "Configuration file not found: {:?}\n\
                Please create a config file or specify the path with --config\n\
                You can use config.example.toml as a template",
                path
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DynamicPipelineError::ConfigError(format!(
                "Failed to read configuration file {:?}: {}",
                path, e
            ))
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            DynamicPipelineError::ConfigError(msg) => DynamicPipelineError::ConfigError(
                format!("Invalid configuration file {:?}: {}", path, msg),
            ),
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| DynamicPipelineError::ConfigError(e.to_string()))?;

        config.validate().map_err(DynamicPipelineError::ConfigError)?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Role and factory name of every element in the session, source first
    pub fn factories(&self) -> [(&'static str, &str); 6] {
        [
            ("source", self.source.factory.as_str()),
            ("audio convert", self.audio.convert.as_str()),
            ("audio resample", self.audio.resample.as_str()),
            ("audio sink", self.audio.sink.as_str()),
            ("video convert", self.video.convert.as_str()),
            ("video sink", self.video.sink.as_str()),
        ]
    }

    pub fn required_factories(&self) -> Vec<String> {
        let mut factories: Vec<String> = Vec::new();
        for (_, factory) in self.factories() {
            if !factories.iter().any(|f| f == factory) {
                factories.push(factory.to_string());
            }
        }
        factories
    }
}
