use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// "http" downloads from `url`, "static" always hands out `image`.
    #[serde(default = "default_camera_mode")]
    pub mode: String,
    pub url: Option<String>,
    pub image: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_camera_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Darknet installation directory; the detector runs with this as its cwd.
    pub darknet_dir: PathBuf,
    #[serde(default = "default_executable")]
    pub executable: String,
    #[serde(default = "default_config_path")]
    pub config_path: String,
    #[serde(default = "default_weights_path")]
    pub weights_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// "s3" uploads to an S3-compatible bucket, "log" only logs the sample.
    #[serde(default = "default_upload_mode")]
    pub mode: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_camera_id")]
    pub camera_id: String,
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            history_capacity: default_history_capacity(),
            workers: default_workers(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            mode: default_upload_mode(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            bucket: default_bucket(),
            prefix: default_prefix(),
            camera_id: default_camera_id(),
            region: default_region(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_camera_mode() -> String {
    "http".into()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("images")
}
fn default_camera_timeout() -> u64 {
    10
}
fn default_executable() -> String {
    "./darknet".into()
}
fn default_config_path() -> String {
    "cfg/yolov3.cfg".into()
}
fn default_weights_path() -> String {
    "yolov3.weights".into()
}
fn default_period_ms() -> u64 {
    2000
}
fn default_history_capacity() -> usize {
    10
}
fn default_workers() -> usize {
    10
}
fn default_shutdown_timeout_ms() -> u64 {
    30_000
}
fn default_upload_mode() -> String {
    "log".into()
}
fn default_bucket() -> String {
    "camera-samples".into()
}
fn default_prefix() -> String {
    "samples/".into()
}
fn default_camera_id() -> String {
    "camera-001".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_log_level() -> String {
    "info".into()
}
