use async_trait::async_trait;
use chrono::Utc;
use edge_filter_common::config::CameraConfig;
use reqwest::header::ACCEPT;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::filter::SampleProvider;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
    #[error("HTTP request failed: {0}")]
    HttpRequest(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("failed to store image {0}: {1}")]
    Store(String, std::io::Error),
    #[error("camera config is missing `{0}`")]
    MissingField(&'static str),
    #[error("unknown camera mode '{0}', expected 'http' or 'static'")]
    UnknownMode(String),
}

/// Downloads one JPEG snapshot per sample from the camera's REST endpoint and
/// stores it under `output_dir` as `img<epoch_ms>_<seq>.jpg`. The sample is the
/// stored file's path.
pub struct CameraClient {
    client: reqwest::Client,
    url: String,
    output_dir: PathBuf,
    seq: AtomicU64,
}

impl CameraClient {
    pub fn new(config: &CameraConfig) -> Result<Self, CameraError> {
        let url = config.url.clone().ok_or(CameraError::MissingField("url"))?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(CameraError::HttpClient)?;
        Ok(Self {
            client,
            url,
            output_dir: config.output_dir.clone(),
            seq: AtomicU64::new(0),
        })
    }

    async fn download(&self) -> Result<PathBuf, CameraError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "image/jpeg")
            .send()
            .await
            .map_err(CameraError::HttpRequest)?;

        if !response.status().is_success() {
            return Err(CameraError::HttpStatus(response.status().as_u16()));
        }

        let jpeg_data = response.bytes().await.map_err(CameraError::HttpRequest)?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let path = self.output_dir.join(format!(
            "img{}_{seq:06}.jpg",
            Utc::now().timestamp_millis()
        ));
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| CameraError::Store(self.output_dir.display().to_string(), e))?;
        tokio::fs::write(&path, &jpeg_data)
            .await
            .map_err(|e| CameraError::Store(path.display().to_string(), e))?;

        debug!(path = %path.display(), bytes = jpeg_data.len(), "stored camera image");
        Ok(path)
    }
}

#[async_trait]
impl SampleProvider<PathBuf> for CameraClient {
    async fn sample(&self) -> Option<PathBuf> {
        match self.download().await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, url = self.url, "failed to fetch camera image");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "camera"
    }
}

/// Hands out the same image on every sample. Stands in for a camera on a
/// bench setup.
pub struct StaticImageProvider {
    image: PathBuf,
}

impl StaticImageProvider {
    pub fn new(config: &CameraConfig) -> Result<Self, CameraError> {
        let image = config.image.clone().ok_or(CameraError::MissingField("image"))?;
        Ok(Self { image })
    }
}

#[async_trait]
impl SampleProvider<PathBuf> for StaticImageProvider {
    async fn sample(&self) -> Option<PathBuf> {
        if !tokio::fs::try_exists(&self.image).await.unwrap_or(false) {
            warn!(path = %self.image.display(), "static image does not exist");
            return None;
        }
        Some(self.image.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Build the provider selected by `camera.mode`.
pub fn provider_from_config(
    config: &CameraConfig,
) -> Result<Box<dyn SampleProvider<PathBuf>>, CameraError> {
    match config.mode.as_str() {
        "http" => Ok(Box::new(CameraClient::new(config)?)),
        "static" => Ok(Box::new(StaticImageProvider::new(config)?)),
        other => Err(CameraError::UnknownMode(other.to_string())),
    }
}
