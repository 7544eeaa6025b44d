use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_types::region::Region;
use chrono::{DateTime, Utc};
use edge_filter_common::config::UploadConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::filter::Uploader;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("upload config is missing `{0}`")]
    MissingField(&'static str),
    #[error("unknown upload mode '{0}', expected 's3' or 'log'")]
    UnknownMode(String),
    #[error("failed to create bucket: {0}")]
    CreateBucket(String),
    #[error("failed to read sample {0}: {1}")]
    ReadSample(String, std::io::Error),
    #[error("failed to put object: {0}")]
    PutObject(String),
}

/// Uploads accepted camera images to an S3-compatible bucket (RustFS, MinIO,
/// AWS).
pub struct S3Uploader {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    camera_id: String,
}

impl S3Uploader {
    pub async fn new(config: &UploadConfig) -> Result<Self, StorageError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or(StorageError::MissingField("endpoint"))?;
        let access_key = config
            .access_key
            .as_deref()
            .ok_or(StorageError::MissingField("access_key"))?;
        let secret_key = config
            .secret_key
            .as_deref()
            .ok_or(StorageError::MissingField("secret_key"))?;

        let creds = Credentials::new(access_key, secret_key, None, None, "static");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .credentials_provider(creds)
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            camera_id: config.camera_id.clone(),
        })
    }

    /// Create the sample bucket unless it is already there.
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        if let Err(e) = self.client.head_bucket().bucket(&self.bucket).send().await {
            debug!(bucket = self.bucket, error = %e, "sample bucket lookup failed");
            self.client
                .create_bucket()
                .bucket(&self.bucket)
                .send()
                .await
                .map_err(|e| StorageError::CreateBucket(e.to_string()))?;
            info!(bucket = self.bucket, camera_id = self.camera_id, "created sample bucket");
        } else {
            info!(bucket = self.bucket, camera_id = self.camera_id, "using sample bucket");
        }
        Ok(())
    }

    async fn put_image(&self, image: &Path) -> Result<String, StorageError> {
        let jpeg_data = tokio::fs::read(image)
            .await
            .map_err(|e| StorageError::ReadSample(image.display().to_string(), e))?;
        let size = jpeg_data.len() as u64;
        let key = sample_key(&self.prefix, &self.camera_id, image, Utc::now());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("image/jpeg")
            .body(ByteStream::from(jpeg_data))
            .send()
            .await
            .map_err(|e| StorageError::PutObject(e.to_string()))?;

        debug!(key, size, "stored sample in bucket");
        Ok(key)
    }
}

#[async_trait]
impl Uploader<PathBuf> for S3Uploader {
    async fn upload(&self, sample: &PathBuf) -> bool {
        match self.put_image(sample).await {
            Ok(key) => {
                info!(key, bucket = self.bucket, "uploaded sample");
                true
            }
            Err(e) => {
                warn!(error = %e, sample = %sample.display(), "failed to upload sample");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "s3"
    }
}

/// Accepts every sample without sending it anywhere. Used while no backend is
/// reachable, so the filter can run and be observed on its own.
pub struct LogUploader;

#[async_trait]
impl Uploader<PathBuf> for LogUploader {
    async fn upload(&self, sample: &PathBuf) -> bool {
        info!(sample = %sample.display(), "accepted sample (log-only upload)");
        true
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Build the uploader selected by `upload.mode`. The S3 bucket is created if
/// missing.
pub async fn uploader_from_config(
    config: &UploadConfig,
) -> Result<Box<dyn Uploader<PathBuf>>, StorageError> {
    match config.mode.as_str() {
        "log" => Ok(Box::new(LogUploader)),
        "s3" => {
            let uploader = S3Uploader::new(config).await?;
            uploader.ensure_bucket().await?;
            Ok(Box::new(uploader))
        }
        other => Err(StorageError::UnknownMode(other.to_string())),
    }
}

/// Object key for an uploaded sample.
/// e.g. "samples/camera-001/2026-02-18/img1771407000000_000042.jpg"
pub fn sample_key(prefix: &str, camera_id: &str, image: &Path, at: DateTime<Utc>) -> String {
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.jpg", at.timestamp_millis()));
    format!(
        "{prefix}{camera_id}/{date}/{file_name}",
        date = at.format("%Y-%m-%d"),
    )
}
