use async_trait::async_trait;

/// Source of sensor samples, e.g. a camera that hands out downloaded images.
#[async_trait]
pub trait SampleProvider<S>: Send + Sync {
    /// Take a new sample. Returns `None` if no data is available or the
    /// provider failed; failures are logged by the implementation.
    async fn sample(&self) -> Option<S>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Decides whether a fresh sample is worth uploading.
///
/// `latest` is the most recently uploaded sample, or `None` before the first
/// successful upload.
#[async_trait]
pub trait InclusionStrategy<S>: Send + Sync {
    /// Returns `true` if the sample should be uploaded.
    async fn should_include(&self, sample: &S, latest: Option<&S>) -> bool;

    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Backend sink for accepted samples.
#[async_trait]
pub trait Uploader<S>: Send + Sync {
    /// Returns `true` if the sample was persisted by the backend. `false` is a
    /// recoverable failure; the sample is simply not recorded as uploaded.
    async fn upload(&self, sample: &S) -> bool;

    fn name(&self) -> &str {
        "unnamed"
    }
}
