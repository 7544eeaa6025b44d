use edge_filter_common::history::BoundedHistory;
use std::fmt::Debug;
use tracing::{debug, info, warn};

use crate::filter::{InclusionStrategy, SampleProvider, Uploader};

/// Result of one sample→filter→upload cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The provider had nothing to offer.
    NoSample,
    /// The strategy judged the sample redundant.
    Suppressed,
    /// Uploaded and recorded in the history.
    Uploaded,
    /// Approved but the upload failed; history untouched.
    UploadFailed,
}

/// Runs sampling cycles against injected collaborators and owns the history
/// of successfully uploaded samples.
///
/// Cycles may run concurrently on a shared `&self`. The history lock is only
/// taken to read the latest entry and to push, never across detection or
/// upload. History order is therefore the order in which uploads completed,
/// which can differ from sampling order.
pub struct SampleOrchestrator<S> {
    provider: Box<dyn SampleProvider<S>>,
    strategy: Box<dyn InclusionStrategy<S>>,
    uploader: Box<dyn Uploader<S>>,
    history: BoundedHistory<S>,
}

impl<S> SampleOrchestrator<S>
where
    S: Clone + Debug + Send + Sync,
{
    pub fn new(
        provider: Box<dyn SampleProvider<S>>,
        strategy: Box<dyn InclusionStrategy<S>>,
        uploader: Box<dyn Uploader<S>>,
        history_capacity: usize,
    ) -> Self {
        Self {
            provider,
            strategy,
            uploader,
            history: BoundedHistory::new(history_capacity),
        }
    }

    /// Sample once, and upload the sample if the strategy approves it.
    /// Rejected or failed samples are not retried; the next cycle takes a
    /// fresh sample instead.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(sample) = self.provider.sample().await else {
            debug!(provider = self.provider.name(), "no sample available");
            return CycleOutcome::NoSample;
        };
        debug!(?sample, "new sample");

        let latest = self.history.latest();
        if !self.strategy.should_include(&sample, latest.as_ref()).await {
            debug!(?sample, strategy = self.strategy.name(), "sample suppressed");
            return CycleOutcome::Suppressed;
        }

        if !self.uploader.upload(&sample).await {
            warn!(?sample, uploader = self.uploader.name(), "upload failed");
            return CycleOutcome::UploadFailed;
        }

        info!(?sample, uploader = self.uploader.name(), "sample uploaded");
        for evicted in self.history.push(sample) {
            debug!(?evicted, "evicted from history");
        }
        CycleOutcome::Uploaded
    }

    /// Uploaded samples currently remembered, oldest first.
    pub fn history(&self) -> Vec<S> {
        self.history.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DetectionError, Detector};
    use crate::filter::SceneChangeStrategy;
    use async_trait::async_trait;
    use edge_filter_common::scene::{DetectedObject, Scene};
    use std::collections::{HashMap, VecDeque};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Hands out a fixed queue of samples, then `None`.
    struct QueueProvider<S>(Mutex<VecDeque<S>>);

    impl<S> QueueProvider<S> {
        fn new(items: impl IntoIterator<Item = S>) -> Box<Self> {
            Box::new(Self(Mutex::new(items.into_iter().collect())))
        }
    }

    #[async_trait]
    impl<S: Send> SampleProvider<S> for QueueProvider<S> {
        async fn sample(&self) -> Option<S> {
            self.0.lock().unwrap().pop_front()
        }
    }

    struct Approve(bool);

    #[async_trait]
    impl<S: Sync> InclusionStrategy<S> for Approve {
        async fn should_include(&self, _sample: &S, _latest: Option<&S>) -> bool {
            self.0
        }
    }

    /// Records every upload attempt; fails for samples in `reject`.
    #[derive(Default)]
    struct RecordingUploader {
        reject: Vec<PathBuf>,
        attempts: Arc<Mutex<Vec<PathBuf>>>,
    }

    #[async_trait]
    impl Uploader<PathBuf> for RecordingUploader {
        async fn upload(&self, sample: &PathBuf) -> bool {
            self.attempts.lock().unwrap().push(sample.clone());
            !self.reject.contains(sample)
        }
    }

    /// Detector with a per-image scene and latency.
    struct ScriptedDetector {
        scenes: HashMap<PathBuf, (Scene, Duration)>,
    }

    impl ScriptedDetector {
        fn new(entries: Vec<(&str, &[&str], u64)>) -> Self {
            let scenes = entries
                .into_iter()
                .map(|(path, names, delay_ms)| {
                    let scene = names.iter().map(|n| DetectedObject::new(*n, 75)).collect();
                    (PathBuf::from(path), (scene, Duration::from_millis(delay_ms)))
                })
                .collect();
            Self { scenes }
        }
    }

    #[async_trait]
    impl Detector for ScriptedDetector {
        async fn detect(&self, image: &Path) -> Result<Scene, DetectionError> {
            let (scene, delay) = self
                .scenes
                .get(image)
                .cloned()
                .ok_or_else(|| DetectionError::Spawn("no such image".into()))?;
            tokio::time::sleep(delay).await;
            Ok(scene)
        }
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[tokio::test]
    async fn missing_sample_is_a_no_op() {
        let orchestrator = SampleOrchestrator::<PathBuf>::new(
            QueueProvider::new(Vec::<PathBuf>::new()),
            Box::new(Approve(true)),
            Box::new(RecordingUploader::default()),
            4,
        );
        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::NoSample);
        assert!(orchestrator.history().is_empty());
    }

    #[tokio::test]
    async fn suppressed_sample_is_not_uploaded() {
        let uploader = RecordingUploader::default();
        let attempts = Arc::clone(&uploader.attempts);
        let orchestrator = SampleOrchestrator::<PathBuf>::new(
            QueueProvider::new(paths(&["a.jpg"])),
            Box::new(Approve(false)),
            Box::new(uploader),
            4,
        );
        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::Suppressed);
        assert!(attempts.lock().unwrap().is_empty());
        assert!(orchestrator.history().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_leaves_history_untouched() {
        let uploader = RecordingUploader {
            reject: paths(&["b.jpg"]),
            ..Default::default()
        };
        let attempts = Arc::clone(&uploader.attempts);
        let orchestrator = SampleOrchestrator::<PathBuf>::new(
            QueueProvider::new(paths(&["a.jpg", "b.jpg", "c.jpg"])),
            Box::new(Approve(true)),
            Box::new(uploader),
            4,
        );
        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::Uploaded);
        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::UploadFailed);
        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::Uploaded);
        assert_eq!(orchestrator.history(), paths(&["a.jpg", "c.jpg"]));
        // One attempt per sample, no retry of b.jpg.
        assert_eq!(*attempts.lock().unwrap(), paths(&["a.jpg", "b.jpg", "c.jpg"]));
    }

    #[tokio::test]
    async fn history_keeps_most_recent_uploads() {
        let orchestrator = SampleOrchestrator::<PathBuf>::new(
            QueueProvider::new(paths(&["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg"])),
            Box::new(Approve(true)),
            Box::new(RecordingUploader::default()),
            3,
        );
        for _ in 0..5 {
            orchestrator.run_cycle().await;
        }
        assert_eq!(orchestrator.history(), paths(&["3.jpg", "4.jpg", "5.jpg"]));
    }

    #[tokio::test]
    async fn unchanged_scene_is_filtered_end_to_end() {
        // S1 is first and always approved, S2 shows the same scene as S1,
        // S3 has an extra object.
        let detector = ScriptedDetector::new(vec![
            ("s1.jpg", &["person", "car"][..], 0),
            ("s2.jpg", &["person", "car"][..], 0),
            ("s3.jpg", &["person", "car", "dog"][..], 0),
        ]);
        let orchestrator = SampleOrchestrator::<PathBuf>::new(
            QueueProvider::new(paths(&["s1.jpg", "s2.jpg", "s3.jpg"])),
            Box::new(SceneChangeStrategy::new(detector)),
            Box::new(RecordingUploader::default()),
            2,
        );

        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::Uploaded);
        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::Suppressed);
        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::Uploaded);
        assert_eq!(orchestrator.history(), paths(&["s1.jpg", "s3.jpg"]));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_cycles_keep_history_consistent() {
        // Every image shows a different number of people, so every comparison
        // approves; staggered latencies make cycles finish out of order.
        let names: Vec<String> = (0..12).map(|i| format!("img{i}.jpg")).collect();
        let people = ["person"; 12];
        let entries = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), &people[..=i], ((12 - i) * 37 % 100) as u64))
            .collect();
        let rejected = paths(&["img3.jpg", "img7.jpg", "img8.jpg"]);
        let uploader = RecordingUploader {
            reject: rejected.clone(),
            ..Default::default()
        };
        let attempts = Arc::clone(&uploader.attempts);

        let orchestrator = Arc::new(SampleOrchestrator::<PathBuf>::new(
            QueueProvider::new(names.iter().map(PathBuf::from)),
            Box::new(SceneChangeStrategy::new(ScriptedDetector::new(entries))),
            Box::new(uploader),
            5,
        ));

        let handles: Vec<_> = (0..names.len())
            .map(|_| {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move { orchestrator.run_cycle().await })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        let history = orchestrator.history();
        let attempts = attempts.lock().unwrap().clone();
        assert!(history.len() <= 5);
        for sample in &history {
            assert!(!rejected.contains(sample), "{sample:?} was never uploaded");
            assert!(attempts.contains(sample));
        }
        let mut deduped = history.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), history.len(), "duplicate history entries");
        // Nothing lost: history holds the last successful uploads in
        // completion order.
        let accepted: Vec<PathBuf> = attempts
            .iter()
            .filter(|s| !rejected.contains(s))
            .cloned()
            .collect();
        let tail = &accepted[accepted.len().saturating_sub(5)..];
        assert_eq!(history, tail);
    }
}
