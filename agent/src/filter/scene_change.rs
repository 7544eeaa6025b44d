use async_trait::async_trait;
use edge_filter_common::scene::scenes_differ;
use std::path::Path;
use tracing::{debug, info, warn};

use super::traits::InclusionStrategy;
use crate::detector::Detector;

/// Object-detection based scene change filter.
///
/// Runs the detector on the latest uploaded image and on the new one and
/// approves the new image only when the two scenes differ (see
/// [`scenes_differ`]). Nothing to compare against means approve.
///
/// Detection failures approve the upload as well: dropping a real scene
/// change is worse than one redundant upload.
pub struct SceneChangeStrategy<D> {
    detector: D,
}

impl<D: Detector> SceneChangeStrategy<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl<S, D> InclusionStrategy<S> for SceneChangeStrategy<D>
where
    S: AsRef<Path> + Sync,
    D: Detector,
{
    async fn should_include(&self, sample: &S, latest: Option<&S>) -> bool {
        let new_img = sample.as_ref();
        let Some(previous) = latest else {
            info!(sample = %new_img.display(), "no previous sample, approving upload");
            return true;
        };
        let old_img = previous.as_ref();

        let old_scene = match self.detector.detect(old_img).await {
            Ok(scene) => scene,
            Err(e) => {
                warn!(error = %e, image = %old_img.display(), "detection failed on previous sample, approving upload");
                return true;
            }
        };
        let new_scene = match self.detector.detect(new_img).await {
            Ok(scene) => scene,
            Err(e) => {
                warn!(error = %e, image = %new_img.display(), "detection failed on new sample, approving upload");
                return true;
            }
        };

        let changed = scenes_differ(&old_scene, &new_scene);
        debug!(
            previous = %old_img.display(),
            sample = %new_img.display(),
            previous_objects = old_scene.len(),
            new_objects = new_scene.len(),
            changed,
            "scene comparison"
        );
        changed
    }

    fn name(&self) -> &str {
        "scene-change"
    }
}
