pub mod scene_change;
pub mod traits;

pub use scene_change::SceneChangeStrategy;
pub use traits::{InclusionStrategy, SampleProvider, Uploader};
