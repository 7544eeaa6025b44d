use std::fmt;

/// An object reported by the detector, e.g. `person: 95%`.
///
/// Scene comparison only looks at `name` (see [`DetectedObject::same_object`]).
/// Confidence fluctuates from frame to frame for the same physical object, so
/// it is carried for logging only.
///
/// `==` is structural and includes `confidence`. It is for exact matching of
/// parser output and is not scene identity; use [`scenes_differ`] for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedObject {
    pub name: String,
    /// Detector confidence as a percentage, 0..=100.
    pub confidence: u8,
}

impl DetectedObject {
    pub fn new(name: impl Into<String>, confidence: u8) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.min(100),
        }
    }

    /// Identity used when comparing two scenes.
    pub fn same_object(&self, other: &DetectedObject) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for DetectedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}%", self.name, self.confidence)
    }
}

/// Objects detected in one image, in the order the detector emitted them.
/// The position of an object doubles as its identity between two scenes.
pub type Scene = Vec<DetectedObject>;

/// Returns `true` if `new` shows a different scene than `old`.
///
/// A differing object count is a change. With equal counts, objects are
/// compared pairwise by position and name.
pub fn scenes_differ(old: &[DetectedObject], new: &[DetectedObject]) -> bool {
    if old.len() != new.len() {
        return true;
    }
    !old.iter().zip(new).all(|(a, b)| a.same_object(b))
}
