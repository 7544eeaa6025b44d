mod parse;
mod process;

pub use process::{DarknetProcess, DetectionError, Detector};
