pub mod digit;
pub mod engine;
pub mod stats;
pub mod window;

pub use engine::{AnalysisEngine, DEFAULT_PIP_SIZE, DEFAULT_WINDOW_SIZE};
