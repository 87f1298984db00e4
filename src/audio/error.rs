//! Error type shared by the render engine and its collaborators

use std::path::PathBuf;

/// Failures reported by the render engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An operation needed a generator but none is loaded
    #[error("no generator loaded")]
    NoGenerator,

    /// Parameter index outside the generator's reported range
    #[error("parameter index {index} out of range (generator reports {count})")]
    InvalidParameterIndex { index: usize, count: usize },

    /// The loader could not produce a generator for this path
    #[error("failed to load generator from {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// The generator rejected a configure or process call
    #[error("generator error: {0}")]
    Generator(String),

    /// Nothing has been rendered yet
    #[error("no rendered audio to write")]
    EmptyAudio,

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
