//! Audio engine for offline patch rendering
//!
//! Provides:
//! - Generator hosting behind a swappable trait, with a built-in reference synth
//! - Sample-accurate note scheduling across fixed-size buffers
//! - Per-buffer MFCC and RMS feature extraction
//! - WAV persistence of rendered audio

pub mod buffer;
pub mod engine;
pub mod error;
pub mod midi;
pub mod patch;
pub mod plugin;
pub mod spectrum;
pub mod wav;

pub use engine::{FeatureReport, RenderEngine};
pub use error::EngineError;
pub use patch::{ParameterOverrides, Patch};
pub use spectrum::{MfccFrame, NUM_MFCC};
