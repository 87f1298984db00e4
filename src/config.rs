//! Engine configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "sample_rate": 48000, "fft_size": 1024 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::EngineError;

/// Render and analysis settings for one engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Frames per generator call (and per feature frame)
    pub buffer_size: usize,
    /// Transform length for the MFCC analyzer, independent of `buffer_size`
    pub fft_size: usize,
    /// Keep every Nth mono sample in the preview accumulator
    pub preview_decimation: usize,
    pub mfcc: MfccConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: 512,
            fft_size: 2048,
            preview_decimation: 1,
            mfcc: MfccConfig::default(),
        }
    }
}

/// Mel filterbank shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfccConfig {
    pub num_filters: usize,
    pub min_freq: f32,
    /// Clamped to Nyquist when the filterbank is built
    pub max_freq: f32,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            num_filters: 42,
            min_freq: 20.0,
            max_freq: 20000.0,
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        log::info!("Loading engine config from: {:?}", path);
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config.sanitized())
    }

    /// Clamp values the engine cannot run with
    pub fn sanitized(mut self) -> Self {
        if self.buffer_size == 0 {
            log::warn!("buffer_size 0 is invalid, using 512");
            self.buffer_size = 512;
        }
        if self.fft_size < 2 {
            log::warn!("fft_size {} is invalid, using 2048", self.fft_size);
            self.fft_size = 2048;
        }
        self.preview_decimation = self.preview_decimation.max(1);
        self.mfcc.num_filters = self.mfcc.num_filters.max(1);
        self
    }
}
