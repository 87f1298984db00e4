//! Generator capability
//!
//! The render engine drives any sound generator through the [`Generator`]
//! trait and obtains generators through a [`GeneratorLoader`]. Plugin
//! formats and binary loading live behind these two seams.

pub mod simple_synth;

use serde::Serialize;
use std::path::Path;

use super::buffer::AudioBuffer;
use super::error::EngineError;
use super::midi::TimedMidiEvent;
use super::patch::Patch;

pub use simple_synth::SimpleSynth;

/// Self-reported metadata for one parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterInfo {
    pub index: usize,
    pub name: String,
    /// Normalized default (0.0 - 1.0)
    pub default_value: f32,
}

/// A sound generator the engine can configure and pull audio from
pub trait Generator: Send {
    fn name(&self) -> &str;

    /// Prepare for processing blocks of at most `buffer_size` frames
    fn configure(&mut self, sample_rate: f64, buffer_size: usize) -> Result<(), String>;

    /// Number of channels `process` writes
    fn output_channels(&self) -> usize;

    fn parameter_count(&self) -> usize;

    fn parameter_info(&self, index: usize) -> Option<ParameterInfo>;

    /// Current normalized value of a parameter
    fn parameter_value(&self, index: usize) -> Option<f32>;

    fn set_parameter(&mut self, index: usize, value: f32);

    /// Apply a patch in order, so later duplicates win
    fn apply_parameters(&mut self, patch: &Patch) {
        let count = self.parameter_count();
        for (index, value) in patch.iter() {
            if index < count {
                self.set_parameter(index, value);
            } else {
                log::debug!("{}: ignoring parameter {} (count {})", self.name(), index, count);
            }
        }
    }

    /// Fill `output` with one block, applying `events` at their offsets
    fn process(&mut self, events: &[TimedMidiEvent], output: &mut AudioBuffer) -> Result<(), String>;

    /// Drop any processing resources; called before the generator is replaced
    fn release(&mut self);
}

/// Resolves a path into a ready-to-configure generator
pub trait GeneratorLoader: Send {
    fn load(&self, path: &Path) -> Result<Box<dyn Generator>, EngineError>;
}

/// Loader for the generators compiled into this crate
///
/// Accepts `builtin:simple-synth`, or any path whose file name is
/// `simple-synth`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinLoader;

impl BuiltinLoader {
    pub const SIMPLE_SYNTH: &'static str = "simple-synth";
}

impl GeneratorLoader for BuiltinLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn Generator>, EngineError> {
        let raw = path.to_string_lossy();
        let name = raw
            .strip_prefix("builtin:")
            .map(str::to_string)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()));

        match name.as_deref() {
            Some(Self::SIMPLE_SYNTH) => Ok(Box::new(SimpleSynth::new())),
            _ => Err(EngineError::Load {
                path: path.to_path_buf(),
                reason: "unknown builtin generator".to_string(),
            }),
        }
    }
}

/// One `index: name` line per parameter
pub fn describe_parameters(generator: &dyn Generator) -> String {
    (0..generator.parameter_count())
        .filter_map(|i| generator.parameter_info(i))
        .map(|info| format!("{}: {}\n", info.index, info.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_loader() {
        let loader = BuiltinLoader;
        let synth = loader.load(Path::new("builtin:simple-synth")).unwrap();
        assert_eq!(synth.name(), "Simple Synth");

        let synth = loader.load(Path::new("/opt/generators/simple-synth")).unwrap();
        assert_eq!(synth.parameter_count(), SimpleSynth::PARAMETER_COUNT);

        match loader.load(Path::new("builtin:missing")) {
            Err(EngineError::Load { reason, .. }) => assert!(reason.contains("unknown")),
            _ => panic!("Expected load error"),
        }
    }

    #[test]
    fn test_describe_parameters() {
        let synth = SimpleSynth::new();
        let text = describe_parameters(&synth);
        assert_eq!(text.lines().count(), SimpleSynth::PARAMETER_COUNT);
        assert!(text.starts_with("0: Gain\n"));
    }

    #[test]
    fn test_apply_parameters_skips_out_of_range() {
        let mut synth = SimpleSynth::new();
        let patch = Patch::from(vec![(0, 0.1), (99, 0.5), (0, 0.3)]);
        synth.apply_parameters(&patch);
        assert_eq!(synth.parameter_value(0), Some(0.3));
        assert_eq!(synth.parameter_value(99), None);
    }
}
