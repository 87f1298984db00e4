//! Offline render engine
//!
//! Owns at most one generator, the current patch and overrides, and the
//! results of the most recent render. A render drives the generator buffer by
//! buffer through one note's lifecycle and extracts MFCC and RMS frames from
//! every buffer as it is produced.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::buffer::AudioBuffer;
use super::error::EngineError;
use super::midi::{MidiBuffer, NoteScheduler, ScheduledEvent};
use super::patch::{ParameterOverrides, Patch};
use super::plugin::{describe_parameters, BuiltinLoader, Generator, GeneratorLoader, ParameterInfo};
use super::spectrum::{self, MfccAnalyzer, MfccFrame};
use super::wav;
use crate::config::EngineConfig;

/// Accumulators for the most recent render
#[derive(Debug, Default)]
struct RenderResults {
    channels: Vec<Vec<f32>>,
    mono: Vec<f32>,
    preview: Vec<f32>,
    mfcc_frames: Vec<MfccFrame>,
    rms_frames: Vec<f32>,
    note_events: Vec<ScheduledEvent>,
}

impl RenderResults {
    fn with_capacity(channel_count: usize, num_buffers: usize, buffer_size: usize) -> Self {
        let samples = num_buffers * buffer_size;
        Self {
            channels: vec![Vec::with_capacity(samples); channel_count],
            mono: Vec::with_capacity(samples),
            preview: Vec::new(),
            mfcc_frames: Vec::with_capacity(num_buffers),
            rms_frames: Vec::with_capacity(num_buffers),
            note_events: Vec::new(),
        }
    }

    /// Append one block and its features
    fn push_block(
        &mut self,
        block: &AudioBuffer,
        mono: &[f32],
        analyzer: &mut MfccAnalyzer,
        preview_decimation: usize,
    ) {
        for (dst, src) in self.channels.iter_mut().zip(block.channels()) {
            dst.extend_from_slice(src);
        }

        let start = self.mono.len();
        self.preview.extend(
            mono.iter()
                .enumerate()
                .filter(|(i, _)| (start + i) % preview_decimation == 0)
                .map(|(_, s)| *s),
        );
        self.mono.extend_from_slice(mono);

        let (frame, level) = analyzer.process_block(mono);
        self.mfcc_frames.push(frame);
        self.rms_frames.push(level);
    }
}

/// Serializable snapshot of the last render's features
#[derive(Debug, Clone, Serialize)]
pub struct FeatureReport {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub num_frames: usize,
    pub mfcc_frames: Vec<MfccFrame>,
    pub rms_frames: Vec<f32>,
    pub note_events: Vec<ScheduledEvent>,
}

/// The render engine
pub struct RenderEngine {
    config: EngineConfig,
    loader: Box<dyn GeneratorLoader>,
    generator: Option<Box<dyn Generator>>,
    generator_path: Option<PathBuf>,
    patch: Patch,
    overrides: ParameterOverrides,
    analyzer: MfccAnalyzer,
    results: RenderResults,
}

impl RenderEngine {
    /// Create an engine that loads built-in generators
    pub fn new(config: EngineConfig) -> Self {
        Self::with_loader(config, Box::new(BuiltinLoader))
    }

    pub fn with_loader(config: EngineConfig, loader: Box<dyn GeneratorLoader>) -> Self {
        let config = config.sanitized();
        log::info!(
            "Render engine: {} Hz, {} frame buffers, {}-point FFT",
            config.sample_rate,
            config.buffer_size,
            config.fft_size
        );
        let analyzer = MfccAnalyzer::new(config.sample_rate, config.fft_size, &config.mfcc);
        Self {
            config,
            loader,
            generator: None,
            generator_path: None,
            patch: Patch::new(),
            overrides: ParameterOverrides::new(),
            analyzer,
            results: RenderResults::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Generator lifecycle

    /// Load a generator through the engine's loader
    ///
    /// The current generator is released first, so a failed load leaves the
    /// engine without one.
    pub fn load_plugin<P: AsRef<Path>>(&mut self, path: P) -> Result<(), EngineError> {
        let path = path.as_ref();
        self.unload_plugin();
        log::info!("Loading generator from: {:?}", path);

        let generator = self.loader.load(path).map_err(|e| {
            log::error!("Failed to load generator: {}", e);
            e
        })?;
        self.set_generator(generator)?;
        self.generator_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Release the previous generator, then configure and install this one
    ///
    /// The base patch is reset to the new generator's current values and
    /// overrides are cleared.
    pub fn set_generator(&mut self, mut generator: Box<dyn Generator>) -> Result<(), EngineError> {
        self.unload_plugin();

        if let Err(e) = generator.configure(self.config.sample_rate as f64, self.config.buffer_size) {
            log::error!("Generator {} failed to configure: {}", generator.name(), e);
            generator.release();
            return Err(EngineError::Generator(e));
        }

        self.patch = (0..generator.parameter_count())
            .filter_map(|i| generator.parameter_value(i).map(|v| (i, v)))
            .collect();

        log::info!(
            "Generator loaded: {} ({} parameters, {} channels)",
            generator.name(),
            generator.parameter_count(),
            generator.output_channels()
        );
        self.generator = Some(generator);
        Ok(())
    }

    /// Release and drop the current generator
    ///
    /// The patch and overrides belong to the released generator and are
    /// cleared with it.
    pub fn unload_plugin(&mut self) {
        if let Some(mut generator) = self.generator.take() {
            generator.release();
            log::info!("Generator unloaded: {}", generator.name());
            self.patch = Patch::new();
            self.overrides.clear();
        }
        self.generator_path = None;
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Path the current generator was loaded from, if it came from the loader
    pub fn generator_path(&self) -> Option<&Path> {
        self.generator_path.as_deref()
    }

    fn generator(&self) -> Result<&dyn Generator, EngineError> {
        self.generator.as_deref().ok_or(EngineError::NoGenerator)
    }

    fn check_index(&self, index: usize) -> Result<(), EngineError> {
        let count = self.generator()?.parameter_count();
        if index >= count {
            log::warn!("Parameter index {} out of range ({})", index, count);
            return Err(EngineError::InvalidParameterIndex { index, count });
        }
        Ok(())
    }

    // Patch model

    /// Replace the base patch and push the effective patch to the generator
    pub fn set_patch(&mut self, patch: Patch) {
        self.patch = patch;
        let effective = self.get_patch();
        if let Some(generator) = self.generator.as_mut() {
            generator.apply_parameters(&effective);
        }
    }

    /// The base patch with overrides substituted
    pub fn get_patch(&self) -> Patch {
        self.patch.with_overrides(&self.overrides)
    }

    /// Override one parameter on top of the patch
    ///
    /// Only takes effect for indices the patch lists; an override for any
    /// other index is kept but never reaches the generator.
    pub fn override_parameter(&mut self, index: usize, value: f32) -> Result<(), EngineError> {
        self.check_index(index)?;
        self.overrides.set(index, value);
        if self.patch.get(index).is_none() {
            log::debug!("Override for parameter {} has no patch entry", index);
            return Ok(());
        }
        if let Some(generator) = self.generator.as_mut() {
            generator.set_parameter(index, value);
        }
        Ok(())
    }

    /// Remove an override; succeeds when there was none
    pub fn remove_override(&mut self, index: usize) -> Result<(), EngineError> {
        self.check_index(index)?;
        if self.overrides.remove(index).is_some() {
            if let (Some(value), Some(generator)) = (self.patch.get(index), self.generator.as_mut()) {
                generator.set_parameter(index, value);
            }
        }
        Ok(())
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
        let patch = self.patch.clone();
        if let Some(generator) = self.generator.as_mut() {
            generator.apply_parameters(&patch);
        }
    }

    pub fn overrides(&self) -> &ParameterOverrides {
        &self.overrides
    }

    // Rendering

    /// Render one note and extract per-buffer features
    ///
    /// Produces `ceil(render_length * sample_rate / buffer_size)` buffers. The
    /// note is released at `note_length` seconds unless that is at or past
    /// `render_length`, in which case it is still held when the render ends.
    pub fn render_patch(
        &mut self,
        midi_note: u8,
        midi_velocity: u8,
        note_length: f64,
        render_length: f64,
    ) -> Result<(), EngineError> {
        let effective = self.get_patch();
        let generator = self.generator.as_mut().ok_or(EngineError::NoGenerator)?;
        generator.apply_parameters(&effective);

        let sample_rate = self.config.sample_rate as f64;
        let buffer_size = self.config.buffer_size;
        let num_buffers = (render_length * sample_rate / buffer_size as f64).ceil().max(0.0) as usize;
        let channel_count = generator.output_channels().max(1);

        log::info!(
            "Rendering note {} vel {}: {:.3}s held, {:.3}s total, {} buffers",
            midi_note,
            midi_velocity,
            note_length,
            render_length,
            num_buffers
        );

        self.analyzer.reset();
        self.results = RenderResults::with_capacity(channel_count, num_buffers, buffer_size);

        let mut scheduler = NoteScheduler::new(
            midi_note,
            midi_velocity,
            note_length,
            render_length,
            sample_rate,
            buffer_size,
        );
        let mut midi = MidiBuffer::new();
        let mut block = AudioBuffer::new(channel_count, buffer_size);
        let mut mono = Vec::with_capacity(buffer_size);

        for index in 0..num_buffers {
            scheduler.fill_buffer(index, &mut midi);
            block.clear();

            if let Err(e) = generator.process(midi.events(), &mut block) {
                log::error!("Generator failed on buffer {}: {}", index, e);
                self.results = RenderResults::default();
                return Err(EngineError::Generator(e));
            }

            block.mix_to_mono(&mut mono);
            self.results
                .push_block(&block, &mono, &mut self.analyzer, self.config.preview_decimation);
        }

        self.results.note_events = scheduler.into_event_log();
        log::info!(
            "Render complete: {} samples, {} feature frames",
            self.results.mono.len(),
            self.results.mfcc_frames.len()
        );
        Ok(())
    }

    /// Run the feature extractor over external mono audio
    ///
    /// The signal is cut into `buffer_size` blocks (the last one zero padded)
    /// and replaces the results of the previous render.
    pub fn analyze_audio(&mut self, samples: &[f32]) {
        let buffer_size = self.config.buffer_size;
        let num_buffers = samples.len().div_ceil(buffer_size);
        log::info!("Analyzing {} samples in {} buffers", samples.len(), num_buffers);

        self.analyzer.reset();
        self.results = RenderResults::with_capacity(1, num_buffers, buffer_size);

        let mut block = AudioBuffer::new(1, buffer_size);
        for chunk in samples.chunks(buffer_size) {
            block.clear();
            block.channel_mut(0)[..chunk.len()].copy_from_slice(chunk);
            let mono = block.channel(0).to_vec();
            self.results
                .push_block(&block, &mono, &mut self.analyzer, self.config.preview_decimation);
        }
    }

    // Results

    pub fn mfcc_frames(&self) -> &[MfccFrame] {
        &self.results.mfcc_frames
    }

    /// MFCC frames standardized with caller-supplied statistics
    pub fn normalised_mfcc_frames(&self, mean: &MfccFrame, variance: &MfccFrame) -> Vec<MfccFrame> {
        spectrum::normalise(&self.results.mfcc_frames, mean, variance)
    }

    pub fn rms_frames(&self) -> &[f32] {
        &self.results.rms_frames
    }

    /// Mono mixdown of the rendered audio
    pub fn audio_frames(&self) -> &[f32] {
        &self.results.mono
    }

    /// Rendered audio, one vector per channel
    pub fn audio_channels(&self) -> &[Vec<f32>] {
        &self.results.channels
    }

    /// Mono audio decimated by `preview_decimation`
    pub fn preview_frames(&self) -> &[f32] {
        &self.results.preview
    }

    /// Note events injected during the last render
    pub fn note_events(&self) -> &[ScheduledEvent] {
        &self.results.note_events
    }

    pub fn feature_report(&self) -> FeatureReport {
        FeatureReport {
            sample_rate: self.config.sample_rate,
            buffer_size: self.config.buffer_size,
            num_frames: self.results.mfcc_frames.len(),
            mfcc_frames: self.results.mfcc_frames.clone(),
            rms_frames: self.results.rms_frames.clone(),
            note_events: self.results.note_events.clone(),
        }
    }

    pub fn parameter_count(&self) -> Result<usize, EngineError> {
        Ok(self.generator()?.parameter_count())
    }

    /// One `index: name` line per generator parameter
    pub fn parameter_descriptions(&self) -> Result<String, EngineError> {
        Ok(describe_parameters(self.generator()?))
    }

    pub fn parameter_info(&self) -> Result<Vec<ParameterInfo>, EngineError> {
        let generator = self.generator()?;
        Ok((0..generator.parameter_count())
            .filter_map(|i| generator.parameter_info(i))
            .collect())
    }

    /// Write the rendered audio as a float WAV file
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        wav::write_wav(path, &self.results.channels, self.config.sample_rate)
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        self.unload_plugin();
    }
}
