//! FFT-based MFCC analyzer for rendered audio
//!
//! Audio is pushed block by block into a sliding window of `fft_size`
//! samples. Each analysis windows the latest `fft_size` samples, takes the
//! power spectrum, integrates it through a triangular mel filterbank, and
//! decorrelates the log energies with a DCT-II.

use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use super::buffer::rms;
use crate::config::MfccConfig;

/// Coefficients per MFCC frame
pub const NUM_MFCC: usize = 13;

pub type MfccFrame = [f32; NUM_MFCC];

/// Floor added before the log so silent bands stay finite
const LOG_FLOOR: f32 = 1e-10;

/// Triangular filter over a contiguous bin range
struct MelFilter {
    start_bin: usize,
    weights: Vec<f32>,
}

/// MFCC analyzer using FFT
pub struct MfccAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    fft_size: usize,
    /// Ring buffer of the latest `fft_size` samples; `write_pos` is the oldest
    input_buffer: Vec<f32>,
    write_pos: usize,
    /// Pre-allocated scratch for windowed samples
    windowed_buffer: Vec<f32>,
    spectrum_buffer: Vec<realfft::num_complex::Complex<f32>>,
    window: Vec<f32>,
    power: Vec<f32>,
    filters: Vec<MelFilter>,
    mel_energies: Vec<f32>,
    /// DCT-II basis, `dct[k][n]`
    dct: Vec<Vec<f32>>,
}

impl MfccAnalyzer {
    pub fn new(sample_rate: u32, fft_size: usize, config: &MfccConfig) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let spectrum_buffer = fft.make_output_vec();
        let num_bins = spectrum_buffer.len();

        // Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let x = i as f32 / fft_size as f32;
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * x).cos())
            })
            .collect();

        let filters = build_filterbank(sample_rate, fft_size, num_bins, config);
        let num_filters = filters.len();

        let dct: Vec<Vec<f32>> = (0..NUM_MFCC)
            .map(|k| {
                let scale = if k == 0 {
                    (1.0 / num_filters as f32).sqrt()
                } else {
                    (2.0 / num_filters as f32).sqrt()
                };
                (0..num_filters)
                    .map(|n| {
                        scale
                            * (std::f32::consts::PI / num_filters as f32
                                * (n as f32 + 0.5)
                                * k as f32)
                                .cos()
                    })
                    .collect::<Vec<f32>>()
            })
            .collect();

        Self {
            fft,
            fft_size,
            input_buffer: vec![0.0; fft_size],
            write_pos: 0,
            windowed_buffer: vec![0.0; fft_size],
            spectrum_buffer,
            window,
            power: vec![0.0; num_bins],
            filters,
            mel_energies: vec![0.0; num_filters],
            dct,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn num_filters(&self) -> usize {
        self.filters.len()
    }

    /// Push mono samples into the sliding window
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.input_buffer[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// MFCC frame for the latest `fft_size` samples
    pub fn analyze(&mut self) -> MfccFrame {
        // Unroll the ring oldest-first while windowing
        let (newest, oldest) = self.input_buffer.split_at(self.write_pos);
        for (i, (&s, &w)) in oldest.iter().chain(newest).zip(&self.window).enumerate() {
            self.windowed_buffer[i] = s * w;
        }

        if let Err(e) = self.fft.process(&mut self.windowed_buffer, &mut self.spectrum_buffer) {
            log::warn!("MFCC transform failed: {}", e);
            return [0.0; NUM_MFCC];
        }

        for (p, c) in self.power.iter_mut().zip(&self.spectrum_buffer) {
            *p = c.norm_sqr();
        }

        for (energy, filter) in self.mel_energies.iter_mut().zip(&self.filters) {
            let bins = &self.power[filter.start_bin..filter.start_bin + filter.weights.len()];
            let sum: f32 = bins.iter().zip(&filter.weights).map(|(p, w)| p * w).sum();
            *energy = (sum + LOG_FLOOR).ln();
        }

        let mut frame = [0.0; NUM_MFCC];
        for (coeff, basis) in frame.iter_mut().zip(&self.dct) {
            *coeff = basis.iter().zip(&self.mel_energies).map(|(b, e)| b * e).sum();
        }
        frame
    }

    /// Push one mono block and return its MFCC frame and RMS level
    pub fn process_block(&mut self, mono: &[f32]) -> (MfccFrame, f32) {
        self.push_samples(mono);
        (self.analyze(), rms(mono))
    }

    /// Reset the analyzer state
    pub fn reset(&mut self) {
        self.input_buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[inline]
fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

#[inline]
fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters evenly spaced on the mel scale
fn build_filterbank(
    sample_rate: u32,
    fft_size: usize,
    num_bins: usize,
    config: &MfccConfig,
) -> Vec<MelFilter> {
    let nyquist = sample_rate as f32 / 2.0;
    let max_freq = config.max_freq.min(nyquist);
    let min_freq = config.min_freq.clamp(0.0, max_freq);
    let num_filters = config.num_filters.max(1);

    let mel_min = hz_to_mel(min_freq);
    let mel_max = hz_to_mel(max_freq);
    let edges: Vec<f32> = (0..num_filters + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (num_filters + 1) as f32))
        .collect();

    let bin_freq = sample_rate as f32 / fft_size as f32;

    edges
        .windows(3)
        .map(|edge| {
            let (lo, center, hi) = (edge[0], edge[1], edge[2]);
            let start_bin = ((lo / bin_freq).ceil() as usize).min(num_bins);
            let end_bin = ((hi / bin_freq).floor() as usize + 1).min(num_bins);
            let weights: Vec<f32> = (start_bin..end_bin.max(start_bin))
                .map(|bin| {
                    let f = bin as f32 * bin_freq;
                    if f <= center {
                        if center > lo { (f - lo) / (center - lo) } else { 1.0 }
                    } else if hi > center {
                        (hi - f) / (hi - center)
                    } else {
                        0.0
                    }
                })
                .map(|w: f32| w.max(0.0))
                .collect();
            MelFilter { start_bin, weights }
        })
        .collect()
}

/// Standardize frames per coefficient: `(c - mean[c]) / variance[c]`
///
/// Zero variance yields NaN or infinity.
pub fn normalise(frames: &[MfccFrame], mean: &MfccFrame, variance: &MfccFrame) -> Vec<MfccFrame> {
    frames
        .iter()
        .map(|frame| {
            let mut out = [0.0; NUM_MFCC];
            for (c, value) in out.iter_mut().enumerate() {
                *value = (frame[c] - mean[c]) / variance[c];
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_block(freq: f32, sample_rate: f32, start: usize, len: usize) -> Vec<f32> {
        (start..start + len)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_silence_is_finite() {
        let mut analyzer = MfccAnalyzer::new(44100, 2048, &MfccConfig::default());
        let (frame, level) = analyzer.process_block(&[0.0; 512]);

        assert_eq!(level, 0.0);
        assert!(frame.iter().all(|c| c.is_finite()));

        // Flat log spectrum: only c0 carries energy
        let n = analyzer.num_filters() as f32;
        assert!((frame[0] - n.sqrt() * LOG_FLOOR.ln()).abs() < 1e-2);
        assert!(frame[1..].iter().all(|c| c.abs() < 1e-2));
    }

    #[test]
    fn test_filterbank_covers_spectrum() {
        let config = MfccConfig::default();
        let filters = build_filterbank(44100, 2048, 1025, &config);
        assert_eq!(filters.len(), 42);

        let mut last_start = 0;
        for filter in &filters {
            assert!(!filter.weights.is_empty());
            assert!(filter.weights.iter().all(|w| (0.0..=1.0).contains(w)));
            assert!(filter.start_bin >= last_start);
            assert!(filter.start_bin + filter.weights.len() <= 1025);
            last_start = filter.start_bin;
        }
    }

    #[test]
    fn test_max_freq_clamped_to_nyquist() {
        let config = MfccConfig {
            max_freq: 40000.0,
            ..MfccConfig::default()
        };
        let filters = build_filterbank(16000, 512, 257, &config);
        let last = filters.last().unwrap();
        assert!(last.start_bin + last.weights.len() <= 257);
    }

    #[test]
    fn test_ring_unrolls_oldest_first() {
        let mut analyzer = MfccAnalyzer::new(44100, 4, &MfccConfig::default());
        analyzer.push_samples(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let (newest, oldest) = analyzer.input_buffer.split_at(analyzer.write_pos);
        let ordered: Vec<f32> = oldest.iter().chain(newest).copied().collect();
        assert_eq!(ordered, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_pitch_changes_frame() {
        let config = MfccConfig::default();
        let mut low = MfccAnalyzer::new(44100, 2048, &config);
        let mut high = MfccAnalyzer::new(44100, 2048, &config);

        let mut low_frame = [0.0; NUM_MFCC];
        let mut high_frame = [0.0; NUM_MFCC];
        for block in 0..4 {
            low_frame = low.process_block(&sine_block(220.0, 44100.0, block * 512, 512)).0;
            high_frame = high.process_block(&sine_block(5000.0, 44100.0, block * 512, 512)).0;
        }

        let distance: f32 = low_frame
            .iter()
            .zip(&high_frame)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt();
        assert!(distance > 1.0);
    }

    #[test]
    fn test_window_smaller_than_block() {
        // Only the latest 256 samples matter
        let config = MfccConfig::default();
        let mut analyzer = MfccAnalyzer::new(44100, 256, &config);
        let mut reference = MfccAnalyzer::new(44100, 256, &config);

        let mut block = vec![0.5; 256];
        block.extend(sine_block(1000.0, 44100.0, 0, 256));
        let frame = analyzer.process_block(&block).0;
        let expected = reference.process_block(&block[256..]).0;
        assert_eq!(frame, expected);
    }

    #[test]
    fn test_reset_clears_history() {
        let config = MfccConfig::default();
        let mut analyzer = MfccAnalyzer::new(44100, 1024, &config);
        let silent = analyzer.process_block(&[0.0; 512]).0;

        analyzer.process_block(&sine_block(440.0, 44100.0, 0, 512));
        analyzer.reset();
        assert_eq!(analyzer.process_block(&[0.0; 512]).0, silent);
    }

    #[test]
    fn test_normalise() {
        let frames = vec![[2.0; NUM_MFCC], [4.0; NUM_MFCC]];
        let mean = [1.0; NUM_MFCC];
        let mut variance = [2.0; NUM_MFCC];
        let out = normalise(&frames, &mean, &variance);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], [0.5; NUM_MFCC]);
        assert_eq!(out[1], [1.5; NUM_MFCC]);

        variance[3] = 0.0;
        let out = normalise(&frames, &mean, &variance);
        assert!(out[0][3].is_infinite());
    }
}
