//! Built-in reference generator
//!
//! A monophonic two-channel synth: sine/saw blend plus seeded noise through a
//! linear attack/release envelope. Deterministic for a given parameter set and
//! event sequence, which makes it useful for checking the render pipeline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

use super::{Generator, ParameterInfo};
use crate::audio::buffer::AudioBuffer;
use crate::audio::midi::{MidiEvent, TimedMidiEvent};

const PARAM_GAIN: usize = 0;
const PARAM_SHAPE: usize = 1;
const PARAM_ATTACK: usize = 2;
const PARAM_RELEASE: usize = 3;
const PARAM_NOISE: usize = 4;
const PARAM_DETUNE: usize = 5;

const NUM_PARAMS: usize = 6;

const PARAMETERS: [(&str, f32); NUM_PARAMS] = [
    ("Gain", 0.8),
    ("Shape", 0.0),
    ("Attack", 0.05),
    ("Release", 0.1),
    ("Noise", 0.0),
    ("Detune", 0.0),
];

/// Envelope times map 0.0 - 1.0 onto this range, in seconds
const MIN_ENV_SECS: f32 = 0.001;
const MAX_ENV_SECS: f32 = 2.0;

/// Detune at 1.0, in semitones (right channel only)
const MAX_DETUNE_SEMITONES: f32 = 0.5;

const NOISE_SEED: u64 = 0x5eed;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Sustain,
    Release,
}

pub struct SimpleSynth {
    params: [f32; NUM_PARAMS],
    sample_rate: f32,
    max_frames: usize,

    // Voice state
    note: Option<u8>,
    velocity: f32,
    stage: Stage,
    level: f32,
    phase_left: f32,
    phase_right: f32,
    rng: StdRng,
}

impl SimpleSynth {
    pub const PARAMETER_COUNT: usize = NUM_PARAMS;

    pub fn new() -> Self {
        let mut params = [0.0; NUM_PARAMS];
        for (slot, (_, default)) in params.iter_mut().zip(PARAMETERS.iter()) {
            *slot = *default;
        }
        Self {
            params,
            sample_rate: 44100.0,
            max_frames: 0,
            note: None,
            velocity: 0.0,
            stage: Stage::Idle,
            level: 0.0,
            phase_left: 0.0,
            phase_right: 0.0,
            rng: StdRng::seed_from_u64(NOISE_SEED),
        }
    }

    /// Whether a note is sounding (including its release tail)
    pub fn is_sounding(&self) -> bool {
        self.stage != Stage::Idle
    }

    fn env_secs(&self, index: usize) -> f32 {
        MIN_ENV_SECS + self.params[index].clamp(0.0, 1.0) * (MAX_ENV_SECS - MIN_ENV_SECS)
    }

    fn handle_event(&mut self, event: &MidiEvent) {
        match *event {
            MidiEvent::NoteOn { note, velocity, .. } => {
                self.note = Some(note);
                self.velocity = velocity as f32 / 127.0;
                self.stage = Stage::Attack;
                self.level = 0.0;
                self.phase_left = 0.0;
                self.phase_right = 0.0;
                self.rng = StdRng::seed_from_u64(NOISE_SEED);
            }
            MidiEvent::NoteOff { note, .. } => {
                if self.note == Some(note) && self.stage != Stage::Idle {
                    self.stage = Stage::Release;
                }
            }
        }
    }

    fn advance_envelope(&mut self) {
        let attack_step = 1.0 / (self.env_secs(PARAM_ATTACK) * self.sample_rate);
        let release_step = 1.0 / (self.env_secs(PARAM_RELEASE) * self.sample_rate);
        match self.stage {
            Stage::Idle | Stage::Sustain => {}
            Stage::Attack => {
                self.level += attack_step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Release => {
                self.level -= release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                    self.note = None;
                }
            }
        }
    }

    /// Render one stereo frame
    fn next_frame(&mut self) -> (f32, f32) {
        let note = match self.note {
            Some(note) if self.stage != Stage::Idle => note,
            _ => return (0.0, 0.0),
        };

        let freq = 440.0 * 2f32.powf((note as f32 - 69.0) / 12.0);
        let detune = 2f32.powf(self.params[PARAM_DETUNE] * MAX_DETUNE_SEMITONES / 12.0);
        let shape = self.params[PARAM_SHAPE].clamp(0.0, 1.0);
        let noise_mix = self.params[PARAM_NOISE].clamp(0.0, 1.0);

        let osc = |phase: f32| {
            let sine = (2.0 * PI * phase).sin();
            let saw = 2.0 * phase - 1.0;
            sine * (1.0 - shape) + saw * shape
        };

        let noise: f32 = self.rng.gen_range(-1.0..1.0);
        let amp = self.params[PARAM_GAIN] * self.velocity * self.level;
        let left = amp * (osc(self.phase_left) * (1.0 - noise_mix) + noise * noise_mix);
        let right = amp * (osc(self.phase_right) * (1.0 - noise_mix) + noise * noise_mix);

        self.phase_left = (self.phase_left + freq / self.sample_rate).fract();
        self.phase_right = (self.phase_right + freq * detune / self.sample_rate).fract();
        self.advance_envelope();

        (left, right)
    }
}

impl Default for SimpleSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for SimpleSynth {
    fn name(&self) -> &str {
        "Simple Synth"
    }

    fn configure(&mut self, sample_rate: f64, buffer_size: usize) -> Result<(), String> {
        if sample_rate <= 0.0 {
            return Err(format!("Invalid sample rate: {}", sample_rate));
        }
        self.sample_rate = sample_rate as f32;
        self.max_frames = buffer_size;
        log::info!("Simple Synth configured: {} Hz, {} frames", sample_rate, buffer_size);
        Ok(())
    }

    fn output_channels(&self) -> usize {
        2
    }

    fn parameter_count(&self) -> usize {
        Self::PARAMETER_COUNT
    }

    fn parameter_info(&self, index: usize) -> Option<ParameterInfo> {
        PARAMETERS.get(index).map(|(name, default)| ParameterInfo {
            index,
            name: name.to_string(),
            default_value: *default,
        })
    }

    fn parameter_value(&self, index: usize) -> Option<f32> {
        self.params.get(index).copied()
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.params.get_mut(index) {
            *slot = value;
        }
    }

    fn process(&mut self, events: &[TimedMidiEvent], output: &mut AudioBuffer) -> Result<(), String> {
        let frames = output.frames();
        if self.max_frames != 0 && frames > self.max_frames {
            return Err(format!("Buffer size {} exceeds max_frames {}", frames, self.max_frames));
        }

        let mut pending = events.iter().peekable();
        for i in 0..frames {
            while let Some(timed) = pending.next_if(|e| e.offset <= i) {
                self.handle_event(&timed.event);
            }
            let (left, right) = self.next_frame();
            output.channel_mut(0)[i] = left;
            if output.channel_count() > 1 {
                output.channel_mut(1)[i] = right;
            }
        }

        // Events past the end of the block still take effect
        for timed in pending {
            log::warn!("Event offset {} beyond block of {} frames", timed.offset, frames);
            self.handle_event(&timed.event);
        }

        Ok(())
    }

    fn release(&mut self) {
        self.note = None;
        self.stage = Stage::Idle;
        self.level = 0.0;
        log::info!("Simple Synth released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::midi::MidiBuffer;

    fn configured() -> SimpleSynth {
        let mut synth = SimpleSynth::new();
        synth.configure(44100.0, 512).unwrap();
        synth
    }

    #[test]
    fn test_silent_without_note() {
        let mut synth = configured();
        let mut buffer = AudioBuffer::new(2, 512);
        synth.process(&[], &mut buffer).unwrap();
        assert!(buffer.channel(0).iter().all(|&s| s == 0.0));
        assert!(!synth.is_sounding());
    }

    #[test]
    fn test_note_on_is_sample_accurate() {
        let mut synth = configured();
        let mut midi = MidiBuffer::new();
        midi.add_note_on(69, 127, 0, 100);

        let mut buffer = AudioBuffer::new(2, 512);
        synth.process(midi.events(), &mut buffer).unwrap();

        assert!(buffer.channel(0)[..101].iter().all(|&s| s == 0.0));
        assert!(buffer.channel(0)[101..].iter().any(|&s| s != 0.0));
        assert!(synth.is_sounding());
    }

    #[test]
    fn test_release_reaches_silence() {
        let mut synth = configured();
        // Shortest attack and release
        synth.set_parameter(PARAM_ATTACK, 0.0);
        synth.set_parameter(PARAM_RELEASE, 0.0);

        let mut midi = MidiBuffer::new();
        midi.add_note_on(60, 127, 0, 0);
        midi.add_note_off(60, 0, 0, 256);

        let mut buffer = AudioBuffer::new(2, 512);
        synth.process(midi.events(), &mut buffer).unwrap();

        // 1ms release at 44.1kHz is ~45 samples
        assert!(!synth.is_sounding());
        assert!(buffer.channel(0)[400..].iter().all(|&s| s == 0.0));
        assert!(buffer.channel(0)[10..256].iter().any(|&s| s.abs() > 0.1));
    }

    #[test]
    fn test_deterministic_with_noise() {
        let render = || {
            let mut synth = configured();
            synth.set_parameter(PARAM_NOISE, 0.5);
            let mut midi = MidiBuffer::new();
            midi.add_note_on(64, 100, 0, 0);
            let mut buffer = AudioBuffer::new(2, 512);
            synth.process(midi.events(), &mut buffer).unwrap();
            buffer
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_rejects_oversized_block() {
        let mut synth = configured();
        let mut buffer = AudioBuffer::new(2, 1024);
        assert!(synth.process(&[], &mut buffer).is_err());
    }

    #[test]
    fn test_parameter_metadata() {
        let synth = SimpleSynth::new();
        assert_eq!(synth.parameter_count(), 6);
        let info = synth.parameter_info(PARAM_RELEASE).unwrap();
        assert_eq!(info.name, "Release");
        assert_eq!(synth.parameter_value(PARAM_RELEASE), Some(info.default_value));
        assert!(synth.parameter_info(6).is_none());
    }
}
