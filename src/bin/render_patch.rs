//! Patch renderer
//!
//! Renders one note through a generator with a patch applied and prints the
//! per-buffer features as JSON on stdout.
//!
//! ```bash
//! # Render middle C for 1s, held for 0.5s, and keep the audio
//! render-patch builtin:simple-synth patch.json --note-length 0.5 --render-length 1 --wav out.wav
//!
//! # Score an existing recording the same way
//! render-patch --analyze out.wav
//! ```

use clap::Parser;
use std::path::PathBuf;

use patchrender_lib::audio::wav::read_wav_mono;
use patchrender_lib::audio::{EngineError, Patch, RenderEngine};
use patchrender_lib::EngineConfig;

/// Render a note through a generator and print its MFCC/RMS features as JSON
#[derive(Parser, Debug)]
#[command(name = "render-patch")]
#[command(version)]
struct Options {
    /// Generator to load (e.g. builtin:simple-synth)
    #[arg(required_unless_present = "analyze", conflicts_with = "analyze")]
    generator: Option<String>,

    /// Patch file: JSON list of [index, value] pairs
    patch: Option<PathBuf>,

    /// Analyze a WAV file instead of rendering
    #[arg(long, value_name = "WAV")]
    analyze: Option<PathBuf>,

    /// Engine config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the rendered audio
    #[arg(long, value_name = "FILE")]
    wav: Option<PathBuf>,

    /// MIDI note
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u8).range(0..=127))]
    note: u8,

    /// MIDI velocity
    #[arg(long, default_value_t = 127, value_parser = clap::value_parser!(u8).range(0..=127))]
    velocity: u8,

    /// Seconds until note-off
    #[arg(long, default_value_t = 1.0, value_parser = parse_secs)]
    note_length: f64,

    /// Total render time in seconds
    #[arg(long, default_value_t = 2.0, value_parser = parse_secs)]
    render_length: f64,

    /// Parameter override, repeatable
    #[arg(long = "override", value_name = "INDEX=VALUE", value_parser = parse_override)]
    overrides: Vec<(usize, f32)>,
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let options = Options::parse();

    if let Err(e) = run(&options) {
        log::error!("render-patch failed: {}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn parse_secs(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => Ok(v),
        _ => Err(format!("expected a positive number of seconds, got {}", value)),
    }
}

fn parse_override(value: &str) -> Result<(usize, f32), String> {
    let (index, param) = value
        .split_once('=')
        .ok_or_else(|| format!("override must be INDEX=VALUE, got {}", value))?;
    match (index.trim().parse::<usize>(), param.trim().parse::<f32>()) {
        (Ok(i), Ok(v)) => Ok((i, v)),
        _ => Err(format!("invalid override: {}", value)),
    }
}

fn run(options: &Options) -> Result<(), EngineError> {
    let config = match &options.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let mut engine = RenderEngine::new(config);

    if let Some(input) = &options.analyze {
        let (samples, sample_rate) = read_wav_mono(input)?;
        if sample_rate != engine.config().sample_rate {
            log::warn!(
                "{:?} is {} Hz but the engine runs at {} Hz; features are not resampled",
                input,
                sample_rate,
                engine.config().sample_rate
            );
        }
        engine.analyze_audio(&samples);
    } else if let Some(generator) = &options.generator {
        engine.load_plugin(generator)?;

        if let Some(path) = &options.patch {
            log::info!("Loading patch from: {:?}", path);
            let text = std::fs::read_to_string(path)?;
            let patch: Patch = serde_json::from_str(&text)?;
            engine.set_patch(patch);
        }
        for &(index, value) in &options.overrides {
            engine.override_parameter(index, value)?;
        }

        log::debug!("Parameters:\n{}", engine.parameter_descriptions()?);
        engine.render_patch(
            options.note,
            options.velocity,
            options.note_length,
            options.render_length,
        )?;

        if let Some(path) = &options.wav {
            engine.write_wav(path)?;
        }
    }

    let report = serde_json::to_string(&engine.feature_report())?;
    println!("{}", report);
    Ok(())
}
