//! WAV persistence for rendered audio

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

use super::error::EngineError;

/// Write planar channels as an interleaved 32-bit float WAV file
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    channels: &[Vec<f32>],
    sample_rate: u32,
) -> Result<(), EngineError> {
    let frames = channels.first().map(|ch| ch.len()).unwrap_or(0);
    if frames == 0 {
        return Err(EngineError::EmptyAudio);
    }

    let path = path.as_ref();
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for i in 0..frames {
        for ch in channels {
            writer.write_sample(ch.get(i).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    log::info!(
        "Wrote {} frames x {} channels to {:?}",
        frames,
        channels.len(),
        path
    );
    Ok(())
}

/// Read a WAV file as mono (channel mean) float samples, with its sample rate
///
/// Integer formats are scaled to -1.0..1.0.
pub fn read_wav_mono<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32), EngineError> {
    let mut reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.wav");
        let channels = vec![vec![0.5, -0.5, 0.25], vec![0.5, 0.5, -0.25]];

        write_wav(&path, &channels, 22050).unwrap();

        let reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_format, SampleFormat::Float);
        assert_eq!(reader.len(), 6);

        let (mono, sample_rate) = read_wav_mono(&path).unwrap();
        assert_eq!(sample_rate, 22050);
        assert_eq!(mono, vec![0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_read_int_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("int.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384i16).unwrap();
        writer.write_sample(-32768i16).unwrap();
        writer.finalize().unwrap();

        let (mono, _) = read_wav_mono(&path).unwrap();
        assert_eq!(mono, vec![0.5, -1.0]);
    }

    #[test]
    fn test_empty_audio_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        assert!(matches!(write_wav(&path, &[], 44100), Err(EngineError::EmptyAudio)));
        assert!(matches!(
            write_wav(&path, &[Vec::new()], 44100),
            Err(EngineError::EmptyAudio)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_path() {
        let result = write_wav("/nonexistent/dir/out.wav", &[vec![0.0]], 44100);
        assert!(matches!(result, Err(EngineError::Wav(_))));
    }
}
