//! Planar audio buffers

/// Fixed-size planar block: one `Vec<f32>` per channel, all `frames` long
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    frames: usize,
}

impl AudioBuffer {
    pub fn new(channel_count: usize, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channel_count],
            frames,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    /// Zero every sample
    pub fn clear(&mut self) {
        for ch in &mut self.channels {
            ch.iter_mut().for_each(|s| *s = 0.0);
        }
    }

    /// Average all channels into `out`, replacing its contents
    pub fn mix_to_mono(&self, out: &mut Vec<f32>) {
        out.clear();
        match self.channels.len() {
            0 => out.resize(self.frames, 0.0),
            1 => out.extend_from_slice(&self.channels[0]),
            n => {
                let scale = 1.0 / n as f32;
                out.extend((0..self.frames).map(|i| {
                    self.channels.iter().map(|ch| ch[i]).sum::<f32>() * scale
                }));
            }
        }
    }
}

/// Root-mean-square level of a block; 0 for an empty block
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}
