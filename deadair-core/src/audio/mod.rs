//! Decoded audio held in memory for one analysis call.
//!
//! The pipeline never streams: the audio source hands over the complete byte
//! payload, [`decode::decode`] turns it into an [`AudioBuffer`], and the buffer
//! is dropped once the call's evaluation has been composed.

pub mod decode;

pub use decode::decode;

/// Interleaved PCM samples at a known sample rate.
///
/// Samples are normalised to `[-1.0, 1.0]` so that an amplitude of `1.0`
/// corresponds to 0 dBFS regardless of the source bit depth.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
}

impl AudioBuffer {
    /// Build a buffer from already-normalised interleaved samples.
    ///
    /// A trailing incomplete frame (fewer samples than `channels`) is dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Interleaved samples in `[-1.0, 1.0]`.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration of the buffer in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Returns true if the buffer holds no complete frame.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_duration_counts_frames_not_samples() {
        let buffer = AudioBuffer::new(vec![0.0; 16_000], 8_000, 2, 16);
        assert_eq!(buffer.frames(), 8_000);
        assert!((buffer.duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn incomplete_trailing_frame_is_dropped() {
        let buffer = AudioBuffer::new(vec![0.1, 0.2, 0.3], 8_000, 2, 16);
        assert_eq!(buffer.samples(), &[0.1, 0.2]);
        assert_eq!(buffer.frames(), 1);
    }

    #[test]
    fn empty_buffer_has_zero_duration() {
        let buffer = AudioBuffer::new(Vec::new(), 16_000, 1, 16);
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration_seconds(), 0.0);
    }
}
