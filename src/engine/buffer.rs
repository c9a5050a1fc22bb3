//! Audio Buffer Management
//!
//! Decoded sample storage shared between clips and playback graphs.
//! Samples are non-interleaved 32-bit float at the source's native rate;
//! rate conversion happens at render time.

use crate::error::DecodeError;

// ============================================================================
// Constants
// ============================================================================

/// Sample rate used for generated material and offline renders
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Peak level below which rendered output counts as inaudible (-90dBFS)
pub const SILENCE_THRESHOLD_DB: f32 = -90.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Peak level of a block of interleaved samples in dB
pub fn peak_db(samples: &[f32]) -> f32 {
    let peak = samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max);
    linear_to_db(peak)
}

/// Check whether a block of rendered samples is inaudible
pub fn is_silent(samples: &[f32]) -> bool {
    peak_db(samples) < SILENCE_THRESHOLD_DB
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio, one `Vec<f32>` per channel
///
/// # Example
/// ```
/// use phantom_words::engine::buffer::{AudioBuffer, ChannelLayout};
///
/// // Half a second of stereo silence at 44.1kHz
/// let buffer = AudioBuffer::new(22050, ChannelLayout::Stereo, 44100);
/// assert_eq!(buffer.channels(), 2);
/// assert!((buffer.duration_secs() - 0.5).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zeroed buffer with the given frame count, layout and rate
    pub fn new(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// Fails if the data length is not a whole number of frames.
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> std::result::Result<Self, DecodeError> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(DecodeError::unsupported(format!(
                "interleaved data length {} is not divisible by channel count {}",
                interleaved.len(),
                num_channels
            )));
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ... for stereo)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.channels();
        let num_samples = self.len();
        let mut interleaved = Vec::with_capacity(num_channels * num_samples);

        for sample_idx in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }

        interleaved
    }

    /// Fold all channels into the single logical feed the engine plays
    ///
    /// Stereo material is averaged; mono is copied as-is.
    pub fn to_mono(&self) -> Vec<f32> {
        match self.samples.as_slice() {
            [] => Vec::new(),
            [mono] => mono.clone(),
            channels => {
                let scale = 1.0 / channels.len() as f32;
                (0..self.len())
                    .map(|i| channels.iter().map(|ch| ch[i]).sum::<f32>() * scale)
                    .collect()
            }
        }
    }

    /// Single logical sample at `index`, channels averaged
    ///
    /// Reads past the end return silence.
    #[inline]
    pub fn mono_sample(&self, index: usize) -> f32 {
        match self.samples.as_slice() {
            [mono] => mono.get(index).copied().unwrap_or(0.0),
            [left, right] => match (left.get(index), right.get(index)) {
                (Some(l), Some(r)) => (l + r) * 0.5,
                _ => 0.0,
            },
            _ => 0.0,
        }
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get the channel layout
    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_count(self.channels())
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ------------------------------------------------------------------------
    // Level helpers
    // ------------------------------------------------------------------------

    #[test]
    fn test_linear_to_db() {
        assert_relative_eq!(linear_to_db(1.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(linear_to_db(0.5), -6.0206, epsilon = 1e-3);
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
    }

    #[test]
    fn test_is_silent() {
        assert!(is_silent(&[0.0; 64]));
        assert!(is_silent(&[]));
        assert!(!is_silent(&[0.0, 0.0, 0.25, 0.0]));
    }

    // ------------------------------------------------------------------------
    // ChannelLayout tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_channel_layout() {
        assert_eq!(ChannelLayout::Mono.num_channels(), 1);
        assert_eq!(ChannelLayout::Stereo.num_channels(), 2);
        assert_eq!(ChannelLayout::from_count(2), Some(ChannelLayout::Stereo));
        assert_eq!(ChannelLayout::from_count(6), None);
    }

    // ------------------------------------------------------------------------
    // AudioBuffer tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer::new(44100 * 3, ChannelLayout::Mono, 44100);
        assert_relative_eq!(buffer.duration_secs(), 3.0);
    }

    #[test]
    fn test_buffer_from_interleaved_stereo() {
        let data = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buffer = AudioBuffer::from_interleaved(&data, ChannelLayout::Stereo, 8000).unwrap();

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buffer.to_interleaved(), data.to_vec());
    }

    #[test]
    fn test_buffer_from_interleaved_invalid() {
        let result = AudioBuffer::from_interleaved(&[0.1, 0.2, 0.3], ChannelLayout::Stereo, 8000);
        assert!(matches!(result, Err(DecodeError::Unsupported { .. })));
    }

    #[test]
    fn test_to_mono_averages_stereo() {
        let buffer =
            AudioBuffer::from_interleaved(&[1.0, 0.0, 0.5, 0.5], ChannelLayout::Stereo, 8000)
                .unwrap();
        assert_eq!(buffer.to_mono(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_mono_sample_matches_to_mono() {
        let buffer =
            AudioBuffer::from_interleaved(&[0.2, 0.4, -1.0, 1.0], ChannelLayout::Stereo, 8000)
                .unwrap();
        let folded = buffer.to_mono();
        assert_relative_eq!(buffer.mono_sample(0), folded[0]);
        assert_relative_eq!(buffer.mono_sample(1), folded[1]);
        assert_eq!(buffer.mono_sample(2), 0.0);
    }

    #[test]
    fn test_to_mono_passes_mono_through() {
        let mut buffer = AudioBuffer::new(3, ChannelLayout::Mono, 8000);
        buffer.channel_mut(0).copy_from_slice(&[0.1, 0.2, 0.3]);
        assert_eq!(buffer.to_mono(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_buffer_is_empty() {
        let buffer = AudioBuffer::new(0, ChannelLayout::Stereo, 48000);
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration_secs(), 0.0);
    }
}
