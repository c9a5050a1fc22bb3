//! WAV output and generated test material
//!
//! Decoding goes through [`crate::engine::decoder`]; this module only writes.
//! Offline renders and test fixtures are encoded here with `hound`.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{PhantomError, Result};

/// WAV bit depth selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    #[default]
    Int16,
    Int24,
    Float32,
}

impl BitDepth {
    fn bits(&self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        }
    }

    fn sample_format(&self) -> SampleFormat {
        match self {
            BitDepth::Float32 => SampleFormat::Float,
            _ => SampleFormat::Int,
        }
    }
}

/// Encode a buffer as a complete WAV file in memory
pub fn encode_wav(buffer: &AudioBuffer, depth: BitDepth) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_wav(
        &mut cursor,
        &buffer.to_interleaved(),
        buffer.channels() as u16,
        buffer.sample_rate,
        depth,
    )?;
    Ok(cursor.into_inner())
}

/// Write interleaved samples to a WAV file on disk
///
/// Used for offline renders, where the mixer already produces interleaved
/// frames at the output channel count.
pub fn export_interleaved(
    path: &Path,
    interleaved: &[f32],
    channels: u16,
    sample_rate: u32,
    depth: BitDepth,
) -> Result<()> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_wav(file, interleaved, channels, sample_rate, depth)
}

fn write_wav<W: Write + Seek>(
    writer: W,
    interleaved: &[f32],
    channels: u16,
    sample_rate: u32,
    depth: BitDepth,
) -> Result<()> {
    if channels == 0 {
        return Err(PhantomError::Config {
            reason: "cannot write a WAV file with zero channels".to_string(),
        });
    }

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: depth.bits(),
        sample_format: depth.sample_format(),
    };

    let mut writer = WavWriter::new(writer, spec)?;

    match depth {
        BitDepth::Int16 => {
            for &sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled)?;
            }
        }
        BitDepth::Int24 => {
            for &sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled)?;
            }
        }
        BitDepth::Float32 => {
            for &sample in interleaved {
                writer.write_sample(sample)?;
            }
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Generate a mono sine wave
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32).round() as usize;
    let mut buffer = AudioBuffer::new(num_samples, ChannelLayout::Mono, sample_rate);

    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    for (i, sample) in buffer.samples[0].iter_mut().enumerate() {
        *sample = 0.5 * (angular_freq * i as f32).sin();
    }

    buffer
}

/// Generate a stereo buffer with a different sine per channel
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32).round() as usize;
    let mut buffer = AudioBuffer::new(num_samples, ChannelLayout::Stereo, sample_rate);

    for (ch, freq) in [freq_left, freq_right].into_iter().enumerate() {
        let angular_freq = 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
        for (i, sample) in buffer.samples[ch].iter_mut().enumerate() {
            *sample = 0.5 * (angular_freq * i as f32).sin();
        }
    }

    buffer
}

/// Constant-valued mono buffer, handy for tracing exactly which source is
/// audible on which channel
pub fn generate_dc(level: f32, num_samples: usize, sample_rate: u32) -> AudioBuffer {
    let mut buffer = AudioBuffer::new(num_samples, ChannelLayout::Mono, sample_rate);
    buffer.samples[0].fill(level);
    buffer
}

// ============================================================================
// Tests
// ============================================================================
