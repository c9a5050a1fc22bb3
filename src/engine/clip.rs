//! Track slots and decoded clips
//!
//! A clip is the decoded form of one upload. Clips never change after
//! decoding; graphs borrow their sample data through an `Arc`.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::buffer::AudioBuffer;
use crate::error::ValidationError;

/// Upload ceiling for track 1 (30 MB)
pub const TRACK1_MAX_BYTES: usize = 30 * 1024 * 1024;

/// Upload ceiling for track 2 (5 MB)
pub const TRACK2_MAX_BYTES: usize = 5 * 1024 * 1024;

/// File extensions accepted for upload (lowercase, without the dot)
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["mp3", "wav", "ogg", "m4a"];

/// One of the two independent upload/playback channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackSlot {
    One,
    Two,
}

impl TrackSlot {
    /// Largest payload this slot accepts, in bytes
    pub fn max_upload_bytes(&self) -> usize {
        match self {
            TrackSlot::One => TRACK1_MAX_BYTES,
            TrackSlot::Two => TRACK2_MAX_BYTES,
        }
    }

    /// Zero-based index into per-slot storage
    pub fn index(&self) -> usize {
        match self {
            TrackSlot::One => 0,
            TrackSlot::Two => 1,
        }
    }

    /// Map a user-facing slot number (1 or 2)
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(TrackSlot::One),
            2 => Some(TrackSlot::Two),
            _ => None,
        }
    }
}

impl fmt::Display for TrackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSlot::One => write!(f, "1"),
            TrackSlot::Two => write!(f, "2"),
        }
    }
}

/// Lowercased extension of `filename`, if it has one
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Check an upload's extension and size before it reaches the decoder
pub fn validate_upload(
    slot: TrackSlot,
    filename: &str,
    raw_bytes: &[u8],
) -> std::result::Result<(), ValidationError> {
    let accepted = file_extension(filename)
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !accepted {
        return Err(ValidationError::InvalidFileType {
            filename: filename.to_string(),
        });
    }

    if raw_bytes.is_empty() {
        return Err(ValidationError::EmptyUpload { slot });
    }

    let limit = slot.max_upload_bytes();
    if raw_bytes.len() > limit {
        return Err(ValidationError::FileTooLarge {
            slot,
            size: raw_bytes.len(),
            limit,
        });
    }

    Ok(())
}

/// SHA-256 of a payload as lowercase hex
pub fn checksum(raw_bytes: &[u8]) -> String {
    let digest = Sha256::digest(raw_bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// One uploaded, fully decoded track
#[derive(Debug, Clone)]
pub struct AudioClip {
    filename: String,
    raw_bytes: Arc<[u8]>,
    buffer: Arc<AudioBuffer>,
    checksum: String,
}

impl AudioClip {
    /// Wrap a decoded buffer together with the bytes it came from
    pub fn new(
        filename: impl Into<String>,
        raw_bytes: impl Into<Arc<[u8]>>,
        buffer: AudioBuffer,
    ) -> Self {
        let raw_bytes = raw_bytes.into();
        let checksum = checksum(&raw_bytes);
        Self {
            filename: filename.into(),
            raw_bytes,
            buffer: Arc::new(buffer),
            checksum,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The payload exactly as received
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    /// Decoded samples, shared
    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        self.buffer.duration_secs()
    }

    /// SHA-256 of the raw payload
    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}
