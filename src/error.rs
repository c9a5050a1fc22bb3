//! Error handling for Phantom Words
//!
//! Every failure is resolved at the boundary where it occurs and surfaced to
//! the user as a short status message. Nothing here should ever take down a
//! client session.

use thiserror::Error;

use crate::engine::clip::TrackSlot;

/// Result type alias for Phantom Words operations
pub type Result<T> = std::result::Result<T, PhantomError>;

/// Upload and parameter validation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid file type: '{filename}' (expected MP3, WAV, OGG or M4A)")]
    InvalidFileType { filename: String },

    #[error("File too large for track {slot}: {size} bytes (limit {limit} bytes)")]
    FileTooLarge {
        slot: TrackSlot,
        size: usize,
        limit: usize,
    },

    #[error("Empty upload for track {slot}")]
    EmptyUpload { slot: TrackSlot },

    #[error("Parameter '{field}' out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Decoder failures. A decode either yields a complete clip or one of these.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported or corrupt audio: {reason}")]
    Unsupported {
        reason: String,
        #[source]
        source: Option<symphonia::core::errors::Error>,
    },

    #[error("Payload too large for track {slot}: {size} bytes (limit {limit} bytes)")]
    TooLarge {
        slot: TrackSlot,
        size: usize,
        limit: usize,
    },
}

impl DecodeError {
    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        DecodeError::Unsupported {
            reason: reason.into(),
            source: None,
        }
    }
}

/// Playback graph construction failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Missing track {slot}")]
    MissingTrack { slot: TrackSlot },
}

/// Audio output backend failures
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Output stream already running")]
    AlreadyRunning,
}

/// Coarse error category reported to the UI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Decode,
    Build,
    Output,
    Config,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Decode => "decode",
            ErrorKind::Build => "build",
            ErrorKind::Output => "output",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

/// Main error type for Phantom Words operations
#[derive(Error, Debug)]
pub enum PhantomError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PhantomError {
    /// Get the coarse category for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PhantomError::Validation(_) => ErrorKind::Validation,
            PhantomError::Decode(_) => ErrorKind::Decode,
            PhantomError::Build(_) => ErrorKind::Build,
            PhantomError::Output(_) => ErrorKind::Output,
            PhantomError::Config { .. } | PhantomError::Serialization(_) => ErrorKind::Config,
            PhantomError::Wav(_) | PhantomError::Io(_) => ErrorKind::Io,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PhantomError::Validation(ValidationError::InvalidFileType { .. }) => {
                "INVALID_FILE_TYPE"
            }
            PhantomError::Validation(ValidationError::FileTooLarge { .. }) => "FILE_TOO_LARGE",
            PhantomError::Validation(ValidationError::EmptyUpload { .. }) => "EMPTY_UPLOAD",
            PhantomError::Validation(ValidationError::OutOfRange { .. }) => "OUT_OF_RANGE",
            PhantomError::Decode(DecodeError::Unsupported { .. }) => "UNSUPPORTED_AUDIO",
            PhantomError::Decode(DecodeError::TooLarge { .. }) => "PAYLOAD_TOO_LARGE",
            PhantomError::Build(BuildError::MissingTrack { .. }) => "MISSING_TRACK",
            PhantomError::Output(_) => "OUTPUT_ERROR",
            PhantomError::Config { .. } => "CONFIG_ERROR",
            PhantomError::Wav(_) => "WAV_ERROR",
            PhantomError::Io(_) => "IO_ERROR",
            PhantomError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable within the current client session
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PhantomError::Output(OutputError::Device(_)) | PhantomError::Io(_)
        )
    }

    /// Short user-facing message for the status line
    pub fn status_message(&self) -> String {
        match self {
            PhantomError::Validation(ValidationError::InvalidFileType { .. }) => {
                "invalid file type: please upload an MP3, WAV, OGG or M4A file".to_string()
            }
            PhantomError::Validation(ValidationError::FileTooLarge { slot, .. })
            | PhantomError::Decode(DecodeError::TooLarge { slot, .. }) => format!(
                "file too large: track {} is limited to {} MB",
                slot,
                slot.max_upload_bytes() / (1024 * 1024)
            ),
            PhantomError::Validation(ValidationError::EmptyUpload { slot }) => {
                format!("empty file: nothing was uploaded for track {}", slot)
            }
            PhantomError::Validation(ValidationError::OutOfRange {
                field, min, max, ..
            }) => format!("invalid setting: {} must be between {} and {}", field, min, max),
            PhantomError::Decode(DecodeError::Unsupported { .. }) => {
                "decode failed: please check your audio file and try again".to_string()
            }
            PhantomError::Build(BuildError::MissingTrack { slot: TrackSlot::Two }) => {
                "missing track 2: dual track mode needs a second audio file".to_string()
            }
            PhantomError::Build(BuildError::MissingTrack { slot }) => {
                format!("missing track {}: please upload an audio file", slot)
            }
            PhantomError::Output(_) => "audio output unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: PhantomError = BuildError::MissingTrack {
            slot: TrackSlot::Two,
        }
        .into();
        assert_eq!(err.error_code(), "MISSING_TRACK");
        assert_eq!(err.kind(), ErrorKind::Build);
    }

    #[test]
    fn test_missing_second_track_message() {
        let err: PhantomError = BuildError::MissingTrack {
            slot: TrackSlot::Two,
        }
        .into();
        assert!(err.status_message().contains("missing track 2"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_too_large_messages_use_slot_limit() {
        let one: PhantomError = ValidationError::FileTooLarge {
            slot: TrackSlot::One,
            size: 31 * 1024 * 1024,
            limit: TrackSlot::One.max_upload_bytes(),
        }
        .into();
        let two: PhantomError = DecodeError::TooLarge {
            slot: TrackSlot::Two,
            size: 6 * 1024 * 1024,
            limit: TrackSlot::Two.max_upload_bytes(),
        }
        .into();

        assert!(one.status_message().contains("30 MB"));
        assert!(two.status_message().contains("5 MB"));
        assert_eq!(two.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_device_errors_are_not_recoverable() {
        let err: PhantomError = OutputError::Device("gone".into()).into();
        assert!(!err.is_recoverable());
        assert_eq!(err.status_message(), "audio output unavailable");
    }
}
