//! Playback parameters
//!
//! A snapshot of the user's settings taken when "play" is pressed. Values
//! are checked against their domains and rejected, never clamped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ============================================================================
// Domains
// ============================================================================

pub const MIN_DELAY_MS: u32 = 0;
pub const MAX_DELAY_MS: u32 = 500;
pub const DEFAULT_DELAY_MS: u32 = 200;

pub const MIN_LOOP_COUNT: u32 = 1;
pub const MAX_LOOP_COUNT: u32 = 100;
pub const DEFAULT_LOOP_COUNT: u32 = 10;

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;
pub const DEFAULT_SPEED: f32 = 1.0;

// ============================================================================
// Track Mode
// ============================================================================

/// Whether one clip or two clips are played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    /// Track 1 only, heard on both channels
    Single,
    /// Track 1 and track 2 on separate channels, track 2 delayed
    #[default]
    Dual,
}

impl TrackMode {
    /// Whether this mode needs a clip in slot 2
    pub fn requires_track2(&self) -> bool {
        matches!(self, TrackMode::Dual)
    }
}

impl fmt::Display for TrackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackMode::Single => write!(f, "single"),
            TrackMode::Dual => write!(f, "dual"),
        }
    }
}

impl FromStr for TrackMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(TrackMode::Single),
            "dual" => Ok(TrackMode::Dual),
            other => Err(format!("unknown track mode '{}' (expected single or dual)", other)),
        }
    }
}

// ============================================================================
// Playback Parameters
// ============================================================================

/// Settings for one playback session
///
/// # Example
/// ```
/// use phantom_words::engine::{PlaybackParameters, TrackMode};
///
/// let params = PlaybackParameters::new(150, 4, TrackMode::Dual, 1.0, 1.5).unwrap();
/// assert_eq!(params.delay_ms, 150);
///
/// // Out-of-domain values are rejected rather than clamped
/// assert!(PlaybackParameters::new(600, 4, TrackMode::Dual, 1.0, 1.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackParameters {
    /// Start offset of track 2 relative to track 1, in milliseconds
    pub delay_ms: u32,
    /// Total number of passes through each clip
    pub loop_count: u32,
    pub track_mode: TrackMode,
    /// Rate multiplier for track 1
    pub speed1: f32,
    /// Rate multiplier for track 2, unused in single mode
    pub speed2: f32,
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            loop_count: DEFAULT_LOOP_COUNT,
            track_mode: TrackMode::default(),
            speed1: DEFAULT_SPEED,
            speed2: DEFAULT_SPEED,
        }
    }
}

impl PlaybackParameters {
    /// Build and validate a parameter set
    pub fn new(
        delay_ms: u32,
        loop_count: u32,
        track_mode: TrackMode,
        speed1: f32,
        speed2: f32,
    ) -> std::result::Result<Self, ValidationError> {
        let params = Self {
            delay_ms,
            loop_count,
            track_mode,
            speed1,
            speed2,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check every field against its domain
    ///
    /// The speed check also catches NaN, which compares false against both
    /// bounds.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        check_u32("delay_ms", self.delay_ms, MIN_DELAY_MS, MAX_DELAY_MS)?;
        check_u32("loop_count", self.loop_count, MIN_LOOP_COUNT, MAX_LOOP_COUNT)?;
        check_speed("speed1", self.speed1)?;
        check_speed("speed2", self.speed2)?;
        Ok(())
    }

    /// Same parameters with a different track mode
    pub fn with_track_mode(mut self, track_mode: TrackMode) -> Self {
        self.track_mode = track_mode;
        self
    }
}

fn check_u32(
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> std::result::Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value: value as f64,
            min: min as f64,
            max: max as f64,
        })
    }
}

fn check_speed(field: &'static str, value: f32) -> std::result::Result<(), ValidationError> {
    if value >= MIN_SPEED && value <= MAX_SPEED {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value: value as f64,
            min: MIN_SPEED as f64,
            max: MAX_SPEED as f64,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults_match_ui() {
        let params = PlaybackParameters::default();
        assert_eq!(params.delay_ms, 200);
        assert_eq!(params.loop_count, 10);
        assert_eq!(params.track_mode, TrackMode::Dual);
        assert_eq!(params.speed1, 1.0);
        assert_eq!(params.speed2, 1.0);
        assert!(params.validate().is_ok());
    }

    #[test_case(0, 1, 0.5, 0.5 ; "all minimums")]
    #[test_case(500, 100, 2.0, 2.0 ; "all maximums")]
    #[test_case(250, 50, 1.3, 0.7 ; "interior")]
    fn test_accepts_domain(delay: u32, loops: u32, s1: f32, s2: f32) {
        assert!(PlaybackParameters::new(delay, loops, TrackMode::Dual, s1, s2).is_ok());
    }

    #[test_case(501, 10, 1.0, 1.0, "delay_ms" ; "delay too long")]
    #[test_case(200, 0, 1.0, 1.0, "loop_count" ; "zero loops")]
    #[test_case(200, 101, 1.0, 1.0, "loop_count" ; "too many loops")]
    #[test_case(200, 10, 0.4, 1.0, "speed1" ; "speed1 too slow")]
    #[test_case(200, 10, 1.0, 2.1, "speed2" ; "speed2 too fast")]
    #[test_case(200, 10, f32::NAN, 1.0, "speed1" ; "nan speed")]
    fn test_rejects_out_of_domain(delay: u32, loops: u32, s1: f32, s2: f32, expected: &str) {
        match PlaybackParameters::new(delay, loops, TrackMode::Single, s1, s2) {
            Err(ValidationError::OutOfRange { field, .. }) => assert_eq!(field, expected),
            other => panic!("Expected OutOfRange for {}, got {:?}", expected, other),
        }
    }

    #[test]
    fn test_track_mode_parsing() {
        assert_eq!("Single".parse::<TrackMode>(), Ok(TrackMode::Single));
        assert_eq!("dual".parse::<TrackMode>(), Ok(TrackMode::Dual));
        assert!("stereo".parse::<TrackMode>().is_err());
        assert!(TrackMode::Dual.requires_track2());
        assert!(!TrackMode::Single.requires_track2());
    }

    #[test]
    fn test_serde_fills_missing_fields() {
        let params: PlaybackParameters =
            serde_json::from_str(r#"{"delay_ms": 120, "track_mode": "single"}"#).unwrap();
        assert_eq!(params.delay_ms, 120);
        assert_eq!(params.track_mode, TrackMode::Single);
        assert_eq!(params.loop_count, DEFAULT_LOOP_COUNT);
    }
}
