//! CLI Module
//!
//! Command-line front end for the Phantom Words engine.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::params::{
    PlaybackParameters, TrackMode, MAX_DELAY_MS, MAX_LOOP_COUNT, MIN_LOOP_COUNT,
};

/// Phantom Words - play looped clips with an inter-channel delay
#[derive(Parser, Debug)]
#[command(name = "phantom-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play on the default audio device until the loops run out
    Play {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Render a full session to a stereo WAV file
    Render {
        #[command(flatten)]
        session: SessionArgs,

        /// Output WAV path
        #[arg(short, long)]
        out: PathBuf,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = 48000)]
        sample_rate: u32,
    },

    /// Validate and decode a file, then print what was found
    Probe {
        /// Audio file to inspect
        file: PathBuf,

        /// Slot whose size limit applies (1 or 2)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
        slot: u8,
    },
}

/// Tracks and settings shared by `play` and `render`
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Track 1 audio file
    #[arg(long)]
    pub track1: PathBuf,

    /// Track 2 audio file (dual mode)
    #[arg(long)]
    pub track2: Option<PathBuf>,

    /// single or dual
    #[arg(long)]
    pub mode: Option<TrackMode>,

    /// Track 2 delay in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=MAX_DELAY_MS as i64))]
    pub delay: Option<u32>,

    /// Number of loops
    #[arg(long, value_parser = clap::value_parser!(u32).range(MIN_LOOP_COUNT as i64..=MAX_LOOP_COUNT as i64))]
    pub loops: Option<u32>,

    /// Track 1 speed (0.5 - 2.0)
    #[arg(long)]
    pub speed1: Option<f32>,

    /// Track 2 speed (0.5 - 2.0)
    #[arg(long)]
    pub speed2: Option<f32>,

    /// Engine config JSON
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl SessionArgs {
    /// Apply the flags given on the command line over `base`
    ///
    /// When only one track is given and no mode is set, single mode is used.
    pub fn apply(&self, base: PlaybackParameters) -> PlaybackParameters {
        let mut params = base;
        if let Some(delay) = self.delay {
            params.delay_ms = delay;
        }
        if let Some(loops) = self.loops {
            params.loop_count = loops;
        }
        if let Some(speed) = self.speed1 {
            params.speed1 = speed;
        }
        if let Some(speed) = self.speed2 {
            params.speed2 = speed;
        }
        params.track_mode = match (self.mode, &self.track2) {
            (Some(mode), _) => mode,
            (None, None) => TrackMode::Single,
            (None, Some(_)) => params.track_mode,
        };
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from([
            "phantom-cli",
            "render",
            "--track1",
            "a.wav",
            "--track2",
            "b.mp3",
            "--delay",
            "150",
            "--speed2",
            "1.5",
            "--out",
            "out.wav",
        ]);

        match cli.command {
            Commands::Render {
                session,
                out,
                sample_rate,
            } => {
                let params = session.apply(PlaybackParameters::default());
                assert_eq!(params.delay_ms, 150);
                assert_eq!(params.speed2, 1.5);
                assert_eq!(params.track_mode, TrackMode::Dual);
                assert_eq!(out, PathBuf::from("out.wav"));
                assert_eq!(sample_rate, 48000);
            }
            other => panic!("Expected Render, got {:?}", other),
        }
    }

    #[test]
    fn test_single_track_defaults_to_single_mode() {
        let cli = Cli::parse_from(["phantom-cli", "-v", "play", "--track1", "a.wav"]);
        assert!(cli.verbose);
        let Commands::Play { session } = cli.command else {
            panic!("Expected Play");
        };
        assert_eq!(
            session.apply(PlaybackParameters::default()).track_mode,
            TrackMode::Single
        );
    }

    #[test]
    fn test_out_of_range_delay_rejected() {
        let result = Cli::try_parse_from([
            "phantom-cli",
            "play",
            "--track1",
            "a.wav",
            "--delay",
            "900",
        ]);
        assert!(result.is_err());
    }
}
