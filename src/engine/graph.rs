//! Playback graph construction
//!
//! A graph is one or two looping sources, each with its own rate, start
//! offset and output routing. Building a graph never touches the output
//! device; the controller hands the finished graph to the renderer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::engine::buffer::AudioBuffer;
use crate::engine::clip::{AudioClip, TrackSlot};
use crate::engine::params::{PlaybackParameters, TrackMode};
use crate::error::BuildError;

// ============================================================================
// Routing
// ============================================================================

/// Output channel(s) a source is mixed into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    Left,
    Right,
    Both,
}

impl Routing {
    /// Whether this routing feeds output channel `channel` (0 = left)
    #[inline]
    pub fn feeds(&self, channel: usize) -> bool {
        match self {
            Routing::Left => channel == 0,
            Routing::Right => channel == 1,
            Routing::Both => channel < 2,
        }
    }
}

/// Which ear hears track 1 in dual mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelAssignment {
    #[default]
    Track1Left,
    Track1Right,
}

impl ChannelAssignment {
    /// Coin flip between the two assignments
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            ChannelAssignment::Track1Right
        } else {
            ChannelAssignment::Track1Left
        }
    }

    /// Dual-mode routing for a slot
    pub fn routing_for(&self, slot: TrackSlot) -> Routing {
        match (self, slot) {
            (ChannelAssignment::Track1Left, TrackSlot::One)
            | (ChannelAssignment::Track1Right, TrackSlot::Two) => Routing::Left,
            (ChannelAssignment::Track1Left, TrackSlot::Two)
            | (ChannelAssignment::Track1Right, TrackSlot::One) => Routing::Right,
        }
    }
}

impl fmt::Display for ChannelAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelAssignment::Track1Left => write!(f, "track 1 left / track 2 right"),
            ChannelAssignment::Track1Right => write!(f, "track 1 right / track 2 left"),
        }
    }
}

// ============================================================================
// Source Node
// ============================================================================

/// One scheduled, looping clip
#[derive(Debug, Clone)]
pub struct SourceNode {
    pub slot: TrackSlot,
    /// Decoded samples, shared with the clip
    pub buffer: Arc<AudioBuffer>,
    /// Playback-rate multiplier
    pub rate: f32,
    /// Delay after the graph's start before this source is heard
    pub start_offset: Duration,
    /// Total passes through the clip
    pub loop_count: u32,
    pub routing: Routing,
}

impl SourceNode {
    /// Wall-clock time at which the final pass ends
    pub fn finish_time(&self) -> Duration {
        let playing = self.buffer.duration_secs() * self.loop_count as f64 / self.rate as f64;
        self.start_offset.saturating_add(secs_to_duration(playing))
    }
}

/// Non-finite or huge values (a zero rate) saturate instead of panicking
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

// ============================================================================
// Graph Handle
// ============================================================================

/// A built, not yet started, playback graph
#[derive(Debug, Clone)]
pub struct GraphHandle {
    sources: Vec<SourceNode>,
    track_mode: TrackMode,
    assignment: ChannelAssignment,
}

impl GraphHandle {
    pub fn sources(&self) -> &[SourceNode] {
        &self.sources
    }

    pub fn source(&self, slot: TrackSlot) -> Option<&SourceNode> {
        self.sources.iter().find(|s| s.slot == slot)
    }

    /// Scheduled start of a track's source, if the graph has one
    pub fn start_offset(&self, slot: TrackSlot) -> Option<Duration> {
        self.source(slot).map(|s| s.start_offset)
    }

    /// When the later-finishing source completes its last loop
    pub fn finish_time(&self) -> Duration {
        self.sources
            .iter()
            .map(SourceNode::finish_time)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    pub fn track_mode(&self) -> TrackMode {
        self.track_mode
    }

    pub fn channel_assignment(&self) -> ChannelAssignment {
        self.assignment
    }

    pub(crate) fn into_sources(self) -> Vec<SourceNode> {
        self.sources
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles graphs from clips and a parameter snapshot
pub struct GraphBuilder;

impl GraphBuilder {
    /// Confirm every clip the mode needs is present
    ///
    /// Runs before anything else so a failed request can leave running
    /// playback alone.
    pub fn check_tracks(
        clip1: Option<&AudioClip>,
        clip2: Option<&AudioClip>,
        mode: TrackMode,
    ) -> std::result::Result<(), BuildError> {
        if clip1.is_none() {
            return Err(BuildError::MissingTrack {
                slot: TrackSlot::One,
            });
        }
        if mode.requires_track2() && clip2.is_none() {
            return Err(BuildError::MissingTrack {
                slot: TrackSlot::Two,
            });
        }
        Ok(())
    }

    /// Build the graph for one session
    ///
    /// Track 1 starts at zero. In dual mode track 2 starts `delay_ms` later
    /// regardless of either speed, and the two tracks go to opposite
    /// channels per `assignment`. In single mode track 1 plays on both
    /// channels and slot 2 is ignored.
    pub fn build(
        clip1: Option<&AudioClip>,
        clip2: Option<&AudioClip>,
        params: &PlaybackParameters,
        assignment: ChannelAssignment,
    ) -> std::result::Result<GraphHandle, BuildError> {
        Self::check_tracks(clip1, clip2, params.track_mode)?;

        let mut sources = Vec::with_capacity(2);

        match (params.track_mode, clip1, clip2) {
            (TrackMode::Single, Some(one), _) => {
                sources.push(SourceNode {
                    slot: TrackSlot::One,
                    buffer: Arc::clone(one.buffer()),
                    rate: params.speed1,
                    start_offset: Duration::ZERO,
                    loop_count: params.loop_count,
                    routing: Routing::Both,
                });
            }
            (TrackMode::Dual, Some(one), Some(two)) => {
                sources.push(SourceNode {
                    slot: TrackSlot::One,
                    buffer: Arc::clone(one.buffer()),
                    rate: params.speed1,
                    start_offset: Duration::ZERO,
                    loop_count: params.loop_count,
                    routing: assignment.routing_for(TrackSlot::One),
                });
                sources.push(SourceNode {
                    slot: TrackSlot::Two,
                    buffer: Arc::clone(two.buffer()),
                    rate: params.speed2,
                    start_offset: Duration::from_millis(params.delay_ms as u64),
                    loop_count: params.loop_count,
                    routing: assignment.routing_for(TrackSlot::Two),
                });
            }
            _ => {
                // check_tracks guarantees the clips for the mode
                return Err(BuildError::MissingTrack {
                    slot: if clip1.is_none() {
                        TrackSlot::One
                    } else {
                        TrackSlot::Two
                    },
                });
            }
        }

        Ok(GraphHandle {
            sources,
            track_mode: params.track_mode,
            assignment,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
