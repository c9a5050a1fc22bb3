//! Phantom Words - auditory illusion playback engine
//!
//! One or two uploaded clips are looped on separate stereo channels, the
//! second delayed by a few hundred milliseconds and each at its own speed.
//! Listeners start hearing words that are not in the recording.
//!
//! # Architecture
//!
//! - [`engine`]: decoding, graph building, rendering and the playback
//!   state machine
//! - [`context`]: the per-client object tying tracks, parameters and the
//!   controller together
//! - [`config`]: JSON engine configuration

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;

pub use config::{EngineConfig, OutputConfig};
pub use context::{EngineListener, PhantomContext};
pub use engine::{PlaybackParameters, PlaybackState, TrackMode, TrackSlot};
pub use error::{PhantomError, Result};
