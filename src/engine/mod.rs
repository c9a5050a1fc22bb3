//! Audio Engine Module
//!
//! The playback core:
//! - Decoding uploads into clips
//! - Building looping two-channel playback graphs
//! - Rendering graphs through an output backend
//! - The session state machine and its status line

pub mod buffer;
pub mod clip;
pub mod decoder;
pub mod graph;
pub mod io;
pub mod output;
pub mod params;
pub mod render;
pub mod status;
pub mod transport;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use clip::{validate_upload, AudioClip, TrackSlot};
pub use decoder::AudioDecoder;
pub use graph::{ChannelAssignment, GraphBuilder, GraphHandle, Routing, SourceNode};
pub use output::{AudioOutput, OfflineOutput};
pub use params::{PlaybackParameters, TrackMode};
pub use render::{GraphRenderer, RenderStatus};
pub use status::{status_message, StatusEvent, StatusReporter};
pub use transport::{
    EngineEvent, PlaybackController, PlaybackSession, PlaybackState, StateTransition,
    TransitionCause,
};
