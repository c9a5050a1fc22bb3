//! Per-client engine context
//!
//! Owns the two track slots, the current parameters, the playback
//! controller and the status line. Every error is resolved here: it is
//! reported to the listener and also returned to the caller.

use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::clip::{checksum, validate_upload, AudioClip, TrackSlot};
use crate::engine::decoder::AudioDecoder;
use crate::engine::output::AudioOutput;
use crate::engine::params::{PlaybackParameters, TrackMode};
use crate::engine::status::{StatusEvent, StatusReporter};
use crate::engine::transport::{EngineEvent, PlaybackController, PlaybackSession, PlaybackState};
use crate::error::{ErrorKind, PhantomError, Result};

/// Callbacks to the UI side. All methods default to doing nothing.
pub trait EngineListener {
    fn on_status_changed(&mut self, _message: &str) {}

    /// A clip decoded and can be played
    fn on_track_ready(&mut self, _slot: TrackSlot, _duration_seconds: f64) {}

    fn on_error(&mut self, _kind: ErrorKind, _message: &str) {}
}

/// Listener that ignores everything
impl EngineListener for () {}

/// One client's engine
pub struct PhantomContext {
    tracks: [Option<AudioClip>; 2],
    /// Bumped on every upload or clear so late async decodes can be dropped
    generations: [u64; 2],
    parameters: PlaybackParameters,
    controller: PlaybackController,
    reporter: StatusReporter,
    listener: Box<dyn EngineListener>,
}

impl PhantomContext {
    pub fn new(output: Box<dyn AudioOutput>, config: &EngineConfig) -> Self {
        Self {
            tracks: [None, None],
            generations: [0, 0],
            parameters: config.defaults,
            controller: PlaybackController::new(output)
                .with_random_channels(config.randomize_channels),
            reporter: StatusReporter::new(),
            listener: Box::new(()),
        }
    }

    pub fn with_listener(mut self, listener: Box<dyn EngineListener>) -> Self {
        self.listener = listener;
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn track(&self, slot: TrackSlot) -> Option<&AudioClip> {
        self.tracks[slot.index()].as_ref()
    }

    pub fn parameters(&self) -> &PlaybackParameters {
        &self.parameters
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    /// Current status line, if anything has been reported yet
    pub fn status(&self) -> Option<&str> {
        self.reporter.current()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.controller.session()
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Validate and decode an upload into `slot`
    ///
    /// On success returns the clip's duration. Re-uploading the same bytes
    /// keeps the existing clip without decoding again. On failure the slot
    /// is left empty.
    pub fn upload_track(&mut self, slot: TrackSlot, filename: &str, raw_bytes: Vec<u8>) -> Result<f64> {
        self.generations[slot.index()] += 1;

        if let Err(e) = validate_upload(slot, filename, &raw_bytes) {
            return Err(self.upload_failed(slot, e.into()));
        }

        if let Some(duration) = self.same_clip(slot, &raw_bytes) {
            self.track_ready(slot, duration);
            return Ok(duration);
        }

        match AudioDecoder::for_slot(slot).decode(raw_bytes, filename) {
            Ok(clip) => Ok(self.install_clip(slot, clip)),
            Err(e) => Err(self.upload_failed(slot, e.into())),
        }
    }

    /// Validate now, decode on a worker thread
    ///
    /// The slot is emptied as soon as validation passes. The result is
    /// applied by a later [`process_events`](Self::process_events) unless
    /// another upload or clear for the same slot came in first.
    /// Returns the upload's generation number.
    pub fn upload_track_async(
        &mut self,
        slot: TrackSlot,
        filename: &str,
        raw_bytes: Vec<u8>,
    ) -> Result<u64> {
        self.generations[slot.index()] += 1;
        let generation = self.generations[slot.index()];

        if let Err(e) = validate_upload(slot, filename, &raw_bytes) {
            return Err(self.upload_failed(slot, e.into()));
        }

        if let Some(duration) = self.same_clip(slot, &raw_bytes) {
            self.track_ready(slot, duration);
            return Ok(generation);
        }

        // The previous clip is replaced even before the decode lands
        self.tracks[slot.index()] = None;

        let events = self.controller.event_sender();
        let name = filename.to_string();
        let spawned = AudioDecoder::for_slot(slot).decode_async(
            raw_bytes,
            filename.to_string(),
            move |result| {
                // Receiver gone means the context was dropped
                let _ = events.send(EngineEvent::TrackDecoded {
                    slot,
                    generation,
                    filename: name,
                    result,
                });
            },
        );

        match spawned {
            Ok(_) => {
                debug!("[CONTEXT] Decoding '{}' for track {} (gen {})", filename, slot, generation);
                Ok(generation)
            }
            Err(e) => Err(self.upload_failed(slot, e.into())),
        }
    }

    /// Empty a slot
    pub fn clear_track(&mut self, slot: TrackSlot) {
        self.generations[slot.index()] += 1;
        if self.tracks[slot.index()].take().is_some() {
            debug!("[CONTEXT] Cleared track {}", slot);
        }
    }

    fn same_clip(&self, slot: TrackSlot, raw_bytes: &[u8]) -> Option<f64> {
        let existing = self.track(slot)?;
        if existing.raw_bytes().len() == raw_bytes.len() && existing.checksum() == checksum(raw_bytes)
        {
            debug!("[CONTEXT] Track {} unchanged, keeping decoded clip", slot);
            Some(existing.duration_seconds())
        } else {
            None
        }
    }

    fn install_clip(&mut self, slot: TrackSlot, clip: AudioClip) -> f64 {
        let duration = clip.duration_seconds();
        info!(
            "[CONTEXT] Track {} ready: '{}' ({:.2}s)",
            slot,
            clip.filename(),
            duration
        );
        self.tracks[slot.index()] = Some(clip);
        self.track_ready(slot, duration);
        duration
    }

    fn track_ready(&mut self, slot: TrackSlot, duration: f64) {
        self.listener.on_track_ready(slot, duration);
        if let Some(message) = self.reporter.report(&StatusEvent::TrackReady) {
            self.listener.on_status_changed(&message);
        }
    }

    fn upload_failed(&mut self, slot: TrackSlot, err: PhantomError) -> PhantomError {
        self.tracks[slot.index()] = None;
        self.report_error(&err);
        err
    }

    // ========================================================================
    // Parameters and Playback
    // ========================================================================

    /// Replace the parameters used by the next `play()`
    ///
    /// A running session keeps the snapshot it started with.
    pub fn set_parameters(&mut self, params: PlaybackParameters) -> Result<()> {
        if let Err(e) = params.validate() {
            let err = PhantomError::from(e);
            self.report_error(&err);
            return Err(err);
        }
        self.parameters = params;
        Ok(())
    }

    pub fn set_track_mode(&mut self, mode: TrackMode) {
        self.parameters.track_mode = mode;
    }

    /// Start a session with the current tracks and parameters
    pub fn play(&mut self) -> Result<Uuid> {
        let result = self.controller.play(
            self.tracks[0].as_ref(),
            self.tracks[1].as_ref(),
            self.parameters,
        );
        if let Err(e) = &result {
            self.report_error(e);
        }
        self.publish_transitions();
        result
    }

    /// Hard stop, safe in every state
    pub fn stop(&mut self) {
        self.controller.stop();
        self.publish_transitions();
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Apply engine events and finished decodes without blocking
    pub fn process_events(&mut self) {
        let rest = self.controller.process_events();
        self.handle_events(rest);
    }

    /// Block up to `timeout` for the next engine event, then apply it
    pub fn wait_for_events(&mut self, timeout: Duration) {
        let rest = self.controller.wait_for_events(timeout);
        self.handle_events(rest);
    }

    fn handle_events(&mut self, events: Vec<EngineEvent>) {
        for event in events {
            if let EngineEvent::TrackDecoded {
                slot,
                generation,
                filename,
                result,
            } = event
            {
                if generation != self.generations[slot.index()] {
                    debug!(
                        "[CONTEXT] Dropping stale decode of '{}' for track {} (gen {})",
                        filename, slot, generation
                    );
                    continue;
                }
                match result {
                    Ok(clip) => {
                        self.install_clip(slot, clip);
                    }
                    Err(e) => {
                        self.upload_failed(slot, e.into());
                    }
                }
            }
        }
        self.publish_transitions();
    }

    fn publish_transitions(&mut self) {
        for transition in self.controller.drain_transitions() {
            if let Some(message) = self.reporter.report(&StatusEvent::Transition(&transition)) {
                self.listener.on_status_changed(&message);
            }
        }
    }

    fn report_error(&mut self, err: &PhantomError) {
        if err.is_recoverable() {
            debug!("[CONTEXT] {} ({})", err, err.error_code());
        } else {
            warn!("[CONTEXT] {} ({})", err, err.error_code());
        }

        let message = err.status_message();
        self.listener.on_error(err.kind(), &message);
        if let Some(status) = self.reporter.report(&StatusEvent::Error(err)) {
            self.listener.on_status_changed(&status);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
