//! Playback Controller for Phantom Words
//!
//! Owns the lifecycle of the current playback session:
//! Idle -> Scheduled -> Playing -> Stopped.
//!
//! The controller is the only code that starts or stops the output. It
//! never waits on the audio thread; the renderer reports start and
//! completion as [`EngineEvent`]s which are applied in
//! [`PlaybackController::process_events`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::clip::{AudioClip, TrackSlot};
use crate::engine::graph::{ChannelAssignment, GraphBuilder, GraphHandle};
use crate::engine::output::AudioOutput;
use crate::engine::params::PlaybackParameters;
use crate::engine::render::{GraphRenderer, RenderStatus};
use crate::error::{DecodeError, PhantomError, Result};

// ============================================================================
// States and Events
// ============================================================================

/// Playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    /// Nothing has been played yet
    #[default]
    Idle,
    /// Graph built and handed to the output, first buffer not yet rendered
    Scheduled,
    /// Output confirmed audible
    Playing,
    /// Session over, graph released
    Stopped,
}

impl PlaybackState {
    /// Scheduled or Playing
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Scheduled | PlaybackState::Playing)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Scheduled => write!(f, "Scheduled"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Why a transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    PlayRequested,
    EngineStarted,
    /// Every source ran out of loops
    Completed,
    StopRequested,
    /// Force-stopped to make room for a new session
    Superseded,
    /// The output refused to start
    OutputFailed,
}

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    /// Session the change applies to, `None` for a stop with no session
    pub session: Option<Uuid>,
    pub from: PlaybackState,
    pub to: PlaybackState,
    pub cause: TransitionCause,
}

/// Messages posted to the controller from other threads
#[derive(Debug)]
pub enum EngineEvent {
    /// First buffer of a session was rendered
    Started { session: Uuid },
    /// All sources of a session finished their last loop
    Completed { session: Uuid },
    /// A background decode finished
    TrackDecoded {
        slot: TrackSlot,
        generation: u64,
        filename: String,
        result: std::result::Result<AudioClip, DecodeError>,
    },
}

// ============================================================================
// Playback Session
// ============================================================================

/// The live object for one play request
#[derive(Debug)]
pub struct PlaybackSession {
    id: Uuid,
    state: PlaybackState,
    params: PlaybackParameters,
    graph_handle: Option<GraphHandle>,
    scheduled_at: Instant,
    started_at: Option<DateTime<Utc>>,
    halt: Arc<AtomicBool>,
}

impl PlaybackSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Parameters snapshotted when the session was created
    pub fn params(&self) -> &PlaybackParameters {
        &self.params
    }

    /// The session's graph, `None` once released
    pub fn graph(&self) -> Option<&GraphHandle> {
        self.graph_handle.as_ref()
    }

    /// When the engine confirmed the start
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Time since the session was scheduled
    pub fn elapsed(&self) -> Duration {
        self.scheduled_at.elapsed()
    }
}

// ============================================================================
// Playback Controller
// ============================================================================

/// Single-session playback state machine
///
/// # Example
/// ```
/// use phantom_words::engine::output::OfflineOutput;
/// use phantom_words::engine::{PlaybackController, PlaybackState};
///
/// let mut controller = PlaybackController::new(Box::new(OfflineOutput::default()));
/// assert_eq!(controller.state(), PlaybackState::Idle);
///
/// // Stop is always safe
/// controller.stop();
/// controller.stop();
/// assert_eq!(controller.state(), PlaybackState::Stopped);
/// ```
pub struct PlaybackController {
    output: Box<dyn AudioOutput>,
    state: PlaybackState,
    session: Option<PlaybackSession>,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
    transitions: VecDeque<StateTransition>,
    randomize_channels: bool,
}

impl PlaybackController {
    /// Create a controller driving `output`
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            output,
            state: PlaybackState::Idle,
            session: None,
            events_tx,
            events_rx,
            transitions: VecDeque::new(),
            randomize_channels: true,
        }
    }

    /// Pick the dual-mode channel assignment at random per session
    /// (`true`, the default) or always put track 1 on the left
    pub fn with_random_channels(mut self, randomize: bool) -> Self {
        self.randomize_channels = randomize;
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// The current or most recent session
    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn output_sample_rate(&self) -> u32 {
        self.output.sample_rate()
    }

    /// Sender for posting events from worker threads
    pub fn event_sender(&self) -> Sender<EngineEvent> {
        self.events_tx.clone()
    }

    /// Queued transitions since the last drain, oldest first
    pub fn drain_transitions(&mut self) -> Vec<StateTransition> {
        self.transitions.drain(..).collect()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start a new session
    ///
    /// Validation and track checks run first; if either fails nothing
    /// changes, including any running session. Otherwise the active session
    /// is force-stopped and released before the new graph is built.
    ///
    /// # Arguments
    /// * `clip1` - Track 1, always required
    /// * `clip2` - Track 2, required in dual mode
    /// * `params` - Settings snapshot for the new session
    ///
    /// # Returns
    /// The new session's id
    pub fn play(
        &mut self,
        clip1: Option<&AudioClip>,
        clip2: Option<&AudioClip>,
        params: PlaybackParameters,
    ) -> Result<Uuid> {
        params.validate()?;

        if let Err(e) = GraphBuilder::check_tracks(clip1, clip2, params.track_mode) {
            debug!("[CONTROLLER] Play rejected in {}: {}", self.state, e);
            return Err(e.into());
        }

        if self.state.is_active() {
            self.halt_session(TransitionCause::Superseded);
        }

        let assignment = if self.randomize_channels {
            ChannelAssignment::random(&mut rand::thread_rng())
        } else {
            ChannelAssignment::Track1Left
        };

        let graph = GraphBuilder::build(clip1, clip2, &params, assignment)?;

        let id = Uuid::new_v4();
        let halt = Arc::new(AtomicBool::new(false));
        let renderer = GraphRenderer::new(
            id,
            graph.clone(),
            self.output.sample_rate(),
            self.output.channels(),
            Arc::clone(&halt),
            self.events_tx.clone(),
        );

        debug!(
            "[CONTROLLER] Session {} scheduled: {} mode, {} loops, delay {}ms, finishes at {:.3}s ({})",
            id,
            params.track_mode,
            params.loop_count,
            params.delay_ms,
            graph.finish_time().as_secs_f64(),
            assignment
        );

        self.session = Some(PlaybackSession {
            id,
            state: self.state,
            params,
            graph_handle: Some(graph),
            scheduled_at: Instant::now(),
            started_at: None,
            halt,
        });
        self.transition(PlaybackState::Scheduled, TransitionCause::PlayRequested);

        // Dropped once halted; later pulls are silence
        let mut renderer = Some(renderer);
        let callback = move |buf: &mut [f32]| {
            let halted = match renderer.as_mut() {
                Some(r) => r.fill(buf) == RenderStatus::Halted,
                None => {
                    buf.fill(0.0);
                    false
                }
            };
            if halted {
                renderer = None;
            }
        };

        if let Err(e) = self.output.start(Box::new(callback)) {
            warn!("[CONTROLLER] Output failed to start session {}: {}", id, e);
            self.halt_session(TransitionCause::OutputFailed);
            return Err(PhantomError::Output(e));
        }

        Ok(id)
    }

    /// Hard stop
    ///
    /// Always ends in `Stopped`. A second call is a no-op.
    pub fn stop(&mut self) {
        match self.state {
            PlaybackState::Scheduled | PlaybackState::Playing => {
                self.halt_session(TransitionCause::StopRequested);
            }
            PlaybackState::Idle => {
                self.transition(PlaybackState::Stopped, TransitionCause::StopRequested);
            }
            PlaybackState::Stopped => {
                debug!("[CONTROLLER] Stop ignored, already stopped");
            }
        }
    }

    // ========================================================================
    // Event Handling
    // ========================================================================

    /// Apply every pending engine event without blocking
    ///
    /// Start and completion events are consumed here. Anything else is
    /// returned for the caller to handle.
    pub fn process_events(&mut self) -> Vec<EngineEvent> {
        let pending: Vec<EngineEvent> = self.events_rx.try_iter().collect();
        self.apply_events(pending)
    }

    /// Block for up to `timeout` until an event arrives, then apply it and
    /// everything queued behind it
    pub fn wait_for_events(&mut self, timeout: Duration) -> Vec<EngineEvent> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(first) => {
                let mut pending = vec![first];
                pending.extend(self.events_rx.try_iter());
                self.apply_events(pending)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Vec::new(),
        }
    }

    fn apply_events(&mut self, events: Vec<EngineEvent>) -> Vec<EngineEvent> {
        let mut passthrough = Vec::new();
        for event in events {
            match event {
                EngineEvent::Started { session } => self.on_started(session),
                EngineEvent::Completed { session } => self.on_completed(session),
                other => passthrough.push(other),
            }
        }
        passthrough
    }

    fn is_current(&self, session: Uuid) -> bool {
        self.session.as_ref().map(|s| s.id) == Some(session)
    }

    fn on_started(&mut self, session: Uuid) {
        if !self.is_current(session) || self.state != PlaybackState::Scheduled {
            debug!(
                "[CONTROLLER] Ignoring stale start for {} in {}",
                session, self.state
            );
            return;
        }

        if let Some(s) = self.session.as_mut() {
            s.started_at = Some(Utc::now());
        }
        self.transition(PlaybackState::Playing, TransitionCause::EngineStarted);
    }

    fn on_completed(&mut self, session: Uuid) {
        if !self.is_current(session) || !self.state.is_active() {
            debug!(
                "[CONTROLLER] Ignoring stale completion for {} in {}",
                session, self.state
            );
            return;
        }

        self.halt_session(TransitionCause::Completed);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Silence, stop the output, release the graph, move to Stopped
    ///
    /// A failing output is logged and the session is stopped regardless.
    fn halt_session(&mut self, cause: TransitionCause) {
        if let Some(session) = self.session.as_ref() {
            session.halt.store(true, Ordering::Release);
        }

        if let Err(e) = self.output.stop() {
            warn!(
                "[CONTROLLER] Output failed to release ({:?}): {}; forcing Stopped",
                cause, e
            );
        }

        if let Some(session) = self.session.as_mut() {
            session.graph_handle = None;
        }

        self.transition(PlaybackState::Stopped, cause);
    }

    fn transition(&mut self, to: PlaybackState, cause: TransitionCause) {
        let from = self.state;
        self.state = to;

        // Sessions only exist from Scheduled onwards
        let session = match self.session.as_mut() {
            Some(s) if to != PlaybackState::Stopped || from.is_active() => {
                s.state = to;
                Some(s.id)
            }
            _ => None,
        };

        debug!(
            "[CONTROLLER] {} -> {} ({:?}){}",
            from,
            to,
            cause,
            session.map(|id| format!(" session {}", id)).unwrap_or_default()
        );

        self.transitions.push_back(StateTransition {
            session,
            from,
            to,
            cause,
        });
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state)
            .field("session", &self.session.as_ref().map(|s| s.id))
            .field("output_running", &self.output.is_running())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
