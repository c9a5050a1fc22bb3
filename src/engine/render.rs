//! Graph renderer
//!
//! Runs inside the output callback. Each source keeps a fractional read
//! position that advances by `rate * source_rate / output_rate` per output
//! frame, with linear interpolation between neighbouring samples. Start
//! offsets are counted in output frames, so they follow the host clock and
//! not either source's speed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use uuid::Uuid;

use crate::engine::graph::{GraphHandle, Routing, SourceNode};
use crate::engine::transport::EngineEvent;

/// Outcome of one render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// At least one source still has loops left
    Running,
    /// Every source has played its final loop
    Finished,
    /// The halt flag was raised; output is silence
    Halted,
}

// ============================================================================
// Source Cursor
// ============================================================================

/// Read state for one source node
#[derive(Debug)]
pub struct SourceCursor {
    node: SourceNode,
    /// Output frames of silence before the source begins
    delay_frames: u64,
    /// Source frames consumed per output frame
    step: f64,
    position: f64,
    loops_done: u32,
    finished: bool,
}

impl SourceCursor {
    pub fn new(node: SourceNode, output_rate: u32) -> Self {
        let delay_frames = (node.start_offset.as_secs_f64() * output_rate as f64).round() as u64;
        let step = node.rate as f64 * node.buffer.sample_rate as f64 / output_rate as f64;
        let finished = node.buffer.is_empty() || node.loop_count == 0;

        Self {
            node,
            delay_frames,
            step,
            position: 0.0,
            loops_done: 0,
            finished,
        }
    }

    pub fn routing(&self) -> Routing {
        self.node.routing
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Completed passes through the clip
    pub fn loops_done(&self) -> u32 {
        self.loops_done
    }

    /// Sample for absolute output frame `frame`, or `None` once finished
    pub fn next_sample(&mut self, frame: u64) -> Option<f32> {
        if self.finished {
            return None;
        }
        if frame < self.delay_frames {
            return Some(0.0);
        }

        let sample = self.interpolate();
        let len = self.node.buffer.len() as f64;

        self.position += self.step;
        while self.position >= len {
            self.position -= len;
            self.loops_done += 1;
            if self.loops_done >= self.node.loop_count {
                self.finished = true;
                break;
            }
        }

        Some(sample)
    }

    fn interpolate(&self) -> f32 {
        let buffer = &self.node.buffer;
        let index = self.position.floor() as usize;
        let fraction = (self.position - self.position.floor()) as f32;

        let current = buffer.mono_sample(index);
        let next = if index + 1 < buffer.len() {
            buffer.mono_sample(index + 1)
        } else if self.loops_done + 1 < self.node.loop_count {
            // Seam: the next pass starts straight away
            buffer.mono_sample(0)
        } else {
            0.0
        };

        current + (next - current) * fraction
    }
}

// ============================================================================
// Graph Renderer
// ============================================================================

/// Mixes a session's sources into interleaved output
///
/// Owned by the output callback. Shares only the halt flag and the event
/// sender with the controller.
pub struct GraphRenderer {
    session: Uuid,
    cursors: Vec<SourceCursor>,
    channels: usize,
    frame: u64,
    halt: Arc<AtomicBool>,
    events: Sender<EngineEvent>,
    started: bool,
    completed: bool,
}

impl GraphRenderer {
    pub fn new(
        session: Uuid,
        graph: GraphHandle,
        output_rate: u32,
        channels: u16,
        halt: Arc<AtomicBool>,
        events: Sender<EngineEvent>,
    ) -> Self {
        let cursors = graph
            .into_sources()
            .into_iter()
            .map(|node| SourceCursor::new(node, output_rate))
            .collect();

        Self {
            session,
            cursors,
            channels: channels.max(1) as usize,
            frame: 0,
            halt,
            events,
            started: false,
            completed: false,
        }
    }

    /// Output frames rendered so far
    pub fn frames_rendered(&self) -> u64 {
        self.frame
    }

    /// Fill one interleaved output buffer
    pub fn fill(&mut self, out: &mut [f32]) -> RenderStatus {
        out.fill(0.0);

        if self.halt.load(Ordering::Acquire) {
            return RenderStatus::Halted;
        }

        if !self.started {
            self.started = true;
            // The controller may already be gone; nothing to report to then
            let _ = self.events.send(EngineEvent::Started {
                session: self.session,
            });
        }

        if self.completed {
            return RenderStatus::Finished;
        }

        let channels = self.channels;
        for frame in out.chunks_exact_mut(channels) {
            for cursor in self.cursors.iter_mut() {
                let routing = cursor.routing();
                if let Some(sample) = cursor.next_sample(self.frame) {
                    for (ch, out_sample) in frame.iter_mut().enumerate() {
                        if channels == 1 || routing.feeds(ch) {
                            *out_sample += sample;
                        }
                    }
                }
            }
            self.frame += 1;
        }

        if self.cursors.iter().all(SourceCursor::is_finished) {
            self.completed = true;
            let _ = self.events.send(EngineEvent::Completed {
                session: self.session,
            });
            RenderStatus::Finished
        } else {
            RenderStatus::Running
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
