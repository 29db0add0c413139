//! In-memory backend. Time only moves when the caller renders, which makes
//! every scheduling decision reproducible.

use crate::clock::{AudioBackend, ClockSource, ClockState, ResumeHandle};
use crate::error::EngineError;
use crate::graph::{GraphError, GraphOp, NodeId, ToneGraph, VoiceRenderer};
use crate::tick::{TickSource, TickToken};
use crossbeam_channel::{bounded, Sender};
use pacer_shared::Waveform;
use std::cell::RefCell;
use std::rc::Rc;

/// How the offline clock answers a resume request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeBehavior {
    Complete,
    Fail(String),
    /// Keep the request open forever.
    Never,
}

struct OfflineState {
    renderer: VoiceRenderer,
    clock_state: ClockState,
    resume: ResumeBehavior,
    // Held so a `Never` resume stays unresolved instead of disconnecting
    parked_resumes: Vec<Sender<Result<(), EngineError>>>,
    journal: Vec<GraphOp>,
    graph_fails: bool,
    opens: usize,
}

/// Shared view of an offline session, for driving time and inspecting output.
#[derive(Clone)]
pub struct OfflineHandle {
    inner: Rc<RefCell<OfflineState>>,
}

impl OfflineHandle {
    pub fn now(&self) -> f64 {
        self.inner.borrow().renderer.current_time()
    }

    pub fn sample_rate(&self) -> f64 {
        self.inner.borrow().renderer.sample_rate()
    }

    /// Render `frames` mono frames, moving the clock forward by as much.
    pub fn advance_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        self.inner.borrow_mut().renderer.render(&mut out, 1);
        out
    }

    /// Render the next `seconds` (rounded to whole frames).
    pub fn advance(&self, seconds: f64) -> Vec<f32> {
        let frames = (seconds * self.sample_rate()).round().max(0.0) as usize;
        self.advance_frames(frames)
    }

    pub fn clock_state(&self) -> ClockState {
        self.inner.borrow().clock_state
    }

    pub fn set_resume_behavior(&self, behavior: ResumeBehavior) {
        self.inner.borrow_mut().resume = behavior;
    }

    /// Make every graph call fail with `GraphError::Unavailable`.
    pub fn set_graph_failure(&self, fails: bool) {
        self.inner.borrow_mut().graph_fails = fails;
    }

    /// How many times the backend handed out a clock.
    pub fn opens(&self) -> usize {
        self.inner.borrow().opens
    }

    pub fn journal(&self) -> Vec<GraphOp> {
        self.inner.borrow().journal.clone()
    }

    /// Start times of every tone started so far, in scheduling order.
    pub fn click_times(&self) -> Vec<f64> {
        self.inner
            .borrow()
            .journal
            .iter()
            .filter_map(|op| match op {
                GraphOp::Start { time, .. } => Some(*time),
                _ => None,
            })
            .collect()
    }

    /// Stop times of every tone, in scheduling order.
    pub fn stop_times(&self) -> Vec<f64> {
        self.inner
            .borrow()
            .journal
            .iter()
            .filter_map(|op| match op {
                GraphOp::Stop { time, .. } => Some(*time),
                _ => None,
            })
            .collect()
    }

    /// Tones still held by the renderer.
    pub fn live_tones(&self) -> usize {
        self.inner.borrow().renderer.tone_count()
    }
}

pub struct OfflineBackend {
    handle: OfflineHandle,
    available: bool,
}

impl OfflineBackend {
    /// A backend whose clock starts suspended, like an output that has not
    /// been allowed to play yet.
    pub fn new(sample_rate: u32) -> Self {
        let state = OfflineState {
            renderer: VoiceRenderer::new(sample_rate),
            clock_state: ClockState::Suspended,
            resume: ResumeBehavior::Complete,
            parked_resumes: Vec::new(),
            journal: Vec::new(),
            graph_fails: false,
            opens: 0,
        };
        Self {
            handle: OfflineHandle { inner: Rc::new(RefCell::new(state)) },
            available: true,
        }
    }

    /// A backend that cannot provide a clock at all.
    pub fn unavailable(sample_rate: u32) -> Self {
        let mut backend = Self::new(sample_rate);
        backend.available = false;
        backend
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn handle(&self) -> OfflineHandle {
        self.handle.clone()
    }
}

impl AudioBackend for OfflineBackend {
    type Clock = OfflineClock;
    type Graph = OfflineGraph;

    fn open(&mut self) -> Result<(OfflineClock, OfflineGraph), EngineError> {
        if !self.available {
            return Err(EngineError::ClockUnavailable("offline backend disabled".to_string()));
        }
        self.handle.inner.borrow_mut().opens += 1;
        Ok((
            OfflineClock { handle: self.handle.clone() },
            OfflineGraph { handle: self.handle.clone() },
        ))
    }
}

pub struct OfflineClock {
    handle: OfflineHandle,
}

impl ClockSource for OfflineClock {
    fn now(&self) -> f64 {
        self.handle.now()
    }

    fn state(&self) -> ClockState {
        self.handle.clock_state()
    }

    fn resume(&mut self) -> ResumeHandle {
        let (tx, rx) = bounded(1);
        let mut state = self.handle.inner.borrow_mut();
        match state.resume.clone() {
            ResumeBehavior::Complete => {
                state.clock_state = ClockState::Active;
                let _ = tx.send(Ok(()));
            }
            ResumeBehavior::Fail(msg) => {
                let _ = tx.send(Err(EngineError::ResumeFailure(msg)));
            }
            ResumeBehavior::Never => state.parked_resumes.push(tx),
        }
        rx
    }
}

/// Renders straight into the shared renderer and journals every op.
pub struct OfflineGraph {
    handle: OfflineHandle,
}

impl OfflineGraph {
    fn with_renderer<R>(
        &mut self,
        f: impl FnOnce(&mut VoiceRenderer) -> Result<R, GraphError>,
    ) -> Result<R, GraphError> {
        let mut state = self.handle.inner.borrow_mut();
        if state.graph_fails {
            return Err(GraphError::Unavailable);
        }
        f(&mut state.renderer)
    }

    fn apply(&mut self, op: GraphOp) -> Result<(), GraphError> {
        let mut state = self.handle.inner.borrow_mut();
        if state.graph_fails {
            return Err(GraphError::Unavailable);
        }
        state.renderer.apply(op.clone())?;
        state.journal.push(op);
        Ok(())
    }
}

impl ToneGraph for OfflineGraph {
    fn create_tone(&mut self, waveform: Waveform, frequency: f64) -> Result<NodeId, GraphError> {
        let id = self.with_renderer(|r| r.create_tone(waveform, frequency))?;
        self.handle
            .inner
            .borrow_mut()
            .journal
            .push(GraphOp::CreateTone { id, waveform, frequency });
        Ok(id)
    }

    fn create_envelope(&mut self) -> Result<NodeId, GraphError> {
        let id = self.with_renderer(|r| r.create_envelope())?;
        self.handle.inner.borrow_mut().journal.push(GraphOp::CreateEnvelope { id });
        Ok(id)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.apply(GraphOp::Connect { from, to })
    }

    fn start(&mut self, tone: NodeId, time: f64) -> Result<(), GraphError> {
        self.apply(GraphOp::Start { tone, time })
    }

    fn stop(&mut self, tone: NodeId, time: f64) -> Result<(), GraphError> {
        self.apply(GraphOp::Stop { tone, time })
    }

    fn set_value_at_time(&mut self, envelope: NodeId, value: f64, time: f64) -> Result<(), GraphError> {
        self.apply(GraphOp::SetValueAtTime { envelope, value, time })
    }

    fn exponential_ramp_to_value_at_time(&mut self, envelope: NodeId, value: f64, time: f64) -> Result<(), GraphError> {
        self.apply(GraphOp::ExponentialRampToValueAtTime { envelope, value, time })
    }
}

#[derive(Debug, Default)]
struct TickLog {
    next_id: u64,
    pending: Option<TickToken>,
    requested: usize,
    cancelled: usize,
}

/// Tick source for offline runs: a pending tick is due immediately.
#[derive(Default)]
pub struct ManualTicks {
    log: Rc<RefCell<TickLog>>,
}

/// Read-only view of a [`ManualTicks`] that outlives it.
#[derive(Clone)]
pub struct TickProbe {
    log: Rc<RefCell<TickLog>>,
}

impl ManualTicks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> TickProbe {
        TickProbe { log: self.log.clone() }
    }
}

impl TickProbe {
    pub fn pending(&self) -> Option<TickToken> {
        self.log.borrow().pending
    }

    pub fn requested(&self) -> usize {
        self.log.borrow().requested
    }

    pub fn cancelled(&self) -> usize {
        self.log.borrow().cancelled
    }
}

impl TickSource for ManualTicks {
    fn request_tick(&mut self) -> TickToken {
        let mut log = self.log.borrow_mut();
        log.next_id += 1;
        let token = TickToken(log.next_id);
        log.pending = Some(token);
        log.requested += 1;
        token
    }

    fn cancel_tick(&mut self, token: TickToken) {
        let mut log = self.log.borrow_mut();
        if log.pending == Some(token) {
            log.pending = None;
            log.cancelled += 1;
        }
    }

    fn wait_for_tick(&mut self) -> Option<TickToken> {
        self.log.borrow_mut().pending.take()
    }
}
