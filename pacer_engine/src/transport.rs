use crate::clock::{wait_for_resume, AudioBackend, ClockSource, ClockState};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::params::LiveParams;
use crate::scheduler::LookaheadScheduler;
use crate::synth::schedule_click;
use crate::tick::{TickSource, TickToken};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
}

/// Snapshot of the transport for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportStatus {
    pub state: PlaybackState,
    /// `None` until the clock has been created.
    pub clock_time: Option<f64>,
    /// Only meaningful while running.
    pub next_click_time: Option<f64>,
    pub clicks_scheduled: u64,
    pub clicks_skipped: u64,
}

// Clock and graph live together for the whole session once created
struct AudioSession<C, G> {
    clock: C,
    graph: G,
}

/// Play/stop state machine. Owns the clock session, the scheduler, and the
/// pending tick.
pub struct Transport<B: AudioBackend, T: TickSource> {
    backend: B,
    ticks: T,
    params: Arc<LiveParams>,
    session: Option<AudioSession<B::Clock, B::Graph>>,
    scheduler: LookaheadScheduler,
    state: PlaybackState,
    pending_tick: Option<TickToken>,
    resume_timeout: Duration,
    is_playing: Arc<AtomicBool>,
}

impl<B: AudioBackend, T: TickSource> Transport<B, T> {
    pub fn new(backend: B, ticks: T, params: Arc<LiveParams>, config: &EngineConfig) -> Self {
        Self::with_playing_flag(backend, ticks, params, config, Arc::new(AtomicBool::new(false)))
    }

    /// Like [`Transport::new`], mirroring the playback state into a flag the
    /// caller already shares with other threads.
    pub fn with_playing_flag(
        backend: B,
        ticks: T,
        params: Arc<LiveParams>,
        config: &EngineConfig,
        is_playing: Arc<AtomicBool>,
    ) -> Self {
        is_playing.store(false, Ordering::Relaxed);
        Self {
            backend,
            ticks,
            params,
            session: None,
            scheduler: LookaheadScheduler::new(config.lookahead_seconds),
            state: PlaybackState::Idle,
            pending_tick: None,
            resume_timeout: Duration::from_millis(config.resume_timeout_ms),
            is_playing,
        }
    }

    pub fn params(&self) -> &Arc<LiveParams> {
        &self.params
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Running
    }

    /// Mirror of the playback state readable from other threads.
    pub fn playing_flag(&self) -> Arc<AtomicBool> {
        self.is_playing.clone()
    }

    pub fn status(&self) -> TransportStatus {
        let running = self.is_playing();
        TransportStatus {
            state: self.state,
            clock_time: self.session.as_ref().map(|s| s.clock.now()),
            next_click_time: running.then(|| self.scheduler.next_click_time()),
            clicks_scheduled: self.scheduler.scheduled(),
            clicks_skipped: self.scheduler.skipped(),
        }
    }

    /// Idle -> Running. Creates the clock on first use and resumes it when
    /// suspended; on any failure the transport stays Idle with no tick pending.
    pub fn play(&mut self) -> Result<(), EngineError> {
        if self.state == PlaybackState::Running {
            return Ok(());
        }

        if self.session.is_none() {
            let (clock, graph) = self.backend.open().map_err(|e| match e {
                EngineError::ClockUnavailable(msg) => EngineError::ClockUnavailable(msg),
                other => EngineError::ClockUnavailable(other.to_string()),
            })?;
            log::info!("[Transport] Clock created at t={:.3}s", clock.now());
            self.session = Some(AudioSession { clock, graph });
        }

        let Some(session) = self.session.as_mut() else {
            return Err(EngineError::ClockUnavailable("no session".to_string()));
        };

        if session.clock.state() == ClockState::Suspended {
            let handle = session.clock.resume();
            if let Err(e) = wait_for_resume(&handle, self.resume_timeout) {
                log::warn!("[Transport] {}", e);
                return Err(e);
            }
        }

        let now = session.clock.now();
        self.scheduler.reset(now);
        self.state = PlaybackState::Running;
        self.is_playing.store(true, Ordering::Relaxed);
        log::info!(
            "[Transport] Playing from t={:.3}s at {} BPM",
            now,
            self.params.requested().bpm
        );

        self.run_pass();
        Ok(())
    }

    /// Running -> Idle. Clicks already handed to the output play out.
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Idle {
            return;
        }
        self.cancel_pending_tick();
        self.state = PlaybackState::Idle;
        self.is_playing.store(false, Ordering::Relaxed);
        log::info!("[Transport] Stopped");
    }

    /// Deliver a tick. Tokens other than the pending one are stale and ignored.
    pub fn on_tick(&mut self, token: TickToken) {
        if self.pending_tick != Some(token) {
            log::debug!("[Transport] Ignoring stale tick {:?}", token);
            return;
        }
        self.pending_tick = None;
        if self.state == PlaybackState::Running {
            self.run_pass();
        }
    }

    /// Wait for the next tick and run it. Returns false when no tick is pending.
    pub fn pump(&mut self) -> bool {
        match self.ticks.wait_for_tick() {
            Some(token) => {
                self.on_tick(token);
                true
            }
            None => false,
        }
    }

    fn run_pass(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let now = session.clock.now();
        let graph = &mut session.graph;
        self.scheduler
            .run(now, &self.params, |click| schedule_click(&mut *graph, click));
        self.pending_tick = Some(self.ticks.request_tick());
    }

    fn cancel_pending_tick(&mut self) {
        if let Some(token) = self.pending_tick.take() {
            self.ticks.cancel_tick(token);
        }
    }
}

impl<B: AudioBackend, T: TickSource> Drop for Transport<B, T> {
    fn drop(&mut self) {
        self.cancel_pending_tick();
        self.is_playing.store(false, Ordering::Relaxed);
    }
}
