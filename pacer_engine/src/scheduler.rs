use crate::graph::GraphError;
use crate::params::LiveParams;
use crate::synth::ScheduledClick;
use pacer_shared::LOOKAHEAD_SECONDS;

/// Lookahead click scheduler.
///
/// Owns the timestamp of the next click that has not been handed to the
/// output yet. Each pass commits every click due before `now + lookahead`,
/// advancing by the beat interval of the BPM current at that moment. Audible
/// timing then depends on the clock, not on how regularly passes arrive, as
/// long as they arrive more often than once per lookahead window.
#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    lookahead: f64,
    next_click_time: f64,
    scheduled: u64,
    skipped: u64,
}

impl Default for LookaheadScheduler {
    fn default() -> Self {
        Self::new(LOOKAHEAD_SECONDS)
    }
}

impl LookaheadScheduler {
    pub fn new(lookahead: f64) -> Self {
        Self {
            lookahead,
            next_click_time: 0.0,
            scheduled: 0,
            skipped: 0,
        }
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    /// Align the next click with `now`. Called once when playback starts.
    pub fn reset(&mut self, now: f64) {
        self.next_click_time = now;
    }

    pub fn next_click_time(&self) -> f64 {
        self.next_click_time
    }

    /// Clicks successfully handed to the output.
    pub fn scheduled(&self) -> u64 {
        self.scheduled
    }

    /// Clicks the output refused. Their beat slot is still consumed.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Run one pass at clock time `now`. Returns the number of clicks emitted,
    /// skipped ones included.
    pub fn run<F>(&mut self, now: f64, params: &LiveParams, mut emit: F) -> usize
    where
        F: FnMut(&ScheduledClick) -> Result<(), GraphError>,
    {
        let horizon = now + self.lookahead;
        let mut emitted = 0;

        while self.next_click_time < horizon {
            let click = ScheduledClick::at(self.next_click_time, &params.observe());
            match emit(&click) {
                Ok(()) => self.scheduled += 1,
                Err(e) => {
                    self.skipped += 1;
                    log::warn!("[Scheduler] Skipped click at {:.3}s: {}", click.start_time, e);
                }
            }
            emitted += 1;

            let interval = 60.0 / params.observe_bpm();
            if !(interval.is_finite() && interval > 0.0) {
                // The bridge never lets this through; refuse to spin if it does
                log::error!("[Scheduler] Invalid beat interval {}, pass aborted", interval);
                break;
            }
            self.next_click_time += interval;
        }

        if emitted > 0 {
            log::trace!(
                "[Scheduler] {} click(s) at t={:.3}s, next at {:.3}s",
                emitted,
                now,
                self.next_click_time
            );
        }
        emitted
    }
}
