use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken(pub u64);

/// Periodic tick driving the scheduler. At most one tick is pending at a time;
/// requesting a new one replaces the old.
pub trait TickSource {
    fn request_tick(&mut self) -> TickToken;
    fn cancel_tick(&mut self, token: TickToken);
    /// Wait until the pending tick is due and hand out its token. `None` when
    /// nothing is pending.
    fn wait_for_tick(&mut self) -> Option<TickToken>;
}

/// Frame-aligned ticker: one tick per `interval`, by sleeping on the calling
/// thread until the deadline.
pub struct FrameTicker {
    interval: Duration,
    next_id: u64,
    pending: Option<(TickToken, Instant)>,
    last_fired: Option<Instant>,
}

impl FrameTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_id: 0,
            pending: None,
            last_fired: None,
        }
    }

    /// ~60 Hz
    pub fn sixty_hz() -> Self {
        Self::new(Duration::from_micros(16_667))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl TickSource for FrameTicker {
    fn request_tick(&mut self) -> TickToken {
        self.next_id += 1;
        let token = TickToken(self.next_id);
        let now = Instant::now();
        // Stay on the frame grid while ticking continuously; late frames fire asap
        let deadline = match self.last_fired {
            Some(last) => (last + self.interval).max(now),
            None => now + self.interval,
        };
        self.pending = Some((token, deadline));
        token
    }

    fn cancel_tick(&mut self, token: TickToken) {
        if matches!(self.pending, Some((pending, _)) if pending == token) {
            self.pending = None;
            self.last_fired = None;
        }
    }

    fn wait_for_tick(&mut self) -> Option<TickToken> {
        let (token, deadline) = self.pending.take()?;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
        self.last_fired = Some(Instant::now());
        Some(token)
    }
}
