/// Format a duration as `MM:SS`, or `HH:MM:SS` once it reaches an hour.
/// Fractional seconds are floored. Negative or non-finite input reads as zero.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let sec = total % 60;
    let min = (total / 60) % 60;
    let hr = total / 3600;

    if hr > 0 {
        format!("{:02}:{:02}:{:02}", hr, min, sec)
    } else {
        format!("{:02}:{:02}", min, sec)
    }
}

/// Format a pace given in seconds per kilometer, e.g. `5:07 /km`.
pub fn format_pace(seconds_per_km: f64) -> String {
    if !seconds_per_km.is_finite() || seconds_per_km <= 0.0 {
        return "--:-- /km".to_string();
    }
    let total = seconds_per_km.round() as u64;
    format!("{}:{:02} /km", total / 60, total % 60)
}

/// Whole-second counter driven by a coarse (~1 Hz) periodic tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElapsedTimer {
    seconds: u64,
    running: bool,
}

impl ElapsedTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        self.seconds = 0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Called once per second by the display tick. Ignored while stopped.
    pub fn on_second_tick(&mut self) {
        if self.running {
            self.seconds += 1;
        }
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn display(&self) -> String {
        format_time(self.seconds as f64)
    }
}
