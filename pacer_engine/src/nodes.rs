use pacer_shared::Waveform;

/// Oscillator voice. Silent before `start_time` and from `stop_time` on.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    pub start_time: Option<f64>,
    pub stop_time: Option<f64>,
    phase: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f64) -> Self {
        Self {
            waveform,
            frequency,
            start_time: None,
            stop_time: None,
            phase: 0.0,
        }
    }

    pub fn is_active_at(&self, time: f64) -> bool {
        match self.start_time {
            Some(start) if time >= start => self.stop_time.is_none_or(|stop| time < stop),
            _ => false,
        }
    }

    /// Finished voices can be dropped from the graph.
    pub fn is_finished_at(&self, time: f64) -> bool {
        self.stop_time.is_some_and(|stop| time >= stop)
    }

    /// Produce the sample at `time` and advance the phase by one frame.
    pub fn tick(&mut self, time: f64, sample_rate: f64) -> f64 {
        if !self.is_active_at(time) {
            return 0.0;
        }
        let s = self.waveform.sample(self.phase);
        self.phase = (self.phase + self.frequency / sample_rate) % 1.0;
        s
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationKind {
    SetValue,
    ExponentialRamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationEvent {
    pub kind: AutomationKind,
    pub value: f64,
    pub time: f64,
}

/// Gain stage driven by an automation timeline.
#[derive(Debug, Clone)]
pub struct GainEnvelope {
    pub default_value: f64,
    events: Vec<AutomationEvent>,
}

impl Default for GainEnvelope {
    fn default() -> Self {
        Self {
            default_value: 1.0,
            events: Vec::new(),
        }
    }
}

impl GainEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(AutomationEvent { kind: AutomationKind::SetValue, value, time });
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(AutomationEvent { kind: AutomationKind::ExponentialRamp, value, time });
    }

    // Keeps events ordered by time; equal times keep insertion order
    fn insert(&mut self, event: AutomationEvent) {
        let pos = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(pos, event);
    }

    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    /// Time of the last automation event, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }

    pub fn value_at(&self, time: f64) -> f64 {
        let mut prev_value = self.default_value;
        let mut prev_time = f64::NEG_INFINITY;

        for event in &self.events {
            if event.time > time {
                return match event.kind {
                    AutomationKind::SetValue => prev_value,
                    AutomationKind::ExponentialRamp => {
                        exponential_between(prev_time, prev_value, event.time, event.value, time)
                    }
                };
            }
            prev_value = event.value;
            prev_time = event.time;
        }

        prev_value
    }
}

fn exponential_between(t0: f64, v0: f64, t1: f64, v1: f64, t: f64) -> f64 {
    // Ramp without a starting point, or from zero / across a sign change: hold
    if !t0.is_finite() || v0 <= 0.0 || v1 <= 0.0 || t1 <= t0 {
        return v0;
    }
    let progress = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
    v0 * (v1 / v0).powf(progress)
}
