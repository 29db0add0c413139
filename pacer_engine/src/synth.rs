use crate::graph::{GraphError, ToneGraph, DESTINATION};
use pacer_shared::{TempoParams, Waveform, ENVELOPE_FLOOR};

/// One click, fully resolved at the moment it was scheduled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledClick {
    pub start_time: f64,
    pub stop_time: f64,
    pub frequency: f64,
    pub waveform: Waveform,
    pub volume: f64,
    pub decay_seconds: f64,
}

impl ScheduledClick {
    pub fn at(start_time: f64, params: &TempoParams) -> Self {
        Self {
            start_time,
            stop_time: start_time + params.decay_seconds,
            frequency: params.frequency_hz,
            waveform: params.waveform,
            volume: params.volume,
            decay_seconds: params.decay_seconds,
        }
    }
}

/// Render one click into the graph: an oscillator gated by an envelope that
/// holds `volume` at the start and decays exponentially to the floor by the
/// stop time, when the oscillator stops. Fire and forget.
pub fn schedule_click<G: ToneGraph + ?Sized>(graph: &mut G, click: &ScheduledClick) -> Result<(), GraphError> {
    let tone = graph.create_tone(click.waveform, click.frequency)?;
    let envelope = graph.create_envelope()?;

    graph.set_value_at_time(envelope, click.volume, click.start_time)?;
    graph.exponential_ramp_to_value_at_time(envelope, ENVELOPE_FLOOR, click.stop_time)?;

    graph.connect(tone, envelope)?;
    graph.connect(envelope, DESTINATION)?;

    graph.start(tone, click.start_time)?;
    graph.stop(tone, click.stop_time)?;
    Ok(())
}
