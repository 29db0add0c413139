use crate::error::EngineError;
use crate::graph::ToneGraph;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Active,
    Suspended,
}

/// Completion of an asynchronous resume.
pub type ResumeHandle = Receiver<Result<(), EngineError>>;

/// Monotonic, sample-accurate time source. Seconds since an epoch fixed when
/// the clock was created.
pub trait ClockSource {
    fn now(&self) -> f64;
    fn state(&self) -> ClockState;
    fn resume(&mut self) -> ResumeHandle;
}

/// Platform that can hand out a clock and the tone graph rendered against it.
/// Opening is the lazy "create the clock" step of Play.
pub trait AudioBackend {
    type Clock: ClockSource;
    type Graph: ToneGraph;

    fn open(&mut self) -> Result<(Self::Clock, Self::Graph), EngineError>;
}

/// Block until a resume completes, fails, or `timeout` passes. Every way of
/// not completing is a `ResumeFailure`.
pub fn wait_for_resume(handle: &ResumeHandle, timeout: Duration) -> Result<(), EngineError> {
    match handle.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(EngineError::ResumeFailure(msg))) => Err(EngineError::ResumeFailure(msg)),
        Ok(Err(other)) => Err(EngineError::ResumeFailure(other.to_string())),
        Err(RecvTimeoutError::Timeout) => Err(EngineError::ResumeFailure(format!(
            "no completion within {} ms",
            timeout.as_millis()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(EngineError::ResumeFailure(
            "resume was abandoned".to_string(),
        )),
    }
}
