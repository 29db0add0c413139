use crate::graph::GraphError;
use pacer_shared::ParamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The platform could not provide a usable clock / output device.
    #[error("clock source unavailable: {0}")]
    ClockUnavailable(String),
    /// Resuming a suspended clock failed or never completed.
    #[error("clock resume failed: {0}")]
    ResumeFailure(String),
    #[error(transparent)]
    InvalidParameter(#[from] ParamError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("invalid engine configuration: {0}")]
    Config(String),
}
