pub mod clock;
pub mod commands;
pub mod config;
pub mod engine; // cpal output lives here
pub mod error;
pub mod graph;
pub mod nodes;
pub mod offline;
pub mod params;
pub mod scheduler;
pub mod synth;
pub mod tick;
pub mod transport;

#[cfg(test)]
mod tests_transport;

// Re-exports
pub use clock::{AudioBackend, ClockSource, ClockState};
pub use commands::{run, MetronomeCommand, MetronomeHandle};
pub use config::EngineConfig;
pub use engine::CpalBackend;
pub use error::EngineError;
pub use graph::{GraphError, ToneGraph};
pub use params::LiveParams;
pub use scheduler::LookaheadScheduler;
pub use tick::{FrameTicker, TickSource};
pub use transport::{PlaybackState, Transport, TransportStatus};
