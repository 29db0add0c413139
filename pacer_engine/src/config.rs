use crate::error::EngineError;
use pacer_shared::{TempoParams, LOOKAHEAD_SECONDS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How far ahead of the clock clicks are committed.
    pub lookahead_seconds: f64,
    /// Scheduler tick period. Must be well below the lookahead.
    pub frame_interval_ms: u64,
    /// How long Play waits for a suspended clock to resume.
    pub resume_timeout_ms: u64,
    /// Fixed device buffer size; the device default when unset.
    pub buffer_frames: Option<u32>,
    /// Parameters in effect when the engine starts.
    pub params: TempoParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookahead_seconds: LOOKAHEAD_SECONDS,
            frame_interval_ms: 16,
            resume_timeout_ms: 2000,
            buffer_frames: None,
            params: TempoParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, anyhow::Error> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.lookahead_seconds.is_finite() && self.lookahead_seconds > 0.0) {
            return Err(EngineError::Config(format!(
                "lookahead_seconds must be positive, got {}",
                self.lookahead_seconds
            )));
        }
        if self.frame_interval_ms == 0 {
            return Err(EngineError::Config("frame_interval_ms must be at least 1".to_string()));
        }
        let frame_secs = self.frame_interval_ms as f64 / 1000.0;
        if frame_secs >= self.lookahead_seconds {
            // Ticks this sparse can miss a whole scheduling window
            return Err(EngineError::Config(format!(
                "frame_interval_ms ({}) must be shorter than the lookahead ({}s)",
                self.frame_interval_ms, self.lookahead_seconds
            )));
        }
        if frame_secs * 4.0 > self.lookahead_seconds {
            log::warn!(
                "[Config] Only {:.1} ticks per lookahead window; clicks may land late under load",
                self.lookahead_seconds / frame_secs
            );
        }
        if self.buffer_frames == Some(0) {
            return Err(EngineError::Config("buffer_frames must be positive".to_string()));
        }
        self.params.validate()?;
        Ok(())
    }
}
