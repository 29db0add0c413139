use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Default for Waveform {
    fn default() -> Self {
        Self::Square
    }
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    /// Value of one period of the waveform at `phase` (0.0 to 1.0), in [-1, 1].
    /// Every shape starts its period at a zero crossing except the square,
    /// which starts high.
    pub fn sample(&self, phase: f64) -> f64 {
        let p = phase.rem_euclid(1.0);
        match self {
            Waveform::Sine => (p * std::f64::consts::TAU).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => {
                // Rising ramp, shifted so the period begins at 0
                let shifted = (p + 0.5).rem_euclid(1.0);
                2.0 * shifted - 1.0
            }
            Waveform::Triangle => {
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }

    /// Compact encoding for lock-free parameter cells.
    pub fn to_u8(self) -> u8 {
        match self {
            Waveform::Sine => 0,
            Waveform::Square => 1,
            Waveform::Sawtooth => 2,
            Waveform::Triangle => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

impl std::fmt::Display for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Waveform {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|w| w.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParamError::UnknownWaveform(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{name} must be a finite number")]
    NotFinite { name: &'static str },
    #[error("unknown waveform '{0}'")]
    UnknownWaveform(String),
}

/// The numeric tempo parameters and their accepted ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Bpm,
    Frequency,
    Volume,
    Decay,
}

impl ParamKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Bpm => "bpm",
            ParamKind::Frequency => "frequency",
            ParamKind::Volume => "volume",
            ParamKind::Decay => "decay",
        }
    }

    /// Inclusive (min, max).
    pub fn range(&self) -> (f64, f64) {
        match self {
            ParamKind::Bpm => (40.0, 240.0),
            ParamKind::Frequency => (100.0, 5000.0),
            ParamKind::Volume => (0.0, 1.0),
            ParamKind::Decay => (0.001, 1.0),
        }
    }

    /// UI step size.
    pub fn step(&self) -> f64 {
        match self {
            ParamKind::Bpm => 1.0,
            ParamKind::Frequency => 1.0,
            ParamKind::Volume => 0.01,
            ParamKind::Decay => 0.001,
        }
    }

    pub fn validate(&self, value: f64) -> Result<f64, ParamError> {
        if !value.is_finite() {
            return Err(ParamError::NotFinite { name: self.name() });
        }
        let (min, max) = self.range();
        if value < min || value > max {
            return Err(ParamError::OutOfRange {
                name: self.name(),
                value,
                min,
                max,
            });
        }
        Ok(value)
    }

    /// Pull a value into range. Non-finite input falls back to the default.
    pub fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.default_value();
        }
        let (min, max) = self.range();
        value.clamp(min, max)
    }

    pub fn default_value(&self) -> f64 {
        let defaults = TempoParams::default();
        match self {
            ParamKind::Bpm => defaults.bpm,
            ParamKind::Frequency => defaults.frequency_hz,
            ParamKind::Volume => defaults.volume,
            ParamKind::Decay => defaults.decay_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoParams {
    pub bpm: f64,
    pub frequency_hz: f64,
    pub waveform: Waveform,
    pub volume: f64,
    pub decay_seconds: f64,
}

impl Default for TempoParams {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            frequency_hz: 1000.0,
            waveform: Waveform::Square,
            volume: 1.0,
            decay_seconds: 0.01,
        }
    }
}

impl TempoParams {
    /// Seconds between two clicks.
    pub fn beat_interval(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        ParamKind::Bpm.validate(self.bpm)?;
        ParamKind::Frequency.validate(self.frequency_hz)?;
        ParamKind::Volume.validate(self.volume)?;
        ParamKind::Decay.validate(self.decay_seconds)?;
        Ok(())
    }
}
