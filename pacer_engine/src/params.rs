//! Live parameter bridge.
//!
//! Every tempo parameter lives in a cell with two slots: the latest value a
//! setter requested, and the value scheduling most recently observed. Setters
//! write the requested slot synchronously; the scheduler and synthesis unit
//! read it at the instant they need a value, so edits made mid-playback apply
//! to the very next click without restarting anything.

use pacer_shared::{ParamError, ParamKind, TempoParams, Waveform};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

#[derive(Debug)]
struct F64Cell {
    requested: AtomicU64,
    current: AtomicU64,
}

impl F64Cell {
    fn new(value: f64) -> Self {
        Self {
            requested: AtomicU64::new(value.to_bits()),
            current: AtomicU64::new(value.to_bits()),
        }
    }

    fn request(&self, value: f64) {
        self.requested.store(value.to_bits(), Ordering::Release);
    }

    fn observe(&self) -> f64 {
        let bits = self.requested.load(Ordering::Acquire);
        self.current.store(bits, Ordering::Relaxed);
        f64::from_bits(bits)
    }

    fn requested(&self) -> f64 {
        f64::from_bits(self.requested.load(Ordering::Acquire))
    }

    fn current(&self) -> f64 {
        f64::from_bits(self.current.load(Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct WaveformCell {
    requested: AtomicU8,
    current: AtomicU8,
}

impl WaveformCell {
    fn new(value: Waveform) -> Self {
        Self {
            requested: AtomicU8::new(value.to_u8()),
            current: AtomicU8::new(value.to_u8()),
        }
    }

    fn request(&self, value: Waveform) {
        self.requested.store(value.to_u8(), Ordering::Release);
    }

    fn observe(&self) -> Waveform {
        let raw = self.requested.load(Ordering::Acquire);
        self.current.store(raw, Ordering::Relaxed);
        Waveform::from_u8(raw).unwrap_or_default()
    }

    fn requested(&self) -> Waveform {
        Waveform::from_u8(self.requested.load(Ordering::Acquire)).unwrap_or_default()
    }

    fn current(&self) -> Waveform {
        Waveform::from_u8(self.current.load(Ordering::Relaxed)).unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct LiveParams {
    bpm: F64Cell,
    frequency: F64Cell,
    waveform: WaveformCell,
    volume: F64Cell,
    decay: F64Cell,
}

impl Default for LiveParams {
    fn default() -> Self {
        Self::from_valid(TempoParams::default())
    }
}

impl LiveParams {
    pub fn new(params: TempoParams) -> Result<Self, ParamError> {
        params.validate()?;
        Ok(Self::from_valid(params))
    }

    fn from_valid(params: TempoParams) -> Self {
        Self {
            bpm: F64Cell::new(params.bpm),
            frequency: F64Cell::new(params.frequency_hz),
            waveform: WaveformCell::new(params.waveform),
            volume: F64Cell::new(params.volume),
            decay: F64Cell::new(params.decay_seconds),
        }
    }

    pub fn set_bpm(&self, bpm: f64) -> Result<(), ParamError> {
        self.bpm.request(ParamKind::Bpm.validate(bpm)?);
        Ok(())
    }

    pub fn set_frequency(&self, hz: f64) -> Result<(), ParamError> {
        self.frequency.request(ParamKind::Frequency.validate(hz)?);
        Ok(())
    }

    pub fn set_waveform(&self, waveform: Waveform) {
        self.waveform.request(waveform);
    }

    pub fn set_volume(&self, volume: f64) -> Result<(), ParamError> {
        self.volume.request(ParamKind::Volume.validate(volume)?);
        Ok(())
    }

    pub fn set_decay(&self, seconds: f64) -> Result<(), ParamError> {
        self.decay.request(ParamKind::Decay.validate(seconds)?);
        Ok(())
    }

    /// Apply a whole parameter set. Nothing changes unless every value is valid.
    pub fn set_all(&self, params: TempoParams) -> Result<(), ParamError> {
        params.validate()?;
        self.bpm.request(params.bpm);
        self.frequency.request(params.frequency_hz);
        self.waveform.request(params.waveform);
        self.volume.request(params.volume);
        self.decay.request(params.decay_seconds);
        Ok(())
    }

    /// Latest requested BPM, marked as observed.
    pub fn observe_bpm(&self) -> f64 {
        self.bpm.observe()
    }

    /// Latest requested values of every parameter, marked as observed.
    pub fn observe(&self) -> TempoParams {
        TempoParams {
            bpm: self.bpm.observe(),
            frequency_hz: self.frequency.observe(),
            waveform: self.waveform.observe(),
            volume: self.volume.observe(),
            decay_seconds: self.decay.observe(),
        }
    }

    /// Latest requested values without touching the observed slots.
    pub fn requested(&self) -> TempoParams {
        TempoParams {
            bpm: self.bpm.requested(),
            frequency_hz: self.frequency.requested(),
            waveform: self.waveform.requested(),
            volume: self.volume.requested(),
            decay_seconds: self.decay.requested(),
        }
    }

    /// Values scheduling last used.
    pub fn current(&self) -> TempoParams {
        TempoParams {
            bpm: self.bpm.current(),
            frequency_hz: self.frequency.current(),
            waveform: self.waveform.current(),
            volume: self.volume.current(),
            decay_seconds: self.decay.current(),
        }
    }
}
