use crate::clock::{AudioBackend, ClockSource, ClockState, ResumeHandle};
use crate::error::EngineError;
use crate::graph::{GraphOp, StreamGraph, VoiceRenderer};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, unbounded};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Default output device via cpal.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    buffer_frames: Option<u32>,
}

impl CpalBackend {
    pub fn new(buffer_frames: Option<u32>) -> Self {
        Self { buffer_frames }
    }
}

impl AudioBackend for CpalBackend {
    type Clock = StreamClock;
    type Graph = StreamGraph;

    fn open(&mut self) -> Result<(StreamClock, StreamGraph), EngineError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::ClockUnavailable("No output device available".to_string()))?;
        let config = device
            .default_output_config()
            .map_err(|e| EngineError::ClockUnavailable(e.to_string()))?;

        let sample_rate = config.sample_rate();
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();

        if let cpal::SupportedBufferSize::Range { min, max } = config.buffer_size() {
            log::debug!("[Engine] Device buffer range: {}-{}", min, max);
        }

        let mut stream_config: cpal::StreamConfig = config.into();
        if let Some(frames) = self.buffer_frames {
            stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
        }
        log::info!("[Engine] Using config: {:?}", stream_config);

        let (op_tx, op_rx) = unbounded::<GraphOp>();
        let frames = Arc::new(AtomicU64::new(0));
        let frames_callback = frames.clone();

        // Owned by the audio thread from here on
        let mut renderer = VoiceRenderer::new(sample_rate);

        let err_fn = |err: cpal::StreamError| {
            let s = err.to_string();
            if !s.contains("underrun") && !s.contains("overrun") {
                log::error!("[Engine] Stream error: {}", s);
            }
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        while let Ok(op) = op_rx.try_recv() {
                            if let Err(e) = renderer.apply(op) {
                                log::warn!("[Engine] Dropped graph op: {}", e);
                            }
                        }
                        renderer.render(data, channels);
                        frames_callback.store(renderer.frames_rendered(), Ordering::Relaxed);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| EngineError::ClockUnavailable(e.to_string()))?,
            other => {
                return Err(EngineError::ClockUnavailable(format!(
                    "Unsupported sample format {:?}",
                    other
                )));
            }
        };

        // Start suspended; Play resumes it
        if let Err(e) = stream.pause() {
            log::debug!("[Engine] Could not pause new stream: {}", e);
        }

        let clock = StreamClock {
            stream,
            frames,
            sample_rate: sample_rate as f64,
            running: Arc::new(AtomicBool::new(false)),
        };
        Ok((clock, StreamGraph::new(op_tx)))
    }
}

/// Clock backed by the frame counter of a cpal output stream.
pub struct StreamClock {
    stream: cpal::Stream,
    frames: Arc<AtomicU64>,
    sample_rate: f64,
    running: Arc<AtomicBool>,
}

impl ClockSource for StreamClock {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Relaxed) as f64 / self.sample_rate
    }

    fn state(&self) -> ClockState {
        if self.running.load(Ordering::Relaxed) {
            ClockState::Active
        } else {
            ClockState::Suspended
        }
    }

    fn resume(&mut self) -> ResumeHandle {
        let (tx, rx) = bounded(1);
        let result = match self.stream.play() {
            Ok(()) => {
                self.running.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => Err(EngineError::ResumeFailure(e.to_string())),
        };
        let _ = tx.send(result);
        rx
    }
}
