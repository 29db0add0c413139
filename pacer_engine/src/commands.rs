use crate::clock::AudioBackend;
use crate::error::EngineError;
use crate::params::LiveParams;
use crate::tick::TickSource;
use crate::transport::Transport;
use crossbeam_channel::{unbounded, Receiver, SendError, Sender, TryRecvError};
use pacer_shared::Waveform;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetronomeCommand {
    Play,
    Stop,
    Shutdown,
}

/// Control surface for a transport running on another thread. Parameter
/// setters write straight into the shared bridge; play/stop go through the
/// command channel.
#[derive(Clone)]
pub struct MetronomeHandle {
    tx: Sender<MetronomeCommand>,
    params: Arc<LiveParams>,
    playing: Arc<AtomicBool>,
}

impl MetronomeHandle {
    /// Handle plus the receiving end to pass to [`run`].
    pub fn new(params: Arc<LiveParams>, playing: Arc<AtomicBool>) -> (Self, Receiver<MetronomeCommand>) {
        let (tx, rx) = unbounded();
        (Self { tx, params, playing }, rx)
    }

    pub fn for_transport<B: AudioBackend, T: TickSource>(
        transport: &Transport<B, T>,
    ) -> (Self, Receiver<MetronomeCommand>) {
        Self::new(transport.params().clone(), transport.playing_flag())
    }

    pub fn play(&self) -> Result<(), SendError<MetronomeCommand>> {
        self.tx.send(MetronomeCommand::Play)
    }

    pub fn stop(&self) -> Result<(), SendError<MetronomeCommand>> {
        self.tx.send(MetronomeCommand::Stop)
    }

    pub fn shutdown(&self) -> Result<(), SendError<MetronomeCommand>> {
        self.tx.send(MetronomeCommand::Shutdown)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn params(&self) -> &Arc<LiveParams> {
        &self.params
    }

    pub fn set_bpm(&self, bpm: f64) -> Result<(), EngineError> {
        Ok(self.params.set_bpm(bpm)?)
    }

    pub fn set_frequency(&self, hz: f64) -> Result<(), EngineError> {
        Ok(self.params.set_frequency(hz)?)
    }

    pub fn set_waveform(&self, waveform: Waveform) {
        self.params.set_waveform(waveform);
    }

    pub fn set_volume(&self, volume: f64) -> Result<(), EngineError> {
        Ok(self.params.set_volume(volume)?)
    }

    pub fn set_decay(&self, seconds: f64) -> Result<(), EngineError> {
        Ok(self.params.set_decay(seconds)?)
    }
}

// Returns false when the loop should exit
fn handle_command<B: AudioBackend, T: TickSource>(
    transport: &mut Transport<B, T>,
    cmd: MetronomeCommand,
) -> bool {
    match cmd {
        MetronomeCommand::Play => {
            if let Err(e) = transport.play() {
                log::error!("[Transport] Play failed: {}", e);
            }
            true
        }
        MetronomeCommand::Stop => {
            transport.stop();
            true
        }
        MetronomeCommand::Shutdown => false,
    }
}

/// Drive `transport` until `Shutdown` arrives or every handle is gone.
pub fn run<B: AudioBackend, T: TickSource>(
    transport: &mut Transport<B, T>,
    commands: &Receiver<MetronomeCommand>,
) {
    loop {
        if transport.is_playing() {
            loop {
                match commands.try_recv() {
                    Ok(cmd) => {
                        if !handle_command(transport, cmd) {
                            transport.stop();
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        transport.stop();
                        return;
                    }
                }
            }
            if transport.is_playing() && !transport.pump() {
                // Nothing pending while running; fall back to waiting on commands
                log::warn!("[Transport] Running without a pending tick");
                match commands.recv() {
                    Ok(cmd) if handle_command(transport, cmd) => {}
                    _ => break,
                }
            }
        } else {
            match commands.recv() {
                Ok(cmd) if handle_command(transport, cmd) => {}
                _ => break,
            }
        }
    }
    transport.stop();
    log::info!("[Transport] Command loop finished");
}
