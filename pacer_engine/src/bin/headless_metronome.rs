use pacer_engine::{run, CpalBackend, EngineConfig, FrameTicker, LiveParams, MetronomeHandle, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&PathBuf::from(path))?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    println!("[Headless] Starting metronome at {} BPM...", config.params.bpm);

    let params = Arc::new(LiveParams::new(config.params)?);
    let playing = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let (handle, rx) = MetronomeHandle::new(params.clone(), playing.clone());

    // The output stream is not Send, so the whole transport lives on its own thread
    let runner = thread::spawn(move || {
        let backend = CpalBackend::new(config.buffer_frames);
        let ticks = FrameTicker::new(config.frame_interval());
        let mut transport = Transport::with_playing_flag(backend, ticks, params, &config, playing);
        run(&mut transport, &rx);
    });

    handle.play()?;
    println!("[Headless] Playing for 4 seconds...");
    thread::sleep(Duration::from_secs(4));

    println!("[Headless] Dropping to 60 BPM...");
    handle.set_bpm(60.0)?;
    thread::sleep(Duration::from_secs(4));

    println!("[Headless] Sending STOP...");
    handle.stop()?;
    thread::sleep(Duration::from_millis(500));
    println!("[Headless] Playing after stop: {}", handle.is_playing());

    handle.shutdown()?;
    runner
        .join()
        .map_err(|_| anyhow::anyhow!("metronome thread panicked"))?;
    println!("[Headless] Done.");
    Ok(())
}
