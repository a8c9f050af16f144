use clap::Parser;
use midi_measures::{
    ClickEngine, ClickPlayer, Clock, SessionConfig, Session, SilentPlayer, SourceKind, SystemClock,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Group live MIDI notes into measures with a metronome")]
struct Args {
    /// Session config (RON). Defaults to the user config file when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Play random notes instead of reading a MIDI device
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Beats per minute (overrides config)
    #[arg(long)]
    bpm: Option<u32>,

    /// Beats per measure (overrides config)
    #[arg(long)]
    beats: Option<u32>,

    /// Stop after this many seconds; runs until Ctrl-C otherwise
    #[arg(long)]
    seconds: Option<u64>,

    /// Log clicks instead of playing them
    #[arg(long, default_value_t = false)]
    no_audio: bool,
}

fn load_config(args: &Args) -> Result<SessionConfig, midi_measures::ConfigError> {
    let path = args
        .config
        .clone()
        .or_else(|| SessionConfig::default_path().filter(|p| p.exists()));

    let mut config = match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            SessionConfig::load(&path)?
        }
        None => SessionConfig::default(),
    };

    if args.synthetic {
        config.source = SourceKind::Synthetic;
    }
    if let Some(bpm) = args.bpm {
        config.beats_per_minute = bpm;
    }
    if let Some(beats) = args.beats {
        config.beats_per_measure = beats;
    }
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    // The engine has to outlive the session; it stops sounding when dropped
    let mut _engine = None;
    let player: Arc<dyn ClickPlayer> = if args.no_audio {
        Arc::new(SilentPlayer)
    } else {
        match ClickEngine::start() {
            Ok((engine, trigger)) => {
                info!(sample_rate = engine.sample_rate(), "click output ready");
                _engine = Some(engine);
                Arc::new(trigger)
            }
            Err(err) => {
                warn!(%err, "no click output, metronome will be silent");
                Arc::new(SilentPlayer)
            }
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let mut session = match Session::new(&config, Arc::clone(&clock), player) {
        Ok(session) => session,
        Err(err) => {
            error!(%err, "could not start session");
            return ExitCode::FAILURE;
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_ctrlc = Arc::clone(&stop);
    if let Err(err) = ctrlc::set_handler(move || stop_for_ctrlc.store(true, Ordering::SeqCst)) {
        warn!(%err, "Ctrl-C handler not installed");
    }

    info!(
        bpm = config.beats_per_minute,
        beats = config.beats_per_measure,
        source = ?config.source,
        "session started"
    );

    let interval = Duration::from_millis(config.update_interval_ms);
    let deadline = args.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    while !stop.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        session.tick(clock.wall_now());
        thread::sleep(interval);
    }

    session.pause();
    info!("session ended");
    ExitCode::SUCCESS
}
