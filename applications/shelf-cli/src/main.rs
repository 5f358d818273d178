//! Shelf CLI - inspect and play playback sessions against a simulated host
mod sim;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use shelf_core::{PlaybackSession, PlaybackSessionPayload};
use shelf_playback::{PlayStrategy, PlaybackEngine, PlayerConfig, PlayerEvent, PlayerState};
use sim::{SimOptions, SimulatedBackend};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser)]
#[command(name = "shelf-cli")]
#[command(about = "Inspect and play Shelf Player sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the timeline of a session payload
    Inspect {
        /// Session payload (JSON, as returned by the server)
        session: PathBuf,

        /// Print absolute URLs against this server
        #[arg(long)]
        base_url: Option<Url>,

        /// Emit the timeline as JSON
        #[arg(long)]
        json: bool,
    },
    /// Play a session against a simulated host
    Play {
        /// Session payload (JSON, as returned by the server)
        session: PathBuf,

        /// Global start time in seconds (default: the payload's resume position)
        #[arg(long)]
        start: Option<f64>,

        /// Delivery strategy (default: implied by the payload's play method)
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Start playing as soon as media is ready
        #[arg(long)]
        autoplay: bool,

        /// Playback speed
        #[arg(long)]
        rate: Option<f64>,

        /// Simulated seconds per wall-clock second
        #[arg(long, default_value_t = 10.0)]
        time_scale: f64,

        /// Player configuration file (TOML)
        #[arg(short, long, env = "SHELF_CONFIG")]
        config: Option<PathBuf>,

        /// Jump to this global time while playing; repeat to queue more jumps
        #[arg(long)]
        seek: Vec<f64>,

        /// Wall-clock seconds between queued jumps
        #[arg(long, default_value_t = 2.0)]
        seek_every: f64,

        /// Make this stream fragment fail once
        #[arg(long)]
        fail_fragment: Option<u64>,

        /// On a playback error, reset the stream once under the other strategy
        #[arg(long)]
        recover: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Direct,
    Adaptive,
}

impl From<StrategyArg> for PlayStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Direct => PlayStrategy::DirectPlay,
            StrategyArg::Adaptive => PlayStrategy::AdaptiveStream,
        }
    }
}

/// Options for the `play` subcommand
struct PlayOptions {
    start: Option<f64>,
    strategy: Option<PlayStrategy>,
    autoplay: bool,
    rate: Option<f64>,
    time_scale: f64,
    config: Option<PathBuf>,
    seeks: Vec<f64>,
    seek_every: Duration,
    fail_fragment: Option<u64>,
    recover: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelf=info,shelf_playback=info,shelf_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            session,
            base_url,
            json,
        } => {
            inspect(&session, base_url.as_ref(), json)?;
        }
        Commands::Play {
            session,
            start,
            strategy,
            autoplay,
            rate,
            time_scale,
            config,
            seek,
            seek_every,
            fail_fragment,
            recover,
        } => {
            if !(time_scale.is_finite() && time_scale > 0.0) {
                bail!("--time-scale must be a positive number");
            }
            if !(seek_every.is_finite() && seek_every > 0.0) {
                bail!("--seek-every must be a positive number");
            }

            let options = PlayOptions {
                start,
                strategy: strategy.map(Into::into),
                autoplay,
                rate,
                time_scale,
                config,
                seeks: seek,
                seek_every: Duration::from_secs_f64(seek_every),
                fail_fragment,
                recover,
            };
            play(&session, options).await?;
        }
    }

    Ok(())
}

fn load_payload(path: &Path) -> anyhow::Result<PlaybackSessionPayload> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    PlaybackSessionPayload::from_json(&json)
        .with_context(|| format!("{} is not a session payload", path.display()))
}

/// One row of `inspect` output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimelineEntry {
    index: u32,
    title: String,
    start: f64,
    end: f64,
    address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimelineReport {
    session_id: String,
    title: Option<String>,
    strategy: String,
    start_time: f64,
    total_duration: f64,
    gapless: bool,
    manifest: String,
    tracks: Vec<TimelineEntry>,
}

fn timeline(
    payload: &PlaybackSessionPayload,
    session: &PlaybackSession,
    base_url: Option<&Url>,
) -> anyhow::Result<TimelineReport> {
    let tracks = session
        .tracks()
        .iter()
        .map(|track| {
            let address = match base_url {
                Some(base) => track.resolve_url(base, session.id())?.to_string(),
                None => track.resolve_address(session.id()),
            };
            Ok(TimelineEntry {
                index: track.index,
                title: track.title.clone(),
                start: track.start_offset,
                end: track.end_offset(),
                address,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(TimelineReport {
        session_id: session.id().to_string(),
        title: payload.display_title.clone(),
        strategy: session.strategy().to_string(),
        start_time: payload.start_time(),
        total_duration: session.total_duration(),
        gapless: session.is_gapless(),
        manifest: session.manifest_address(),
        tracks,
    })
}

fn inspect(path: &Path, base_url: Option<&Url>, json: bool) -> anyhow::Result<()> {
    let payload = load_payload(path)?;
    let session = payload.clone().into_session()?;
    let report = timeline(&payload, &session, base_url)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Session {} ({})",
        report.session_id,
        report.title.as_deref().unwrap_or("untitled")
    );
    println!("  strategy: {}", report.strategy);
    println!("  resume:   {}", format_time(report.start_time));
    println!(
        "  duration: {}{}",
        format_time(report.total_duration),
        if report.gapless { "" } else { " (timeline has gaps)" }
    );
    println!("  manifest: {}", report.manifest);
    println!();
    for track in &report.tracks {
        println!(
            "  {:>3}  {:>9} - {:<9}  {}  {}",
            track.index,
            format_time(track.start),
            format_time(track.end),
            track.title,
            track.address
        );
    }

    Ok(())
}

async fn play(path: &Path, options: PlayOptions) -> anyhow::Result<()> {
    let config = PlayerConfig::load(options.config.as_deref())?;
    let payload = load_payload(path)?;
    let start = options.start.unwrap_or_else(|| payload.start_time());

    let mut session = payload.into_session()?;
    if let Some(strategy) = options.strategy {
        session = session.with_strategy(strategy);
    }

    let backend = Arc::new(SimulatedBackend::for_session(
        &session,
        SimOptions {
            tick: Duration::from_millis(100),
            time_scale: options.time_scale,
            fail_fragment: options.fail_fragment,
        },
    ));

    let engine = PlaybackEngine::new(backend, config)?;
    let mut events = engine.subscribe();

    if let Some(rate) = options.rate {
        engine.set_playback_rate(rate)?;
    }

    info!(
        session = %session.id(),
        strategy = %session.strategy(),
        start = %format_time(start),
        "Starting playback"
    );
    engine.set_session(session, start, options.autoplay)?;

    let mut seeks: VecDeque<f64> = options.seeks.into();
    let mut seek_timer = tokio::time::interval(options.seek_every);
    seek_timer.tick().await;

    let mut started = options.autoplay;
    let mut recovered = false;
    let mut outcome = Ok(());

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    PlayerEvent::StateChange(state) => {
                        info!(%state, time = %format_time(engine.current_time()), "State changed");
                        if state == PlayerState::Loaded && !started {
                            started = true;
                            engine.play()?;
                        }
                    }
                    PlayerEvent::TimeUpdate(time) => {
                        debug!(time = %format_time(time), "Position");
                    }
                    PlayerEvent::BufferTimeUpdate(time) => {
                        debug!(buffered = %format_time(time), "Buffered");
                    }
                    PlayerEvent::DurationChange(duration) => {
                        info!(duration = %format_time(duration), "Duration");
                    }
                    PlayerEvent::Error(cause) => {
                        error!(error = %cause, "Playback error");
                        if options.recover && !recovered {
                            recovered = true;
                            let resume_at = engine.current_time();
                            warn!(resume_at = %format_time(resume_at), "Resetting stream");
                            engine.reset_stream(resume_at)?;
                        } else {
                            outcome = Err(anyhow::anyhow!("playback failed: {cause}"));
                            break;
                        }
                    }
                    PlayerEvent::Finished => {
                        info!(time = %format_time(engine.current_time()), "Finished");
                        break;
                    }
                }
            }
            _ = seek_timer.tick(), if !seeks.is_empty() && engine.state() == PlayerState::Playing => {
                if let Some(target) = seeks.pop_front() {
                    info!(target = %format_time(target), "Seeking");
                    engine.seek(target, true)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    engine.destroy();
    outcome
}

/// `h:mm:ss.s`, or `m:ss.s` under an hour
fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let whole = seconds.floor() as u64;
    let tenths = ((seconds - seconds.floor()) * 10.0).floor() as u64;
    let (hours, minutes, secs) = (whole / 3600, (whole % 3600) / 60, whole % 60);

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}.{tenths}")
    } else {
        format!("{minutes}:{secs:02}.{tenths}")
    }
}
