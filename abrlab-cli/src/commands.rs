//! CLI command implementations

use std::time::Duration;

use abrlab_core::config::AbrLabConfig;
use abrlab_core::{AbrLabError, Result};
use abrlab_core::metrics::MetricsSnapshot;
use abrlab_core::segments::{SegmentStatus, TimelineSnapshot};
use abrlab_core::session::{SessionHandle, StreamTarget, spawn_session};
use abrlab_core::sync::{ComparisonReport, DualSessionSynchronizer};
use abrlab_core::throttle::ThrottleProfile;
use abrlab_sim::{DEMO_STREAMS, SimStats, SimulatedPlayer};
use clap::Subcommand;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Play one simulated stream and report metrics as it runs
    Play {
        /// Stream URL (defaults to the first demo stream)
        #[arg(long)]
        url: Option<String>,
        /// Network profile: unlimited, slow3g, fast3g, 4g, wifi or 2g
        #[arg(short, long, default_value = "unlimited")]
        profile: String,
        /// Seconds of playback to simulate
        #[arg(short, long, default_value = "20")]
        seconds: u64,
        /// Metrics interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
        /// Seed for the simulated network
        #[arg(long)]
        seed: Option<u64>,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Play the same stream on an unthrottled session A and a throttled session B
    Compare {
        /// Stream URL (defaults to the first demo stream)
        #[arg(long)]
        url: Option<String>,
        /// Network profile applied to session B
        #[arg(short, long, default_value = "slow3g")]
        profile: String,
        /// Seconds of playback to simulate
        #[arg(short, long, default_value = "20")]
        seconds: u64,
        /// Comparison interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
        /// Seed for the simulated networks
        #[arg(long)]
        seed: Option<u64>,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List network profiles
    Profiles,
    /// List demo streams
    Streams,
}

/// Handle the CLI command
///
/// # Errors
/// - `AbrLabError::Target` - The stream URL is not valid
/// - `AbrLabError::Throttle` - The network profile is unknown
/// - `AbrLabError::Configuration` - The run options are out of range
/// - `AbrLabError::Session` - A session stopped unexpectedly
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Play {
            url,
            profile,
            seconds,
            interval_ms,
            seed,
            json,
        } => {
            let options = RunOptions::new(url, &profile, seconds, interval_ms, seed)?;
            play(options, json).await
        }
        Commands::Compare {
            url,
            profile,
            seconds,
            interval_ms,
            seed,
            json,
        } => {
            let options = RunOptions::new(url, &profile, seconds, interval_ms, seed)?;
            compare(options, json).await
        }
        Commands::Profiles => {
            list_profiles();
            Ok(())
        }
        Commands::Streams => {
            list_streams();
            Ok(())
        }
    }
}

/// Validated options shared by `play` and `compare`.
struct RunOptions {
    target: StreamTarget,
    profile: ThrottleProfile,
    duration: Duration,
    interval: Duration,
    config: AbrLabConfig,
}

impl RunOptions {
    fn new(
        url: Option<String>,
        profile: &str,
        seconds: u64,
        interval_ms: u64,
        seed: Option<u64>,
    ) -> Result<Self> {
        if seconds == 0 {
            return Err(AbrLabError::Configuration {
                reason: "playback must run for at least one second".to_string(),
            });
        }
        let (url, name) = match url {
            Some(url) => (url.clone(), url),
            None => (DEMO_STREAMS[0].url.to_string(), DEMO_STREAMS[0].name.to_string()),
        };
        let target = StreamTarget::adaptive(&url, name)?;
        let profile = profile.parse::<ThrottleProfile>()?;

        let mut config = AbrLabConfig::from_env();
        if seed.is_some() {
            config.simulation.deterministic_seed = seed;
        }

        Ok(Self {
            target,
            profile,
            duration: Duration::from_secs(seconds),
            interval: config.metrics.clamp_interval(Duration::from_millis(interval_ms)),
            config,
        })
    }
}

/// A session bound to its own simulated player.
struct SimulatedSession {
    session: SessionHandle,
    player: abrlab_sim::SimulationDriver,
    ticker: JoinHandle<()>,
}

async fn start_session(config: &AbrLabConfig, label: &str) -> Result<SimulatedSession> {
    let player = SimulatedPlayer::new(&config.simulation);
    let ticker = player.driver.spawn(config.simulation.tick_interval);
    let session = spawn_session(player.engine, config.clone(), label);
    session.initialize(Box::new(player.surface)).await?;
    Ok(SimulatedSession {
        session,
        player: player.driver,
        ticker,
    })
}

#[derive(Serialize)]
struct PlayReport {
    metrics: MetricsSnapshot,
    throttle: ThrottleProfile,
    current_time_sec: f64,
    buffered_segments: usize,
    simulation: SimStats,
}

/// Plays one stream under `options.profile`.
///
/// # Errors
/// - `AbrLabError::Session` - The session stopped unexpectedly
async fn play(options: RunOptions, json: bool) -> Result<()> {
    let run = start_session(&options.config, "A").await?;
    let session = &run.session;

    session.set_throttle(options.profile).await?;
    session.load(options.target.clone()).await?;
    session.play().await?;
    session.start_metrics_update(Some(options.interval)).await?;

    let mut elapsed = Duration::ZERO;
    while elapsed < options.duration {
        time::sleep(options.interval).await;
        elapsed += options.interval;
        if !json {
            println!("{}", format_metrics("A", &session.metrics().await?));
        }
    }

    let timeline = session.segments().await?;
    let report = PlayReport {
        metrics: session.metrics().await?,
        throttle: session.throttle().await?,
        current_time_sec: session.current_time().await?,
        buffered_segments: timeline.buffered_segments_count,
        simulation: run.player.stats(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("Timeline  {}", render_timeline(&timeline));
        println!(
            "Played {:.1}s of {}, {} fragments loaded, {:.1}s stalled",
            report.current_time_sec,
            options.target.label(),
            report.simulation.fragments_loaded,
            report.simulation.stall_time_sec
        );
    }

    session.destroy().await?;
    if let Err(e) = run.ticker.await {
        tracing::warn!("Simulation ticker ended abnormally: {}", e);
    }
    Ok(())
}

/// Plays one stream on two sessions, throttling only B.
///
/// # Errors
/// - `AbrLabError::Session` - Either session stopped unexpectedly
async fn compare(options: RunOptions, json: bool) -> Result<()> {
    let a = start_session(&options.config, "A").await?;
    let b = start_session(&options.config, "B").await?;
    let sync = DualSessionSynchronizer::new(a.session.clone(), b.session.clone());

    sync.apply_network_profile(options.profile).await?;
    sync.load_both(options.target.clone()).await?;
    sync.sync_play().await?;
    sync.start_metrics_update(Some(options.interval)).await?;

    let mut elapsed = Duration::ZERO;
    let mut report = sync.compare().await?;
    while elapsed < options.duration {
        time::sleep(options.interval).await;
        elapsed += options.interval;
        report = sync.compare().await?;
        if !json {
            println!("{}", format_comparison(&report));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("A  {}", render_timeline(&a.session.segments().await?));
        println!("B  {}", render_timeline(&b.session.segments().await?));
    }

    sync.destroy().await?;
    let (ticker_a, ticker_b) = futures::future::join(a.ticker, b.ticker).await;
    for e in [ticker_a, ticker_b].into_iter().filter_map(|joined| joined.err()) {
        tracing::warn!("Simulation ticker ended abnormally: {}", e);
    }
    Ok(())
}

fn list_profiles() {
    println!("{:<12} {:>10} {:>10}", "PROFILE", "CAP", "LATENCY");
    for profile in ThrottleProfile::presets() {
        let cap = if profile.is_unlimited() {
            "-".to_string()
        } else {
            format!("{}kbps", profile.cap_kbps())
        };
        println!(
            "{:<12} {:>10} {:>8}ms",
            profile.name.to_string(),
            cap,
            profile.simulated_latency_ms
        );
    }
}

fn list_streams() {
    for stream in DEMO_STREAMS {
        println!("{:<16} {}", stream.name, stream.url);
    }
}

fn format_metrics(label: &str, metrics: &MetricsSnapshot) -> String {
    format!(
        "[{label}] {:<18} {:>5}kbps  buffer {:>5.1}s  dropped {}",
        metrics.quality_label, metrics.bitrate_kbps, metrics.buffer_health_sec, metrics.dropped_frames
    )
}

fn format_comparison(report: &ComparisonReport) -> String {
    format!(
        "A {:>5}kbps {:>5.1}s | B ({}) {:>5}kbps {:>5.1}s | delta {:+}kbps {:+.1}s",
        report.a.bitrate_kbps,
        report.a.buffer_health_sec,
        report.b_throttle.name,
        report.b.bitrate_kbps,
        report.b.buffer_health_sec,
        report.bitrate_delta_kbps,
        report.buffer_delta_sec
    )
}

/// One character per segment: `.` pending, `-` loading, `=` loaded,
/// `>` playing, `#` buffered, `x` error.
fn render_timeline(timeline: &TimelineSnapshot) -> String {
    timeline
        .segments
        .iter()
        .map(|segment| match segment.status {
            SegmentStatus::Pending => '.',
            SegmentStatus::Loading => '-',
            SegmentStatus::Loaded => '=',
            SegmentStatus::Playing => '>',
            SegmentStatus::Buffered => '#',
            SegmentStatus::Error => 'x',
        })
        .collect()
}
