//! tunegrab - song acquisition CLI
//!
//! Finds the best matching upload for a song, extracts its audio, embeds
//! cover art and provenance, optionally identifies the recording, and moves
//! the result into the music library.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunegrab_ai::collaborators::Collaborators;
use tunegrab_ai::config::{build_settings, resolve_acoustid_api_key, SettingsOverrides};
use tunegrab_ai::models::AcquisitionJob;
use tunegrab_ai::services::trace_report::format_trace_table;
use tunegrab_ai::wanted::LidarrClient;
use tunegrab_ai::workflow::{run_batch, BatchItem, BatchReport, JobEvent, Orchestrator, PlaylistResolver};
use tunegrab_common::config::{load_or_default, TomlConfig};

/// Command-line arguments for tunegrab
#[derive(Parser, Debug)]
#[command(name = "tunegrab")]
#[command(about = "Find, download and file songs into a music library")]
#[command(version)]
struct Cli {
    /// Config file (default: TUNEGRAB_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Working directory for in-progress downloads
    #[arg(long, global = true)]
    tmp_dir: Option<PathBuf>,

    /// Library root; files stay in the working directory when unset
    #[arg(long, global = true)]
    dest_dir: Option<PathBuf>,

    /// Audio quality: bitrate (320, 256, 192, 128, 96) or preset name
    #[arg(short, long, global = true)]
    quality: Option<String>,

    /// Identify the recording acoustically and correct its tags
    #[arg(long, global = true)]
    identify: bool,

    /// AcoustID API key (overrides TUNEGRAB_ACOUSTID_API_KEY and TOML)
    #[arg(long, global = true)]
    acoustid_key: Option<String>,

    /// Cover image to embed instead of the thumbnail (path or URL)
    #[arg(long, global = true)]
    cover: Option<String>,

    /// File name used when the recording is not identified
    #[arg(long, global = true)]
    name: Option<String>,

    /// Write an HTML score report per search into this directory
    #[arg(long, global = true)]
    debug_report: Option<PathBuf>,

    /// Number of search results to score
    #[arg(long, global = true)]
    max_results: Option<usize>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search for a song and acquire the best match
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Acquire a known video identifier
    Id { video_id: String },

    /// Acquire every item of a playlist
    Playlist {
        /// Playlist id or any URL carrying `list=`
        reference: String,

        /// Items processed concurrently
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,
    },

    /// Acquire the releases Lidarr reports as missing
    Wanted {
        /// Keep consecutive duplicate release titles
        #[arg(long)]
        all_tracks: bool,
    },

    /// Score search results without downloading
    Rank {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Also write the ranking as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let toml_config = load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(cli.verbose, &toml_config);
    info!("Starting tunegrab {}", env!("CARGO_PKG_VERSION"));

    let overrides = SettingsOverrides {
        tmp_dir: cli.tmp_dir.clone(),
        dest_dir: cli.dest_dir.clone(),
        quality: cli.quality.clone(),
        identify: cli.identify,
        max_results: cli.max_results,
        cover_image: cli.cover.clone(),
        debug_report_dir: cli.debug_report.clone(),
    };
    let settings = build_settings(&overrides, &toml_config).context("Invalid settings")?;

    let acoustid_key = if settings.identify {
        Some(
            resolve_acoustid_api_key(cli.acoustid_key.as_deref(), &toml_config)
                .context("--identify needs an AcoustID API key")?,
        )
    } else {
        None
    };
    let collaborators =
        Collaborators::production(acoustid_key).context("Failed to set up collaborators")?;

    let (event_tx, event_rx) = mpsc::channel(100);
    let printer = tokio::spawn(print_events(event_rx));
    let orchestrator = Orchestrator::new(collaborators, settings).with_events(event_tx);

    let success = match cli.command {
        Command::Search { query } => {
            let job = orchestrator.acquire_query(&query.join(" "), cli.name).await;
            report_job(&job)
        }
        Command::Id { video_id } => {
            let job = orchestrator.acquire_identifier(&video_id, cli.name).await;
            report_job(&job)
        }
        Command::Playlist { reference, jobs } => {
            let report = PlaylistResolver::new(&orchestrator)
                .with_concurrency(jobs)
                .resolve(&reference)
                .await
                .context("Failed to list playlist")?;
            report_batch(&report)
        }
        Command::Wanted { all_tracks } => {
            let lidarr = toml_config
                .lidarr
                .as_ref()
                .context("No [lidarr] section in the configuration")?;
            let queries = LidarrClient::new(lidarr)?
                .with_unique_tracks(!all_tracks)
                .wanted_queries()
                .await
                .context("Failed to read the Lidarr wanted list")?;
            info!(releases = queries.len(), "Wanted list loaded");
            let items = queries.into_iter().map(BatchItem::Query).collect();
            let report = run_batch(&orchestrator, "lidarr wanted", items, 1).await;
            report_batch(&report)
        }
        Command::Rank { query, json } => rank(&orchestrator, &query.join(" "), json).await?,
    };

    drop(orchestrator);
    let _ = printer.await;

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// RUST_LOG → --verbose → TOML level → info
fn init_tracing(verbose: bool, toml_config: &TomlConfig) {
    let fallback = if verbose {
        "debug".to_string()
    } else {
        toml_config.logging.level.clone()
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn print_events(mut rx: mpsc::Receiver<JobEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            JobEvent::StageStarted { stage, .. } => eprintln!("  {}...", stage),
            JobEvent::StageFinished {
                stage,
                status,
                detail,
                ..
            } => eprintln!("  {} [{}] {}", stage, status, detail),
            JobEvent::JobFinished { .. } => {}
        }
    }
}

fn report_job(job: &AcquisitionJob) -> bool {
    println!("{}", job.summary());
    for warning in job.warnings() {
        println!("  warning: {}", warning.detail);
    }
    job.succeeded()
}

fn report_batch(report: &BatchReport) -> bool {
    for job in &report.jobs {
        report_job(job);
    }
    println!(
        "{}: {} succeeded, {} failed",
        report.source, report.succeeded, report.failed
    );
    report.all_succeeded()
}

async fn rank(orchestrator: &Orchestrator, query: &str, json: Option<PathBuf>) -> Result<bool> {
    let selection = orchestrator.rank(query).await.context("Search failed")?;

    for evaluation in selection.ranked() {
        println!(
            "{:>7.2}  {}  {} ({})",
            evaluation.outcome.score,
            evaluation.candidate.id,
            evaluation.candidate.title,
            evaluation.candidate.channel
        );
        println!("{}", format_trace_table(&evaluation.outcome.trace));
    }

    match &selection.best {
        Some(best) => println!("Best: '{}' ({}) score {:.2}", best.candidate.title, best.candidate.id, best.score),
        None => println!("No viable match for '{}'", query),
    }

    if let Some(path) = json {
        let body = serde_json::to_string_pretty(&selection)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Ranking written");
    }

    Ok(selection.is_match())
}
