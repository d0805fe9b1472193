//! Rewind main entry point
//!
//! This is the command-line interface for the Rewind web archiver.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rewind::config::{load_config_with_hash, Config};
use rewind::output::{load_statistics, print_jobs, print_sites, print_statistics};
use rewind::storage::open_storage;
use rewind::{Archiver, JobStatus, ResourceStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Rewind: a personal time-travel web archiver
///
/// Rewind captures a bounded part of one website into a local SQLite
/// database and replays any captured snapshot offline.
#[derive(Parser, Debug)]
#[command(name = "rewind")]
#[command(version)]
#[command(about = "A personal time-travel web archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive a site starting from a seed URL
    Archive {
        /// Seed URL (http or https)
        url: String,

        /// Maximum number of distinct URLs to fetch
        #[arg(long)]
        pages: Option<u32>,

        /// Number of concurrent workers
        #[arg(long)]
        workers: Option<u32>,
    },

    /// Replay one archived resource
    Render {
        /// Job ID
        job: i64,

        /// Original URL of the resource
        url: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List archived sites, or the jobs of one host
    Jobs {
        /// Host to list jobs for
        host: Option<String>,
    },

    /// Show statistics for a job
    Stats {
        /// Job ID
        job: i64,
    },

    /// Delete a job and everything it captured
    Delete {
        /// Job ID
        job: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_deref())?;
    let store: Arc<dyn ResourceStore> = Arc::new(
        open_storage(Path::new(&config.output.database_path)).with_context(|| {
            format!("Failed to open database {}", config.output.database_path)
        })?,
    );

    let result = match cli.command {
        Command::Archive {
            url,
            pages,
            workers,
        } => handle_archive(store, config, &url, pages, workers).await,
        Command::Render { job, url, output } => {
            handle_render(store, config, job, &url, output.as_deref())
        }
        Command::Jobs { host } => handle_jobs(store.as_ref(), host.as_deref()),
        Command::Stats { job } => handle_stats(store.as_ref(), job),
        Command::Delete { job } => handle_delete(store.as_ref(), job),
    };

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rewind=info,warn"),
            1 => EnvFilter::new("rewind=debug,info"),
            2 => EnvFilter::new("rewind=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or the defaults when none is given
fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        tracing::info!("Loading configuration from: {}", path.display());
    }

    let (config, hash) = load_config_with_hash(path).context("Failed to load configuration")?;
    match hash {
        Some(hash) => tracing::info!("Configuration loaded successfully (hash: {})", hash),
        None => tracing::debug!("No configuration file given, using defaults"),
    }
    Ok(config)
}

/// Runs one archive job to completion; Ctrl-C cancels it
async fn handle_archive(
    store: Arc<dyn ResourceStore>,
    config: Config,
    url: &str,
    pages: Option<u32>,
    workers: Option<u32>,
) -> anyhow::Result<()> {
    let pages = pages.unwrap_or(config.crawler.page_budget);
    let workers = workers.unwrap_or(config.crawler.workers);

    let archiver = Archiver::new(store, config);
    let handle = archiver
        .start_archive(url, pages, workers)
        .with_context(|| format!("Cannot archive {}", url))?;
    let job_id = handle.job_id();

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling job {}", job_id);
            cancel.cancel();
        }
    });

    let status = handle.wait().await?;
    let job = archiver.store().get_job(job_id)?;
    let pages = job.map(|j| j.page_count).unwrap_or(0);

    println!("Job {} {}: {} resources stored", job_id, status, pages);
    if status != JobStatus::Completed {
        bail!("Job {} did not complete", job_id);
    }
    Ok(())
}

/// Replays one resource to stdout or a file
fn handle_render(
    store: Arc<dyn ResourceStore>,
    config: Config,
    job: i64,
    url: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    use std::io::Write;

    let archiver = Archiver::new(store, config);
    let rendered = archiver.render_archived_page(job, url)?;
    tracing::info!(
        "{} ({}, status {})",
        rendered.link,
        rendered.content_type,
        rendered
            .status_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    match output {
        Some(path) => std::fs::write(path, &rendered.body)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => std::io::stdout().write_all(&rendered.body)?,
    }

    let neighbors = archiver.neighbors(job)?;
    if let Some(older) = neighbors.older {
        tracing::info!("Older snapshot: job {}", older);
    }
    if let Some(newer) = neighbors.newer {
        tracing::info!("Newer snapshot: job {}", newer);
    }

    Ok(())
}

/// Lists archived sites, or the jobs of one host
fn handle_jobs(store: &dyn ResourceStore, host: Option<&str>) -> anyhow::Result<()> {
    match host {
        Some(host) => print_jobs(host, &store.list_jobs_for_host(host)?),
        None => print_sites(&store.list_archived_sites()?),
    }
    Ok(())
}

/// Shows statistics for one job
fn handle_stats(store: &dyn ResourceStore, job: i64) -> anyhow::Result<()> {
    let stats = load_statistics(store, job)?;
    print_statistics(&stats);
    Ok(())
}

/// Deletes one job
fn handle_delete(store: &dyn ResourceStore, job: i64) -> anyhow::Result<()> {
    if !store.delete_job(job)? {
        bail!("No job {}", job);
    }
    println!("Deleted job {}", job);
    Ok(())
}
