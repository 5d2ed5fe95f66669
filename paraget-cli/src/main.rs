//! Paraget CLI - command-line front-end for the download engine.
//!
//! All engine interaction goes through `DownloadConfig` and the event bus;
//! rendering stays on this side of that boundary.

mod error;
mod renderer;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use paraget::{DownloadConfig, Downloader};

use crate::error::CliError;
use crate::renderer::ProgressRenderer;

#[derive(Debug, Parser)]
#[command(name = "paraget", version, about = "Concurrent HTTP file downloader")]
struct Args {
    /// URLs to download (duplicates are removed)
    #[arg(required = true)]
    urls: Vec<String>,

    /// Output directory for downloaded files (created if missing)
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Maximum number of parallel downloads
    #[arg(long, default_value_t = 5)]
    parallel: usize,

    /// Additional attempts after a connection timeout
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// HTTP timeout in seconds (fractions allowed)
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,

    /// Disable the progress bar (lifecycle events still fire)
    #[arg(long)]
    no_progress: bool,

    /// Skip the summary report after a batch
    #[arg(long)]
    no_report: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn to_config(&self) -> DownloadConfig {
        DownloadConfig::new()
            .with_parallel_downloads(self.parallel)
            .with_retry_count(self.retries)
            .with_timeout(Duration::from_secs_f64(self.timeout))
            .with_no_progress(self.no_progress)
            .with_bulk_download_report(!self.no_report)
            .with_verbose(!self.quiet)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {}", style("error:").red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

/// Number of failed transfers on success.
fn run(args: &Args) -> Result<usize, CliError> {
    let downloader = Downloader::new(args.to_config())?;

    let _renderer = if args.no_progress {
        None
    } else {
        Some(ProgressRenderer::attach(&downloader.events()))
    };

    let cancel = downloader.cancel_handle();
    ctrlc::set_handler(move || cancel.cancel()).map_err(|e| CliError::Setup(e.to_string()))?;

    if let [url] = args.urls.as_slice() {
        let done = downloader.download(url, &args.output)?;
        if !args.quiet {
            println!(
                "{} {} ({})",
                style("downloaded").green(),
                done.path.display(),
                paraget::format_bytes(done.bytes)
            );
        }
        return Ok(0);
    }

    let report = downloader.download_list(&args.urls, &args.output)?;

    if !args.quiet && !args.no_report {
        println!(
            "{} {} of {} files ({})",
            style("downloaded").green(),
            report.succeeded.len(),
            report.total(),
            paraget::format_bytes(report.downloaded_bytes)
        );
        for failure in &report.failed {
            println!(
                "{} {}: {}",
                style("failed").red(),
                failure.url,
                failure.error
            );
        }
    }

    Ok(report.failed.len())
}

/// Logs go to stderr so they interleave less with the progress bar; the
/// filter honors `RUST_LOG` when set.
fn init_tracing(args: &Args) {
    let default = if args.quiet {
        "paraget=warn"
    } else {
        "paraget=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
