//! `leadgen` command line: submit, inspect and export lead generation jobs,
//! or run the orchestrator loop.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use leadgen::error::ValidationError;
use leadgen::logging::init_logging;
use leadgen::{
    resolve_config, ExportFormat, Intensity, JobRequest, JobService, JobStatus, LeadgenError,
    Platform,
};

#[derive(Parser)]
#[command(name = "leadgen")]
#[command(about = "Lead generation job engine")]
struct Cli {
    /// Path to a leadgen.json config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job and process it right away, printing progress
    Run {
        #[arg(long)]
        industry: String,
        #[arg(long)]
        location: String,
        #[arg(long, default_value_t = 25)]
        radius: u32,
        #[arg(long, default_value_t = 100)]
        max_results: u32,
        /// Comma separated
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        #[arg(long)]
        job_title: Option<String>,
        /// Comma separated platform names
        #[arg(long, value_delimiter = ',', default_value = "google_maps")]
        platforms: Vec<String>,
        #[arg(long, default_value = "standard")]
        intensity: String,
        #[arg(long)]
        webhook_url: Option<String>,
    },

    /// Show a job's status
    Status { job_id: String },

    /// Show a job's leads, newest first
    Results {
        job_id: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Export a job's leads as CSV or JSON
    Export {
        job_id: String,
        #[arg(long, default_value = "csv")]
        format: String,
        /// Leave out per-platform enrichment payloads
        #[arg(long)]
        no_enrichment: bool,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List jobs
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Cancel a queued or processing job
    Cancel { job_id: String },

    /// System statistics
    Stats {
        /// Also print per-day rows from this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
    },

    /// Delete finished jobs older than the given number of days
    Cleanup {
        #[arg(long)]
        days: Option<u32>,
    },

    /// Run the orchestrator until Ctrl-C
    Serve,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), LeadgenError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_platforms(values: &[String]) -> Result<Vec<Platform>, ValidationError> {
    values
        .iter()
        .map(|v| v.trim().parse::<Platform>().map_err(ValidationError::from))
        .collect()
}

async fn execute(cli: Cli) -> Result<(), LeadgenError> {
    let config = resolve_config(cli.config.as_deref())?;
    init_logging(&config.logging);
    let service = JobService::from_config(&config)?;

    match cli.command {
        Commands::Run {
            industry,
            location,
            radius,
            max_results,
            keywords,
            job_title,
            platforms,
            intensity,
            webhook_url,
        } => {
            let request = JobRequest {
                industry,
                location,
                radius,
                max_results,
                keywords,
                job_title,
                platforms: parse_platforms(&platforms)?,
                intensity: intensity.parse::<Intensity>().map_err(ValidationError::from)?,
                webhook_url,
            };
            let submitted = service.submit(request)?;
            print_json(&submitted)?;

            let mut events = service.broadcaster().subscribe();
            let job_id = submitted.job_id.clone();
            let printer = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    if event.job_id != job_id {
                        continue;
                    }
                    println!("[{:>3}%] {:<18} {}", event.progress, event.stage.to_string(), event.message);
                    if event.status.is_terminal() {
                        break;
                    }
                }
            });

            let outcome = service.orchestrator().process_job(&submitted.job_id).await;
            printer.abort();
            outcome?;
            print_json(&service.status(&submitted.job_id)?)?;
        }
        Commands::Status { job_id } => print_json(&service.status(&job_id)?)?,
        Commands::Results {
            job_id,
            offset,
            limit,
        } => print_json(&service.results(&job_id, offset, limit)?)?,
        Commands::Export {
            job_id,
            format,
            no_enrichment,
            output,
        } => {
            let format = format.parse::<ExportFormat>().map_err(ValidationError::from)?;
            let export = service.export(&job_id, format, !no_enrichment)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &export.content)?;
                    eprintln!(
                        "Wrote {} records ({} bytes) to {}",
                        export.record_count,
                        export.size_bytes,
                        path.display()
                    );
                }
                None => std::io::stdout().write_all(&export.content)?,
            }
        }
        Commands::List {
            status,
            offset,
            limit,
        } => {
            let status = status
                .map(|s| s.parse::<JobStatus>().map_err(ValidationError::from))
                .transpose()?;
            print_json(&service.list(status, offset, limit)?)?;
        }
        Commands::Cancel { job_id } => print_json(&service.cancel(&job_id)?)?,
        Commands::Stats { since } => {
            print_json(&service.stats()?)?;
            if since.is_some() {
                print_json(&service.daily_stats(since.as_deref(), None)?)?;
            }
        }
        Commands::Cleanup { days } => print_json(&service.cleanup(days)?)?,
        Commands::Serve => {
            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl-C received, stopping");
                }
                signal.cancel();
            });
            service.orchestrator().run(shutdown).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error ({}): {e}", e.status_code());
            ExitCode::FAILURE
        }
    }
}
