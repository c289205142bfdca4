//! CLI entry point for the CALPUFF index tool.
//!
//! `run` turns one forecast run's pollutant and meteorology grids into the
//! per-village graded summary. `download` fetches the upstream NWP GRIB2
//! files from the KMA API hub.

use anyhow::{Context, Result};
use calpuff_index::{
    config::{Model, RegionFilterConfig, RunConfig},
    download::{
        AUTH_PARAM, DEFAULT_FIRST_HOUR, DEFAULT_LAST_HOUR, DEFAULT_PREFIX, DownloadPlan,
        REQUEST_TIMEOUT, download_all,
    },
    fetch::{BasicClient, auth::UrlParam},
    grid::dataset::NetcdfOpener,
    output::log_json,
    pipeline::runner::run,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "calpuff_index")]
#[command(about = "Village-level pollution index from CALPUFF and CALMET grids", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one forecast run into detail and summary tables
    Run {
        /// Base time of the run (e.g. 2024091121)
        date: String,

        /// Target region identifier (e.g. ns)
        target: String,

        /// Model family: klaps or rdaps
        model: Model,

        /// Root of the meteorology runs
        met_dir: PathBuf,

        /// Root of the pollutant runs
        pollutant_dir: PathBuf,

        /// Directory holding addresses_code_{target}.csv
        info_dir: PathBuf,

        /// Root of the output tree
        output_dir: PathBuf,

        /// Restrict the summary to this city/county name
        #[arg(long)]
        city: Option<String>,

        /// JSON file mapping target regions to city/county filters
        #[arg(long)]
        region_filters: Option<PathBuf>,
    },
    /// Download NWP GRIB2 forecast files from the KMA API hub
    Download {
        /// Base time of the forecast (YYYYMMDDHH)
        #[arg(short, long)]
        date: String,

        /// File name prefix
        #[arg(short, long, default_value = DEFAULT_PREFIX)]
        prefix: String,

        /// First forecast hour
        #[arg(long, default_value_t = DEFAULT_FIRST_HOUR)]
        start: u32,

        /// Last forecast hour (inclusive)
        #[arg(long, default_value_t = DEFAULT_LAST_HOUR)]
        end: u32,

        /// Directory to save files into
        #[arg(short, long, default_value = "grib")]
        output_dir: PathBuf,

        /// API hub key (falls back to KMA_AUTH_KEY)
        #[arg(long)]
        auth_key: Option<String>,
    },
}

/// Colored stderr plus a JSON log file written through `appender`.
fn init_logging(appender: RollingFileAppender) -> WorkerGuard {
    let (non_blocking_file, guard) = tracing_appender::non_blocking(appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            date,
            target,
            model,
            met_dir,
            pollutant_dir,
            info_dir,
            output_dir,
            city,
            region_filters,
        } => {
            let filters = match &region_filters {
                Some(path) => RegionFilterConfig::load(path)
                    .with_context(|| format!("loading region filters from {}", path.display()))?,
                None => RegionFilterConfig::default(),
            };
            let mut config = RunConfig::new(
                date,
                target,
                model,
                met_dir,
                pollutant_dir,
                info_dir,
                output_dir,
            )
            .with_filters(&filters);
            if city.is_some() {
                config = config.with_city_filter(city);
            }

            // The run log lives next to the tables it describes.
            let log_dir = config.run_output_dir();
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("creating {}", log_dir.display()))?;
            let _file_guard =
                init_logging(tracing_appender::rolling::never(&log_dir, config.log_file_name()));

            info!(
                city_filter = config.city_filter.as_deref().unwrap_or("-"),
                "Configuration loaded"
            );

            match run(&config, &NetcdfOpener) {
                Ok(outcome) => {
                    info!(
                        processed = outcome.processed(),
                        groups = outcome.groups,
                        "Run finished"
                    );
                    log_json(&outcome)?;
                }
                Err(e) => {
                    error!(error = %e, "Run failed");
                    return Err(e);
                }
            }
        }
        Commands::Download {
            date,
            prefix,
            start,
            end,
            output_dir,
            auth_key,
        } => {
            let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
            let _file_guard =
                init_logging(tracing_appender::rolling::daily(log_dir, "calpuff_download.log"));

            let auth_key = auth_key
                .or_else(|| std::env::var("KMA_AUTH_KEY").ok())
                .context("no API key: pass --auth-key or set KMA_AUTH_KEY")?;
            let client = UrlParam::new(
                BasicClient::with_timeout(REQUEST_TIMEOUT)?,
                AUTH_PARAM,
                auth_key,
            );

            let plan = DownloadPlan {
                prefix,
                hours: start..=end,
                ..DownloadPlan::new(date, output_dir)
            };
            let summary = download_all(&client, &plan).await?;
            log_json(&summary)?;
        }
    }

    Ok(())
}
