//! Drives one run from the raw grids to the two CSV tables.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::config::{RunConfig, Species};
use crate::error::RunError;
use crate::grid::dataset::DatasetOpener;
use crate::grid::flatten::valid_time_tag;
use crate::grid::matcher::match_grid_files;
use crate::output::{read_detail, write_detail, write_summary};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::assemble::{TimestepOutcome, assemble_run};
use crate::pipeline::grade::classify;
use crate::pipeline::region::{join_regions, load_region_lookup};

/// What a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub model: String,
    pub date: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub timesteps: Vec<TimestepOutcome>,
    pub detail_rows: usize,
    pub joined_rows: usize,
    pub groups: usize,
    pub detail_path: PathBuf,
    pub summary_path: PathBuf,
}

impl RunOutcome {
    pub fn processed(&self) -> usize {
        self.timesteps.iter().filter(|t| t.is_processed()).count()
    }
}

/// `{model}_{first}_{last}_index_{suffix}.csv`, tagged with the valid times
/// of the first and last matched files.
pub fn output_file_name(config: &RunConfig, files: &[String], suffix: &str) -> String {
    let tag = |name: Option<&String>| {
        name.and_then(|n| valid_time_tag(n))
            .unwrap_or_default()
            .to_string()
    };
    format!(
        "{}_{}_{}_index_{}.csv",
        config.model,
        tag(files.first()),
        tag(files.last()),
        suffix
    )
}

/// Runs the whole pipeline for `config`, reading rasters through `opener`.
///
/// Individual timesteps that fail are skipped. Missing inputs, an empty
/// file match, a run where every timestep failed, and any write failure
/// are fatal.
#[instrument(skip_all, fields(date = %config.date, model = %config.model, target = %config.target))]
pub fn run<O: DatasetOpener>(config: &RunConfig, opener: &O) -> Result<RunOutcome> {
    let started_at = Utc::now();
    info!("Run started");

    config.check_inputs()?;

    let nh3_dir = config.species_dir(Species::Nh3);
    let co_dir = config.species_dir(Species::Co);
    let files = match_grid_files(&nh3_dir, &co_dir, config.model.horizon())?;
    if files.is_empty() {
        return Err(RunError::NoCommonFiles(nh3_dir, co_dir).into());
    }

    let regions = load_region_lookup(&config.region_file())?;

    let met_path = config.met_file();
    let met = match opener.open(&met_path) {
        Ok(ds) => Some(ds),
        Err(e) => {
            error!(path = %met_path.display(), error = %e, "Meteorology unavailable, continuing without it");
            None
        }
    };

    let acc = assemble_run(config, opener, met.as_ref(), &files);
    drop(met);

    if acc.records().is_empty() {
        return Err(RunError::NoData {
            skipped: acc.skipped(),
        }
        .into());
    }
    let (records, timesteps) = acc.into_parts();

    let out_dir = config.run_output_dir();
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let detail_path = out_dir.join(output_file_name(config, &files, "data"));
    write_detail(&detail_path, &records)?;
    info!(path = %detail_path.display(), rows = records.len(), "Detail table written");
    let detail_rows = records.len();
    drop(records);

    // Later stages read the persisted table so they see exactly what was written.
    let cells = read_detail(&detail_path)?;

    let joined = join_regions(&cells, &regions, config.city_filter.as_deref());
    let joined_rows = joined.len();

    let summary: Vec<_> = aggregate(&joined).into_iter().map(classify).collect();
    let summary_path = out_dir.join(output_file_name(config, &files, "li"));
    write_summary(&summary_path, &summary)?;
    info!(path = %summary_path.display(), rows = summary.len(), "Summary table written");

    Ok(RunOutcome {
        model: config.model.to_string(),
        date: config.date.clone(),
        target: config.target.clone(),
        started_at,
        timesteps,
        detail_rows,
        joined_rows,
        groups: summary.len(),
        detail_path,
        summary_path,
    })
}
