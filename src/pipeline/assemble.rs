//! Builds the per-run cell table one timestep at a time.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{RunConfig, Species};
use crate::error::GridResult;
use crate::grid::dataset::{DatasetOpener, GridDataset};
use crate::grid::flatten::GridTimestep;
use crate::grid::meteorology::{MetFields, MetSample};
use crate::pipeline::types::{CellRecord, XyKey};

/// Result of processing one timestep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TimestepOutcome {
    Processed {
        index: usize,
        file_name: String,
        rows: usize,
    },
    Skipped {
        index: usize,
        file_name: String,
        reason: String,
    },
}

impl TimestepOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, TimestepOutcome::Processed { .. })
    }
}

/// Left-joins meteorology onto pollutant rows by `(X, Y)`.
///
/// Every pollutant row is kept; rows without a meteorological match keep
/// empty meteorology. A key matched by several samples yields one row per
/// sample.
pub fn left_join_meteorology(cells: Vec<CellRecord>, met: &[MetSample]) -> Vec<CellRecord> {
    let mut index: HashMap<XyKey, Vec<&MetSample>> = HashMap::new();
    for sample in met {
        index.entry(XyKey::new(sample.x, sample.y)).or_default().push(sample);
    }

    let mut joined = Vec::with_capacity(cells.len());
    for cell in cells {
        match index.get(&XyKey::new(cell.x, cell.y)) {
            Some(samples) => {
                for sample in samples {
                    joined.push(CellRecord {
                        temperature: sample.temperature,
                        relative_humidity: sample.relative_humidity,
                        wind_speed: sample.wind_speed,
                        wind_direction: sample.wind_direction,
                        ..cell.clone()
                    });
                }
            }
            None => joined.push(cell),
        }
    }
    joined
}

/// Reads, flattens and joins one timestep.
///
/// Both species files are opened here and closed when this returns, on
/// success and on error alike.
pub fn assemble_timestep<O: DatasetOpener>(
    config: &RunConfig,
    opener: &O,
    met: Option<&impl GridDataset>,
    index: usize,
    file_name: &str,
) -> GridResult<Vec<CellRecord>> {
    let nh3 = opener.open(&config.species_dir(Species::Nh3).join(file_name))?;
    let co = opener.open(&config.species_dir(Species::Co).join(file_name))?;

    let timestep = GridTimestep::read(index, file_name, &nh3, &co)?;
    let cells = timestep.flatten();

    match met {
        Some(met) => {
            let samples = MetFields::read(met, index)?.flatten(&timestep.mesh)?;
            Ok(left_join_meteorology(cells, &samples))
        }
        None => Ok(cells),
    }
}

/// Append-only accumulation of cell rows across timesteps.
#[derive(Debug, Default)]
pub struct Accumulator {
    records: Vec<CellRecord>,
    outcomes: Vec<TimestepOutcome>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of one timestep. A failed timestep contributes no
    /// rows.
    pub fn push(&mut self, index: usize, file_name: &str, result: GridResult<Vec<CellRecord>>) {
        let outcome = match result {
            Ok(rows) => {
                let count = rows.len();
                self.records.extend(rows);
                debug!(index, file_name, rows = count, "Timestep appended");
                TimestepOutcome::Processed {
                    index,
                    file_name: file_name.to_string(),
                    rows: count,
                }
            }
            Err(e) => {
                error!(index, file_name, error = %e, "Timestep skipped");
                TimestepOutcome::Skipped {
                    index,
                    file_name: file_name.to_string(),
                    reason: e.to_string(),
                }
            }
        };
        self.outcomes.push(outcome);
    }

    pub fn records(&self) -> &[CellRecord] {
        &self.records
    }

    pub fn outcomes(&self) -> &[TimestepOutcome] {
        &self.outcomes
    }

    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_processed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.processed()
    }

    pub fn into_parts(self) -> (Vec<CellRecord>, Vec<TimestepOutcome>) {
        (self.records, self.outcomes)
    }
}

/// Runs every matched timestep, in order, into an [`Accumulator`].
pub fn assemble_run<O: DatasetOpener>(
    config: &RunConfig,
    opener: &O,
    met: Option<&O::Dataset>,
    files: &[String],
) -> Accumulator {
    let mut acc = Accumulator::new();
    for (index, file_name) in files.iter().enumerate() {
        info!(index, file_name = %file_name, "Processing timestep");
        let result = assemble_timestep(config, opener, met, index, file_name);
        acc.push(index, file_name, result);
    }
    info!(
        processed = acc.processed(),
        skipped = acc.skipped(),
        rows = acc.records().len(),
        "Timesteps assembled"
    );
    acc
}
