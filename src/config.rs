//! Run configuration.
//!
//! A [`RunConfig`] is built once from the command line and handed by
//! reference to every stage of the pipeline. Path derivation follows the
//! directory layout the dispersion model writes:
//!
//! ```text
//! {met}/{date}_{model}_{target}/{model}_{date}_{target}.nc
//! {pollutant}/{date}_{model}_{target}/nc_nh3/*.nc
//! {pollutant}/{date}_{model}_{target}/nc_co/*.nc
//! {info}/addresses_code_{target}.csv
//! {output}/{date}/{model}/
//! ```

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::error::RunError;

/// Model family that produced the forecast run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Klaps,
    Rdaps,
}

impl Model {
    /// Number of forecast timesteps one run of this model produces.
    pub fn horizon(self) -> usize {
        match self {
            Model::Klaps => 13,
            Model::Rdaps => 49,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Model::Klaps => "klaps",
            Model::Rdaps => "rdaps",
        }
    }
}

impl FromStr for Model {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "klaps" => Ok(Model::Klaps),
            "rdaps" => Ok(Model::Rdaps),
            other => Err(RunError::UnknownModel(other.to_string())),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracked pollutant species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Nh3,
    Co,
}

impl Species {
    pub const ALL: [Species; 2] = [Species::Nh3, Species::Co];

    /// Column name used in both output tables.
    pub fn column(self) -> &'static str {
        match self {
            Species::Nh3 => "NH3",
            Species::Co => "CO",
        }
    }

    /// Subdirectory holding this species' per-timestep grids.
    pub fn dir_name(self) -> &'static str {
        match self {
            Species::Nh3 => "nc_nh3",
            Species::Co => "nc_co",
        }
    }

    /// Concentration variable inside the grid file.
    pub fn variable(self) -> &'static str {
        match self {
            Species::Nh3 => "NH3",
            // The dispersion model writes the CO run under its generic tracer name.
            Species::Co => "OU",
        }
    }
}

/// Built-in single-region filters, keyed by target region.
static DEFAULT_REGION_FILTERS: &[(&str, &str)] = &[("ns", "논산시")];

/// Maps target region identifiers to the city/county name the summary is
/// restricted to.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "ns": "논산시"
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RegionFilterConfig {
    entries: HashMap<String, String>,
}

impl RegionFilterConfig {
    /// Loads the table from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let entries: HashMap<String, String> = serde_json::from_str(&content)?;
        Ok(Self { entries })
    }

    /// Returns the city/county filter for `target`, if one is configured.
    pub fn get(&self, target: &str) -> Option<&str> {
        self.entries.get(target).map(String::as_str)
    }
}

impl Default for RegionFilterConfig {
    fn default() -> Self {
        Self {
            entries: DEFAULT_REGION_FILTERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Parameters of one pipeline run. Built once, then shared by reference.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Base time tag of the run, e.g. `2024091121`.
    pub date: String,
    /// Target region identifier, e.g. `ns`.
    pub target: String,
    pub model: Model,
    pub met_dir: PathBuf,
    pub pollutant_dir: PathBuf,
    pub info_dir: PathBuf,
    pub output_dir: PathBuf,
    /// City/county name the joined table is restricted to.
    pub city_filter: Option<String>,
}

impl RunConfig {
    pub fn new(
        date: impl Into<String>,
        target: impl Into<String>,
        model: Model,
        met_dir: impl Into<PathBuf>,
        pollutant_dir: impl Into<PathBuf>,
        info_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            date: date.into(),
            target: target.into(),
            model,
            met_dir: met_dir.into(),
            pollutant_dir: pollutant_dir.into(),
            info_dir: info_dir.into(),
            output_dir: output_dir.into(),
            city_filter: None,
        }
    }

    /// Sets the single-region filter from the filter table for this target.
    pub fn with_filters(mut self, filters: &RegionFilterConfig) -> Self {
        self.city_filter = filters.get(&self.target).map(str::to_string);
        self
    }

    pub fn with_city_filter(mut self, city: Option<String>) -> Self {
        self.city_filter = city;
        self
    }

    /// `{date}_{model}_{target}`, the per-run folder name on both model sides.
    pub fn run_folder(&self) -> String {
        format!("{}_{}_{}", self.date, self.model, self.target)
    }

    pub fn met_file(&self) -> PathBuf {
        self.met_dir.join(self.run_folder()).join(format!(
            "{}_{}_{}.nc",
            self.model, self.date, self.target
        ))
    }

    pub fn species_dir(&self, species: Species) -> PathBuf {
        self.pollutant_dir
            .join(self.run_folder())
            .join(species.dir_name())
    }

    pub fn region_file(&self) -> PathBuf {
        self.info_dir
            .join(format!("addresses_code_{}.csv", self.target))
    }

    /// Directory receiving both CSV tables and the run log.
    pub fn run_output_dir(&self) -> PathBuf {
        self.output_dir.join(&self.date).join(self.model.as_str())
    }

    pub fn log_file_name(&self) -> String {
        format!("calpuff_process_{}_{}.log", self.date, self.model)
    }

    /// Checks every input the run needs before any timestep is touched.
    pub fn check_inputs(&self) -> Result<(), RunError> {
        for species in Species::ALL {
            let dir = self.species_dir(species);
            if !dir.is_dir() {
                return Err(RunError::MissingDirectory(dir));
            }
        }
        for file in [self.met_file(), self.region_file()] {
            if !file.is_file() {
                return Err(RunError::MissingFile(file));
            }
        }
        info!(
            nh3_dir = %self.species_dir(Species::Nh3).display(),
            co_dir = %self.species_dir(Species::Co).display(),
            met_file = %self.met_file().display(),
            region_file = %self.region_file().display(),
            "Input paths verified"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunConfig {
        RunConfig::new(
            "2024091121",
            "ns",
            Model::Rdaps,
            "/met",
            "/puff",
            "/info",
            "/out",
        )
    }

    #[test]
    fn test_model_horizon() {
        assert_eq!("klaps".parse::<Model>().unwrap().horizon(), 13);
        assert_eq!("rdaps".parse::<Model>().unwrap().horizon(), 49);
        assert!("gfs".parse::<Model>().is_err());
    }

    #[test]
    fn test_derived_paths() {
        let cfg = sample();
        assert_eq!(
            cfg.met_file(),
            PathBuf::from("/met/2024091121_rdaps_ns/rdaps_2024091121_ns.nc")
        );
        assert_eq!(
            cfg.species_dir(Species::Co),
            PathBuf::from("/puff/2024091121_rdaps_ns/nc_co")
        );
        assert_eq!(
            cfg.region_file(),
            PathBuf::from("/info/addresses_code_ns.csv")
        );
        assert_eq!(cfg.run_output_dir(), PathBuf::from("/out/2024091121/rdaps"));
        assert_eq!(cfg.log_file_name(), "calpuff_process_2024091121_rdaps.log");
    }

    #[test]
    fn test_default_filter_table() {
        let cfg = sample().with_filters(&RegionFilterConfig::default());
        assert_eq!(cfg.city_filter.as_deref(), Some("논산시"));

        let mut other = sample();
        other.target = "jb".to_string();
        let other = other.with_filters(&RegionFilterConfig::default());
        assert_eq!(other.city_filter, None);
    }

    #[test]
    fn test_filter_table_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filters.json");
        std::fs::write(&path, r#"{"jb": "전주시"}"#).unwrap();

        let filters = RegionFilterConfig::load(&path).unwrap();
        assert_eq!(filters.get("jb"), Some("전주시"));
        assert_eq!(filters.get("ns"), None);
    }

    #[test]
    fn test_check_inputs_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig::new(
            "2024091121",
            "ns",
            Model::Klaps,
            dir.path(),
            dir.path(),
            dir.path(),
            dir.path(),
        );
        match cfg.check_inputs() {
            Err(RunError::MissingDirectory(p)) => assert!(p.ends_with("nc_nh3")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
