//! Reads one timestep of pollutant grids and flattens it into cell rows.
//!
//! Row order is defined by [`Mesh`]: linear index `i` is the cell at row
//! `i / nx`, column `i % nx`. Every 2-D field is read at that explicit
//! `(row, col)` rather than by zipping independently flattened arrays.

use chrono::NaiveDate;
use ndarray::Array2;

use crate::config::Species;
use crate::error::{GridError, GridResult};
use crate::grid::dataset::GridDataset;
use crate::pipeline::types::CellRecord;

/// Date and hour stamped on every row of a timestep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTime {
    /// `YYYYMMDD`
    pub date: String,
    /// `HH`
    pub hour: String,
}

/// Parses the valid time out of `{model}_{base}_{valid}_{region}.nc`.
///
/// The third underscore-separated part is an 8-digit date immediately
/// followed by a 2-digit hour.
pub fn parse_valid_time(file_name: &str) -> GridResult<ValidTime> {
    let stem = file_name.strip_suffix(".nc").unwrap_or(file_name);
    let bad = || GridError::FileName(file_name.to_string());

    let stamp = stem.split('_').nth(2).ok_or_else(bad)?;
    if stamp.len() != 10 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let (date, hour) = stamp.split_at(8);
    NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| bad())?;

    Ok(ValidTime {
        date: date.to_string(),
        hour: hour.to_string(),
    })
}

/// Second-to-last underscore part of a grid file name, used to tag output
/// files (`rdaps_2024091121_2024091201_jb.nc` gives `2024091201`).
pub fn valid_time_tag(file_name: &str) -> Option<&str> {
    file_name.rsplit('_').nth(1)
}

/// Coordinate mesh built from the 1-D `x` and `y` axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Mesh {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self { x, y }
    }

    /// `(rows, cols)`, i.e. `(len(y), len(x))`.
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    pub fn len(&self) -> usize {
        self.x.len() * self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(row, col)` of linear index `i`.
    pub fn position(&self, i: usize) -> (usize, usize) {
        let nx = self.x.len();
        (i / nx, i % nx)
    }

    /// `(x, y)` coordinates of linear index `i`.
    pub fn coordinates(&self, i: usize) -> (f64, f64) {
        let (row, col) = self.position(i);
        (self.x[col], self.y[row])
    }

    /// Errors unless `field` has the mesh's shape.
    pub fn check(&self, name: &str, field: &Array2<f64>) -> GridResult<()> {
        if field.dim() != self.shape() {
            return Err(GridError::ShapeMismatch {
                left: name.to_string(),
                left_shape: field.dim(),
                right: "x/y mesh".to_string(),
                right_shape: self.shape(),
            });
        }
        Ok(())
    }
}

/// One forecast valid time of both pollutant grids.
#[derive(Debug, Clone)]
pub struct GridTimestep {
    /// Position within the run, also the time index into the meteorology.
    pub index: usize,
    pub valid: ValidTime,
    pub mesh: Mesh,
    pub lat: Array2<f64>,
    pub lon: Array2<f64>,
    pub nh3: Array2<f64>,
    pub co: Array2<f64>,
}

impl GridTimestep {
    /// Reads a timestep from the two species files.
    ///
    /// Coordinates (`lat`, `lon`, `x`, `y`) are taken from the NH3 file; the
    /// species grids share them. Concentrations are stored as
    /// `(time, level, y, x)` with singleton leading dimensions.
    pub fn read<D: GridDataset>(
        index: usize,
        file_name: &str,
        nh3: &D,
        co: &D,
    ) -> GridResult<Self> {
        let valid = parse_valid_time(file_name)?;
        let mesh = Mesh::new(nh3.axis("x")?, nh3.axis("y")?);

        let timestep = Self {
            index,
            valid,
            lat: nh3.plane("lat", &[])?,
            lon: nh3.plane("lon", &[])?,
            nh3: nh3.plane(Species::Nh3.variable(), &[0, 0])?,
            co: co.plane(Species::Co.variable(), &[0, 0])?,
            mesh,
        };

        timestep.mesh.check("lat", &timestep.lat)?;
        timestep.mesh.check("lon", &timestep.lon)?;
        timestep.mesh.check(Species::Nh3.column(), &timestep.nh3)?;
        timestep.mesh.check(Species::Co.column(), &timestep.co)?;
        Ok(timestep)
    }

    /// One row per grid cell, meteorology left empty.
    pub fn flatten(&self) -> Vec<CellRecord> {
        (0..self.mesh.len())
            .map(|i| {
                let (x, y) = self.mesh.coordinates(i);
                let cell = self.mesh.position(i);
                CellRecord {
                    date: self.valid.date.clone(),
                    time: self.valid.hour.clone(),
                    x,
                    y,
                    lat: self.lat[cell],
                    lon: self.lon[cell],
                    nh3: present(self.nh3[cell]),
                    co: present(self.co[cell]),
                    temperature: None,
                    relative_humidity: None,
                    wind_speed: None,
                    wind_direction: None,
                }
            })
            .collect()
    }
}

/// `NaN` marks a missing cell.
pub fn present(v: f64) -> Option<f64> {
    if v.is_nan() { None } else { Some(v) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::dataset::MemoryDataset;

    #[test]
    fn test_parse_valid_time() {
        let t = parse_valid_time("rdaps_2024091121_2024091201_jb.nc").unwrap();
        assert_eq!(t.date, "20240912");
        assert_eq!(t.hour, "01");
    }

    #[test]
    fn test_parse_valid_time_rejects_bad_names() {
        assert!(parse_valid_time("rdaps_2024091121.nc").is_err());
        assert!(parse_valid_time("rdaps_2024091121_20240912_jb.nc").is_err());
        assert!(parse_valid_time("rdaps_2024091121_2024139901_jb.nc").is_err());
    }

    #[test]
    fn test_valid_time_tag() {
        assert_eq!(
            valid_time_tag("klaps_2024091203_2024091215_ns.nc"),
            Some("2024091215")
        );
        assert_eq!(valid_time_tag("plain.nc"), None);
    }

    #[test]
    fn test_mesh_is_row_major() {
        let mesh = Mesh::new(vec![10.0, 20.0, 30.0], vec![1.0, 2.0]);
        assert_eq!(mesh.shape(), (2, 3));
        let coords: Vec<_> = (0..mesh.len()).map(|i| mesh.coordinates(i)).collect();
        assert_eq!(
            coords,
            vec![
                (10.0, 1.0),
                (20.0, 1.0),
                (30.0, 1.0),
                (10.0, 2.0),
                (20.0, 2.0),
                (30.0, 2.0),
            ]
        );
    }

    fn species_file(var: &str, values: Vec<f64>) -> MemoryDataset {
        MemoryDataset::new()
            .with_variable("x", &[2], vec![100.0, 101.0])
            .with_variable("y", &[2], vec![200.0, 201.0])
            .with_variable("lat", &[2, 2], vec![36.0, 36.0, 36.1, 36.1])
            .with_variable("lon", &[2, 2], vec![127.0, 127.1, 127.0, 127.1])
            .with_variable(var, &[1, 1, 2, 2], values)
    }

    #[test]
    fn test_read_and_flatten_pairs_fields_by_cell() {
        let nh3 = species_file("NH3", vec![10.0, 60.0, 150.0, f64::NAN]);
        let co = species_file("OU", vec![5.0, 12.0, 18.0, 25.0]);

        let ts = GridTimestep::read(0, "klaps_2024091203_2024091204_ns.nc", &nh3, &co).unwrap();
        let rows = ts.flatten();

        assert_eq!(rows.len(), 4);
        assert_eq!((rows[1].x, rows[1].y), (101.0, 200.0));
        assert_eq!((rows[1].lat, rows[1].lon), (36.0, 127.1));
        assert_eq!(rows[1].nh3, Some(60.0));
        assert_eq!(rows[2].co, Some(18.0));
        assert_eq!(rows[3].nh3, None);
        assert!(rows.iter().all(|r| r.date == "20240912" && r.time == "04"));
    }

    #[test]
    fn test_read_rejects_mismatched_species_grid() {
        let nh3 = species_file("NH3", vec![0.0; 4]);
        let co = MemoryDataset::new().with_variable("OU", &[1, 1, 3, 2], vec![0.0; 6]);

        let err = GridTimestep::read(0, "klaps_2024091203_2024091204_ns.nc", &nh3, &co)
            .unwrap_err();
        assert!(matches!(err, GridError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_read_missing_species_variable() {
        let nh3 = species_file("NH3", vec![0.0; 4]);
        let co = species_file("CO", vec![0.0; 4]);

        let err = GridTimestep::read(0, "klaps_2024091203_2024091204_ns.nc", &nh3, &co)
            .unwrap_err();
        assert!(matches!(err, GridError::MissingVariable(v) if v == "OU"));
    }
}
