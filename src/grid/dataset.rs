//! Raster file access.
//!
//! [`GridDataset`] is the read side of one opened raster file and
//! [`DatasetOpener`] opens them by path. [`NetcdfOpener`] is the production
//! implementation; [`MemoryOpener`] serves prebuilt fields.
//!
//! Missing cells (fill values, non-finite values) are returned as `NaN`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use netcdf::types::{FloatType, NcVariableType};
use tracing::debug;

use crate::error::{GridError, GridResult};

/// netCDF default fill for floating point variables without `_FillValue`.
const DEFAULT_FILL_THRESHOLD: f64 = 9.0e36;

/// Read access to the variables of one opened raster file.
pub trait GridDataset {
    /// Reads a one-dimensional variable.
    fn axis(&self, name: &str) -> GridResult<Vec<f64>>;

    /// Reads the trailing 2-D plane of `name`, with every leading dimension
    /// fixed at the matching entry of `leading`.
    fn plane(&self, name: &str, leading: &[usize]) -> GridResult<Array2<f64>>;
}

/// Opens raster files by path.
pub trait DatasetOpener {
    type Dataset: GridDataset;

    fn open(&self, path: &Path) -> GridResult<Self::Dataset>;
}

/// Validates a plane selection against a variable shape and returns the
/// plane's `(rows, cols)`.
pub fn plane_shape(name: &str, shape: &[usize], leading: &[usize]) -> GridResult<(usize, usize)> {
    if shape.len() != leading.len() + 2 {
        return Err(GridError::Shape {
            variable: name.to_string(),
            detail: format!(
                "rank {} cannot be indexed by {} leading indices",
                shape.len(),
                leading.len()
            ),
        });
    }
    for (dim, (&index, &len)) in leading.iter().zip(shape).enumerate() {
        if index >= len {
            return Err(GridError::Shape {
                variable: name.to_string(),
                detail: format!("index {index} out of range for dimension {dim} of length {len}"),
            });
        }
    }
    let rank = shape.len();
    Ok((shape[rank - 2], shape[rank - 1]))
}

/// Replaces fill values by `NaN` and widens single-precision data.
///
/// When `single_precision` is set the values were stored as `f32` and are
/// widened through their shortest decimal form, so `36.12345f32` becomes
/// `36.12345f64` rather than `36.123451232910156`. Double-precision data is
/// returned as stored.
pub fn clean_values(mut values: Vec<f64>, fill: Option<f64>, single_precision: bool) -> Vec<f64> {
    for v in values.iter_mut() {
        let is_fill = fill.is_some_and(|f| *v == f);
        if is_fill || !v.is_finite() || v.abs() >= DEFAULT_FILL_THRESHOLD {
            *v = f64::NAN;
        } else if single_precision {
            *v = widen_f32(*v as f32);
        }
    }
    values
}

fn widen_f32(v: f32) -> f64 {
    v.to_string().parse().unwrap_or(f64::from(v))
}

/// Opens files with the netCDF library.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfOpener;

impl DatasetOpener for NetcdfOpener {
    type Dataset = NetcdfDataset;

    fn open(&self, path: &Path) -> GridResult<NetcdfDataset> {
        let file = netcdf::open(path).map_err(|e| GridError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Opened raster file");
        Ok(NetcdfDataset {
            file,
            path: path.to_path_buf(),
        })
    }
}

/// An open netCDF file. Closed when dropped.
pub struct NetcdfDataset {
    file: netcdf::File,
    path: PathBuf,
}

impl NetcdfDataset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn variable(&self, name: &str) -> GridResult<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| GridError::MissingVariable(name.to_string()))
    }
}

impl GridDataset for NetcdfDataset {
    fn axis(&self, name: &str) -> GridResult<Vec<f64>> {
        let var = self.variable(name)?;
        let rank = var.dimensions().len();
        if rank != 1 {
            return Err(GridError::Shape {
                variable: name.to_string(),
                detail: format!("expected 1 dimension, found {rank}"),
            });
        }
        let raw: Vec<f64> = var.get_values(..)?;
        Ok(clean_values(raw, fill_value(&var), is_single_precision(&var)))
    }

    fn plane(&self, name: &str, leading: &[usize]) -> GridResult<Array2<f64>> {
        let var = self.variable(name)?;
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let (rows, cols) = plane_shape(name, &shape, leading)?;

        let raw: Vec<f64> = match *leading {
            [] => var.get_values(..)?,
            [a] => var.get_values((a, .., ..))?,
            [a, b] => var.get_values((a, b, .., ..))?,
            _ => {
                return Err(GridError::Shape {
                    variable: name.to_string(),
                    detail: format!("unsupported rank {}", shape.len()),
                });
            }
        };

        let values = clean_values(raw, fill_value(&var), is_single_precision(&var));
        Array2::from_shape_vec((rows, cols), values).map_err(|e| GridError::Shape {
            variable: name.to_string(),
            detail: e.to_string(),
        })
    }
}

fn is_single_precision(var: &netcdf::Variable) -> bool {
    matches!(var.vartype(), NcVariableType::Float(FloatType::F32))
}

/// `_FillValue`, or `missing_value` when only that is present.
fn fill_value(var: &netcdf::Variable) -> Option<f64> {
    ["_FillValue", "missing_value"].iter().find_map(|name| {
        if !var.attributes().any(|attr| attr.name() == *name) {
            return None;
        }
        let value = var.attribute_value(name)?.ok()?;
        f64::try_from(value).ok()
    })
}

/// A variable held in memory: its shape and row-major values.
#[derive(Debug, Clone)]
pub struct MemoryVariable {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

/// An in-memory dataset.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    variables: HashMap<String, MemoryVariable>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable. Panics if `values` does not fill `shape`.
    pub fn with_variable(mut self, name: &str, shape: &[usize], values: Vec<f64>) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            values.len(),
            "values do not fill shape of '{name}'"
        );
        self.variables.insert(
            name.to_string(),
            MemoryVariable {
                shape: shape.to_vec(),
                values,
            },
        );
        self
    }

    fn variable(&self, name: &str) -> GridResult<&MemoryVariable> {
        self.variables
            .get(name)
            .ok_or_else(|| GridError::MissingVariable(name.to_string()))
    }
}

impl GridDataset for MemoryDataset {
    fn axis(&self, name: &str) -> GridResult<Vec<f64>> {
        let var = self.variable(name)?;
        if var.shape.len() != 1 {
            return Err(GridError::Shape {
                variable: name.to_string(),
                detail: format!("expected 1 dimension, found {}", var.shape.len()),
            });
        }
        Ok(clean_values(var.values.clone(), None, false))
    }

    fn plane(&self, name: &str, leading: &[usize]) -> GridResult<Array2<f64>> {
        let var = self.variable(name)?;
        let (rows, cols) = plane_shape(name, &var.shape, leading)?;

        // Row-major offset of the selected plane.
        let mut offset = 0;
        for (&index, &len) in leading.iter().zip(&var.shape) {
            offset = offset * len + index;
        }
        let start = offset * rows * cols;
        let values = var.values[start..start + rows * cols].to_vec();

        Array2::from_shape_vec((rows, cols), clean_values(values, None, false)).map_err(|e| {
            GridError::Shape {
                variable: name.to_string(),
                detail: e.to_string(),
            }
        })
    }
}

/// Serves [`MemoryDataset`]s registered by path; unknown paths fail to open.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    files: HashMap<PathBuf, MemoryDataset>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, dataset: MemoryDataset) {
        self.files.insert(path.into(), dataset);
    }
}

impl DatasetOpener for MemoryOpener {
    type Dataset = MemoryDataset;

    fn open(&self, path: &Path) -> GridResult<MemoryDataset> {
        self.files.get(path).cloned().ok_or_else(|| GridError::Open {
            path: path.to_path_buf(),
            reason: "no such dataset".to_string(),
        })
    }
}
