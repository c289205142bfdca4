//! Meteorological fields aligned to the pollutant grid.
//!
//! The meteorological domain extends [`BORDER_MARGIN`] cells beyond the
//! dispersion domain on every edge. Cropping that border is the whole
//! alignment; no coordinates are compared.

use ndarray::{Array2, Zip, s};

use crate::error::{GridError, GridResult};
use crate::grid::dataset::GridDataset;
use crate::grid::flatten::{Mesh, present};

/// Cells removed from each spatial edge of the meteorological grid.
pub const BORDER_MARGIN: usize = 10;

pub const WIND_U: &str = "U";
pub const WIND_V: &str = "V";
pub const TEMPERATURE: &str = "T";
pub const RELATIVE_HUMIDITY: &str = "RH";

/// Removes `margin` rows and columns from every edge.
pub fn crop(field: &Array2<f64>, margin: usize) -> GridResult<Array2<f64>> {
    let (rows, cols) = field.dim();
    if rows <= 2 * margin || cols <= 2 * margin {
        return Err(GridError::Shape {
            variable: "meteorology".to_string(),
            detail: format!("{rows}x{cols} grid is too small for a {margin}-cell border"),
        });
    }
    Ok(field
        .slice(s![margin..rows - margin, margin..cols - margin])
        .to_owned())
}

/// `sqrt(u² + v²)`
pub fn wind_speed(u: f64, v: f64) -> f64 {
    (u * u + v * v).sqrt()
}

/// Direction the wind blows from, in degrees clockwise from north.
pub fn wind_direction(u: f64, v: f64) -> f64 {
    (270.0 - v.atan2(u).to_degrees()).rem_euclid(360.0)
}

/// One cell's meteorology, keyed by the pollutant grid coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct MetSample {
    pub x: f64,
    pub y: f64,
    pub temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
}

/// Cropped meteorology of one timestep.
#[derive(Debug, Clone)]
pub struct MetFields {
    /// Kelvin.
    pub temperature: Array2<f64>,
    pub relative_humidity: Array2<f64>,
    pub wind_speed: Array2<f64>,
    pub wind_direction: Array2<f64>,
}

impl MetFields {
    /// Reads time index `index` at the lowest level and crops the border.
    ///
    /// `U`, `V` and `T` are `(time, level, y, x)`; `RH` is `(time, y, x)`.
    pub fn read<D: GridDataset>(met: &D, index: usize) -> GridResult<Self> {
        let u = crop(&met.plane(WIND_U, &[index, 0])?, BORDER_MARGIN)?;
        let v = crop(&met.plane(WIND_V, &[index, 0])?, BORDER_MARGIN)?;
        let temperature = crop(&met.plane(TEMPERATURE, &[index, 0])?, BORDER_MARGIN)?;
        let relative_humidity = crop(&met.plane(RELATIVE_HUMIDITY, &[index])?, BORDER_MARGIN)?;
        Self::from_components(u, v, temperature, relative_humidity)
    }

    /// Derives wind speed and direction from cropped components.
    pub fn from_components(
        u: Array2<f64>,
        v: Array2<f64>,
        temperature: Array2<f64>,
        relative_humidity: Array2<f64>,
    ) -> GridResult<Self> {
        for (name, field) in [
            (WIND_V, &v),
            (TEMPERATURE, &temperature),
            (RELATIVE_HUMIDITY, &relative_humidity),
        ] {
            if field.dim() != u.dim() {
                return Err(GridError::ShapeMismatch {
                    left: name.to_string(),
                    left_shape: field.dim(),
                    right: WIND_U.to_string(),
                    right_shape: u.dim(),
                });
            }
        }

        let wind_speed = Zip::from(&u).and(&v).map_collect(|&u, &v| wind_speed(u, v));
        let wind_direction = Zip::from(&u)
            .and(&v)
            .map_collect(|&u, &v| wind_direction(u, v));

        Ok(Self {
            temperature,
            relative_humidity,
            wind_speed,
            wind_direction,
        })
    }

    /// One sample per mesh cell, in mesh order. Fails unless the cropped
    /// grid has exactly the pollutant grid's shape.
    pub fn flatten(&self, mesh: &Mesh) -> GridResult<Vec<MetSample>> {
        mesh.check("cropped meteorology", &self.temperature)?;

        Ok((0..mesh.len())
            .map(|i| {
                let (x, y) = mesh.coordinates(i);
                let cell = mesh.position(i);
                MetSample {
                    x,
                    y,
                    temperature: present(self.temperature[cell]),
                    relative_humidity: present(self.relative_humidity[cell]),
                    wind_speed: present(self.wind_speed[cell]),
                    wind_direction: present(self.wind_direction[cell]),
                }
            })
            .collect())
    }
}
