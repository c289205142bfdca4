//! Raster side of the pipeline: finding the per-timestep files, reading
//! them, and turning 2-D fields into cell rows.

pub mod dataset;
pub mod flatten;
pub mod matcher;
pub mod meteorology;
