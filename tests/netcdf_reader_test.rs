use std::path::Path;

use calpuff_index::error::GridError;
use calpuff_index::grid::dataset::{DatasetOpener, GridDataset, NetcdfOpener};

const FILL: f64 = -9999.0;

/// One timestep of a 2x3 grid laid out like the dispersion model output.
fn write_fixture(path: &Path) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", 1)?;
    file.add_dimension("z", 1)?;
    file.add_dimension("y", 2)?;
    file.add_dimension("x", 3)?;

    let mut x = file.add_variable::<f64>("x", &["x"])?;
    x.put_values(&[200.0, 201.0, 202.0], ..)?;

    let mut y = file.add_variable::<f64>("y", &["y"])?;
    y.put_values(&[300.0, 301.0], ..)?;

    let mut lat = file.add_variable::<f32>("lat", &["y", "x"])?;
    lat.put_values(&[36.1f32, 36.1, 36.1, 36.2, 36.2, 36.2], ..)?;

    // Double precision holding values that came from f32.
    let mut lon = file.add_variable::<f64>("lon", &["y", "x"])?;
    lon.put_values(&[f64::from(36.1f32), f64::from(127.3f32), 127.0, 127.5, 128.0, 128.5], ..)?;

    let mut nh3 = file.add_variable::<f64>("NH3", &["time", "z", "y", "x"])?;
    nh3.put_attribute("_FillValue", FILL)?;
    nh3.put_values(&[10.0, FILL, 150.0, 250.0, 60.0, 5.0], ..)?;

    Ok(())
}

#[test]
fn test_reads_axes_and_planes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("klaps_2024091121_2024091122_ns.nc");
    write_fixture(&path).expect("fixture written");

    let ds = NetcdfOpener.open(&path).expect("file opens");
    assert_eq!(ds.path(), path.as_path());

    assert_eq!(ds.axis("x").unwrap(), vec![200.0, 201.0, 202.0]);
    assert_eq!(ds.axis("y").unwrap(), vec![300.0, 301.0]);

    let nh3 = ds.plane("NH3", &[0, 0]).unwrap();
    assert_eq!(nh3.dim(), (2, 3));
    assert_eq!(nh3[[0, 0]], 10.0);
    assert!(nh3[[0, 1]].is_nan(), "fill value should read as missing");
    assert_eq!(nh3[[1, 2]], 5.0);
}

#[test]
fn test_single_precision_values_widen_to_their_decimal_form() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.nc");
    write_fixture(&path).unwrap();

    let lat = NetcdfOpener.open(&path).unwrap().plane("lat", &[]).unwrap();
    assert_eq!(lat[[0, 0]], 36.1);
    assert_eq!(lat[[1, 2]], 36.2);
}

#[test]
fn test_double_precision_values_are_read_as_stored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.nc");
    write_fixture(&path).unwrap();

    let lon = NetcdfOpener.open(&path).unwrap().plane("lon", &[]).unwrap();
    assert_eq!(lon[[0, 0]], f64::from(36.1f32));
    assert_eq!(lon[[0, 1]], f64::from(127.3f32));
    assert_ne!(lon[[0, 0]], 36.1);
}

#[test]
fn test_reader_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.nc");
    write_fixture(&path).unwrap();
    let ds = NetcdfOpener.open(&path).unwrap();

    assert!(matches!(ds.plane("OU", &[0, 0]), Err(GridError::MissingVariable(name)) if name == "OU"));
    assert!(matches!(ds.plane("NH3", &[1, 0]), Err(GridError::Shape { .. })));
    assert!(matches!(ds.plane("NH3", &[0]), Err(GridError::Shape { .. })));
    assert!(matches!(ds.axis("lat"), Err(GridError::Shape { .. })));

    let missing = dir.path().join("absent.nc");
    assert!(matches!(NetcdfOpener.open(&missing), Err(GridError::Open { .. })));
}
