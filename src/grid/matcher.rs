//! Pairs per-timestep grid files of the two species by file name.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::error::RunError;

/// Extension of the per-timestep raster files.
pub const GRID_EXTENSION: &str = ".nc";

/// Lists the grid files present in both `first` and `second`, sorted by
/// name and truncated to `horizon` entries.
///
/// The file name embeds the valid time at a fixed position, so lexicographic
/// order is chronological. Fewer than `horizon` common files is not an error.
pub fn match_grid_files(first: &Path, second: &Path, horizon: usize) -> Result<Vec<String>> {
    let left = list_grid_files(first)?;
    let right = list_grid_files(second)?;

    let mut common: Vec<String> = left.intersection(&right).cloned().collect();
    let available = common.len();
    common.truncate(horizon);

    info!(
        first = left.len(),
        second = right.len(),
        common = available,
        used = common.len(),
        horizon,
        "Grid files matched"
    );
    debug!(files = ?common, "Matched grid files");
    Ok(common)
}

fn list_grid_files(dir: &Path) -> Result<BTreeSet<String>> {
    if !dir.is_dir() {
        return Err(RunError::MissingDirectory(dir.to_path_buf()).into());
    }

    let mut names = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(GRID_EXTENSION) {
                names.insert(name.to_string());
            }
        }
    }

    debug!(dir = %dir.display(), count = names.len(), "Grid directory listed");
    Ok(names)
}
