//! CSV persistence for the detail and summary tables.
//!
//! Files are written UTF-8 with a leading byte-order mark so spreadsheet
//! tools pick up the Korean names. Readers accept files with or without it.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::pipeline::types::{CellRecord, GroupedRecord};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const DETAIL_HEADERS: [&str; 12] = [
    "Date",
    "Time",
    "X",
    "Y",
    "Lat",
    "Lon",
    "NH3",
    "CO",
    "Temperature",
    "Relative_Humidity",
    "Wind_Speed",
    "Wind_Direction",
];

pub const SUMMARY_HEADERS: [&str; 16] = [
    "Date",
    "Time",
    "CTP_KOR_NM",
    "CTPRVN_CD",
    "SIG_KOR_NM",
    "SIG_CD",
    "EMD_KOR_NM",
    "EMD_CD",
    "LI_KOR_NM",
    "LI_CD",
    "NH3",
    "CO",
    "Temperature",
    "Relative_Humidity",
    "Wind_Speed",
    "Wind_Direction",
];

/// Logs any serializable value as pretty-printed JSON.
pub fn log_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Opens a headed CSV file, dropping a byte-order mark from the first
/// header if present.
pub fn csv_reader(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers: StringRecord = reader
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}'))
        .collect();
    reader.set_headers(headers);

    Ok(reader)
}

/// Writes `headers` and then every row. The header line is present even
/// when there are no rows.
fn write_table<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(UTF8_BOM)?;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}

pub fn write_detail(path: &Path, rows: &[CellRecord]) -> Result<()> {
    write_table(path, &DETAIL_HEADERS, rows)
}

/// Reads a detail table back. Empty fields become missing values.
pub fn read_detail(path: &Path) -> Result<Vec<CellRecord>> {
    let mut reader = csv_reader(path)?;
    let mut rows = Vec::new();
    for (line, row) in reader.deserialize::<CellRecord>().enumerate() {
        rows.push(row.with_context(|| format!("{}: bad row {}", path.display(), line + 2))?);
    }
    Ok(rows)
}

pub fn write_summary(path: &Path, rows: &[GroupedRecord]) -> Result<()> {
    write_table(path, &SUMMARY_HEADERS, rows)
}
