//! Joins the cell table against the administrative lookup.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::output::csv_reader;
use crate::pipeline::types::{
    AdminHierarchy, CellRecord, CoordKey, JoinedRecord, Measures, RegionRecord, RegionRow,
};

/// Reads `addresses_code_{target}.csv`.
pub fn load_region_lookup(path: &Path) -> Result<Vec<RegionRecord>> {
    let mut reader = csv_reader(path)?;
    let mut regions = Vec::new();
    for (line, row) in reader.deserialize::<RegionRow>().enumerate() {
        let row = row.with_context(|| format!("{}: bad row {}", path.display(), line + 2))?;
        regions.push(RegionRecord::from(row));
    }
    info!(path = %path.display(), rows = regions.len(), "Region lookup loaded");
    Ok(regions)
}

/// Full outer join on `(X, Y, Lat, Lon)`.
///
/// Matched pairs produce one row per pair. Cells with no region keep an
/// empty hierarchy; regions with no cell keep empty date, time and
/// measures.
pub fn outer_join(cells: &[CellRecord], regions: &[RegionRecord]) -> Vec<JoinedRecord> {
    let mut by_coord: HashMap<CoordKey, Vec<&RegionRecord>> = HashMap::new();
    for region in regions {
        by_coord.entry(region.coord_key()).or_default().push(region);
    }

    let mut matched: HashSet<CoordKey> = HashSet::new();
    let mut joined = Vec::with_capacity(cells.len());

    for cell in cells {
        let key = cell.coord_key();
        match by_coord.get(&key) {
            Some(matches) => {
                matched.insert(key);
                for region in matches {
                    joined.push(JoinedRecord {
                        date: Some(cell.date.clone()),
                        time: Some(cell.time.clone()),
                        admin: region.admin.clone(),
                        measures: cell.measures(),
                    });
                }
            }
            None => joined.push(JoinedRecord {
                date: Some(cell.date.clone()),
                time: Some(cell.time.clone()),
                admin: AdminHierarchy::default(),
                measures: cell.measures(),
            }),
        }
    }

    for region in regions {
        if !matched.contains(&region.coord_key()) {
            joined.push(JoinedRecord {
                date: None,
                time: None,
                admin: region.admin.clone(),
                measures: Measures::default(),
            });
        }
    }

    joined
}

/// Fills absent village names and codes from the town/district level.
pub fn apply_village_fallback(rows: &mut [JoinedRecord]) {
    for row in rows {
        row.admin.fill_village_from_town();
    }
}

/// Keeps only rows whose city/county name equals `city`.
pub fn filter_city(rows: Vec<JoinedRecord>, city: &str) -> Vec<JoinedRecord> {
    rows.into_iter()
        .filter(|row| row.admin.city_name.as_deref() == Some(city))
        .collect()
}

/// Outer join, village fallback, then the optional city filter.
pub fn join_regions(
    cells: &[CellRecord],
    regions: &[RegionRecord],
    city: Option<&str>,
) -> Vec<JoinedRecord> {
    let mut joined = outer_join(cells, regions);
    info!(rows = joined.len(), "Cells joined with region lookup");

    apply_village_fallback(&mut joined);

    match city {
        Some(city) => {
            let filtered = filter_city(joined, city);
            info!(city, rows = filtered.len(), "Region filter applied");
            filtered
        }
        None => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(x: f64, date_hour: (&str, &str), nh3: f64) -> CellRecord {
        CellRecord {
            date: date_hour.0.into(),
            time: date_hour.1.into(),
            x,
            y: 0.0,
            lat: 36.0,
            lon: 127.0 + x,
            nh3: Some(nh3),
            co: None,
            temperature: None,
            relative_humidity: None,
            wind_speed: None,
            wind_direction: None,
        }
    }

    fn region(x: f64, city: &str, village: Option<&str>) -> RegionRecord {
        RegionRecord {
            x,
            y: 0.0,
            lat: 36.0,
            lon: 127.0 + x,
            admin: AdminHierarchy {
                province_name: Some("충청남도".into()),
                province_code: Some("44".into()),
                city_name: Some(city.into()),
                city_code: Some("44230".into()),
                town_name: Some("강경읍".into()),
                town_code: Some("44230250".into()),
                village_name: village.map(String::from),
                village_code: village.map(|_| "4423025021".to_string()),
            },
        }
    }

    #[test]
    fn test_outer_join_keeps_both_unmatched_sides() {
        let cells = vec![
            cell(0.0, ("20240912", "01"), 10.0),
            cell(0.0, ("20240912", "02"), 20.0),
            cell(5.0, ("20240912", "01"), 30.0),
        ];
        let regions = vec![region(0.0, "논산시", Some("황산리")), region(9.0, "논산시", None)];

        let joined = outer_join(&cells, &regions);
        assert_eq!(joined.len(), 4);

        // Both timesteps of cell 0 matched the same region.
        assert_eq!(joined[0].admin.village_name.as_deref(), Some("황산리"));
        assert_eq!(joined[1].admin.village_name.as_deref(), Some("황산리"));
        // Cell-only row.
        assert_eq!(joined[2].admin, AdminHierarchy::default());
        assert_eq!(joined[2].measures.nh3, Some(30.0));
        // Region-only row.
        assert_eq!(joined[3].date, None);
        assert_eq!(joined[3].measures, Measures::default());
    }

    #[test]
    fn test_join_regions_applies_fallback_then_filter() {
        let cells = vec![
            cell(0.0, ("20240912", "01"), 10.0),
            cell(1.0, ("20240912", "01"), 10.0),
        ];
        let regions = vec![region(0.0, "논산시", None), region(1.0, "공주시", None)];

        let rows = join_regions(&cells, &regions, Some("논산시"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].admin.village_name.as_deref(), Some("강경읍"));
        assert_eq!(rows[0].admin.village_code.as_deref(), Some("44230250"));
    }

    #[test]
    fn test_filter_drops_rows_without_city() {
        let cells = vec![cell(3.0, ("20240912", "01"), 10.0)];
        let rows = join_regions(&cells, &[], Some("논산시"));
        assert!(rows.is_empty());

        let unfiltered = join_regions(&cells, &[], None);
        assert_eq!(unfiltered.len(), 1);
    }

    #[test]
    fn test_load_region_lookup_with_bom_and_blank_village() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addresses_code_ns.csv");
        let content = "\u{feff}X,Y,Lat,Lon,CTP_KOR_NM,CTPRVN_CD,SIG_KOR_NM,SIG_CD,EMD_KOR_NM,EMD_CD,LI_KOR_NM,LI_CD\n\
             200.0,300.0,36.12345,127.1,충청남도,44,논산시,44230,강경읍,44230250,,\n";
        std::fs::write(&path, content).unwrap();

        let regions = load_region_lookup(&path).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].lat, 36.12345);
        assert_eq!(regions[0].admin.city_code.as_deref(), Some("44230"));
        assert_eq!(regions[0].admin.village_name, None);
    }
}
