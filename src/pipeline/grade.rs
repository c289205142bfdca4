//! Ordinal grades for mean concentrations and the Kelvin/Celsius conversion.

use crate::config::Species;
use crate::pipeline::types::{GroupMean, GroupedRecord};

const ZERO_CELSIUS_IN_KELVIN: f64 = 273.15;

/// Upper bounds of grades 1, 2 and 3. Values at or above the last bound are
/// grade 4.
pub type Thresholds = [f64; 3];

pub const NH3_THRESHOLDS: Thresholds = [50.0, 100.0, 200.0];
pub const CO_THRESHOLDS: Thresholds = [10.0, 15.0, 20.0];

pub fn thresholds(species: Species) -> &'static Thresholds {
    match species {
        Species::Nh3 => &NH3_THRESHOLDS,
        Species::Co => &CO_THRESHOLDS,
    }
}

/// Converts a mean concentration into a grade from 1 to 4.
///
/// | Range            | Grade |
/// |------------------|-------|
/// | < bounds[0]      | 1     |
/// | < bounds[1]      | 2     |
/// | < bounds[2]      | 3     |
/// | >= bounds[2]     | 4     |
pub fn grade(value: f64, bounds: &Thresholds) -> u8 {
    match value {
        v if v < bounds[0] => 1,
        v if v < bounds[1] => 2,
        v if v < bounds[2] => 3,
        _ => 4,
    }
}

pub fn species_grade(species: Species, value: f64) -> u8 {
    grade(value, thresholds(species))
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - ZERO_CELSIUS_IN_KELVIN
}

pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + ZERO_CELSIUS_IN_KELVIN
}

/// Grades the pollutant means of a group and converts its temperature.
/// Missing means stay missing.
pub fn classify(group: GroupMean) -> GroupedRecord {
    let GroupMean { key, means, .. } = group;
    let admin = key.admin;
    GroupedRecord {
        date: key.date,
        time: key.time,
        province_name: admin.province_name,
        province_code: admin.province_code,
        city_name: admin.city_name,
        city_code: admin.city_code,
        town_name: admin.town_name,
        town_code: admin.town_code,
        village_name: admin.village_name,
        village_code: admin.village_code,
        nh3_grade: means.nh3.map(|v| species_grade(Species::Nh3, v)),
        co_grade: means.co.map(|v| species_grade(Species::Co, v)),
        temperature: means.temperature.map(kelvin_to_celsius),
        relative_humidity: means.relative_humidity,
        wind_speed: means.wind_speed,
        wind_direction: means.wind_direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{AdminHierarchy, GroupKey, Measures};

    #[test]
    fn test_nh3_grade_boundaries() {
        assert_eq!(species_grade(Species::Nh3, 0.0), 1);
        assert_eq!(species_grade(Species::Nh3, 49.999), 1);
        assert_eq!(species_grade(Species::Nh3, 50.0), 2);
        assert_eq!(species_grade(Species::Nh3, 99.999), 2);
        assert_eq!(species_grade(Species::Nh3, 100.0), 3);
        assert_eq!(species_grade(Species::Nh3, 199.999), 3);
        assert_eq!(species_grade(Species::Nh3, 200.0), 4);
        assert_eq!(species_grade(Species::Nh3, 1000.0), 4);
    }

    #[test]
    fn test_co_grade_boundaries() {
        assert_eq!(species_grade(Species::Co, 9.999), 1);
        assert_eq!(species_grade(Species::Co, 10.0), 2);
        assert_eq!(species_grade(Species::Co, 14.999), 2);
        assert_eq!(species_grade(Species::Co, 15.0), 3);
        assert_eq!(species_grade(Species::Co, 20.0), 4);
        assert_eq!(species_grade(Species::Co, 25.0), 4);
    }

    #[test]
    fn test_per_cell_grades_of_sample_grid() {
        let nh3: Vec<u8> = [10.0, 60.0, 150.0, 250.0]
            .iter()
            .map(|&v| species_grade(Species::Nh3, v))
            .collect();
        let co: Vec<u8> = [5.0, 12.0, 18.0, 25.0]
            .iter()
            .map(|&v| species_grade(Species::Co, v))
            .collect();
        assert_eq!(nh3, vec![1, 2, 3, 4]);
        assert_eq!(co, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_temperature_round_trip() {
        for c in [-40.0, -0.5, 0.0, 12.25, 36.6] {
            let back = kelvin_to_celsius(celsius_to_kelvin(c));
            assert!((back - c).abs() < 1e-9, "{c} became {back}");
        }
        assert!((kelvin_to_celsius(273.15)).abs() < 1e-12);
    }

    #[test]
    fn test_classify_keeps_missing_means_empty() {
        let group = GroupMean {
            key: GroupKey {
                date: None,
                time: None,
                admin: AdminHierarchy::default(),
            },
            rows: 1,
            means: Measures {
                nh3: None,
                co: Some(12.0),
                temperature: Some(300.15),
                ..Default::default()
            },
        };
        let record = classify(group);
        assert_eq!(record.nh3_grade, None);
        assert_eq!(record.co_grade, Some(2));
        assert!((record.temperature.unwrap() - 27.0).abs() < 1e-9);
    }
}
