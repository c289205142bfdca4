//! Record types flowing through the pipeline.

use serde::{Deserialize, Serialize};

/// One grid cell at one timestep. Also the row of the detail CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Lat")]
    pub lat: f64,
    #[serde(rename = "Lon")]
    pub lon: f64,
    #[serde(rename = "NH3")]
    pub nh3: Option<f64>,
    #[serde(rename = "CO")]
    pub co: Option<f64>,
    /// Kelvin.
    #[serde(rename = "Temperature")]
    pub temperature: Option<f64>,
    #[serde(rename = "Relative_Humidity")]
    pub relative_humidity: Option<f64>,
    #[serde(rename = "Wind_Speed")]
    pub wind_speed: Option<f64>,
    #[serde(rename = "Wind_Direction")]
    pub wind_direction: Option<f64>,
}

impl CellRecord {
    pub fn coord_key(&self) -> CoordKey {
        CoordKey::new(self.x, self.y, self.lat, self.lon)
    }

    pub fn measures(&self) -> Measures {
        Measures {
            nh3: self.nh3,
            co: self.co,
            temperature: self.temperature,
            relative_humidity: self.relative_humidity,
            wind_speed: self.wind_speed,
            wind_direction: self.wind_direction,
        }
    }
}

/// The measured quantities of a row, each possibly missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measures {
    pub nh3: Option<f64>,
    pub co: Option<f64>,
    pub temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
}

impl Measures {
    pub const COUNT: usize = 6;

    pub fn to_array(self) -> [Option<f64>; Self::COUNT] {
        [
            self.nh3,
            self.co,
            self.temperature,
            self.relative_humidity,
            self.wind_speed,
            self.wind_direction,
        ]
    }

    pub fn from_array(values: [Option<f64>; Self::COUNT]) -> Self {
        let [nh3, co, temperature, relative_humidity, wind_speed, wind_direction] = values;
        Self {
            nh3,
            co,
            temperature,
            relative_humidity,
            wind_speed,
            wind_direction,
        }
    }
}

/// Bit-exact key over a coordinate tuple. `-0.0` equals `0.0` and all
/// `NaN`s are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey([u64; 4]);

impl CoordKey {
    pub fn new(x: f64, y: f64, lat: f64, lon: f64) -> Self {
        Self([canonical(x), canonical(y), canonical(lat), canonical(lon)])
    }
}

/// Key over grid coordinates only, for joining data of one timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XyKey([u64; 2]);

impl XyKey {
    pub fn new(x: f64, y: f64) -> Self {
        Self([canonical(x), canonical(y)])
    }
}

fn canonical(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

/// Administrative hierarchy of one cell: province, city/county,
/// town/district and village, each with name and code.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdminHierarchy {
    pub province_name: Option<String>,
    pub province_code: Option<String>,
    pub city_name: Option<String>,
    pub city_code: Option<String>,
    pub town_name: Option<String>,
    pub town_code: Option<String>,
    pub village_name: Option<String>,
    pub village_code: Option<String>,
}

impl AdminHierarchy {
    /// Cells outside any village take their town/district instead. Name and
    /// code are filled independently of each other.
    pub fn fill_village_from_town(&mut self) {
        if self.village_name.is_none() {
            self.village_name = self.town_name.clone();
        }
        if self.village_code.is_none() {
            self.village_code = self.town_code.clone();
        }
    }
}

/// Row of the `addresses_code_{target}.csv` lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionRow {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Lat")]
    pub lat: f64,
    #[serde(rename = "Lon")]
    pub lon: f64,
    #[serde(rename = "CTP_KOR_NM")]
    pub province_name: Option<String>,
    #[serde(rename = "CTPRVN_CD")]
    pub province_code: Option<String>,
    #[serde(rename = "SIG_KOR_NM")]
    pub city_name: Option<String>,
    #[serde(rename = "SIG_CD")]
    pub city_code: Option<String>,
    #[serde(rename = "EMD_KOR_NM")]
    pub town_name: Option<String>,
    #[serde(rename = "EMD_CD")]
    pub town_code: Option<String>,
    #[serde(rename = "LI_KOR_NM")]
    pub village_name: Option<String>,
    #[serde(rename = "LI_CD")]
    pub village_code: Option<String>,
}

/// A grid cell's place in the administrative hierarchy. Time independent.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRecord {
    pub x: f64,
    pub y: f64,
    pub lat: f64,
    pub lon: f64,
    pub admin: AdminHierarchy,
}

impl RegionRecord {
    pub fn coord_key(&self) -> CoordKey {
        CoordKey::new(self.x, self.y, self.lat, self.lon)
    }
}

impl From<RegionRow> for RegionRecord {
    fn from(row: RegionRow) -> Self {
        Self {
            x: row.x,
            y: row.y,
            lat: row.lat,
            lon: row.lon,
            admin: AdminHierarchy {
                province_name: row.province_name,
                province_code: row.province_code,
                city_name: row.city_name,
                city_code: row.city_code,
                town_name: row.town_name,
                town_code: row.town_code,
                village_name: row.village_name,
                village_code: row.village_code,
            },
        }
    }
}

/// A cell row and a region row joined on their coordinates; either side
/// may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub date: Option<String>,
    pub time: Option<String>,
    pub admin: AdminHierarchy,
    pub measures: Measures,
}

/// Grouping key of the summary: date, time and the full hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub date: Option<String>,
    pub time: Option<String>,
    pub admin: AdminHierarchy,
}

/// Mean of every measured quantity over one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub key: GroupKey,
    pub rows: usize,
    pub means: Measures,
}

/// Row of the summary CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRecord {
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Time")]
    pub time: Option<String>,
    #[serde(rename = "CTP_KOR_NM")]
    pub province_name: Option<String>,
    #[serde(rename = "CTPRVN_CD")]
    pub province_code: Option<String>,
    #[serde(rename = "SIG_KOR_NM")]
    pub city_name: Option<String>,
    #[serde(rename = "SIG_CD")]
    pub city_code: Option<String>,
    #[serde(rename = "EMD_KOR_NM")]
    pub town_name: Option<String>,
    #[serde(rename = "EMD_CD")]
    pub town_code: Option<String>,
    #[serde(rename = "LI_KOR_NM")]
    pub village_name: Option<String>,
    #[serde(rename = "LI_CD")]
    pub village_code: Option<String>,
    /// Grade 1-4.
    #[serde(rename = "NH3")]
    pub nh3_grade: Option<u8>,
    /// Grade 1-4.
    #[serde(rename = "CO")]
    pub co_grade: Option<u8>,
    /// Celsius.
    #[serde(rename = "Temperature")]
    pub temperature: Option<f64>,
    #[serde(rename = "Relative_Humidity")]
    pub relative_humidity: Option<f64>,
    #[serde(rename = "Wind_Speed")]
    pub wind_speed: Option<f64>,
    #[serde(rename = "Wind_Direction")]
    pub wind_direction: Option<f64>,
}
