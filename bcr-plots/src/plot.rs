use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Column names of the plot CSV that map onto typed [`PlotRecord`] fields.
pub mod columns {
    pub const ID: &str = "ID";
    pub const PROJECT_TYPE: &str = "Project_Type";
    pub const DATA_SOURCE: &str = "Data_Source";
    pub const MONITORING_YEAR: &str = "Monitoring_Year";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const GPS_LAT: &str = "GPS_Lat";
    pub const GPS_LONG: &str = "GPS_Long";
}

/// A numeric field measured on every plot.
///
/// The discriminant doubles as the index into [`Measurements`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Measurement {
    TreeHeight,
    Dbh,
    BiomassAbove,
    BiomassBelow,
    SoilOrganicCarbon,
    SoilSalinity,
    SoilMoisture,
    SoilPh,
    WaterSalinity,
    WaterTemperature,
    Co2Flux,
    Ch4Flux,
    Ndvi,
    CanopyCover,
    PlotArea,
    SoilBulkDensity,
    SoilDepth,
}

impl Measurement {
    pub const ALL: [Measurement; 17] = [
        Measurement::TreeHeight,
        Measurement::Dbh,
        Measurement::BiomassAbove,
        Measurement::BiomassBelow,
        Measurement::SoilOrganicCarbon,
        Measurement::SoilSalinity,
        Measurement::SoilMoisture,
        Measurement::SoilPh,
        Measurement::WaterSalinity,
        Measurement::WaterTemperature,
        Measurement::Co2Flux,
        Measurement::Ch4Flux,
        Measurement::Ndvi,
        Measurement::CanopyCover,
        Measurement::PlotArea,
        Measurement::SoilBulkDensity,
        Measurement::SoilDepth,
    ];

    /// CSV header (and document field) carrying this measurement.
    pub fn field_name(self) -> &'static str {
        match self {
            Measurement::TreeHeight => "Tree_Height_m",
            Measurement::Dbh => "DBH_cm",
            Measurement::BiomassAbove => "Biomass_above_kg",
            Measurement::BiomassBelow => "Biomass_below_kg",
            Measurement::SoilOrganicCarbon => "Soil_Organic_Carbon_g_per_kg",
            Measurement::SoilSalinity => "Soil_Salinity_psu",
            Measurement::SoilMoisture => "Soil_Moisture_percent",
            Measurement::SoilPh => "Soil_pH",
            Measurement::WaterSalinity => "Water_Salinity_psu",
            Measurement::WaterTemperature => "Water_Temperature_C",
            Measurement::Co2Flux => "CO2_Flux_mg_m2_day",
            Measurement::Ch4Flux => "CH4_Flux_mg_m2_day",
            Measurement::Ndvi => "NDVI",
            Measurement::CanopyCover => "Canopy_Cover_percent",
            Measurement::PlotArea => "Plot_Area_ha",
            Measurement::SoilBulkDensity => "Soil_Bulk_Density_g_cm3",
            Measurement::SoilDepth => "Soil_Depth_cm",
        }
    }

    /// SQL column storing this measurement in the `plots` table.
    pub fn column(self) -> &'static str {
        match self {
            Measurement::TreeHeight => "tree_height_m",
            Measurement::Dbh => "dbh_cm",
            Measurement::BiomassAbove => "biomass_above_kg",
            Measurement::BiomassBelow => "biomass_below_kg",
            Measurement::SoilOrganicCarbon => "soil_organic_carbon_g_per_kg",
            Measurement::SoilSalinity => "soil_salinity_psu",
            Measurement::SoilMoisture => "soil_moisture_percent",
            Measurement::SoilPh => "soil_ph",
            Measurement::WaterSalinity => "water_salinity_psu",
            Measurement::WaterTemperature => "water_temperature_c",
            Measurement::Co2Flux => "co2_flux_mg_m2_day",
            Measurement::Ch4Flux => "ch4_flux_mg_m2_day",
            Measurement::Ndvi => "ndvi",
            Measurement::CanopyCover => "canopy_cover_percent",
            Measurement::PlotArea => "plot_area_ha",
            Measurement::SoilBulkDensity => "soil_bulk_density_g_cm3",
            Measurement::SoilDepth => "soil_depth_cm",
        }
    }

    /// Look up a measurement by its CSV header.
    pub fn from_field_name(name: &str) -> Option<Measurement> {
        Measurement::ALL
            .iter()
            .copied()
            .find(|m| m.field_name() == name)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// The full measurement vector of one plot. Missing or unparsable values are NaN.
#[derive(Debug, Clone, Copy)]
pub struct Measurements([f64; 17]);

impl Default for Measurements {
    fn default() -> Self {
        Measurements([f64::NAN; 17])
    }
}

impl Measurements {
    pub fn get(&self, m: Measurement) -> f64 {
        self.0[m as usize]
    }

    pub fn set(&mut self, m: Measurement, value: f64) {
        self.0[m as usize] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Measurement, f64)> + '_ {
        Measurement::ALL.iter().map(move |m| (*m, self.get(*m)))
    }

    /// Numeric comparison in which two NaN sentinels compare equal.
    pub fn same_values(&self, other: &Measurements) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| same_f64(*a, *b))
    }
}

impl Serialize for Measurements {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Measurement::ALL.len()))?;
        for (m, value) in self.iter() {
            map.serialize_entry(m.field_name(), &value)?;
        }
        map.end()
    }
}

/// Where a plot sits, distinguishing a real position from a bad or missing one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Location {
    Valid { longitude: f64, latitude: f64 },
    /// GPS text was present but unparsable or out of range.
    Invalid,
    /// Neither GPS field was supplied.
    Absent,
}

impl Location {
    /// Classify parsed GPS fields. `None` means the field was not supplied,
    /// NaN means it was supplied but not numeric.
    pub fn classify(latitude: Option<f64>, longitude: Option<f64>) -> Location {
        match (latitude, longitude) {
            (None, None) => Location::Absent,
            (Some(lat), Some(lon))
                if lat.is_finite()
                    && lon.is_finite()
                    && (-90.0..=90.0).contains(&lat)
                    && (-180.0..=180.0).contains(&lon) =>
            {
                Location::Valid {
                    longitude: lon,
                    latitude: lat,
                }
            }
            _ => Location::Invalid,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Location::Valid { .. } => "valid",
            Location::Invalid => "invalid",
            Location::Absent => "absent",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Location::Valid { .. })
    }
}

/// A normalized plot, ready to be written to the store.
#[derive(Debug, Clone, Serialize)]
pub struct PlotRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Project_Type")]
    pub project_type: Option<String>,
    #[serde(rename = "Data_Source")]
    pub data_source: String,
    #[serde(rename = "Monitoring_Year")]
    pub monitoring_year: Option<i32>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "GPS_Lat")]
    pub gps_lat: f64,
    #[serde(rename = "GPS_Long")]
    pub gps_long: f64,
    pub location: Location,
    #[serde(flatten)]
    pub measurements: Measurements,
    /// Source columns with no typed counterpart, kept verbatim.
    pub attributes: BTreeMap<String, String>,
}

impl PlotRecord {
    /// `[longitude, latitude]`, substituting 0 for an axis that did not parse.
    pub fn coordinates(&self) -> [f64; 2] {
        [zero_if_nan(self.gps_long), zero_if_nan(self.gps_lat)]
    }

    /// Field-by-field equality with NaN treated as equal to NaN.
    pub fn same_content(&self, other: &PlotRecord) -> bool {
        self.id == other.id
            && self.project_type == other.project_type
            && self.data_source == other.data_source
            && self.monitoring_year == other.monitoring_year
            && self.timestamp == other.timestamp
            && same_f64(self.gps_lat, other.gps_lat)
            && same_f64(self.gps_long, other.gps_long)
            && same_location(&self.location, &other.location)
            && self.measurements.same_values(&other.measurements)
            && self.attributes == other.attributes
    }
}

fn zero_if_nan(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v
    }
}

fn same_f64(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn same_location(a: &Location, b: &Location) -> bool {
    match (a, b) {
        (
            Location::Valid {
                longitude: a_lon,
                latitude: a_lat,
            },
            Location::Valid {
                longitude: b_lon,
                latitude: b_lat,
            },
        ) => same_f64(*a_lon, *b_lon) && same_f64(*a_lat, *b_lat),
        _ => a.status() == b.status(),
    }
}
