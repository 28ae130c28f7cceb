use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::table::{FromRow, Row};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Longitude/latitude geometry in EPSG:4326.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point([f64; 2]),
    LineString(Vec<[f64; 2]>),
}

impl Geometry {
    pub fn point(lon: f64, lat: f64) -> Self {
        Self::Point([lon, lat])
    }

    pub fn to_geojson(&self) -> Value {
        match self {
            Self::Point(p) => json!({ "type": "Point", "coordinates": p }),
            Self::LineString(coords) => json!({ "type": "LineString", "coordinates": coords }),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulated inputs
// ---------------------------------------------------------------------------

/// Route-level boardings for one line in one time period.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedBoarding {
    pub operator: String,
    pub technology: String,
    pub tm2_mode: String,
    pub line_mode: String,
    pub line_name: String,
    pub daily_line_name: String,
    pub time_period: String,
    pub total_boarding: f64,
}

impl FromRow for SimulatedBoarding {
    const COLUMNS: &'static [&'static str] = &[
        "operator",
        "technology",
        "tm2_mode",
        "line_mode",
        "line_name",
        "daily_line_name",
        "time_period",
        "total_boarding",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            operator: row.text("operator"),
            technology: row.text("technology"),
            tm2_mode: row.text("tm2_mode"),
            line_mode: row.text("line_mode"),
            line_name: row.text("line_name"),
            daily_line_name: row.text("daily_line_name"),
            time_period: row.text("time_period"),
            total_boarding: row.parse("total_boarding")?,
        })
    }
}

/// One link of one line in the shape-period transit assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitSegment {
    pub line: String,
    pub link_id: i64,
    pub seq: i64,
    pub board: f64,
    pub volume: f64,
    pub capacity_total: f64,
    pub capacity_seated: f64,
    pub geometry: Geometry,
}

impl FromRow for TransitSegment {
    const COLUMNS: &'static [&'static str] = &[
        "line",
        "link_id",
        "seq",
        "board",
        "volume",
        "capacity_total",
        "capacity_seated",
        "from_lon",
        "from_lat",
        "to_lon",
        "to_lat",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            line: row.text("line"),
            link_id: row.parse("link_id")?,
            seq: row.parse("seq")?,
            board: row.parse("board")?,
            volume: row.parse("volume")?,
            capacity_total: row.parse("capacity_total")?,
            capacity_seated: row.parse("capacity_seated")?,
            geometry: Geometry::LineString(vec![
                [row.parse("from_lon")?, row.parse("from_lat")?],
                [row.parse("to_lon")?, row.parse("to_lat")?],
            ]),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedStationFlow {
    pub operator: String,
    pub boarding_name: String,
    pub alighting_name: String,
    pub simulated: f64,
}

impl FromRow for SimulatedStationFlow {
    const COLUMNS: &'static [&'static str] =
        &["operator", "boarding_name", "alighting_name", "simulated"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            operator: row.text("operator"),
            boarding_name: row.text("boarding_name"),
            alighting_name: row.text("alighting_name"),
            simulated: row.parse("simulated")?,
        })
    }
}

/// Zero-vehicle household share for one MAZ, keyed by sequential MAZ id.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedZeroVehicle {
    pub maz: i64,
    pub share: f64,
    pub households: f64,
}

impl FromRow for SimulatedZeroVehicle {
    const COLUMNS: &'static [&'static str] =
        &["maz", "simulated_zero_vehicle_share", "simulated_households"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            maz: row.parse("maz")?,
            share: row.parse("simulated_zero_vehicle_share")?,
            households: row.parse("simulated_households")?,
        })
    }
}

/// Sequential MAZ id to original MAZ id.
#[derive(Debug, Clone, PartialEq)]
pub struct MazSequence {
    pub sequence: i64,
    pub original: i64,
}

impl FromRow for MazSequence {
    const COLUMNS: &'static [&'static str] = &["MAZSEQ", "MAZ_ORIGINAL"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            sequence: row.parse("MAZSEQ")?,
            original: row.parse("MAZ_ORIGINAL")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedHomeWorkFlow {
    pub residence_county: String,
    pub work_county: String,
    pub simulated_flow: f64,
}

impl FromRow for SimulatedHomeWorkFlow {
    const COLUMNS: &'static [&'static str] = &["residence_county", "work_county", "simulated_flow"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            residence_county: row.text("residence_county"),
            work_county: row.text("work_county"),
            simulated_flow: row.parse("simulated_flow")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedAccess {
    pub operator: String,
    pub boarding_name: String,
    pub time_period: String,
    pub access_mode: String,
    pub simulated_boardings: f64,
}

impl FromRow for SimulatedAccess {
    const COLUMNS: &'static [&'static str] = &[
        "operator",
        "boarding_name",
        "time_period",
        "access_mode",
        "simulated_boardings",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            operator: row.text("operator"),
            boarding_name: row.text("boarding_name"),
            time_period: row.text("time_period"),
            access_mode: row.text("access_mode"),
            simulated_boardings: row.parse("simulated_boardings")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationLocation {
    pub station_name: String,
    pub lon: f64,
    pub lat: f64,
}

impl FromRow for StationLocation {
    const COLUMNS: &'static [&'static str] = &["station_name", "lon", "lat"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            station_name: row.text("station_name"),
            lon: row.parse("lon")?,
            lat: row.parse("lat")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Observed inputs
// ---------------------------------------------------------------------------

/// On-board survey boardings by operator, route and time period.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedBoarding {
    pub survey_operator: String,
    pub survey_tech: String,
    pub survey_route: String,
    pub survey_boardings: f64,
    pub time_period: String,
    pub florida_threshold: Option<f64>,
    pub standard_line_name: Option<String>,
    pub daily_line_name: Option<String>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub headsign: Option<String>,
}

impl FromRow for ObservedBoarding {
    const COLUMNS: &'static [&'static str] = &[
        "survey_operator",
        "survey_tech",
        "survey_route",
        "survey_boardings",
        "time_period",
        "florida_threshold",
        "standard_line_name",
        "daily_line_name",
        "standard_route_short_name",
        "standard_route_long_name",
        "standard_headsign",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            survey_operator: row.text("survey_operator"),
            survey_tech: row.text("survey_tech"),
            survey_route: row.text("survey_route"),
            survey_boardings: row.parse("survey_boardings")?,
            time_period: row.text("time_period"),
            florida_threshold: row.opt_parse("florida_threshold")?,
            standard_line_name: row.opt_text("standard_line_name"),
            daily_line_name: row.opt_text("daily_line_name"),
            route_short_name: row.opt_text("standard_route_short_name"),
            route_long_name: row.opt_text("standard_route_long_name"),
            headsign: row.opt_text("standard_headsign"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservedStationFlow {
    pub boarding: String,
    pub alighting: String,
    pub observed: f64,
    pub boarding_lon: Option<f64>,
    pub boarding_lat: Option<f64>,
}

impl FromRow for ObservedStationFlow {
    const COLUMNS: &'static [&'static str] =
        &["boarding", "alighting", "observed", "boarding_lon", "boarding_lat"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            boarding: row.text("boarding"),
            alighting: row.text("alighting"),
            observed: row.parse("observed")?,
            boarding_lon: row.opt_parse("boarding_lon")?,
            boarding_lat: row.opt_parse("boarding_lat")?,
        })
    }
}

/// Census zero-vehicle household share by tract.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedZeroVehicle {
    pub geoid: String,
    pub total_households: Option<f64>,
    pub share: Option<f64>,
}

impl FromRow for ObservedZeroVehicle {
    const COLUMNS: &'static [&'static str] = &[
        "geoid",
        "total_households",
        "observed_zero_vehicle_household_share",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            geoid: row.text("geoid"),
            total_households: row.opt_parse("total_households")?,
            share: row.opt_parse("observed_zero_vehicle_household_share")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TractCentroid {
    pub tract: String,
    pub lon: f64,
    pub lat: f64,
}

impl FromRow for TractCentroid {
    const COLUMNS: &'static [&'static str] = &["tract", "lon", "lat"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            tract: row.text("tract"),
            lon: row.parse("lon")?,
            lat: row.parse("lat")?,
        })
    }
}

/// CTPP county-to-county worker flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedHomeWorkFlow {
    pub residence_county: String,
    pub work_county: String,
    pub observed_flow: f64,
}

impl FromRow for ObservedHomeWorkFlow {
    const COLUMNS: &'static [&'static str] = &["residence_county", "work_county", "observed_flow"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            residence_county: row.text("residence_county"),
            work_county: row.text("work_county"),
            observed_flow: row.parse("observed_flow")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservedAccess {
    pub operator: String,
    pub boarding_station: String,
    pub time_period: String,
    pub access_mode: String,
    pub survey_trips: f64,
}

impl FromRow for ObservedAccess {
    const COLUMNS: &'static [&'static str] = &[
        "operator",
        "boarding_station",
        "time_period",
        "access_mode",
        "survey_trips",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            operator: row.text("operator"),
            boarding_station: row.text("boarding_station"),
            time_period: row.text("time_period"),
            access_mode: row.text("access_mode"),
            survey_trips: row.parse("survey_trips")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Canonical inputs
// ---------------------------------------------------------------------------

/// Areal share of an original MAZ falling in a census block group.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusCrosswalk {
    pub maz: i64,
    pub blockgroup: String,
    pub maz_share: f64,
}

impl FromRow for CensusCrosswalk {
    const COLUMNS: &'static [&'static str] = &["maz", "blockgroup", "maz_share"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            maz: row.parse("maz")?,
            blockgroup: row.text("blockgroup"),
            maz_share: row.parse("maz_share")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Reconciled boardings
// ---------------------------------------------------------------------------

/// Which join produced a boardings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFamily {
    Rail,
    NonRail,
}

/// One row of the combined rail + non-rail boardings join.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardingComparison {
    pub family: LineFamily,
    pub operator: Option<String>,
    pub technology: Option<String>,
    pub time_period: String,
    pub line_name: Option<String>,
    pub daily_line_name: Option<String>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub trip_headsign: Option<String>,
    pub simulated_boardings: Option<f64>,
    pub observed_boardings: Option<f64>,
    pub florida_threshold: Option<f64>,
    /// Position of the contributing row in this family's simulated and
    /// observed inputs. A fanned-out join repeats the same position.
    pub simulated_row: Option<usize>,
    pub observed_row: Option<usize>,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Text(String),
    Number(f64),
}

impl From<&str> for DimensionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DimensionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for DimensionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// One point/attribute comparison row in the `compare` output.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub criteria_number: u32,
    pub criteria_name: String,
    /// Dimension name and value, index 0 is `dimension_01`. Unused slots are `None`.
    pub dimensions: [Option<(String, Option<DimensionValue>)>; 3],
    pub observed_outcome: Option<f64>,
    pub simulated_outcome: Option<f64>,
    pub acceptance_threshold: String,
    pub geometry: Option<Geometry>,
}

impl ReconciledRecord {
    pub fn dimension_value(&self, index: usize) -> Option<&DimensionValue> {
        self.dimensions
            .get(index)
            .and_then(|d| d.as_ref())
            .and_then(|(_, v)| v.as_ref())
    }

    /// Output properties. Unused dimension slots are left out entirely so the
    /// emitter can tell an absent column from a null value.
    pub fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("criteria_number".into(), json!(self.criteria_number));
        props.insert("criteria_name".into(), json!(self.criteria_name));
        for (i, dim) in self.dimensions.iter().enumerate() {
            if let Some((name, value)) = dim {
                props.insert(format!("dimension_{:02}_name", i + 1), json!(name));
                props.insert(format!("dimension_{:02}_value", i + 1), json!(value));
            }
        }
        props.insert("observed_outcome".into(), json!(self.observed_outcome));
        props.insert("simulated_outcome".into(), json!(self.simulated_outcome));
        props.insert("acceptance_threshold".into(), json!(self.acceptance_threshold));
        props
    }
}

/// One transit link of one line in one time period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkComparisonRecord {
    pub model_link_id: Option<i64>,
    pub model_line_id: Option<String>,
    pub operator: Option<String>,
    pub technology: Option<String>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub trip_headsign: Option<String>,
    pub time_period: String,
    pub route_observed_boardings: Option<f64>,
    pub route_simulated_boardings: Option<f64>,
    pub florida_threshold: Option<f64>,
    pub am_segment_simulated_boardings: Option<f64>,
    pub am_segment_volume: Option<f64>,
    pub am_segment_capacity_total: Option<f64>,
    pub am_segment_vc_ratio_total: Option<f64>,
    pub am_segment_capacity_seated: Option<f64>,
    pub am_segment_vc_ratio_seated: Option<f64>,
    pub mean_am_segment_vc_ratio_total: Option<f64>,
    #[serde(skip)]
    pub geometry: Option<Geometry>,
}

impl NetworkComparisonRecord {
    pub fn properties(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_geojson() {
        let g = Geometry::point(-122.27, 37.80);
        assert_eq!(
            g.to_geojson(),
            json!({ "type": "Point", "coordinates": [-122.27, 37.80] })
        );
    }

    #[test]
    fn reconciled_properties_skip_unused_dimensions() {
        let record = ReconciledRecord {
            criteria_number: 17,
            criteria_name: "pnr".into(),
            dimensions: [
                Some(("Boarding Station".into(), Some("Orinda".into()))),
                None,
                None,
            ],
            observed_outcome: Some(600.0),
            simulated_outcome: None,
            acceptance_threshold: "t".into(),
            geometry: None,
        };
        let props = record.properties();
        assert_eq!(props["dimension_01_value"], json!("Orinda"));
        assert!(!props.contains_key("dimension_02_name"));
        assert_eq!(props["simulated_outcome"], Value::Null);
    }

    #[test]
    fn numeric_dimension_serializes_as_number() {
        let record = ReconciledRecord {
            criteria_number: 24,
            criteria_name: "zv".into(),
            dimensions: [
                Some(("residence_tract".into(), Some("6001400100".into()))),
                Some(("observed_total_households".into(), Some(1520.0.into()))),
                None,
            ],
            observed_outcome: Some(0.1),
            simulated_outcome: Some(0.12),
            acceptance_threshold: "t".into(),
            geometry: None,
        };
        assert_eq!(record.properties()["dimension_02_value"], json!(1520.0));
    }

    #[test]
    fn network_record_keeps_nulls() {
        let record = NetworkComparisonRecord {
            model_link_id: Some(7),
            model_line_id: Some("AC_1".into()),
            operator: None,
            technology: None,
            route_short_name: None,
            route_long_name: None,
            trip_headsign: None,
            time_period: "am".into(),
            route_observed_boardings: None,
            route_simulated_boardings: Some(0.0),
            florida_threshold: None,
            am_segment_simulated_boardings: None,
            am_segment_volume: None,
            am_segment_capacity_total: None,
            am_segment_vc_ratio_total: None,
            am_segment_capacity_seated: None,
            am_segment_vc_ratio_seated: None,
            mean_am_segment_vc_ratio_total: None,
            geometry: None,
        };
        let props = record.properties().unwrap();
        assert_eq!(props.len(), 18);
        assert_eq!(props["operator"], Value::Null);
        assert!(!props.contains_key("geometry"));
    }
}
