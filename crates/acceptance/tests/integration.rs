use std::path::PathBuf;

use model_acceptance::config::AcceptanceConfig;
use model_acceptance::criteria::{
    BART_PARK_AND_RIDE, BART_STATION_TO_STATION, HOME_WORK_FLOWS, RAIL_ACCESS_MODE_SHARE,
    TRANSIT_BOARDINGS, ZERO_VEHICLE_HOUSEHOLDS,
};
use model_acceptance::{Acceptance, AcceptanceError, Canonical, Observed, Simulated, Table};
use serde_json::{json, Value};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load(name: &str, file: &str) -> Table {
    let path = fixtures_dir().join(file);
    Table::from_csv_path(name, &path)
        .unwrap_or_else(|e| panic!("cannot load {}: {e}", path.display()))
}

fn simulated() -> Simulated {
    Simulated {
        boardings: load("simulated.boardings", "simulated_boardings.csv"),
        transit_segments: load("simulated.transit_segments", "simulated_transit_segments.csv"),
        station_to_station: load(
            "simulated.station_to_station",
            "simulated_station_to_station.csv",
        ),
        zero_vehicle_hhs: load("simulated.zero_vehicle_hhs", "simulated_zero_vehicle_hhs.csv"),
        maz_data: load("simulated.maz_data", "simulated_maz_data.csv"),
        home_work_flows: load("simulated.home_work_flows", "simulated_home_work_flows.csv"),
        transit_access: load("simulated.transit_access", "simulated_transit_access.csv"),
        stations: load("simulated.stations", "simulated_stations.csv"),
    }
}

fn observed() -> Observed {
    Observed {
        transit_on_board: load("observed.transit_on_board", "observed_transit_on_board.csv"),
        bart_boardings: load("observed.bart_boardings", "observed_bart_boardings.csv"),
        zero_vehicle_hhs: load("observed.zero_vehicle_hhs", "observed_zero_vehicle_hhs.csv"),
        tract_centroids: load("observed.tract_centroids", "observed_tract_centroids.csv"),
        ctpp_flows: load("observed.ctpp_flows", "observed_ctpp_flows.csv"),
        transit_access: load("observed.transit_access", "observed_transit_access.csv"),
    }
}

fn canonical() -> Canonical {
    let mut canonical = Canonical::default();
    canonical.rail_operators.insert("BART".into());
    for (line, daily) in [("AC_51A_am", "AC_51A"), ("BART_RED_am", "BART_RED")] {
        canonical.daily_line_names.insert(line.into(), daily.into());
    }
    for (raw, mode) in [
        ("pnr", "Park and Ride"),
        ("Park and Ride", "Park and Ride"),
        ("walk", "Walk"),
        ("Walk", "Walk"),
    ] {
        canonical.access_mode_dict.insert(raw.into(), mode.into());
    }
    canonical
        .with_census_crosswalk(&load("canonical.census_maz_crosswalk", "census_maz_crosswalk.csv"))
        .unwrap()
}

fn config() -> AcceptanceConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("acceptance.toml")).unwrap();
    AcceptanceConfig::from_toml(&toml).unwrap()
}

fn read_geojson(path: PathBuf) -> Value {
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&content).unwrap()
}

// -------------------------------------------------------------------------
// Full run
// -------------------------------------------------------------------------

#[test]
fn full_run_writes_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let acceptance =
        Acceptance::new(canonical(), simulated(), observed(), dir.path()).with_config(config());
    let outputs = acceptance.make_acceptance(true, true).unwrap();

    assert_eq!(outputs.transit.unwrap().len(), 5);
    assert_eq!(outputs.other.unwrap().len(), 10);

    let transit = read_geojson(dir.path().join("transit/network.geojson"));
    let other = read_geojson(dir.path().join("other/compare.geojson"));
    for doc in [&transit, &other] {
        assert_eq!(doc["type"], "FeatureCollection");
        assert_eq!(doc["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4326");
    }
}

#[test]
fn other_comparisons_in_stable_order() {
    let dir = tempfile::tempdir().unwrap();
    let acceptance =
        Acceptance::new(canonical(), simulated(), observed(), dir.path()).with_config(config());
    let records = acceptance.other_comparison_records().unwrap();

    let numbers: Vec<u32> = records.iter().map(|r| r.criteria_number).collect();
    assert_eq!(
        numbers,
        vec![
            HOME_WORK_FLOWS,
            HOME_WORK_FLOWS,
            ZERO_VEHICLE_HOUSEHOLDS,
            BART_STATION_TO_STATION,
            RAIL_ACCESS_MODE_SHARE,
            RAIL_ACCESS_MODE_SHARE,
            BART_PARK_AND_RIDE,
            TRANSIT_BOARDINGS,
            TRANSIT_BOARDINGS,
            TRANSIT_BOARDINGS,
        ]
    );

    // Repeat runs are identical.
    assert_eq!(acceptance.other_comparison_records().unwrap(), records);
}

#[test]
fn other_comparison_values() {
    let dir = tempfile::tempdir().unwrap();
    let acceptance =
        Acceptance::new(canonical(), simulated(), observed(), dir.path()).with_config(config());
    acceptance.build_other_comparisons().unwrap();
    let doc = read_geojson(dir.path().join("other/compare.geojson"));
    let features = doc["features"].as_array().unwrap();
    let props = |i: usize| &features[i]["properties"];

    // CTPP flows scaled by 400 / 200.
    assert_eq!(props(0)["observed_outcome"], json!(300.0));
    assert_eq!(props(1)["dimension_02_value"], "San Francisco");

    // Zero-vehicle tract, household weighted.
    let zero_vehicle = props(2);
    assert_eq!(zero_vehicle["dimension_01_value"], "6001400100");
    assert_eq!(zero_vehicle["dimension_02_value"], json!(210.0));
    let share = zero_vehicle["simulated_outcome"].as_f64().unwrap();
    assert!((share - 0.3).abs() < 1e-12);
    assert_eq!(features[2]["geometry"]["coordinates"], json!([-122.23, 37.86]));

    // BART flows keep only pairs seen on both sides.
    assert_eq!(props(3)["dimension_02_value"], "Embarcadero");
    assert_eq!(props(3)["simulated_outcome"], json!(410.0));

    // Park and ride at Orinda only; Rockridge is under the threshold.
    assert_eq!(props(4)["dimension_01_value"], "BART Orinda");
    assert_eq!(props(6)["dimension_01_value"], "Orinda");
    assert_eq!(props(6)["dimension_02_name"], Value::Null);
    assert_eq!(props(6)["observed_outcome"], json!(700.0));
    assert_eq!(props(6)["simulated_outcome"], json!(650.0));

    // Transit boardings by operator, AC Transit before BART.
    assert_eq!(props(7)["dimension_01_value"], "AC Transit");
    assert_eq!(props(7)["dimension_02_value"], "Local Bus");
    assert_eq!(props(7)["dimension_03_value"], "am");
    assert_eq!(props(9)["dimension_01_value"], "BART");
    assert_eq!(props(9)["dimension_02_value"], "Heavy Rail");
    assert_eq!(props(9)["observed_outcome"], json!(120.0));
    assert_eq!(props(9)["simulated_outcome"], json!(100.0));
}

#[test]
fn transit_network_route_totals_counted_once() {
    let dir = tempfile::tempdir().unwrap();
    let acceptance =
        Acceptance::new(canonical(), simulated(), observed(), dir.path()).with_config(config());
    let records = acceptance.transit_network_records().unwrap();
    assert_eq!(records.len(), 5);

    let daily: Vec<_> = records.iter().filter(|r| r.time_period == "daily").collect();
    assert_eq!(
        daily.iter().map(|r| r.model_link_id).collect::<Vec<_>>(),
        vec![Some(11), Some(12)]
    );
    let daily_simulated: f64 = daily
        .iter()
        .filter_map(|r| r.route_simulated_boardings)
        .sum();
    let daily_observed: f64 = daily
        .iter()
        .filter_map(|r| r.route_observed_boardings)
        .sum();
    assert_eq!(daily_simulated, 300.0);
    assert_eq!(daily_observed, 280.0);
    assert_eq!(daily[0].route_short_name.as_deref(), Some("51A"));

    let am_ac: Vec<_> = records
        .iter()
        .filter(|r| r.time_period == "am" && r.model_line_id.as_deref() == Some("AC_51A_am"))
        .collect();
    assert_eq!(am_ac.len(), 2);
    let am_simulated: f64 = am_ac.iter().filter_map(|r| r.route_simulated_boardings).sum();
    assert_eq!(am_simulated, 40.0);
    assert!(am_ac.iter().all(|r| r.route_observed_boardings == Some(0.0)));
    assert!(am_ac
        .iter()
        .all(|r| r.mean_am_segment_vc_ratio_total == Some(0.375)));
    assert!(am_ac.iter().all(|r| r.technology.as_deref() == Some("Local Bus")));

    let bart = records
        .iter()
        .find(|r| r.model_line_id.as_deref() == Some("BART_RED_am"))
        .unwrap();
    assert_eq!(bart.operator.as_deref(), Some("BART"));
    assert_eq!(bart.model_link_id, Some(21));
    assert_eq!(bart.am_segment_vc_ratio_total, Some(0.8));
}

#[test]
fn transit_file_uses_network_schema() {
    let dir = tempfile::tempdir().unwrap();
    let acceptance =
        Acceptance::new(canonical(), simulated(), observed(), dir.path()).with_config(config());
    acceptance.build_transit_comparisons().unwrap();
    let doc = read_geojson(dir.path().join("transit/network.geojson"));

    let first = &doc["features"][0];
    let keys: Vec<&str> = first["properties"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys.len(), 18);
    assert_eq!(keys[0], "model_link_id");
    assert_eq!(keys[17], "mean_am_segment_vc_ratio_total");
    assert_eq!(first["geometry"]["type"], "LineString");
}

// -------------------------------------------------------------------------
// Failures
// -------------------------------------------------------------------------

#[test]
fn missing_column_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut observed = observed();
    observed.ctpp_flows = Table::from_csv(
        "observed.ctpp_flows",
        "residence_county,observed_flow\nAlameda,150\n",
    )
    .unwrap();
    let acceptance =
        Acceptance::new(canonical(), simulated(), observed, dir.path()).with_config(config());

    let err = acceptance.make_acceptance(false, true).unwrap_err();
    assert!(matches!(
        err,
        AcceptanceError::MissingColumn { ref column, .. } if column == "work_county"
    ));
    assert!(!dir.path().join("other/compare.geojson").exists());
}

#[test]
fn duplicate_key_under_error_policy_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut simulated = simulated();
    simulated.stations = Table::from_csv(
        "simulated.stations",
        "station_name,lon,lat\nOrinda,-122.18,37.88\nOrinda,-122.19,37.88\n",
    )
    .unwrap();
    let acceptance =
        Acceptance::new(canonical(), simulated, observed(), dir.path()).with_config(config());

    let err = acceptance.other_comparison_records().unwrap_err();
    assert!(matches!(err, AcceptanceError::JoinCardinality { .. }));
}
