//! Point/attribute comparison families: worker flows, zero-vehicle households,
//! BART station-to-station flows and rail station access modes.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::{rollup_to_blockgroups, rollup_to_tracts, AreaShare, MazShare};
use crate::config::AcceptanceConfig;
use crate::criteria::{
    self, BART_PARK_AND_RIDE, BART_STATION_TO_STATION, HOME_WORK_FLOWS, RAIL_ACCESS_MODE_SHARE,
    ZERO_VEHICLE_HOUSEHOLDS,
};
use crate::error::Result;
use crate::join::{inner_join, left_join, JoinSpec};
use crate::model::{
    Geometry, MazSequence, ObservedAccess, ObservedHomeWorkFlow, ObservedStationFlow,
    ObservedZeroVehicle, ReconciledRecord, SimulatedAccess, SimulatedHomeWorkFlow,
    SimulatedStationFlow, SimulatedZeroVehicle, StationLocation, TractCentroid,
};
use crate::provider::{Canonical, Observed, Simulated};

const CENSUS_TRACT_PREFIX: &str = "1400000US0";

fn sim_obs_join<'a>(name: &'a str, config: &AcceptanceConfig) -> JoinSpec<'a> {
    JoinSpec {
        name,
        left_side: "simulated",
        right_side: "observed",
        policy: config.joins.cardinality,
    }
}

// ---------------------------------------------------------------------------
// Criterion 23: home-work flows
// ---------------------------------------------------------------------------

/// Observed CTPP flows are first scaled so their total matches the simulated
/// total, then every simulated county pair is left-joined to them.
pub fn home_work_flows(
    simulated: &Simulated,
    observed: &Observed,
    config: &AcceptanceConfig,
) -> Result<Vec<ReconciledRecord>> {
    let criterion = criteria::lookup(HOME_WORK_FLOWS)?;
    let sim: Vec<SimulatedHomeWorkFlow> = simulated.home_work_flows.records()?;
    let obs: Vec<ObservedHomeWorkFlow> = observed.ctpp_flows.records()?;

    let sim_total: f64 = sim.iter().map(|f| f.simulated_flow).sum();
    let obs_total: f64 = obs.iter().map(|f| f.observed_flow).sum();
    let adjust = if obs_total > 0.0 {
        sim_total / obs_total
    } else {
        tracing::warn!(event = "flows.unscaled", "observed CTPP flows sum to zero");
        1.0
    };

    let joined = left_join(
        &sim,
        &obs,
        |s| (s.residence_county.clone(), s.work_county.clone()),
        |o| (o.residence_county.clone(), o.work_county.clone()),
        &sim_obs_join("home_work_flows", config),
    )?;

    Ok(joined
        .into_iter()
        .map(|(s, o)| {
            criterion.stamp(
                [
                    Some(s.residence_county.as_str().into()),
                    Some(s.work_county.as_str().into()),
                    None,
                ],
                o.map(|o| o.observed_flow * adjust),
                Some(s.simulated_flow),
                None,
            )
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Criterion 24: zero-vehicle households
// ---------------------------------------------------------------------------

/// Observed census share keyed by tract.
#[derive(Debug, Clone, PartialEq)]
struct ObservedTract {
    tract: String,
    total_households: Option<f64>,
    share: Option<f64>,
}

/// One row per tract, first row wins. A later row with different values
/// for the same tract is logged and ignored.
fn dedup_census_tracts(census: &[ObservedZeroVehicle]) -> Vec<ObservedTract> {
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();
    let mut tracts: Vec<ObservedTract> = Vec::with_capacity(census.len());
    for row in census {
        match positions.entry(row.geoid.replace(CENSUS_TRACT_PREFIX, "")) {
            Entry::Occupied(entry) => {
                let kept = &tracts[*entry.get()];
                if kept.total_households != row.total_households || kept.share != row.share {
                    tracing::warn!(
                        event = "census.conflicting_tract",
                        tract = %entry.key(),
                        "later census row for tract ignored"
                    );
                }
            }
            Entry::Vacant(entry) => {
                tracts.push(ObservedTract {
                    tract: entry.key().clone(),
                    total_households: row.total_households,
                    share: row.share,
                });
                entry.insert(tracts.len() - 1);
            }
        }
    }
    tracts
}

pub fn zero_vehicle_households(
    simulated: &Simulated,
    observed: &Observed,
    canonical: &Canonical,
    config: &AcceptanceConfig,
) -> Result<Vec<ReconciledRecord>> {
    let criterion = criteria::lookup(ZERO_VEHICLE_HOUSEHOLDS)?;
    let zero_vehicle: Vec<SimulatedZeroVehicle> = simulated.zero_vehicle_hhs.records()?;
    let sequences: Vec<MazSequence> = simulated.maz_data.records()?;
    let census: Vec<ObservedZeroVehicle> = observed.zero_vehicle_hhs.records()?;
    let centroids: Vec<TractCentroid> = observed.tract_centroids.records()?;

    let maz_spec = JoinSpec {
        name: "maz_sequence",
        left_side: "zero_vehicle",
        right_side: "maz_data",
        policy: config.joins.cardinality,
    };
    let mazs: Vec<MazShare> = left_join(
        &zero_vehicle,
        &sequences,
        |z| z.maz,
        |m| m.sequence,
        &maz_spec,
    )?
    .into_iter()
    .filter_map(|(z, m)| {
        m.map(|m| MazShare {
            maz: m.original,
            share: z.share,
            households: z.households,
        })
    })
    .collect();

    let tracts: Vec<AreaShare> =
        rollup_to_tracts(&rollup_to_blockgroups(&mazs, &canonical.census_maz_crosswalk));

    let observed_tracts = dedup_census_tracts(&census);

    let with_observed = left_join(
        &tracts,
        &observed_tracts,
        |t| t.area.clone(),
        |o| o.tract.clone(),
        &sim_obs_join("zero_vehicle_tracts", config),
    )?;
    let centroid_spec = JoinSpec {
        name: "tract_centroids",
        left_side: "tracts",
        right_side: "centroids",
        policy: config.joins.cardinality,
    };
    let with_centroid = left_join(
        &with_observed,
        &centroids,
        |(t, _)| t.area.clone(),
        |c| c.tract.clone(),
        &centroid_spec,
    )?;

    Ok(with_centroid
        .into_iter()
        .map(|((tract, obs), centroid)| {
            criterion.stamp(
                [
                    Some(tract.area.as_str().into()),
                    obs.and_then(|o| o.total_households).map(Into::into),
                    None,
                ],
                obs.and_then(|o| o.share),
                tract.share,
                centroid.map(|c| Geometry::point(c.lon, c.lat)),
            )
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Criterion 16: BART station-to-station
// ---------------------------------------------------------------------------

/// Only station pairs present on both sides are compared.
pub fn bart_station_to_station(
    simulated: &Simulated,
    observed: &Observed,
    config: &AcceptanceConfig,
) -> Result<Vec<ReconciledRecord>> {
    let criterion = criteria::lookup(BART_STATION_TO_STATION)?;
    let obs: Vec<ObservedStationFlow> = observed.bart_boardings.records()?;
    let sim: Vec<SimulatedStationFlow> = simulated
        .station_to_station
        .records::<SimulatedStationFlow>()?
        .into_iter()
        .filter(|s| s.operator == config.stations.bart_operator)
        .collect();

    let spec = JoinSpec {
        name: "bart_station_to_station",
        left_side: "observed",
        right_side: "simulated",
        policy: config.joins.cardinality,
    };
    let joined = inner_join(
        &obs,
        &sim,
        |o| (o.boarding.clone(), o.alighting.clone()),
        |s| (s.boarding_name.clone(), s.alighting_name.clone()),
        &spec,
    )?;

    Ok(joined
        .into_iter()
        .map(|(o, s)| {
            let geometry = match (o.boarding_lon, o.boarding_lat) {
                (Some(lon), Some(lat)) => Some(Geometry::point(lon, lat)),
                _ => None,
            };
            criterion.stamp(
                [
                    Some(o.boarding.as_str().into()),
                    Some(o.alighting.as_str().into()),
                    None,
                ],
                Some(o.observed),
                Some(s.simulated),
                geometry,
            )
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Criteria 19 and 17: rail station access
// ---------------------------------------------------------------------------

/// Access row after vocabulary remapping, keyed like the observed side.
#[derive(Debug, Clone, PartialEq)]
struct AccessRow {
    operator: String,
    station: String,
    time_period: String,
    access_mode: String,
    trips: f64,
}

type AccessKey = (String, String, String, String);

fn access_key(r: &AccessRow) -> AccessKey {
    (
        r.operator.clone(),
        r.station.clone(),
        r.time_period.clone(),
        r.access_mode.clone(),
    )
}

/// Remap access modes through the canonical dictionary and keep one time
/// period. Rows whose mode is not in the dictionary are dropped.
fn remap_access(
    rows: impl Iterator<Item = AccessRow>,
    canonical: &Canonical,
    time_period: &str,
    side: &'static str,
) -> Vec<AccessRow> {
    let mut unmapped = 0usize;
    let out: Vec<AccessRow> = rows
        .filter(|r| r.time_period == time_period)
        .filter_map(|mut r| match canonical.access_mode(&r.access_mode) {
            Some(mode) => {
                r.access_mode = mode.to_string();
                Some(r)
            }
            None => {
                unmapped += 1;
                None
            }
        })
        .collect();
    if unmapped > 0 {
        tracing::debug!(side, unmapped, "access rows with unknown access mode dropped");
    }
    out
}

/// Compare access-mode boardings at stations with heavy park-and-ride use.
///
/// Both criteria read the same reconciled table: 19 covers every access mode
/// at the selected stations, 17 is its BART park-and-ride projection.
pub fn rail_access(
    simulated: &Simulated,
    observed: &Observed,
    canonical: &Canonical,
    config: &AcceptanceConfig,
) -> Result<Vec<ReconciledRecord>> {
    let share_criterion = criteria::lookup(RAIL_ACCESS_MODE_SHARE)?;
    let pnr_criterion = criteria::lookup(BART_PARK_AND_RIDE)?;
    let access = &config.access;

    let sim_rows = simulated
        .transit_access
        .records::<SimulatedAccess>()?
        .into_iter()
        .map(|s| AccessRow {
            operator: s.operator,
            station: s.boarding_name,
            time_period: s.time_period,
            access_mode: s.access_mode,
            trips: s.simulated_boardings,
        });
    let obs_rows = observed
        .transit_access
        .records::<ObservedAccess>()?
        .into_iter()
        .map(|o| AccessRow {
            operator: o.operator,
            station: o.boarding_station,
            time_period: o.time_period,
            access_mode: o.access_mode,
            trips: o.survey_trips,
        });
    let stations: Vec<StationLocation> = simulated.stations.records()?;

    let sim = remap_access(sim_rows, canonical, &access.time_period, "simulated");
    let obs = remap_access(obs_rows, canonical, &access.time_period, "observed");

    let spec = JoinSpec {
        name: "station_access",
        left_side: "observed",
        right_side: "simulated",
        policy: config.joins.cardinality,
    };
    let joined = left_join(&obs, &sim, access_key, access_key, &spec)?;

    let relevant: BTreeSet<(&str, &str)> = joined
        .iter()
        .filter(|(o, _)| {
            o.access_mode == access.park_and_ride_mode && o.trips > access.park_and_ride_threshold
        })
        .map(|(o, _)| (o.operator.as_str(), o.station.as_str()))
        .collect();

    let selected: Vec<(&AccessRow, f64)> = joined
        .iter()
        .filter(|(o, _)| relevant.contains(&(o.operator.as_str(), o.station.as_str())))
        .map(|(o, s)| (*o, s.map(|s| s.trips).unwrap_or(0.0)))
        .collect();

    let location_spec = JoinSpec {
        name: "station_locations",
        left_side: "access",
        right_side: "stations",
        policy: config.joins.cardinality,
    };
    let located = left_join(
        &selected,
        &stations,
        |(o, _)| o.station.clone(),
        |s| s.station_name.clone(),
        &location_spec,
    )?;

    let mut shares = Vec::with_capacity(located.len());
    let mut park_and_ride = Vec::new();
    for ((row, simulated_trips), location) in located {
        let geometry = location.map(|l| Geometry::point(l.lon, l.lat));
        shares.push(share_criterion.stamp(
            [
                Some(format!("{} {}", row.operator, row.station).into()),
                Some(row.access_mode.as_str().into()),
                None,
            ],
            Some(row.trips),
            Some(*simulated_trips),
            geometry.clone(),
        ));
        if row.operator == config.stations.bart_operator
            && row.access_mode == access.park_and_ride_mode
        {
            park_and_ride.push(pnr_criterion.stamp(
                [Some(row.station.as_str().into()), None, None],
                Some(row.trips),
                Some(*simulated_trips),
                geometry,
            ));
        }
    }

    tracing::info!(
        event = "access.selected",
        stations = relevant.len(),
        share_rows = shares.len(),
        park_and_ride_rows = park_and_ride.len(),
        "rail access stations selected"
    );
    shares.extend(park_and_ride);
    Ok(shares)
}
