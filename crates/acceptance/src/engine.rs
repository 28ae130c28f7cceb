use std::path::{Path, PathBuf};

use crate::compare;
use crate::config::AcceptanceConfig;
use crate::emit::{Feature, FeatureTable, COMPARE_SCHEMA, TRANSIT_NETWORK_SCHEMA};
use crate::error::Result;
use crate::model::{
    BoardingComparison, MazSequence, NetworkComparisonRecord, ObservedAccess, ObservedBoarding,
    ObservedHomeWorkFlow, ObservedStationFlow, ObservedZeroVehicle, ReconciledRecord,
    SimulatedAccess, SimulatedBoarding, SimulatedHomeWorkFlow, SimulatedStationFlow,
    SimulatedZeroVehicle, StationLocation, TractCentroid, TransitSegment,
};
use crate::provider::{Canonical, Observed, Simulated};
use crate::table::{FromRow, Table};
use crate::transit;

/// Files produced by one run. A family that was not requested is `None`.
#[derive(Debug, Default)]
pub struct AcceptanceOutputs {
    pub transit: Option<FeatureTable>,
    pub other: Option<FeatureTable>,
}

/// Reconciles one model run against observed data and writes the two
/// comparison files under `output_root`.
#[derive(Debug, Clone)]
pub struct Acceptance {
    canonical: Canonical,
    simulated: Simulated,
    observed: Observed,
    output_root: PathBuf,
    config: AcceptanceConfig,
}

impl Acceptance {
    pub fn new(
        canonical: Canonical,
        simulated: Simulated,
        observed: Observed,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            canonical,
            simulated,
            observed,
            output_root: output_root.into(),
            config: AcceptanceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AcceptanceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AcceptanceConfig {
        &self.config
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Run the requested families. Each family writes its own file.
    pub fn make_acceptance(&self, make_transit: bool, make_other: bool) -> Result<AcceptanceOutputs> {
        let mut outputs = AcceptanceOutputs::default();
        if make_transit {
            outputs.transit = Some(self.build_transit_comparisons()?);
        }
        if make_other {
            outputs.other = Some(self.build_other_comparisons()?);
        }
        Ok(outputs)
    }

    pub fn build_transit_comparisons(&self) -> Result<FeatureTable> {
        let records = self.transit_network_records()?;
        let features = records
            .iter()
            .map(Feature::try_from)
            .collect::<Result<Vec<_>>>()?;
        let table = FeatureTable::concat("transit_network", TRANSIT_NETWORK_SCHEMA, vec![features])?;
        table.write(&self.output_root.join(&self.config.output.transit_file))?;
        Ok(table)
    }

    pub fn build_other_comparisons(&self) -> Result<FeatureTable> {
        let records = self.other_comparison_records()?;
        let features = records.iter().map(Feature::from).collect();
        let table = FeatureTable::concat("compare", COMPARE_SCHEMA, vec![features])?;
        table.write(&self.output_root.join(&self.config.output.other_file))?;
        Ok(table)
    }

    /// Line comparison records, one per network link, without writing.
    pub fn transit_network_records(&self) -> Result<Vec<NetworkComparisonRecord>> {
        check(&self.simulated.boardings, SimulatedBoarding::COLUMNS)?;
        check(&self.simulated.transit_segments, TransitSegment::COLUMNS)?;
        check(&self.observed.transit_on_board, ObservedBoarding::COLUMNS)?;

        family("transit_network", || {
            let boards = self.boards()?;
            let segments: Vec<TransitSegment> = self.simulated.transit_segments.records()?;
            transit::build_network_records(&boards, &segments, &self.canonical, &self.config)
        })
    }

    /// Point and attribute comparison records in emit order: home-work flows,
    /// zero-vehicle households, BART flows, rail access (access-mode share,
    /// then park and ride), transit boardings by operator.
    ///
    /// Every input table is schema-checked before any family runs.
    pub fn other_comparison_records(&self) -> Result<Vec<ReconciledRecord>> {
        let s = &self.simulated;
        let o = &self.observed;
        check(&s.home_work_flows, SimulatedHomeWorkFlow::COLUMNS)?;
        check(&o.ctpp_flows, ObservedHomeWorkFlow::COLUMNS)?;
        check(&s.zero_vehicle_hhs, SimulatedZeroVehicle::COLUMNS)?;
        check(&s.maz_data, MazSequence::COLUMNS)?;
        check(&o.zero_vehicle_hhs, ObservedZeroVehicle::COLUMNS)?;
        check(&o.tract_centroids, TractCentroid::COLUMNS)?;
        check(&s.station_to_station, SimulatedStationFlow::COLUMNS)?;
        check(&o.bart_boardings, ObservedStationFlow::COLUMNS)?;
        check(&s.transit_access, SimulatedAccess::COLUMNS)?;
        check(&o.transit_access, ObservedAccess::COLUMNS)?;
        check(&s.stations, StationLocation::COLUMNS)?;
        check(&s.boardings, SimulatedBoarding::COLUMNS)?;
        check(&o.transit_on_board, ObservedBoarding::COLUMNS)?;

        let c = &self.canonical;
        let config = &self.config;
        let mut records = Vec::new();
        records.extend(family("home_work_flows", || {
            compare::home_work_flows(s, o, config)
        })?);
        records.extend(family("zero_vehicle_households", || {
            compare::zero_vehicle_households(s, o, c, config)
        })?);
        records.extend(family("bart_station_to_station", || {
            compare::bart_station_to_station(s, o, config)
        })?);
        records.extend(family("rail_access", || compare::rail_access(s, o, c, config))?);
        records.extend(family("transit_boardings", || {
            transit::boardings_by_operator(&self.boards()?)
        })?);
        Ok(records)
    }

    fn boards(&self) -> Result<Vec<BoardingComparison>> {
        let simulated: Vec<SimulatedBoarding> = self.simulated.boardings.records()?;
        let observed: Vec<ObservedBoarding> = self.observed.transit_on_board.records()?;
        transit::join_boardings(
            &simulated,
            &observed,
            &self.canonical,
            self.config.joins.cardinality,
        )
    }
}

fn check(table: &Table, columns: &[&str]) -> Result<()> {
    table.require_columns(columns)
}

/// Run one comparison family inside its own span.
fn family<T>(name: &str, run: impl FnOnce() -> Result<Vec<T>>) -> Result<Vec<T>> {
    let _span = tracing::info_span!("acceptance.family", family = name).entered();

    let records = run()?;
    if records.is_empty() {
        tracing::warn!(event = "family.empty", "comparison family produced no records");
    } else {
        tracing::info!(rows = records.len(), "comparison family reconciled");
    }
    Ok(records)
}
