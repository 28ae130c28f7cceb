//! Transit boardings: simulated line boardings reconciled with on-board survey
//! boardings, then laid onto the shape-period network.
//!
//! Rail operators are compared at operator/technology/time-period level with an
//! outer join, so an operator present on only one side still yields a row.
//! Every other line is left-joined on its line names: each simulated line
//! appears in the output, observed-only routes do not.

use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::{
    aggregate_observed_rail, aggregate_rail_boardings, attribute_route_total,
    build_line_shapes, elect_daily_shapes, sum_optional, LineShape, ObservedRailTotal,
    RailBoardingTotal,
};
use crate::config::{AcceptanceConfig, CardinalityPolicy};
use crate::criteria::{self, TRANSIT_BOARDINGS};
use crate::error::Result;
use crate::join::{left_join, merge_with_precedence, outer_join, JoinSpec, Precedence};
use crate::model::{
    BoardingComparison, LineFamily, NetworkComparisonRecord, ObservedBoarding, ReconciledRecord,
    SimulatedBoarding, TransitSegment,
};
use crate::provider::Canonical;
use crate::vocabulary::{normalize_optional, normalize_technology};

type RailKey = (String, String, String);

fn rail_sim_key((_, t): &(usize, RailBoardingTotal)) -> RailKey {
    (
        t.key.operator.clone(),
        t.key.technology.clone(),
        t.key.time_period.clone(),
    )
}

fn rail_obs_key((_, t): &(usize, ObservedRailTotal)) -> RailKey {
    (t.operator.clone(), t.technology.clone(), t.time_period.clone())
}

/// Build the combined boardings table: rail rows first, then non-rail rows.
pub fn join_boardings(
    simulated: &[SimulatedBoarding],
    observed: &[ObservedBoarding],
    canonical: &Canonical,
    policy: CardinalityPolicy,
) -> Result<Vec<BoardingComparison>> {
    let (sim_rail, sim_other): (Vec<&SimulatedBoarding>, Vec<&SimulatedBoarding>) = simulated
        .iter()
        .partition(|b| canonical.is_rail_operator(&b.operator));
    let (obs_rail, obs_other): (Vec<&ObservedBoarding>, Vec<&ObservedBoarding>) = observed
        .iter()
        .partition(|b| canonical.is_rail_operator(&b.survey_operator));

    let mut out = join_rail(&sim_rail, &obs_rail, policy)?;
    out.extend(join_non_rail(&sim_other, &obs_other, policy)?);

    tracing::info!(
        event = "boardings.joined",
        rail_simulated = sim_rail.len(),
        rail_observed = obs_rail.len(),
        other_simulated = sim_other.len(),
        rows = out.len(),
        "boardings joined"
    );
    Ok(out)
}

fn join_rail(
    simulated: &[&SimulatedBoarding],
    observed: &[&ObservedBoarding],
    policy: CardinalityPolicy,
) -> Result<Vec<BoardingComparison>> {
    let sim_totals: Vec<(usize, RailBoardingTotal)> =
        aggregate_rail_boardings(simulated).into_iter().enumerate().collect();
    let obs_totals: Vec<(usize, ObservedRailTotal)> =
        aggregate_observed_rail(observed).into_iter().enumerate().collect();

    let spec = JoinSpec {
        name: "rail_boardings",
        left_side: "simulated",
        right_side: "observed",
        policy,
    };
    let joined = outer_join(&sim_totals, &obs_totals, rail_sim_key, rail_obs_key, &spec)?;

    Ok(joined
        .into_iter()
        .map(|row| {
            let sim = row.left().map(|(_, s)| s);
            let obs = row.right().map(|(_, o)| o);
            let time_period = sim
                .map(|s| s.key.time_period.clone())
                .or_else(|| obs.map(|o| o.time_period.clone()))
                .unwrap_or_default();
            BoardingComparison {
                family: LineFamily::Rail,
                operator: merge_with_precedence(
                    sim.map(|s| s.key.operator.clone()),
                    obs.map(|o| o.operator.clone()),
                    Precedence::Simulated,
                ),
                technology: merge_with_precedence(
                    sim.map(|s| s.key.technology.clone()),
                    obs.map(|o| o.technology.clone()),
                    Precedence::Simulated,
                ),
                time_period,
                line_name: None,
                daily_line_name: None,
                route_short_name: None,
                route_long_name: None,
                trip_headsign: None,
                simulated_boardings: sim.map(|s| s.total_boarding),
                observed_boardings: obs.map(|o| o.survey_boardings),
                florida_threshold: obs.and_then(|o| o.florida_threshold),
                simulated_row: row.left().map(|(i, _)| *i),
                observed_row: row.right().map(|(i, _)| *i),
            }
        })
        .collect())
}

type LineKey = (Option<String>, Option<String>, String);

fn join_non_rail(
    simulated: &[&SimulatedBoarding],
    observed: &[&ObservedBoarding],
    policy: CardinalityPolicy,
) -> Result<Vec<BoardingComparison>> {
    let spec = JoinSpec {
        name: "line_boardings",
        left_side: "simulated",
        right_side: "observed",
        policy,
    };
    let simulated: Vec<(usize, &SimulatedBoarding)> =
        simulated.iter().copied().enumerate().collect();
    let observed: Vec<(usize, &ObservedBoarding)> =
        observed.iter().copied().enumerate().collect();
    let joined = left_join(
        &simulated,
        &observed,
        |(_, s)| -> LineKey {
            (
                Some(s.line_name.clone()),
                Some(s.daily_line_name.clone()),
                s.time_period.clone(),
            )
        },
        |(_, o)| -> LineKey {
            (
                o.standard_line_name.clone(),
                o.daily_line_name.clone(),
                o.time_period.clone(),
            )
        },
        &spec,
    )?;

    Ok(joined
        .into_iter()
        .map(|(&(sim_row, sim), obs)| BoardingComparison {
            family: LineFamily::NonRail,
            operator: merge_with_precedence(
                Some(sim.operator.clone()).filter(|s| !s.is_empty()),
                obs.map(|(_, o)| o.survey_operator.clone()),
                Precedence::Simulated,
            ),
            technology: merge_with_precedence(
                Some(normalize_technology(&sim.technology)).filter(|s| !s.is_empty()),
                obs.map(|(_, o)| normalize_technology(&o.survey_tech)),
                Precedence::Simulated,
            ),
            time_period: sim.time_period.clone(),
            line_name: Some(sim.line_name.clone()),
            daily_line_name: Some(sim.daily_line_name.clone()),
            route_short_name: obs.and_then(|(_, o)| o.route_short_name.clone()),
            route_long_name: obs.and_then(|(_, o)| o.route_long_name.clone()),
            trip_headsign: obs.and_then(|(_, o)| o.headsign.clone()),
            simulated_boardings: Some(sim.total_boarding),
            observed_boardings: obs.map(|(_, o)| o.survey_boardings),
            florida_threshold: obs.and_then(|(_, o)| o.florida_threshold),
            simulated_row: Some(sim_row),
            observed_row: obs.map(|(i, _)| *i),
        })
        .collect())
}

#[derive(Default)]
struct OperatorTotals {
    observed: Option<f64>,
    simulated: Option<f64>,
    observed_seen: BTreeSet<(LineFamily, usize)>,
    simulated_seen: BTreeSet<(LineFamily, usize)>,
}

/// True the first time a source row is seen. Rows without a source count.
fn first_sighting(
    seen: &mut BTreeSet<(LineFamily, usize)>,
    family: LineFamily,
    row: Option<usize>,
) -> bool {
    row.map_or(true, |i| seen.insert((family, i)))
}

/// Criterion 15: boardings rolled up to operator, technology and time period.
///
/// A source row repeated by a join fan-out is summed once.
pub fn boardings_by_operator(boards: &[BoardingComparison]) -> Result<Vec<ReconciledRecord>> {
    let criterion = criteria::lookup(TRANSIT_BOARDINGS)?;

    type Key = (Option<String>, Option<String>, String);
    let mut groups: BTreeMap<Key, OperatorTotals> = BTreeMap::new();
    for b in boards {
        let key = (b.operator.clone(), b.technology.clone(), b.time_period.clone());
        let entry = groups.entry(key).or_default();
        if first_sighting(&mut entry.observed_seen, b.family, b.observed_row) {
            entry.observed = sum_optional(entry.observed, b.observed_boardings);
        }
        if first_sighting(&mut entry.simulated_seen, b.family, b.simulated_row) {
            entry.simulated = sum_optional(entry.simulated, b.simulated_boardings);
        }
    }

    Ok(groups
        .into_iter()
        .map(|((operator, technology, time_period), totals)| {
            criterion.stamp(
                [
                    operator.map(Into::into),
                    technology.map(Into::into),
                    Some(time_period.into()),
                ],
                totals.observed,
                totals.simulated,
                None,
            )
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Network records
// ---------------------------------------------------------------------------

struct RouteTotals<'b> {
    board: Option<&'b BoardingComparison>,
    model_line_id: Option<String>,
    operator: Option<String>,
    time_period: String,
    zero_observed: bool,
}

fn network_record(
    totals: RouteTotals<'_>,
    shape: Option<&LineShape<'_>>,
) -> NetworkComparisonRecord {
    // A board without any shape is a single row and carries its own totals.
    let first_row = shape.map(|s| s.first_row_in_line).unwrap_or(true);
    let board = totals.board;
    let observed = if totals.zero_observed {
        Some(0.0)
    } else {
        attribute_route_total(board.and_then(|b| b.observed_boardings), first_row)
    };
    let segment = shape.map(|s| s.segment);

    NetworkComparisonRecord {
        model_link_id: segment.map(|s| s.link_id),
        model_line_id: totals.model_line_id,
        operator: totals.operator,
        technology: normalize_optional(board.and_then(|b| b.technology.as_deref())),
        route_short_name: board.and_then(|b| b.route_short_name.clone()),
        route_long_name: board.and_then(|b| b.route_long_name.clone()),
        trip_headsign: board.and_then(|b| b.trip_headsign.clone()),
        time_period: totals.time_period,
        route_observed_boardings: observed,
        route_simulated_boardings: attribute_route_total(
            board.and_then(|b| b.simulated_boardings),
            first_row,
        ),
        florida_threshold: board.and_then(|b| b.florida_threshold),
        am_segment_simulated_boardings: segment.map(|s| s.board),
        am_segment_volume: segment.map(|s| s.volume),
        am_segment_capacity_total: segment.map(|s| s.capacity_total),
        am_segment_vc_ratio_total: shape.and_then(|s| s.vc_ratio_total),
        am_segment_capacity_seated: segment.map(|s| s.capacity_seated),
        am_segment_vc_ratio_seated: shape.and_then(|s| s.vc_ratio_seated),
        mean_am_segment_vc_ratio_total: shape.and_then(|s| s.mean_vc_ratio_total),
        geometry: segment.map(|s| s.geometry.clone()),
    }
}

/// Lay boardings onto the network: all-day boardings onto the elected daily
/// shape, shape-period boardings onto their own line's segments. One record
/// per link; route totals sit on the first link of each line only.
pub fn build_network_records(
    boards: &[BoardingComparison],
    segments: &[TransitSegment],
    canonical: &Canonical,
    config: &AcceptanceConfig,
) -> Result<Vec<NetworkComparisonRecord>> {
    let shapes = build_line_shapes(
        segments,
        canonical,
        &config.transit.park_and_ride_line_marker,
    );
    let daily_shapes = elect_daily_shapes(&shapes);
    let all_day = canonical.all_day_word.as_str();
    let shape_period = config.transit.shape_time_period.as_str();

    let mut records = Vec::new();

    for board in boards.iter().filter(|b| b.time_period == all_day) {
        let shape_rows = board
            .daily_line_name
            .as_ref()
            .and_then(|d| daily_shapes.get(d));
        let totals = || RouteTotals {
            board: Some(board),
            model_line_id: board.daily_line_name.clone(),
            operator: board.operator.clone(),
            time_period: all_day.to_string(),
            zero_observed: false,
        };
        match shape_rows {
            Some(rows) => {
                records.extend(rows.iter().map(|s| network_record(totals(), Some(*s))))
            }
            None => records.push(network_record(totals(), None)),
        }
    }
    let daily_count = records.len();

    let period_boards: Vec<&BoardingComparison> = boards
        .iter()
        .filter(|b| b.time_period == shape_period)
        .collect();
    let spec = JoinSpec {
        name: "shape_boardings",
        left_side: "segments",
        right_side: "boardings",
        policy: config.joins.cardinality,
    };
    let joined = left_join(
        &shapes,
        &period_boards,
        |s| (Some(s.segment.line.clone()), Some(s.daily_line_name.clone())),
        |b| (b.line_name.clone(), b.daily_line_name.clone()),
        &spec,
    )?;

    for (shape, board) in joined {
        let board = board.copied();
        let line_operator = Canonical::operator_from_line_name(&shape.segment.line);
        let rail_operator = canonical
            .is_rail_operator(line_operator)
            .then(|| line_operator.to_string());
        let totals = RouteTotals {
            board,
            model_line_id: merge_with_precedence(
                board.and_then(|b| b.line_name.clone()),
                Some(shape.segment.line.clone()),
                Precedence::Simulated,
            ),
            operator: merge_with_precedence(
                board.and_then(|b| b.operator.clone()),
                rail_operator,
                Precedence::Simulated,
            ),
            time_period: shape_period.to_string(),
            // The survey is not split by direction, so per-period observed
            // totals cannot be attributed to a directional line.
            zero_observed: true,
        };
        records.push(network_record(totals, Some(shape)));
    }

    tracing::info!(
        event = "network.records",
        daily = daily_count,
        shape_period = records.len() - daily_count,
        "network records assembled"
    );
    Ok(records)
}
