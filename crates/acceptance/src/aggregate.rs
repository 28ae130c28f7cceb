use std::collections::{BTreeMap, HashMap};

use crate::model::{CensusCrosswalk, ObservedBoarding, SimulatedBoarding, TransitSegment};
use crate::provider::Canonical;
use crate::vocabulary::normalize_technology;

// ---------------------------------------------------------------------------
// Rail boardings
// ---------------------------------------------------------------------------

/// Grouping key for simulated rail boardings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RailBoardingKey {
    pub tm2_mode: String,
    pub line_mode: String,
    pub operator: String,
    pub technology: String,
    pub time_period: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RailBoardingTotal {
    pub key: RailBoardingKey,
    pub total_boarding: f64,
}

/// Sum simulated boardings by (mode, line mode, operator, technology, time period).
pub fn aggregate_rail_boardings(rows: &[&SimulatedBoarding]) -> Vec<RailBoardingTotal> {
    let mut groups: BTreeMap<RailBoardingKey, f64> = BTreeMap::new();

    for row in rows {
        let key = RailBoardingKey {
            tm2_mode: row.tm2_mode.clone(),
            line_mode: row.line_mode.clone(),
            operator: row.operator.clone(),
            technology: normalize_technology(&row.technology),
            time_period: row.time_period.clone(),
        };
        *groups.entry(key).or_insert(0.0) += row.total_boarding;
    }

    groups
        .into_iter()
        .map(|(key, total_boarding)| RailBoardingTotal { key, total_boarding })
        .collect()
}

/// Observed rail boardings summed to (operator, technology, time period).
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedRailTotal {
    pub operator: String,
    pub technology: String,
    pub time_period: String,
    pub survey_boardings: f64,
    pub florida_threshold: Option<f64>,
}

/// Survey routes of one rail operator collapse into one row per key so the
/// outer join against simulated totals cannot fan out on route.
/// The largest route threshold is kept.
pub fn aggregate_observed_rail(rows: &[&ObservedBoarding]) -> Vec<ObservedRailTotal> {
    let mut groups: BTreeMap<(String, String, String), (f64, Option<f64>)> = BTreeMap::new();

    for row in rows {
        let key = (
            row.survey_operator.clone(),
            normalize_technology(&row.survey_tech),
            row.time_period.clone(),
        );
        let entry = groups.entry(key).or_insert((0.0, None));
        entry.0 += row.survey_boardings;
        entry.1 = match (entry.1, row.florida_threshold) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    groups
        .into_iter()
        .map(
            |((operator, technology, time_period), (survey_boardings, florida_threshold))| {
                ObservedRailTotal {
                    operator,
                    technology,
                    time_period,
                    survey_boardings,
                    florida_threshold,
                }
            },
        )
        .collect()
}

/// Sum two optional outcomes. Null only when both are null.
pub fn sum_optional(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

// ---------------------------------------------------------------------------
// Geographic rollup
// ---------------------------------------------------------------------------

/// Zero-vehicle share of one original-id MAZ.
#[derive(Debug, Clone, PartialEq)]
pub struct MazShare {
    pub maz: i64,
    pub share: f64,
    pub households: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaShare {
    pub area: String,
    pub share: Option<f64>,
    pub households: f64,
}

/// Roll MAZ shares up to block groups, weighting each MAZ by its households
/// apportioned through the areal crosswalk share. MAZs without a crosswalk
/// entry are dropped.
pub fn rollup_to_blockgroups(mazs: &[MazShare], crosswalk: &[CensusCrosswalk]) -> Vec<AreaShare> {
    let mut by_maz: HashMap<i64, Vec<&CensusCrosswalk>> = HashMap::new();
    for entry in crosswalk {
        by_maz.entry(entry.maz).or_default().push(entry);
    }

    let mut groups: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    let mut unmatched = 0usize;
    for maz in mazs {
        let Some(entries) = by_maz.get(&maz.maz) else {
            unmatched += 1;
            continue;
        };
        for entry in entries {
            let weight = maz.households * entry.maz_share;
            let group = groups.entry(entry.blockgroup.clone()).or_insert((0.0, 0.0));
            group.0 += maz.share * weight;
            group.1 += weight;
        }
    }
    if unmatched > 0 {
        tracing::debug!(unmatched, "MAZs without a census crosswalk entry dropped");
    }

    groups
        .into_iter()
        .map(|(area, (weighted, households))| area_share(area, weighted, households))
        .collect()
}

/// Roll block-group shares up to tracts, weighting by block-group households.
/// A tract id is its block group id without the trailing digit.
pub fn rollup_to_tracts(blockgroups: &[AreaShare]) -> Vec<AreaShare> {
    let mut groups: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for bg in blockgroups {
        let Some(share) = bg.share else { continue };
        let mut tract = bg.area.clone();
        tract.pop();
        let group = groups.entry(tract).or_insert((0.0, 0.0));
        group.0 += share * bg.households;
        group.1 += bg.households;
    }

    groups
        .into_iter()
        .map(|(area, (weighted, households))| area_share(area, weighted, households))
        .collect()
}

fn area_share(area: String, weighted: f64, households: f64) -> AreaShare {
    AreaShare {
        area,
        share: (households > 0.0).then(|| weighted / households),
        households,
    }
}

// ---------------------------------------------------------------------------
// Line shapes
// ---------------------------------------------------------------------------

/// A shape-period segment annotated for the network comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct LineShape<'a> {
    pub segment: &'a TransitSegment,
    pub daily_line_name: String,
    /// Set on the lowest-`seq` segment of each line; route totals land here only.
    pub first_row_in_line: bool,
    pub vc_ratio_total: Option<f64>,
    pub vc_ratio_seated: Option<f64>,
    pub mean_vc_ratio_total: Option<f64>,
}

fn vc_ratio(volume: f64, capacity: f64) -> Option<f64> {
    (capacity > 0.0).then(|| volume / capacity)
}

/// Annotate segments, skipping lines whose name contains `pnr_marker`.
pub fn build_line_shapes<'a>(
    segments: &'a [TransitSegment],
    canonical: &Canonical,
    pnr_marker: &str,
) -> Vec<LineShape<'a>> {
    let kept: Vec<&TransitSegment> = segments
        .iter()
        .filter(|s| pnr_marker.is_empty() || !s.line.contains(pnr_marker))
        .collect();

    let mut first_seq: HashMap<&str, (i64, usize)> = HashMap::new();
    let mut vc_sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for (i, seg) in kept.iter().copied().enumerate() {
        first_seq
            .entry(seg.line.as_str())
            .and_modify(|e| {
                if seg.seq < e.0 {
                    *e = (seg.seq, i);
                }
            })
            .or_insert((seg.seq, i));
        if let Some(vc) = vc_ratio(seg.volume, seg.capacity_total) {
            let sum = vc_sums.entry(seg.line.as_str()).or_insert((0.0, 0));
            sum.0 += vc;
            sum.1 += 1;
        }
    }

    kept.iter()
        .copied()
        .enumerate()
        .map(|(i, seg)| LineShape {
            segment: seg,
            daily_line_name: canonical.daily_line_name(&seg.line).to_string(),
            first_row_in_line: first_seq.get(seg.line.as_str()).map(|e| e.1) == Some(i),
            vc_ratio_total: vc_ratio(seg.volume, seg.capacity_total),
            vc_ratio_seated: vc_ratio(seg.volume, seg.capacity_seated),
            mean_vc_ratio_total: vc_sums
                .get(seg.line.as_str())
                .map(|(sum, n)| sum / *n as f64),
        })
        .collect()
}

/// Elect one representative line per daily line name and return its
/// segments in `seq` order. The elected line is the one with the smallest
/// line id, so the result does not depend on row order.
pub fn elect_daily_shapes<'s, 'a>(
    shapes: &'s [LineShape<'a>],
) -> BTreeMap<String, Vec<&'s LineShape<'a>>> {
    let mut elected: BTreeMap<&str, &str> = BTreeMap::new();
    for shape in shapes {
        elected
            .entry(shape.daily_line_name.as_str())
            .and_modify(|line| {
                if shape.segment.line.as_str() < *line {
                    *line = shape.segment.line.as_str();
                }
            })
            .or_insert(shape.segment.line.as_str());
    }

    let mut daily: BTreeMap<String, Vec<&'s LineShape<'a>>> = BTreeMap::new();
    for shape in shapes {
        if elected.get(shape.daily_line_name.as_str()) == Some(&shape.segment.line.as_str()) {
            daily
                .entry(shape.daily_line_name.clone())
                .or_default()
                .push(shape);
        }
    }
    for segments in daily.values_mut() {
        segments.sort_by_key(|s| s.segment.seq);
    }
    daily
}

/// Route-level totals are carried by the first row of a line only; every
/// other row of the line gets zero so per-link output sums to the route total.
pub fn attribute_route_total(total: Option<f64>, first_row_in_line: bool) -> Option<f64> {
    if first_row_in_line {
        total
    } else {
        Some(0.0)
    }
}
