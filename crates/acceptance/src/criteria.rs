//! Fixed acceptance criteria and the stamping of reconciled rows onto the
//! universal comparison schema.

use crate::error::{AcceptanceError, Result};
use crate::model::{DimensionValue, Geometry, ReconciledRecord};

/// Identity and policy of one acceptance test. `number` determines the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion {
    pub number: u32,
    pub name: &'static str,
    pub threshold: &'static str,
    pub dimension_names: [Option<&'static str>; 3],
}

pub const TRANSIT_BOARDINGS: u32 = 15;
pub const BART_STATION_TO_STATION: u32 = 16;
pub const BART_PARK_AND_RIDE: u32 = 17;
pub const RAIL_ACCESS_MODE_SHARE: u32 = 19;
pub const HOME_WORK_FLOWS: u32 = 23;
pub const ZERO_VEHICLE_HOUSEHOLDS: u32 = 24;

pub const CRITERIA: &[Criterion] = &[
    Criterion {
        number: TRANSIT_BOARDINGS,
        name: "Percent error in transit boardings by operator, technology, and time period",
        threshold: "Within the Florida DOT route-level boardings threshold",
        dimension_names: [Some("Operator"), Some("Technology"), Some("Time Period")],
    },
    Criterion {
        number: BART_STATION_TO_STATION,
        name: "Percent root mean square error across boarding-alighting BART flows",
        threshold: "Less than 40 percent",
        dimension_names: [Some("Boarding Station"), Some("Alighting Station"), None],
    },
    Criterion {
        number: BART_PARK_AND_RIDE,
        name: "Percent root mean square error in park and ride lot demand at each BART station with parking access.",
        threshold: "Less than 20 percent for lots with more than 500 daily vehicles",
        dimension_names: [Some("Boarding Station"), None, None],
    },
    Criterion {
        number: RAIL_ACCESS_MODE_SHARE,
        name: "Percent error in share of transit boardings that access via walk, bus, park and ride, and kiss and ride at rail stations",
        threshold: "MTC's assessment of reasonableness",
        dimension_names: [Some("Boarding Station"), Some("Access Mode"), None],
    },
    Criterion {
        number: HOME_WORK_FLOWS,
        name: "Percent root mean square error in CTPP county-to-county worker flows",
        threshold: "Less than 15 percent RMSE",
        dimension_names: [Some("residence_county"), Some("work_county"), None],
    },
    Criterion {
        number: ZERO_VEHICLE_HOUSEHOLDS,
        name: "Spatial patters of observed and estimated zero vehicle households",
        threshold: "MTC's Assessment of Reasonableness",
        dimension_names: [Some("residence_tract"), Some("observed_total_households"), None],
    },
];

pub fn lookup(number: u32) -> Result<&'static Criterion> {
    CRITERIA
        .iter()
        .find(|c| c.number == number)
        .ok_or(AcceptanceError::UnknownCriteria(number))
}

impl Criterion {
    /// Stamp one reconciled row. Dimension values are matched positionally to
    /// the criterion's dimension names; values for unnamed slots are dropped.
    pub fn stamp(
        &self,
        values: [Option<DimensionValue>; 3],
        observed: Option<f64>,
        simulated: Option<f64>,
        geometry: Option<Geometry>,
    ) -> ReconciledRecord {
        let mut dimensions: [Option<(String, Option<DimensionValue>)>; 3] = [None, None, None];
        for (slot, (name, value)) in dimensions
            .iter_mut()
            .zip(self.dimension_names.iter().zip(values))
        {
            if let Some(name) = name {
                *slot = Some((name.to_string(), value));
            }
        }

        ReconciledRecord {
            criteria_number: self.number,
            criteria_name: self.name.to_string(),
            dimensions,
            observed_outcome: observed,
            simulated_outcome: simulated,
            acceptance_threshold: self.threshold.to_string(),
            geometry,
        }
    }
}
