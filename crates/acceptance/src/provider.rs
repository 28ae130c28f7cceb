//! Provider value objects. Each is an immutable snapshot handed to the engine
//! once per run; pipeline stages only borrow them.

use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::model::CensusCrosswalk;
use crate::table::Table;

/// Model output tables.
#[derive(Debug, Clone)]
pub struct Simulated {
    pub boardings: Table,
    pub transit_segments: Table,
    pub station_to_station: Table,
    pub zero_vehicle_hhs: Table,
    pub maz_data: Table,
    pub home_work_flows: Table,
    pub transit_access: Table,
    pub stations: Table,
}

/// Survey and census reference tables.
#[derive(Debug, Clone)]
pub struct Observed {
    pub transit_on_board: Table,
    pub bart_boardings: Table,
    pub zero_vehicle_hhs: Table,
    pub tract_centroids: Table,
    pub ctpp_flows: Table,
    pub transit_access: Table,
}

/// Static vocabulary shared by every comparison family.
#[derive(Debug, Clone)]
pub struct Canonical {
    pub rail_operators: BTreeSet<String>,
    pub census_maz_crosswalk: Vec<CensusCrosswalk>,
    pub all_day_word: String,
    /// Raw access-mode label to canonical access mode.
    pub access_mode_dict: HashMap<String, String>,
    /// Per-time-period line name to daily line name.
    pub daily_line_names: HashMap<String, String>,
}

impl Default for Canonical {
    fn default() -> Self {
        Self {
            rail_operators: BTreeSet::new(),
            census_maz_crosswalk: Vec::new(),
            all_day_word: "daily".into(),
            access_mode_dict: HashMap::new(),
            daily_line_names: HashMap::new(),
        }
    }
}

impl Canonical {
    /// Parse the MAZ to census block group crosswalk table.
    pub fn with_census_crosswalk(mut self, table: &Table) -> Result<Self> {
        self.census_maz_crosswalk = table.records()?;
        Ok(self)
    }

    pub fn is_rail_operator(&self, operator: &str) -> bool {
        self.rail_operators.contains(operator)
    }

    /// A line missing from the crosswalk is its own daily line.
    pub fn daily_line_name<'a>(&'a self, line: &'a str) -> &'a str {
        self.daily_line_names
            .get(line)
            .map(String::as_str)
            .unwrap_or(line)
    }

    pub fn access_mode(&self, raw: &str) -> Option<&str> {
        self.access_mode_dict.get(raw).map(String::as_str)
    }

    /// Operator encoded in a line name: everything before the first `_`.
    pub fn operator_from_line_name(line: &str) -> &str {
        line.split('_').next().unwrap_or(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_line_name_falls_back_to_line() {
        let mut canonical = Canonical::default();
        canonical
            .daily_line_names
            .insert("AC_51A_am".into(), "AC_51A".into());
        assert_eq!(canonical.daily_line_name("AC_51A_am"), "AC_51A");
        assert_eq!(canonical.daily_line_name("VTA_22"), "VTA_22");
    }

    #[test]
    fn operator_prefix() {
        assert_eq!(Canonical::operator_from_line_name("BART_RED_am"), "BART");
        assert_eq!(Canonical::operator_from_line_name("Caltrain"), "Caltrain");
    }

    #[test]
    fn census_crosswalk_requires_share() {
        let table = Table::from_rows("canonical.census_maz_crosswalk", &["maz", "blockgroup"], &[]);
        assert!(Canonical::default().with_census_crosswalk(&table).is_err());
    }
}
