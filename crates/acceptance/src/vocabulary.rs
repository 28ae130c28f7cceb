//! Technology label normalization.
//!
//! Substitutions run in declared order against the running value, so the last
//! substitution that matches wins. Each canonical label only contains its own
//! keyword, which makes the first matching keyword decide the result:
//! `"light/heavy"` becomes `"Light Rail"`.

use crate::error::Result;
use crate::table::Table;

pub const TECHNOLOGY_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("local", "Local Bus"),
    ("express", "Express Bus"),
    ("light", "Light Rail"),
    ("ferry", "Ferry"),
    ("heavy", "Heavy Rail"),
    ("commuter", "Commuter Rail"),
];

/// Map a free-text technology label onto the canonical label set.
/// Labels that match no keyword pass through unchanged.
pub fn normalize_technology(label: &str) -> String {
    let mut value = label.to_string();
    for (keyword, canonical) in TECHNOLOGY_SUBSTITUTIONS {
        if value.to_lowercase().contains(keyword) {
            value = (*canonical).to_string();
        }
    }
    value
}

pub fn normalize_optional(label: Option<&str>) -> Option<String> {
    label.map(normalize_technology)
}

/// Rewrite `column` of `table` through [`normalize_technology`].
/// Fails with `MissingColumn` if the column is absent.
pub fn normalize_column(table: &Table, column: &str) -> Result<Table> {
    table.map_column(column, normalize_technology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonical_labels() {
        assert_eq!(normalize_technology("local bus"), "Local Bus");
        assert_eq!(normalize_technology("EXPRESS"), "Express Bus");
        assert_eq!(normalize_technology("Light rail"), "Light Rail");
        assert_eq!(normalize_technology("ferry"), "Ferry");
        assert_eq!(normalize_technology("Heavy Rail"), "Heavy Rail");
        assert_eq!(normalize_technology("commuter rail"), "Commuter Rail");
    }

    #[test]
    fn unmatched_passes_through() {
        assert_eq!(normalize_technology("Cable Car"), "Cable Car");
        assert_eq!(normalize_technology(""), "");
    }

    #[test]
    fn double_match_resolved_by_declared_order() {
        // "light" rewrites first; "light rail" no longer contains "heavy".
        assert_eq!(normalize_technology("light/heavy hybrid"), "Light Rail");
        assert_eq!(normalize_technology("heavy light"), "Light Rail");
        assert_eq!(normalize_technology("express local"), "Local Bus");
    }

    #[test]
    fn column_rewrite() {
        let table = Table::from_rows(
            "observed.transit_on_board",
            &["survey_tech", "survey_operator"],
            &[&["local", "AC Transit"], &["Heavy rail", "BART"]],
        );
        let fixed = normalize_column(&table, "survey_tech").unwrap();
        assert_eq!(
            fixed.column_values("survey_tech").unwrap(),
            vec!["Local Bus", "Heavy Rail"]
        );
        assert_eq!(
            fixed.column_values("survey_operator").unwrap(),
            vec!["AC Transit", "BART"]
        );
    }

    #[test]
    fn missing_column_fails() {
        let table = Table::from_rows("t", &["technology"], &[]);
        assert!(normalize_column(&table, "tech").is_err());
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(label in ".{0,24}") {
            let once = normalize_technology(&label);
            prop_assert_eq!(normalize_technology(&once), once);
        }

        #[test]
        fn keyword_labels_are_idempotent(
            prefix in "[a-z ]{0,6}",
            idx in 0usize..6,
            suffix in "[a-z ]{0,6}",
        ) {
            let label = format!("{prefix}{}{suffix}", TECHNOLOGY_SUBSTITUTIONS[idx].0);
            let once = normalize_technology(&label);
            prop_assert_eq!(normalize_technology(&once), once);
        }
    }
}
