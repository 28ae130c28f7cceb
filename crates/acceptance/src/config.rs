use serde::Deserialize;

use crate::error::{AcceptanceError, Result};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptanceConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub transit: TransitConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub stations: StationConfig,
    #[serde(default)]
    pub joins: JoinConfig,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_transit_file")]
    pub transit_file: String,
    #[serde(default = "default_other_file")]
    pub other_file: String,
}

fn default_transit_file() -> String {
    "acceptance-transit-network.geojson".into()
}

fn default_other_file() -> String {
    "acceptance-other.geojson".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            transit_file: default_transit_file(),
            other_file: default_other_file(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transit network
// ---------------------------------------------------------------------------

/// `shape_time_period` is the time period of the simulated segment snapshot.
/// Boardings for that period are joined segment-by-segment; all-day boardings
/// are joined to the elected daily shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitConfig {
    #[serde(default = "default_time_period")]
    pub shape_time_period: String,
    #[serde(default = "default_pnr_marker")]
    pub park_and_ride_line_marker: String,
}

fn default_time_period() -> String {
    "am".into()
}

fn default_pnr_marker() -> String {
    "pnr_".into()
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            shape_time_period: default_time_period(),
            park_and_ride_line_marker: default_pnr_marker(),
        }
    }
}

// ---------------------------------------------------------------------------
// Station access
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    #[serde(default = "default_time_period")]
    pub time_period: String,
    #[serde(default = "default_pnr_mode")]
    pub park_and_ride_mode: String,
    /// Observed daily park-and-ride trips a station must exceed to be compared.
    #[serde(default = "default_pnr_threshold")]
    pub park_and_ride_threshold: f64,
}

fn default_pnr_mode() -> String {
    "Park and Ride".into()
}

fn default_pnr_threshold() -> f64 {
    500.0
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            time_period: default_time_period(),
            park_and_ride_mode: default_pnr_mode(),
            park_and_ride_threshold: default_pnr_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationConfig {
    #[serde(default = "default_bart")]
    pub bart_operator: String,
}

fn default_bart() -> String {
    "BART".into()
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            bart_operator: default_bart(),
        }
    }
}

// ---------------------------------------------------------------------------
// Joins
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinConfig {
    #[serde(default)]
    pub cardinality: CardinalityPolicy,
}

/// What to do when a join key expected to be unique repeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalityPolicy {
    /// Log the duplicate key and let the join fan out.
    #[default]
    Warn,
    /// Abort the run with `JoinCardinality`.
    Error,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AcceptanceConfig {
    pub fn from_toml(input: &str) -> Result<Self> {
        let config: AcceptanceConfig =
            toml::from_str(input).map_err(|e| AcceptanceError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let labels = [
            ("output.transit_file", &self.output.transit_file),
            ("output.other_file", &self.output.other_file),
            ("transit.shape_time_period", &self.transit.shape_time_period),
            ("access.time_period", &self.access.time_period),
            ("access.park_and_ride_mode", &self.access.park_and_ride_mode),
            ("stations.bart_operator", &self.stations.bart_operator),
        ];
        for (key, value) in labels {
            if value.trim().is_empty() {
                return Err(AcceptanceError::ConfigValidation(format!(
                    "{key} must not be empty"
                )));
            }
        }

        if self.output.transit_file == self.output.other_file {
            return Err(AcceptanceError::ConfigValidation(
                "transit and other outputs must use different files".into(),
            ));
        }

        if !self.access.park_and_ride_threshold.is_finite()
            || self.access.park_and_ride_threshold < 0.0
        {
            return Err(AcceptanceError::ConfigValidation(format!(
                "access.park_and_ride_threshold must be a non-negative number, got {}",
                self.access.park_and_ride_threshold
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AcceptanceConfig::from_toml("").unwrap();
        assert_eq!(config.output.transit_file, "acceptance-transit-network.geojson");
        assert_eq!(config.output.other_file, "acceptance-other.geojson");
        assert_eq!(config.transit.shape_time_period, "am");
        assert_eq!(config.transit.park_and_ride_line_marker, "pnr_");
        assert_eq!(config.access.park_and_ride_mode, "Park and Ride");
        assert_eq!(config.access.park_and_ride_threshold, 500.0);
        assert_eq!(config.stations.bart_operator, "BART");
        assert_eq!(config.joins.cardinality, CardinalityPolicy::Warn);
    }

    #[test]
    fn parse_overrides() {
        let input = r#"
[output]
transit_file = "transit.geojson"

[access]
time_period = "pm"
park_and_ride_threshold = 250

[joins]
cardinality = "error"
"#;
        let config = AcceptanceConfig::from_toml(input).unwrap();
        assert_eq!(config.output.transit_file, "transit.geojson");
        assert_eq!(config.output.other_file, "acceptance-other.geojson");
        assert_eq!(config.access.time_period, "pm");
        assert_eq!(config.access.park_and_ride_threshold, 250.0);
        assert_eq!(config.joins.cardinality, CardinalityPolicy::Error);
    }

    #[test]
    fn reject_unknown_policy() {
        let input = r#"
[joins]
cardinality = "ignore"
"#;
        let err = AcceptanceConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, AcceptanceError::ConfigParse(_)));
    }

    #[test]
    fn reject_unknown_key() {
        let input = r#"
[stations]
bart = "BART"
"#;
        assert!(AcceptanceConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_negative_threshold() {
        let input = r#"
[access]
park_and_ride_threshold = -1.0
"#;
        let err = AcceptanceConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("park_and_ride_threshold"));
    }

    #[test]
    fn reject_shared_output_file() {
        let input = r#"
[output]
transit_file = "out.geojson"
other_file = "out.geojson"
"#;
        let err = AcceptanceConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("different files"));
    }

    #[test]
    fn reject_blank_label() {
        let input = r#"
[transit]
shape_time_period = "  "
"#;
        let err = AcceptanceConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("transit.shape_time_period"));
    }
}
