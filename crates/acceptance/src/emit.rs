//! Comparison emitter: concatenates per-family records into one output
//! table, projects it onto a fixed schema and writes GeoJSON.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::error::{AcceptanceError, Result};
use crate::model::{Geometry, NetworkComparisonRecord, ReconciledRecord};

/// Output coordinate reference system.
pub const EPSG: u32 = 4326;

/// One declared output column. Required columns must be present on at least
/// one row of a non-empty output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> ColumnSpec {
    ColumnSpec { name, required: true }
}

const fn optional(name: &'static str) -> ColumnSpec {
    ColumnSpec { name, required: false }
}

/// Line comparisons, one row per link. Geometry is carried separately.
pub const TRANSIT_NETWORK_SCHEMA: &[ColumnSpec] = &[
    required("model_link_id"),
    required("model_line_id"),
    required("operator"),
    required("technology"),
    required("route_short_name"),
    required("route_long_name"),
    required("trip_headsign"),
    required("time_period"),
    required("route_observed_boardings"),
    required("route_simulated_boardings"),
    required("florida_threshold"),
    required("am_segment_simulated_boardings"),
    required("am_segment_volume"),
    required("am_segment_capacity_total"),
    required("am_segment_vc_ratio_total"),
    required("am_segment_capacity_seated"),
    required("am_segment_vc_ratio_seated"),
    required("mean_am_segment_vc_ratio_total"),
];

/// Point and attribute comparisons. Geometry is carried separately.
pub const COMPARE_SCHEMA: &[ColumnSpec] = &[
    required("criteria_number"),
    required("criteria_name"),
    required("dimension_01_name"),
    required("dimension_01_value"),
    optional("dimension_02_name"),
    optional("dimension_02_value"),
    optional("dimension_03_name"),
    optional("dimension_03_value"),
    required("observed_outcome"),
    required("simulated_outcome"),
    required("acceptance_threshold"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub properties: Map<String, Value>,
    pub geometry: Option<Geometry>,
}

impl From<&ReconciledRecord> for Feature {
    fn from(record: &ReconciledRecord) -> Self {
        Self {
            properties: record.properties(),
            geometry: record.geometry.clone(),
        }
    }
}

impl TryFrom<&NetworkComparisonRecord> for Feature {
    type Error = AcceptanceError;

    fn try_from(record: &NetworkComparisonRecord) -> Result<Self> {
        Ok(Self {
            properties: record.properties()?,
            geometry: record.geometry.clone(),
        })
    }
}

/// A named output table with a fixed column order.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    name: String,
    columns: Vec<&'static str>,
    features: Vec<Feature>,
}

impl FeatureTable {
    /// Concatenate parts row-wise in the given order. Columns are unioned
    /// across all rows, absent cells become null, and the result is projected
    /// onto `schema`. Fails if a required column is absent from every row of
    /// a non-empty output.
    pub fn concat(name: &str, schema: &[ColumnSpec], parts: Vec<Vec<Feature>>) -> Result<Self> {
        let features: Vec<Feature> = parts.into_iter().flatten().collect();

        let present: BTreeSet<&str> = features
            .iter()
            .flat_map(|f| f.properties.keys().map(String::as_str))
            .collect();

        if !features.is_empty() {
            if let Some(missing) = schema
                .iter()
                .find(|c| c.required && !present.contains(c.name))
            {
                return Err(AcceptanceError::MissingOutputColumn {
                    output: name.to_string(),
                    column: missing.name.to_string(),
                });
            }
        }

        let dropped: Vec<&str> = present
            .iter()
            .copied()
            .filter(|p| !schema.iter().any(|c| c.name == *p))
            .collect();
        if !dropped.is_empty() {
            tracing::debug!(output = name, ?dropped, "columns outside the output schema dropped");
        }

        let features = features
            .into_iter()
            .map(|mut f| {
                let mut properties = Map::with_capacity(schema.len());
                for column in schema {
                    let value = f.properties.remove(column.name).unwrap_or(Value::Null);
                    properties.insert(column.name.to_string(), value);
                }
                Feature {
                    properties,
                    geometry: f.geometry,
                }
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            columns: schema.iter().map(|c| c.name).collect(),
            features,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|f| {
                json!({
                    "type": "Feature",
                    "properties": f.properties,
                    "geometry": f.geometry.as_ref().map(Geometry::to_geojson),
                })
            })
            .collect();

        json!({
            "type": "FeatureCollection",
            "name": self.name,
            "crs": {
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{EPSG}") },
            },
            "features": features,
        })
    }

    /// Write the table as a GeoJSON feature collection, creating parent
    /// directories as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.to_geojson())?;
        tracing::info!(
            output = %self.name,
            path = %path.display(),
            rows = self.features.len(),
            "comparison file written"
        );
        Ok(())
    }
}
