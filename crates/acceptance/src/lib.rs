//! `model-acceptance`: reconciles travel-model output with observed data.
//!
//! Pure engine crate: receives pre-loaded provider tables, aligns simulated and
//! observed records per comparison family and emits two GeoJSON comparison
//! files. No CLI and no logging subscriber.

pub mod aggregate;
pub mod compare;
pub mod config;
pub mod criteria;
pub mod emit;
pub mod engine;
pub mod error;
pub mod join;
pub mod model;
pub mod provider;
pub mod table;
pub mod transit;
pub mod vocabulary;

pub use config::AcceptanceConfig;
pub use engine::{Acceptance, AcceptanceOutputs};
pub use error::{AcceptanceError, Result};
pub use model::{NetworkComparisonRecord, ReconciledRecord};
pub use provider::{Canonical, Observed, Simulated};
pub use table::Table;
