//! Observation module: per-frame acoustic costs consumed by the search.
//!
//! The acoustic model itself lives outside this crate; the decoder only needs
//! a negative log-likelihood for each (unit, frame) pair.

mod table;

use thiserror::Error;

pub use table::CostTable;

/// Source of emission costs for one utterance.
///
/// Frames are numbered `1..=len()`, matching the lattice time index that an
/// emitting transition moves into.
pub trait ObservationModel {
    /// Number of observation frames (T).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a unit name to the index used by [`emission_cost`](Self::emission_cost).
    fn unit_index(&self, unit: &str) -> Option<usize>;

    /// Negative log-likelihood of `frame` under unit `unit`.
    fn emission_cost(&self, unit: usize, frame: usize) -> f64;

    /// Name-based lookup; `None` if the unit cannot be scored.
    fn emission_cost_for(&self, unit: &str, frame: usize) -> Option<f64> {
        self.unit_index(unit).map(|idx| self.emission_cost(idx, frame))
    }
}

/// Errors raised while loading observation cost tables.
#[derive(Error, Debug)]
pub enum ObservationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame {frame} has {found} costs, expected {expected}")]
    Shape { frame: usize, expected: usize, found: usize },

    #[error("frame {frame}, unit '{unit}': cost {cost} is not a finite non-negative value")]
    InvalidCost { frame: usize, unit: String, cost: f64 },

    #[error("duplicate unit '{0}'")]
    DuplicateUnit(String),
}
