//! Precomputed emission cost tables loaded from JSON.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ObservationError, ObservationModel};

/// On-disk layout: unit names plus one row of costs per frame.
#[derive(Debug, Serialize, Deserialize)]
struct CostTableFile {
    units: Vec<String>,
    costs: Vec<Vec<f64>>,
}

/// Dense `frames x units` table of negative log-likelihoods.
#[derive(Debug, Clone)]
pub struct CostTable {
    units: Vec<String>,
    index: HashMap<String, usize>,
    costs: Vec<Vec<f64>>, // costs[frame - 1][unit]
}

impl CostTable {
    /// Create a table, checking its shape and values.
    ///
    /// # Arguments
    /// * `units` - Unit names, one per column
    /// * `costs` - One row per frame, frame 1 first
    ///
    /// # Errors
    /// Returns an error on duplicate units, ragged rows, or negative / non-finite costs.
    pub fn new(units: Vec<String>, costs: Vec<Vec<f64>>) -> Result<Self, ObservationError> {
        let mut index = HashMap::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            if index.insert(unit.clone(), i).is_some() {
                return Err(ObservationError::DuplicateUnit(unit.clone()));
            }
        }

        for (row, frame_costs) in costs.iter().enumerate() {
            let frame = row + 1;
            if frame_costs.len() != units.len() {
                return Err(ObservationError::Shape { frame, expected: units.len(), found: frame_costs.len() });
            }
            if let Some((i, &cost)) = frame_costs.iter().enumerate().find(|(_, c)| !c.is_finite() || **c < 0.0) {
                return Err(ObservationError::InvalidCost { frame, unit: units[i].clone(), cost });
            }
        }

        Ok(Self { units, index, costs })
    }

    /// Parse a table from JSON (`{"units": [...], "costs": [[...], ...]}`).
    pub fn from_json(json: &str) -> Result<Self, ObservationError> {
        let file: CostTableFile = serde_json::from_str(json)?;
        Self::new(file.units, file.costs)
    }

    /// Read a table from a JSON file.
    pub fn read(path: &Path) -> Result<Self, ObservationError> {
        let json = std::fs::read_to_string(path)?;
        let table = Self::from_json(&json)?;
        debug!("Loaded {} frames x {} units from {}", table.len(), table.units.len(), path.display());
        Ok(table)
    }

    /// Unit names in column order.
    pub fn units(&self) -> &[String] {
        &self.units
    }
}

impl ObservationModel for CostTable {
    fn len(&self) -> usize {
        self.costs.len()
    }

    fn unit_index(&self, unit: &str) -> Option<usize> {
        self.index.get(unit).copied()
    }

    fn emission_cost(&self, unit: usize, frame: usize) -> f64 {
        self.costs[frame - 1][unit]
    }
}
