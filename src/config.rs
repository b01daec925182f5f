// src/config.rs
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::batch::validate_max_distance;
use crate::damerau::EditWeights;
use crate::error::Result;

/// Parameters shared by every pair in a batch.
///
/// `weights` is ordered deletion, insertion, substitution, transposition.
/// A `max_distance` of 0 disables the ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistanceConfig {
    pub weights: [f64; 4],
    pub max_distance: f64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        DistanceConfig { weights: [1.0; 4], max_distance: 0.0 }
    }
}

impl DistanceConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(EditWeights, f64)> {
        let weights = EditWeights::from_slice(&self.weights)?;
        let max_distance = validate_max_distance(self.max_distance)?;
        Ok((weights, max_distance))
    }
}
