//! Heuristic weight configuration.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Constant offset added to every row's heuristic value.
pub const LOST_PENALTY: f32 = 200_000.0;

/// Number of tunable heuristic weights.
pub const WEIGHT_COUNT: usize = 7;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("expected {WEIGHT_COUNT} heuristic weights, got {got}")]
    WeightCount { got: usize },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid weights file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunable coefficients of the row heuristic.
///
/// The weights are baked into [`crate::engine::Tables`] at construction, so
/// a change only takes effect in a newly built bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeuristicWeights {
    pub monotonicity_power: f32,
    pub monotonicity_weight: f32,
    pub sum_power: f32,
    pub sum_weight: f32,
    pub merges_weight: f32,
    /// Weight of adjacent 1/2 pairs, which combine into a 3.
    pub twelve_merges_weight: f32,
    pub empty_weight: f32,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            monotonicity_power: 4.0,
            monotonicity_weight: 47.0,
            sum_power: 0.0,
            sum_weight: 0.0,
            merges_weight: 0.0,
            twelve_merges_weight: 0.0,
            empty_weight: 0.0,
        }
    }
}

impl HeuristicWeights {
    /// Build from exactly seven positional values, in the order
    /// monotonicity power, monotonicity weight, sum power, sum weight,
    /// merges weight, 1/2-merge weight, empty weight.
    ///
    /// ```
    /// use threes_ai::config::HeuristicWeights;
    /// let w = HeuristicWeights::from_slice(&[4.0, 47.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
    /// assert_eq!(w, HeuristicWeights::default());
    /// assert!(HeuristicWeights::from_slice(&[1.0, 2.0]).is_err());
    /// ```
    pub fn from_slice(values: &[f32]) -> Result<Self, ConfigError> {
        let values: &[f32; WEIGHT_COUNT] =
            values.try_into().map_err(|_| ConfigError::WeightCount { got: values.len() })?;
        let [
            monotonicity_power,
            monotonicity_weight,
            sum_power,
            sum_weight,
            merges_weight,
            twelve_merges_weight,
            empty_weight,
        ] = *values;
        Ok(Self {
            monotonicity_power,
            monotonicity_weight,
            sum_power,
            sum_weight,
            merges_weight,
            twelve_merges_weight,
            empty_weight,
        })
    }

    pub fn to_array(&self) -> [f32; WEIGHT_COUNT] {
        [
            self.monotonicity_power,
            self.monotonicity_weight,
            self.sum_power,
            self.sum_weight,
            self.merges_weight,
            self.twelve_merges_weight,
            self.empty_weight,
        ]
    }

    /// Parse a JSON object; missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }
}
