use serde::{Deserialize, Serialize};

use super::scoring_config::ScoreWeights;

/// Sub-scores gathered for one record. A `None` means the component never ran.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub age: Option<f64>,
    pub lfs: Option<f64>,
    pub sv: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateScore {
    pub total: f64,
    /// Components that were absent and counted as zero.
    pub missing: Vec<&'static str>,
}

/// Weighted sum of the sub-scores under one config's weights.
#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator {
    weights: ScoreWeights,
}

impl ScoreAggregator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn aggregate(&self, scores: &SubScores) -> AggregateScore {
        let mut missing = Vec::new();
        let mut component = |value: Option<f64>, name: &'static str| match value {
            Some(value) if value.is_finite() => value,
            _ => {
                missing.push(name);
                0.0
            }
        };

        let age = component(scores.age, "age");
        let lfs = component(scores.lfs, "lfs");
        let sv = component(scores.sv, "sv");

        AggregateScore {
            total: age * self.weights.age + lfs * self.weights.lfs + sv * self.weights.sv,
            missing,
        }
    }
}
