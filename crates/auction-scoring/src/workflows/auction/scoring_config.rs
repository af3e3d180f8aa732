use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(pub String);

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Multipliers applied to each sub-score by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub age: f64,
    pub lfs: f64,
    pub sv: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            age: 0.3,
            lfs: 0.4,
            sv: 0.3,
        }
    }
}

/// How hyphens in the second-level label are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyphenPolicy {
    Allow,
    AllowSingle,
    Forbid,
}

/// Cheap rejection rules applied before any feature scorer runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Compared against the lowercased TLD of each record.
    #[serde(deserialize_with = "tld_set")]
    pub allowed_tlds: BTreeSet<String>,
    pub max_length: usize,
    pub max_digits: usize,
    pub hyphen_policy: HyphenPolicy,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            allowed_tlds: ["com", "net", "org", "io", "co"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            max_length: 20,
            max_digits: 2,
            hyphen_policy: HyphenPolicy::AllowSingle,
        }
    }
}

impl FilterParams {
    /// Trims and lowercases `allowed_tlds`, dropping leading dots and blanks.
    pub fn normalize(&mut self) {
        self.allowed_tlds = normalize_tlds(std::mem::take(&mut self.allowed_tlds));
    }
}

fn normalize_tlds(tlds: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    tlds.into_iter()
        .map(|tld| tld.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|tld| !tld.is_empty())
        .collect()
}

fn tld_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer).map(normalize_tlds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThresholdMode {
    #[default]
    And,
    Or,
}

/// Score/rank cut-offs deciding the preferred flag.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    #[serde(default)]
    pub score_threshold: Option<f64>,
    #[serde(default)]
    pub rank_threshold: Option<u32>,
    #[serde(default)]
    pub mode: ThresholdMode,
}

impl ThresholdPolicy {
    pub fn accepts_all(&self) -> bool {
        self.score_threshold.is_none() && self.rank_threshold.is_none()
    }
}

/// Weight, filter, and threshold settings resolved once per run.
///
/// Changing weights on the active config does not touch records that were
/// already scored; their totals stay comparable only with scores produced under
/// the same config until an explicit reset is issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub id: ConfigId,
    pub name: String,
    pub weights: ScoreWeights,
    pub filter: FilterParams,
    pub thresholds: ThresholdPolicy,
    #[serde(default)]
    pub active: bool,
}

/// Which config a batch, ranking, or classification call should run under.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSelector {
    #[default]
    Active,
    Id(ConfigId),
}

impl From<Option<String>> for ConfigSelector {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(id) if !id.trim().is_empty() => ConfigSelector::Id(ConfigId(id.trim().to_string())),
            _ => ConfigSelector::Active,
        }
    }
}

impl fmt::Display for ConfigSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSelector::Active => f.write_str("active"),
            ConfigSelector::Id(id) => write!(f, "{id}"),
        }
    }
}
