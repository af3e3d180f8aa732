use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::domain::RecordId;
use super::repository::{RecordStore, RepositoryError};
use super::scoring_config::{ThresholdMode, ThresholdPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationReport {
    pub evaluated: usize,
    pub preferred: usize,
}

/// Decides the preferred flag for one scored record.
///
/// An unset threshold does not constrain the decision: under `And` it is
/// satisfied, under `Or` it is left out. With both unset every scored record is
/// preferred. A record scored after the last ranking pass has no rank and never
/// meets a rank threshold.
pub fn is_preferred(policy: &ThresholdPolicy, score: f64, ranking: Option<u32>) -> bool {
    let score_clause = policy.score_threshold.map(|threshold| score >= threshold);
    let rank_clause = policy
        .rank_threshold
        .map(|threshold| ranking.map_or(false, |rank| rank <= threshold));

    match (score_clause, rank_clause) {
        (None, None) => true,
        (Some(clause), None) | (None, Some(clause)) => clause,
        (Some(score_ok), Some(rank_ok)) => match policy.mode {
            ThresholdMode::And => score_ok && rank_ok,
            ThresholdMode::Or => score_ok || rank_ok,
        },
    }
}

/// Re-evaluates `preferred` for every scored record under one threshold policy.
///
/// Flags are written against the ranking generation read before the first
/// page, so a pass that overlaps a newer ranking swap applies nothing.
pub struct PreferredClassifier {
    chunk_size: usize,
}

impl PreferredClassifier {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn classify<S>(
        &self,
        store: &S,
        policy: &ThresholdPolicy,
        now: DateTime<Utc>,
    ) -> Result<ClassificationReport, RepositoryError>
    where
        S: RecordStore + ?Sized,
    {
        if policy.accepts_all() {
            debug!("no thresholds set; every scored record is preferred");
        }
        let generation = store.ranking_generation()?;
        let mut flags: HashMap<RecordId, bool> = HashMap::new();
        let mut cursor = None;

        loop {
            let page = store.scored_page(cursor, self.chunk_size)?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(last.id);
            let full_page = page.len() == self.chunk_size;
            for entry in page {
                flags.insert(entry.id, is_preferred(policy, entry.score, entry.ranking));
            }
            if !full_page {
                break;
            }
        }

        let evaluated = flags.len();
        let preferred = store.apply_preferred(generation, &flags, now)?;
        info!(evaluated, preferred, "preferred flags applied");

        Ok(ClassificationReport {
            evaluated,
            preferred,
        })
    }
}
