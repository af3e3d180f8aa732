//! Global dense ranking over every scored record.
//!
//! A pass pages through the scored set (short store lock per page), builds the
//! complete ranking in a shadow map, and installs it with one generation-checked
//! swap. Nothing is written before the swap, so an aborted pass leaves the
//! previous ranking fully intact.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::RecordId;
use super::repository::{RecordStore, RepositoryError, ScoredEntry};

#[derive(Debug, Clone, Copy)]
pub struct RankingOptions {
    pub chunk_size: usize,
    pub timeout: Option<Duration>,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingReport {
    pub ranked: usize,
    pub chunks: usize,
    pub generation: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("a ranking pass is already running")]
    AlreadyRunning,
    #[error("ranking pass exceeded {limit:?} after {chunks} chunk(s); nothing was applied")]
    TimedOut { limit: Duration, chunks: usize },
    #[error("ranking was replaced by another writer (generation {expected} -> {actual})")]
    Superseded { expected: u64, actual: u64 },
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for RankingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::StaleGeneration { expected, actual } => {
                RankingError::Superseded { expected, actual }
            }
            other => RankingError::Repository(other),
        }
    }
}

/// Single-writer ranking recompute.
pub struct RankingEngine {
    writer: Mutex<()>,
    options: RankingOptions,
}

impl RankingEngine {
    pub fn new(options: RankingOptions) -> Self {
        Self {
            writer: Mutex::new(()),
            options: RankingOptions {
                chunk_size: options.chunk_size.max(1),
                ..options
            },
        }
    }

    pub fn recompute<S>(&self, store: &S, now: DateTime<Utc>) -> Result<RankingReport, RankingError>
    where
        S: RecordStore + ?Sized,
    {
        let _writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(RankingError::AlreadyRunning),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let started = Instant::now();
        let generation = store.ranking_generation()?;
        let mut entries: Vec<ScoredEntry> = Vec::new();
        let mut cursor: Option<RecordId> = None;
        let mut chunks = 0;

        loop {
            let page = store.scored_page(cursor, self.options.chunk_size)?;
            chunks += 1;
            self.check_deadline(started, chunks)?;

            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(last.id);
            let full_page = page.len() == self.options.chunk_size;
            entries.extend(page);
            if !full_page {
                break;
            }
        }

        let ranks = dense_rank(entries);
        self.check_deadline(started, chunks)?;

        let ranked = ranks.len();
        let generation = store.swap_ranking(generation, &ranks, now)?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(ranked, chunks, generation, elapsed_ms, "ranking pass applied");

        Ok(RankingReport {
            ranked,
            chunks,
            generation,
            elapsed_ms,
        })
    }

    fn check_deadline(&self, started: Instant, chunks: usize) -> Result<(), RankingError> {
        match self.options.timeout {
            Some(limit) if started.elapsed() >= limit => {
                warn!(?limit, chunks, "ranking pass aborted before swap");
                Err(RankingError::TimedOut { limit, chunks })
            }
            _ => Ok(()),
        }
    }
}

/// Score descending, then domain ascending, then id ascending: a strict total order.
pub fn ranking_order(left: &ScoredEntry, right: &ScoredEntry) -> Ordering {
    right
        .score
        .total_cmp(&left.score)
        .then_with(|| left.domain.cmp(&right.domain))
        .then_with(|| left.id.cmp(&right.id))
}

/// Assigns ranks `1..=N` with no gaps or duplicates.
pub fn dense_rank(mut entries: Vec<ScoredEntry>) -> HashMap<RecordId, u32> {
    entries.sort_by(ranking_order);
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| (entry.id, u32::try_from(index + 1).unwrap_or(u32::MAX)))
        .collect()
}
