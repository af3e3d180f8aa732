use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::aggregate::{ScoreAggregator, SubScores};
use super::claim::BatchClaimCoordinator;
use super::classifier::{ClassificationReport, PreferredClassifier};
use super::clock::Clock;
use super::domain::{AuctionRecord, RecordId, RecordView};
use super::eligibility::{EligibilityFilter, FilterResult};
use super::features::FeatureScorers;
use super::ranking::{RankingEngine, RankingError, RankingOptions, RankingReport};
use super::repository::{
    Completion, ConfigRepository, ListingQuery, RecordStore, RepositoryError, ResetScope,
    StoreStats,
};
use super::scoring_config::{ConfigId, ConfigSelector, ScoringConfig, ThresholdPolicy};
use crate::config::EngineConfig;

/// Tunables for one service instance.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub batch_size: usize,
    pub lease: Duration,
    pub ranking: RankingOptions,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            lease: Duration::minutes(5),
            ranking: RankingOptions::default(),
        }
    }
}

impl From<&EngineConfig> for ServiceSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            lease: config.lease(),
            ranking: RankingOptions {
                chunk_size: config.ranking_chunk_size,
                timeout: config.ranking_timeout(),
            },
        }
    }
}

/// Trigger parameters for one batch cycle.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub batch_size: Option<usize>,
    pub config: ConfigSelector,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringWarning {
    pub record_id: RecordId,
    pub domain: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub config_id: ConfigId,
    pub claimed: usize,
    pub rejected: usize,
    pub scored: usize,
    pub scoring_errors: usize,
    /// Records whose lease was taken over before this worker finished them.
    pub lost: usize,
    pub released: usize,
    pub cancelled: bool,
    pub warnings: Vec<ScoringWarning>,
}

impl BatchReport {
    fn new(config_id: ConfigId, claimed: usize) -> Self {
        Self {
            config_id,
            claimed,
            rejected: 0,
            scored: 0,
            scoring_errors: 0,
            lost: 0,
            released: 0,
            cancelled: false,
            warnings: Vec::new(),
        }
    }

    /// True when the claim came back empty, i.e. nothing was left to process.
    pub fn is_exhausted(&self) -> bool {
        self.claimed == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrainReport {
    pub config_id: ConfigId,
    pub batches: usize,
    pub claimed: usize,
    pub rejected: usize,
    pub scored: usize,
    pub scoring_errors: usize,
    pub lost: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingPassReport {
    pub config_id: ConfigId,
    pub ranking: RankingReport,
    pub classification: ClassificationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigUpdate {
    pub config: ScoringConfig,
    /// Present when the change touched the active config and flags were recomputed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationReport>,
}

/// Composes claim coordination, filtering, feature scoring, aggregation,
/// ranking, and classification over one record store.
///
/// Ranking passes, classification passes and config changes that re-classify
/// all run under `passes`, so `preferred` is always derived from the ranking
/// it is stored next to. Writers on other instances sharing the store are
/// fenced by the store's ranking generation instead.
pub struct ScoringService<S, C> {
    store: Arc<S>,
    configs: Arc<C>,
    coordinator: BatchClaimCoordinator<S>,
    scorers: FeatureScorers,
    ranking: RankingEngine,
    classifier: PreferredClassifier,
    passes: Mutex<()>,
    clock: Arc<dyn Clock>,
    default_batch_size: usize,
}

impl<S, C> ScoringService<S, C>
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    pub fn new(
        store: Arc<S>,
        configs: Arc<C>,
        scorers: FeatureScorers,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        let coordinator = BatchClaimCoordinator::new(store.clone(), clock.clone(), settings.lease);
        Self {
            store,
            configs,
            coordinator,
            scorers,
            ranking: RankingEngine::new(settings.ranking),
            classifier: PreferredClassifier::new(settings.ranking.chunk_size),
            passes: Mutex::new(()),
            clock,
            default_batch_size: settings.batch_size,
        }
    }

    /// Resolves the config a run will use. A missing config is fatal for the run.
    pub fn resolve_config(
        &self,
        selector: &ConfigSelector,
    ) -> Result<ScoringConfig, ScoringServiceError> {
        let config = match selector {
            ConfigSelector::Active => self.configs.active()?,
            ConfigSelector::Id(id) => self.configs.fetch(id)?,
        };
        config.ok_or_else(|| ScoringServiceError::MissingConfig(selector.clone()))
    }

    /// Claims one batch and drives every record in it to a terminal state.
    pub fn run_batch(&self, request: BatchRequest) -> Result<BatchReport, ScoringServiceError> {
        let batch_size = self.batch_size(request.batch_size)?;
        let config = self.resolve_config(&request.config)?;
        self.process_batch(&config, batch_size, None)
    }

    /// Like `run_batch`, but stops between records once `cancel` is set and
    /// releases the claims it did not get to.
    pub fn run_batch_cancellable(
        &self,
        request: BatchRequest,
        cancel: &AtomicBool,
    ) -> Result<BatchReport, ScoringServiceError> {
        let batch_size = self.batch_size(request.batch_size)?;
        let config = self.resolve_config(&request.config)?;
        self.process_batch(&config, batch_size, Some(cancel))
    }

    /// Runs batches under one resolved config until a claim comes back empty.
    pub fn process_until_exhausted(
        &self,
        request: BatchRequest,
    ) -> Result<DrainReport, ScoringServiceError> {
        let batch_size = self.batch_size(request.batch_size)?;
        let config = self.resolve_config(&request.config)?;
        let mut drain = DrainReport {
            config_id: config.id.clone(),
            batches: 0,
            claimed: 0,
            rejected: 0,
            scored: 0,
            scoring_errors: 0,
            lost: 0,
            warnings: 0,
        };

        loop {
            let report = self.process_batch(&config, batch_size, None)?;
            if report.is_exhausted() {
                break;
            }
            drain.batches += 1;
            drain.claimed += report.claimed;
            drain.rejected += report.rejected;
            drain.scored += report.scored;
            drain.scoring_errors += report.scoring_errors;
            drain.lost += report.lost;
            drain.warnings += report.warnings.len();
        }

        info!(
            config_id = %drain.config_id,
            batches = drain.batches,
            scored = drain.scored,
            rejected = drain.rejected,
            "unprocessed pool drained"
        );
        Ok(drain)
    }

    /// Full ranking recompute followed by a classification pass.
    pub fn rank_and_classify(
        &self,
        selector: &ConfigSelector,
    ) -> Result<RankingPassReport, ScoringServiceError> {
        let _pass = match self.passes.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(RankingError::AlreadyRunning.into()),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let config = self.resolve_config(selector)?;
        let ranking = self.ranking.recompute(self.store.as_ref(), self.clock.now())?;
        let classification = self.classify_under(&config.thresholds)?;

        Ok(RankingPassReport {
            config_id: config.id,
            ranking,
            classification,
        })
    }

    /// Recomputes preferred flags against the current rankings without re-ranking.
    pub fn classify(
        &self,
        selector: &ConfigSelector,
    ) -> Result<ClassificationReport, ScoringServiceError> {
        let _pass = self.wait_for_pass();
        let config = self.resolve_config(selector)?;
        self.classify_under(&config.thresholds)
    }

    pub fn stats(&self) -> Result<StoreStats, ScoringServiceError> {
        Ok(self.store.stats()?)
    }

    pub fn record(&self, id: RecordId) -> Result<AuctionRecord, ScoringServiceError> {
        let record = self.store.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn listing(&self, query: &ListingQuery) -> Result<Vec<RecordView>, ScoringServiceError> {
        Ok(self
            .store
            .listing(query)?
            .iter()
            .map(AuctionRecord::view)
            .collect())
    }

    pub fn config(&self, id: &ConfigId) -> Result<ScoringConfig, ScoringServiceError> {
        self.resolve_config(&ConfigSelector::Id(id.clone()))
    }

    /// Stores a config. Saving the active config re-runs classification, since
    /// its thresholds decide the preferred flags. Weights only affect later batches.
    pub fn save_config(
        &self,
        mut config: ScoringConfig,
    ) -> Result<ConfigUpdate, ScoringServiceError> {
        config.filter.normalize();
        let saved = self.configs.upsert(config)?;
        let classification = if saved.active {
            Some(self.reclassify_active()?)
        } else {
            None
        };
        Ok(ConfigUpdate {
            config: saved,
            classification,
        })
    }

    pub fn activate_config(&self, id: &ConfigId) -> Result<ConfigUpdate, ScoringServiceError> {
        let activated = self.configs.activate(id).map_err(|error| match error {
            RepositoryError::NotFound => {
                ScoringServiceError::MissingConfig(ConfigSelector::Id(id.clone()))
            }
            other => other.into(),
        })?;
        let classification = self.reclassify_active()?;
        info!(config_id = %activated.id, "scoring config activated");
        Ok(ConfigUpdate {
            config: activated,
            classification: Some(classification),
        })
    }

    /// Operator-issued reset; never called by the pipeline itself.
    pub fn reset(&self, scope: &ResetScope) -> Result<usize, ScoringServiceError> {
        let reset = self.store.reset_scores(scope, self.clock.now())?;
        warn!(reset, "scores reset; records return to the unprocessed pool");
        Ok(reset)
    }

    /// Blocks until a running ranking or classification pass has finished.
    fn wait_for_pass(&self) -> MutexGuard<'_, ()> {
        self.passes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-reads the active config once no other pass is running, so overlapping
    /// saves settle on whichever config is active last.
    fn reclassify_active(&self) -> Result<ClassificationReport, ScoringServiceError> {
        let _pass = self.wait_for_pass();
        let active = self.resolve_config(&ConfigSelector::Active)?;
        self.classify_under(&active.thresholds)
    }

    /// Classification pass; callers hold `passes`. Losing the race to another
    /// instance's ranking swap surfaces as `Superseded`.
    fn classify_under(
        &self,
        thresholds: &ThresholdPolicy,
    ) -> Result<ClassificationReport, ScoringServiceError> {
        self.classifier
            .classify(self.store.as_ref(), thresholds, self.clock.now())
            .map_err(|error| match error {
                RepositoryError::StaleGeneration { expected, actual } => {
                    RankingError::Superseded { expected, actual }.into()
                }
                other => other.into(),
            })
    }

    fn batch_size(&self, requested: Option<usize>) -> Result<usize, ScoringServiceError> {
        match requested.unwrap_or(self.default_batch_size) {
            0 => Err(ScoringServiceError::InvalidBatchSize),
            size => Ok(size),
        }
    }

    fn process_batch(
        &self,
        config: &ScoringConfig,
        batch_size: usize,
        cancel: Option<&AtomicBool>,
    ) -> Result<BatchReport, ScoringServiceError> {
        let claimed = self.coordinator.claim(batch_size, &config.id)?;
        let mut report = BatchReport::new(config.id.clone(), claimed.len());
        if claimed.is_empty() {
            return Ok(report);
        }

        let today = self.clock.now().date_naive();
        let FilterResult { kept, removed } =
            EligibilityFilter::new(&config.filter).partition(claimed, today);

        for (record, reason) in removed {
            debug!(record_id = %record.id, domain = %record.domain, %reason, "record rejected");
            if self.settle(&record, Completion::Rejected { reason }, &mut report)? {
                report.rejected += 1;
            }
        }

        let aggregator = ScoreAggregator::new(config.weights);
        let mut pending = kept.into_iter();
        while let Some((record, age_score)) = pending.next() {
            if cancel.map_or(false, |flag| flag.load(Ordering::Acquire)) {
                let remaining: Vec<AuctionRecord> = std::iter::once(record)
                    .chain(pending.by_ref().map(|(record, _)| record))
                    .collect();
                report.released = self.coordinator.release_all(&remaining)?;
                report.cancelled = true;
                warn!(
                    config_id = %config.id,
                    released = report.released,
                    "batch cancelled between records"
                );
                break;
            }

            let outcome = self.scorers.evaluate(&record.domain);
            for message in &outcome.warnings {
                warn!(record_id = %record.id, domain = %record.domain, %message, "feature data gap");
            }
            report
                .warnings
                .extend(outcome.warnings.iter().map(|message| ScoringWarning {
                    record_id: record.id,
                    domain: record.domain.clone(),
                    message: message.clone(),
                }));

            let (completion, failed) = match outcome.into_scores() {
                Ok((lfs_score, sv_score)) => {
                    let aggregate = aggregator.aggregate(&SubScores {
                        age: Some(age_score),
                        lfs: Some(lfs_score),
                        sv: Some(sv_score),
                    });
                    for component in &aggregate.missing {
                        warn!(
                            record_id = %record.id,
                            component,
                            "sub-score missing; counted as zero"
                        );
                        report.warnings.push(ScoringWarning {
                            record_id: record.id,
                            domain: record.domain.clone(),
                            message: format!("{component} sub-score missing; counted as zero"),
                        });
                    }
                    (
                        Completion::Scored {
                            age_score,
                            lfs_score,
                            sv_score,
                            score: aggregate.total,
                        },
                        false,
                    )
                }
                Err(failure) => {
                    warn!(record_id = %record.id, domain = %record.domain, %failure, "scoring failed");
                    (
                        Completion::Rejected {
                            reason: format!("scoring error: {failure}"),
                        },
                        true,
                    )
                }
            };

            if self.settle(&record, completion, &mut report)? {
                if failed {
                    report.scoring_errors += 1;
                } else {
                    report.scored += 1;
                }
            }
        }

        info!(
            config_id = %config.id,
            claimed = report.claimed,
            scored = report.scored,
            rejected = report.rejected,
            scoring_errors = report.scoring_errors,
            lost = report.lost,
            "batch processed"
        );
        Ok(report)
    }

    /// Persists a terminal state. Losing the lease is a per-record event; any
    /// other store failure aborts the batch and leaves remaining claims to expire.
    fn settle(
        &self,
        record: &AuctionRecord,
        completion: Completion,
        report: &mut BatchReport,
    ) -> Result<bool, ScoringServiceError> {
        match self.coordinator.complete(record, completion) {
            Ok(()) => Ok(true),
            Err(RepositoryError::LeaseLost(_)) | Err(RepositoryError::NotFound) => {
                warn!(record_id = %record.id, "lease lost before completion; skipping record");
                report.lost += 1;
                Ok(false)
            }
            Err(other) => Err(other.into()),
        }
    }
}

/// Error raised by the scoring service.
#[derive(Debug, thiserror::Error)]
pub enum ScoringServiceError {
    #[error("no scoring config found for selector '{0}'")]
    MissingConfig(ConfigSelector),
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Ranking(#[from] RankingError),
}
