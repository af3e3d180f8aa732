//! Incremental scoring and ranking of domain-auction listings.
//!
//! Workers pull leased batches of unprocessed records, filter them, score the
//! survivors, and persist the weighted total. Ranking and preferred
//! classification run as separate global passes over everything scored so far.

pub mod aggregate;
pub mod claim;
pub mod classifier;
pub mod clock;
pub mod domain;
pub mod eligibility;
pub mod features;
pub mod ranking;
pub mod repository;
pub mod router;
pub mod scoring_config;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use aggregate::{AggregateScore, ScoreAggregator, SubScores};
pub use claim::BatchClaimCoordinator;
pub use classifier::{is_preferred, ClassificationReport, PreferredClassifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    AuctionListing, AuctionRecord, Claim, ClaimToken, FilterStatus, RecordId, RecordView,
};
pub use eligibility::{age_score, EligibilityFilter, EligibilityVerdict};
pub use features::{
    FeatureScore, FeatureScorer, FeatureScorers, LexicalFrequencyScorer, ReferenceData,
    ReferenceDataError, ScorerError, SemanticValueScorer,
};
pub use ranking::{dense_rank, RankingEngine, RankingError, RankingOptions, RankingReport};
pub use repository::{
    ClaimRequest, Completion, ConfigRepository, ListingQuery, RecordStore, RepositoryError,
    ResetScope, ScoredEntry, StoreStats,
};
pub use router::scoring_router;
pub use scoring_config::{
    ConfigId, ConfigSelector, FilterParams, HyphenPolicy, ScoreWeights, ScoringConfig,
    ThresholdMode, ThresholdPolicy,
};
pub use service::{
    BatchReport, BatchRequest, ConfigUpdate, DrainReport, RankingPassReport, ScoringService,
    ScoringServiceError, ScoringWarning, ServiceSettings,
};
pub use store::{MemoryConfigRepository, MemoryRecordStore};
