use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use auction_scoring::config::EngineConfig;
use auction_scoring::error::AppError;
use auction_scoring::workflows::auction::{
    AuctionListing, AuctionRecord, Clock, ConfigId, FeatureScorers, FilterParams,
    MemoryConfigRepository, MemoryRecordStore, RecordStore, ReferenceData, ScoreWeights,
    ScoringConfig, ScoringService, ScoringServiceError, ServiceSettings, ThresholdPolicy,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

pub(crate) type ApiService = ScoringService<MemoryRecordStore, MemoryConfigRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn default_scoring_config() -> ScoringConfig {
    ScoringConfig {
        id: ConfigId("default".to_string()),
        name: "Default weights".to_string(),
        weights: ScoreWeights::default(),
        filter: FilterParams::default(),
        thresholds: ThresholdPolicy::default(),
        active: true,
    }
}

/// Built-in tables unless `SCORING_REFERENCE_DATA` points at a JSON file.
pub(crate) fn load_reference_data(engine: &EngineConfig) -> Result<Arc<ReferenceData>, AppError> {
    let reference = match &engine.reference_data {
        Some(path) => {
            let data = ReferenceData::from_path(path)?;
            info!(path = %path.display(), "loaded reference data");
            data
        }
        None => ReferenceData::builtin(),
    };
    Ok(Arc::new(reference))
}

/// Reads a JSON array of listings, as exported by an ingestion job.
pub(crate) fn load_listings(path: &Path) -> Result<Vec<AuctionRecord>, AppError> {
    let reader = BufReader::new(File::open(path)?);
    let listings: Vec<AuctionListing> = serde_json::from_reader(reader)?;
    let now = Utc::now();
    Ok(listings
        .into_iter()
        .map(|listing| AuctionRecord::from_listing(listing, now))
        .collect())
}

pub(crate) fn build_service(
    engine: &EngineConfig,
    records: Vec<AuctionRecord>,
    clock: Arc<dyn Clock>,
) -> Result<ApiService, AppError> {
    let store = Arc::new(MemoryRecordStore::new());
    let seeded = store
        .insert(records)
        .map_err(ScoringServiceError::from)?;
    let configs = Arc::new(
        MemoryConfigRepository::with_configs(vec![default_scoring_config()])
            .map_err(ScoringServiceError::from)?,
    );
    let scorers = FeatureScorers::from_reference(load_reference_data(engine)?);

    info!(seeded, batch_size = engine.batch_size, "scoring service assembled");
    Ok(ScoringService::new(
        store,
        configs,
        scorers,
        clock,
        ServiceSettings::from(engine),
    ))
}
