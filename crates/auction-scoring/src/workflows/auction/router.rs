use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::RecordId;
use super::ranking::RankingError;
use super::repository::{ConfigRepository, ListingQuery, RecordStore, RepositoryError};
use super::scoring_config::{ConfigId, ConfigSelector, ScoringConfig};
use super::service::{BatchRequest, ScoringService, ScoringServiceError};

/// Body of a batch trigger. Both fields are optional: the service default batch
/// size and the active config are used when omitted.
#[derive(Debug, Default, Deserialize)]
pub struct BatchTrigger {
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub config_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RankingTrigger {
    #[serde(default)]
    pub config_id: Option<String>,
}

/// Router exposing the trigger, stats, reporting, and config surfaces.
pub fn scoring_router<S, C>(service: Arc<ScoringService<S, C>>) -> Router
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    Router::new()
        .route("/api/v1/auctions/batches", post(batch_handler::<S, C>))
        .route("/api/v1/auctions/ranking", post(ranking_handler::<S, C>))
        .route("/api/v1/auctions/stats", get(stats_handler::<S, C>))
        .route("/api/v1/auctions/listing", get(listing_handler::<S, C>))
        .route(
            "/api/v1/auctions/records/:record_id",
            get(record_handler::<S, C>),
        )
        .route(
            "/api/v1/scoring/configs/:config_id",
            get(config_handler::<S, C>).put(save_config_handler::<S, C>),
        )
        .route(
            "/api/v1/scoring/configs/:config_id/activate",
            post(activate_config_handler::<S, C>),
        )
        .with_state(service)
}

pub(crate) async fn batch_handler<S, C>(
    State(service): State<Arc<ScoringService<S, C>>>,
    Json(trigger): Json<BatchTrigger>,
) -> Response
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    let request = BatchRequest {
        batch_size: trigger.batch_size,
        config: ConfigSelector::from(trigger.config_id),
    };
    off_runtime(move || service.run_batch(request)).await
}

pub(crate) async fn ranking_handler<S, C>(
    State(service): State<Arc<ScoringService<S, C>>>,
    Json(trigger): Json<RankingTrigger>,
) -> Response
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    let selector = ConfigSelector::from(trigger.config_id);
    off_runtime(move || service.rank_and_classify(&selector)).await
}

/// Batches, ranking passes and re-classifying config changes run on the
/// blocking pool; a ranking pass may hold the service for minutes.
async fn off_runtime<T, F>(work: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Result<T, ScoringServiceError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(Err(error)) => error.into_response(),
        Err(join_error) => {
            error!(%join_error, "scoring task did not run to completion");
            let payload = json!({ "error": "scoring task did not run to completion" });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn stats_handler<S, C>(
    State(service): State<Arc<ScoringService<S, C>>>,
) -> Response
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    match service.stats() {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn listing_handler<S, C>(
    State(service): State<Arc<ScoringService<S, C>>>,
    Query(query): Query<ListingQuery>,
) -> Response
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    match service.listing(&query) {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn record_handler<S, C>(
    State(service): State<Arc<ScoringService<S, C>>>,
    Path(record_id): Path<u64>,
) -> Response
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    match service.record(RecordId(record_id)) {
        Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn config_handler<S, C>(
    State(service): State<Arc<ScoringService<S, C>>>,
    Path(config_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    match service.config(&ConfigId(config_id)) {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn save_config_handler<S, C>(
    State(service): State<Arc<ScoringService<S, C>>>,
    Path(config_id): Path<String>,
    Json(mut config): Json<ScoringConfig>,
) -> Response
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    config.id = ConfigId(config_id);
    off_runtime(move || service.save_config(config)).await
}

pub(crate) async fn activate_config_handler<S, C>(
    State(service): State<Arc<ScoringService<S, C>>>,
    Path(config_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    C: ConfigRepository + 'static,
{
    let id = ConfigId(config_id);
    off_runtime(move || service.activate_config(&id)).await
}

impl ScoringServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScoringServiceError::MissingConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScoringServiceError::InvalidBatchSize => StatusCode::BAD_REQUEST,
            ScoringServiceError::Ranking(RankingError::AlreadyRunning)
            | ScoringServiceError::Ranking(RankingError::Superseded { .. }) => StatusCode::CONFLICT,
            ScoringServiceError::Ranking(RankingError::TimedOut { .. })
            | ScoringServiceError::Ranking(RankingError::Repository(
                RepositoryError::Unavailable(_),
            ))
            | ScoringServiceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ScoringServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            ScoringServiceError::Repository(RepositoryError::Conflict)
            | ScoringServiceError::Repository(RepositoryError::StaleGeneration { .. }) => {
                StatusCode::CONFLICT
            }
            ScoringServiceError::Repository(_) | ScoringServiceError::Ranking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ScoringServiceError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.to_string() });
        (self.status_code(), Json(payload)).into_response()
    }
}
