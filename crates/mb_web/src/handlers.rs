use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use mb_core::{Article, Error, StoreStats};
use mb_pipeline::{RunRecord, RunTrigger, Stage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::{AppState, Credentials};

pub const DEFAULT_ARTICLE_LIMIT: usize = 20;
pub const MAX_ARTICLE_LIMIT: usize = 100;

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::AlreadyRunning => StatusCode::CONFLICT,
            Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub running: bool,
    pub credentials: Credentials,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        running: state.orchestrator.is_running(),
        credentials: state.credentials,
    })
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub running: bool,
    pub last_run: Option<RunRecord>,
    pub history: Vec<RunRecord>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<Status> {
    let history = state.orchestrator.history().await;
    Json(Status {
        running: state.orchestrator.is_running(),
        last_run: history.first().cloned(),
        history,
    })
}

#[derive(Debug, Serialize)]
pub struct RunAccepted {
    pub run_id: Uuid,
    pub stages: Vec<Stage>,
}

/// Starts a cycle in the background. The guard is taken before answering so
/// a concurrent request gets `409` rather than a queued run.
pub async fn trigger_run(State(state): State<Arc<AppState>>) -> Result<(StatusCode, Json<RunAccepted>), ApiError> {
    let plan = state.run_plan.clone();
    state.orchestrator.validate(&plan)?;
    let permit = state.orchestrator.try_start()?;
    let accepted = RunAccepted {
        run_id: permit.run_id(),
        stages: plan.stages(),
    };
    info!(run_id = %accepted.run_id, "Cycle requested over HTTP");

    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        if let Err(e) = orchestrator.run_with_permit(permit, plan, RunTrigger::Api).await {
            error!(error = %e, "Requested cycle failed");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Only count articles created in the last `hours`.
    pub hours: Option<i64>,
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StoreStats>, ApiError> {
    let since = query.hours.map(|hours| Utc::now() - Duration::hours(hours));
    Ok(Json(state.orchestrator.store().stats(since).await?))
}

#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    pub limit: Option<usize>,
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticlesQuery>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ARTICLE_LIMIT).min(MAX_ARTICLE_LIMIT);
    Ok(Json(state.orchestrator.store().recent(limit).await?))
}
