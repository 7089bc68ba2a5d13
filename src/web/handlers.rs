use std::sync::Arc;
use std::time::UNIX_EPOCH;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use log::{debug, warn};
use serde::Serialize;

use super::{params, render};
use crate::data::export::{to_csv_bytes, EXPORT_FILE_NAME};
use crate::data::facets::FacetSet;
use crate::data::filter::{search, SearchQuery, SearchResult};
use crate::data::model::CollegeDetail;
use crate::error::AppError;
use crate::state::{AppState, Readiness, Snapshot};

type Pairs = Vec<(String, String)>;

/// Snapshot to search against, or a 503 when the server is degraded.
fn ready_snapshot(state: &AppState) -> Result<Arc<Snapshot>, AppError> {
    let snapshot = state.snapshot();
    match &snapshot.readiness {
        Readiness::Ready => Ok(snapshot),
        Readiness::Degraded { reason } => Err(AppError::Degraded(reason.clone())),
    }
}

fn run(state: &AppState, query: &SearchQuery) -> Result<SearchResult, AppError> {
    let snapshot = ready_snapshot(state)?;
    let result = search(&snapshot.dataset, query)?;
    debug!(
        "rank {} ±{}: {} matches",
        query.rank, query.radius, result.stats.total_matches
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

pub async fn home(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render::search_page(&state.snapshot(), state.config.rank_radius))
}

/// Form post from the search page; answers with an HTML fragment.
pub async fn search_form(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Pairs>,
) -> Response {
    let outcome = params::parse_query(&pairs, &state.config)
        .map_err(AppError::from)
        .and_then(|query| run(&state, &query));

    match outcome {
        Ok(result) => Html(render::results_fragment(&result)).into_response(),
        Err(e) => {
            warn!("search rejected: {e}");
            (e.status(), Html(render::error_fragment(&e.to_string()))).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// JSON API
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub result: SearchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// `GET /find_colleges?rank=..&category=..&quota=..&branch=..`
pub async fn find_colleges(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Pairs>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params::parse_query(&pairs, &state.config)?;
    let result = run(&state, &query)?;
    let message = (result.stats.total_matches == 0).then(render::no_matches_message);
    Ok(Json(SearchResponse { result, message }))
}

/// `GET /api/college/{code}`: one college with all of its seats.
pub async fn college(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<CollegeDetail>, AppError> {
    let snapshot = ready_snapshot(&state)?;
    snapshot
        .dataset
        .college(&code)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No college with code '{code}'")))
}

pub async fn facets(State(state): State<Arc<AppState>>) -> Json<FacetSet> {
    Json(state.snapshot().dataset.facets.clone())
}

/// Full sorted match set as a CSV download; pagination is ignored.
pub async fn export(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Pairs>,
) -> Result<Response, AppError> {
    let query = params::parse_unpaged(&pairs, &state.config)?;
    let result = run(&state, &query)?;
    let body = to_csv_bytes(&result)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthReport {
    #[serde(flatten)]
    pub readiness: Readiness,
    pub ready: bool,
    pub records: usize,
    pub loaded_at: u64,
}

/// Readiness from process state only; 503 while degraded.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let snapshot = state.snapshot();
    let ready = snapshot.is_ready();
    let report = HealthReport {
        readiness: snapshot.readiness.clone(),
        ready,
        records: snapshot.dataset.len(),
        loaded_at: snapshot
            .loaded_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

#[derive(Serialize)]
pub struct ReloadReport {
    pub records: usize,
}

pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadReport>, AppError> {
    let reload_state = state.clone();
    let snapshot = tokio::task::spawn_blocking(move || reload_state.reload())
        .await
        .map_err(|e| AppError::Internal(format!("reload task failed: {e}")))??;
    Ok(Json(ReloadReport {
        records: snapshot.dataset.len(),
    }))
}
