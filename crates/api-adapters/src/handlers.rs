//! # Fish Handlers
//!
//! This module coordinates the flow between HTTP requests and `FishService`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use domains::{DomainError, Fish, FishId, ListFilter, NewFish};
use serde::{Deserialize, Serialize};
use services::ServiceStats;

use crate::error::ApiError;
use crate::metrics;
use crate::middleware::ClientAddr;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub id: FishId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub success: bool,
    pub reports: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub since: Option<String>,
    pub limit: Option<usize>,
}

/// `POST /fish`
pub async fn submit_fish(
    State(state): State<AppState>,
    ClientAddr(origin): ClientAddr,
    payload: Result<Json<NewFish>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(candidate) = payload.map_err(|rejection| {
        let err = ApiError::from(rejection);
        state.metrics.record_submission(err.kind());
        err
    })?;

    let result = state.service.submit(candidate, origin).await;
    state.metrics.record_submission(match &result {
        Ok(_) => "admitted",
        Err(err) => err.kind(),
    });
    let fish = result?;

    Ok(Json(SubmitResponse {
        success: true,
        id: fish.id,
    }))
}

/// `GET /fishes?since=<id>&limit=<n>`
pub async fn list_fishes(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Fish>>, ApiError> {
    let Query(query) = query?;
    let filter = ListFilter::new(
        query.since.filter(|s| !s.is_empty()).map(FishId::from),
        query.limit,
    );
    Ok(Json(state.service.list(&filter).await?))
}

/// `POST /fish/{id}/report`
pub async fn report_fish(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    let reports = state.service.report(&FishId::from(id)).await?;
    state.metrics.record_report();
    Ok(Json(ReportResponse {
        success: true,
        reports,
    }))
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Result<Json<ServiceStats>, ApiError> {
    Ok(Json(state.service.stats().await?))
}

/// `GET /health`. Touches nothing but the clock, so it answers as long as
/// the runtime does.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        uptime: state.service.uptime_secs(),
    })
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.service.stats().await?;
    state.metrics.observe(&stats);
    let body = state
        .metrics
        .encode()
        .map_err(|err| DomainError::Internal(format!("metrics encoding failed: {err}")))?;

    Ok(([(header::CONTENT_TYPE, metrics::CONTENT_TYPE)], body))
}
