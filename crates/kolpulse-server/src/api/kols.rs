use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use kolpulse_analytics::RECENT_WINDOW;
use kolpulse_collector::{BatchImportReport, KolCollection};
use kolpulse_core::{EmotionRecord, Kol, KolPatch, NewKol};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    extract::{ApiJson, ApiPath, ApiQuery},
    map_collect_error, map_db_error, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct ListKolsQuery {
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(super) struct EmotionHistory {
    pub kol_id: Uuid,
    pub username: String,
    pub history: Vec<EmotionRecord>,
}

/// GET /api/v1/kols, highest emotion score first.
pub(super) async fn list_kols(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<ListKolsQuery>,
) -> Result<Json<ApiResponse<Vec<Kol>>>, ApiError> {
    let kols = state
        .store
        .list_kols(query.is_active)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(kols, req_id.0)))
}

/// POST /api/v1/kols. An active KOL gets its first collection in the
/// background.
pub(super) async fn create_kol(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<NewKol>,
) -> Result<(StatusCode, Json<ApiResponse<Kol>>), ApiError> {
    let kol = state
        .orchestrator
        .create_kol(body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(kol, req_id.0))))
}

pub(super) async fn batch_import(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<Vec<NewKol>>,
) -> Json<ApiResponse<BatchImportReport>> {
    let report = state.orchestrator.batch_import(body).await;
    Json(ApiResponse::new(report, req_id.0))
}

pub(super) async fn get_kol(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Kol>>, ApiError> {
    let kol = state
        .store
        .get_kol(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(kol, req_id.0)))
}

pub(super) async fn update_kol(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<KolPatch>,
) -> Result<Json<ApiResponse<Kol>>, ApiError> {
    let kol = state
        .store
        .update_kol(id, patch)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(kol, req_id.0)))
}

/// DELETE /api/v1/kols/{id}: soft delete, the KOL and its records stay.
pub(super) async fn deactivate_kol(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Kol>>, ApiError> {
    let kol = state
        .store
        .deactivate_kol(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(kol, req_id.0)))
}

/// The records the influence calculator grades, newest first.
pub(super) async fn emotion_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<EmotionHistory>>, ApiError> {
    let kol = state
        .store
        .get_kol(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let history = state
        .store
        .recent_by_source(&kol.username, RECENT_WINDOW)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(
        EmotionHistory {
            kol_id: kol.id,
            username: kol.username,
            history,
        },
        req_id.0,
    )))
}

/// POST /api/v1/kols/{id}/collect: runs the per-KOL pipeline now.
pub(super) async fn collect_kol(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<KolCollection>>, ApiError> {
    let kol = state
        .store
        .get_kol(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let collection = state
        .orchestrator
        .collect_kol_data(&kol.username)
        .await
        .map_err(|e| map_collect_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(collection, req_id.0)))
}
