use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use kolpulse_core::{
    EmotionPatch, EmotionRecord, NewEmotionRecord, Page, RecordQuery, Sentiment, Window,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    extract::{ApiJson, ApiPath, ApiQuery},
    map_collect_error, map_db_error, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct ListRecordsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sentiment: Option<Sentiment>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub event_id: Option<Uuid>,
    pub kol_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnalyzeRequest {
    pub text: String,
    pub language: Option<String>,
}

/// GET /api/v1/emotions
pub(super) async fn list_records(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(params): ApiQuery<ListRecordsQuery>,
) -> Result<Json<ApiResponse<Page<EmotionRecord>>>, ApiError> {
    let defaults = RecordQuery::default();
    let query = RecordQuery {
        window: Window {
            start_date: params.start_date,
            end_date: params.end_date,
            event_id: params.event_id,
            kol_id: params.kol_id,
        },
        sentiment: params.sentiment,
        page: params.page.unwrap_or(defaults.page),
        limit: params.limit.unwrap_or(defaults.limit),
    };
    let page = state
        .store
        .query_records(&query)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(page, req_id.0)))
}

/// POST /api/v1/emotions
pub(super) async fn create_record(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<NewEmotionRecord>,
) -> Result<(StatusCode, Json<ApiResponse<EmotionRecord>>), ApiError> {
    let record = state
        .store
        .create_record(body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(record, req_id.0))))
}

/// POST /api/v1/emotions/analyze
pub(super) async fn analyze_text(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<AnalyzeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EmotionRecord>>), ApiError> {
    let record = state
        .orchestrator
        .analyze_text(&body.text, body.language)
        .await
        .map_err(|e| map_collect_error(req_id.0.clone(), &e))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(record, req_id.0))))
}

pub(super) async fn get_record(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<EmotionRecord>>, ApiError> {
    let record = state
        .store
        .get_record(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(record, req_id.0)))
}

pub(super) async fn update_record(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<EmotionPatch>,
) -> Result<Json<ApiResponse<EmotionRecord>>, ApiError> {
    let record = state
        .store
        .update_record(id, patch)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(record, req_id.0)))
}

pub(super) async fn delete_record(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .delete_record(id)
        .await
        .map_err(|e| map_db_error(req_id.0, &e))?;
    Ok(StatusCode::NO_CONTENT)
}
