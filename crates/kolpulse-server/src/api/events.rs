use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use kolpulse_core::{Event, EventOverview, EventPatch, EventQuery, EventStatus, NewEvent, Page};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    extract::{ApiJson, ApiPath, ApiQuery},
    map_db_error, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    pub status: EventStatus,
}

#[derive(Debug, Serialize)]
pub(super) struct MonitoringState {
    pub event_id: Uuid,
    pub monitoring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_terms: Option<Vec<String>>,
}

/// GET /api/v1/events?search=&type=&status=&page=&limit=
pub(super) async fn list_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<EventQuery>,
) -> Result<Json<ApiResponse<Page<Event>>>, ApiError> {
    let page = state
        .store
        .list_events(&query)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(page, req_id.0)))
}

/// POST /api/v1/events. An event whose window contains now is created
/// `active` and monitored right away.
pub(super) async fn create_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<NewEvent>,
) -> Result<(StatusCode, Json<ApiResponse<Event>>), ApiError> {
    let event = state
        .orchestrator
        .create_event(body)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(event, req_id.0))))
}

pub(super) async fn event_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<EventOverview>>, ApiError> {
    let overview = state
        .store
        .event_overview()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(overview, req_id.0)))
}

pub(super) async fn get_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let event = state
        .store
        .get_event(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(event, req_id.0)))
}

/// PATCH /api/v1/events/{id}. New keywords or hashtags on an active event
/// restart its monitoring with the new terms.
pub(super) async fn update_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<EventPatch>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let event = state
        .orchestrator
        .update_event(id, patch)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(event, req_id.0)))
}

pub(super) async fn delete_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .orchestrator
        .delete_event(id)
        .await
        .map_err(|e| map_db_error(req_id.0, &e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/events/{id}/status. Illegal moves are 409s.
pub(super) async fn update_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let event = state
        .orchestrator
        .set_event_status(id, body.status)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(event, req_id.0)))
}

pub(super) async fn monitoring_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Json<ApiResponse<MonitoringState>> {
    let monitoring = state.orchestrator.is_monitoring(id);
    Json(ApiResponse::new(
        MonitoringState {
            event_id: id,
            monitoring,
            search_terms: None,
        },
        req_id.0,
    ))
}

/// POST /api/v1/events/{id}/monitoring: (re)starts collection. An event
/// without search terms is reported as not monitored; one that is not
/// `active` is a 409.
pub(super) async fn start_monitoring(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<MonitoringState>>, ApiError> {
    let terms = state
        .orchestrator
        .start_event_monitoring(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(
        MonitoringState {
            event_id: id,
            monitoring: state.orchestrator.is_monitoring(id),
            search_terms: Some(terms),
        },
        req_id.0,
    )))
}

pub(super) async fn stop_monitoring(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Json<ApiResponse<MonitoringState>> {
    state.orchestrator.stop_event_monitoring(id);
    Json(ApiResponse::new(
        MonitoringState {
            event_id: id,
            monitoring: false,
            search_terms: None,
        },
        req_id.0,
    ))
}

/// POST /api/v1/events/{id}/metrics: recomputes metrics now. An event
/// without records is returned unchanged.
pub(super) async fn refresh_metrics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let updated = state
        .orchestrator
        .update_event_metrics(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let event = match updated {
        Some(event) => event,
        None => state
            .store
            .get_event(id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?,
    };
    Ok(Json(ApiResponse::new(event, req_id.0)))
}
