mod analytics;
mod events;
mod extract;
mod kols;
mod records;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use kolpulse_analytics::Aggregator;
use kolpulse_collector::{CollectError, Orchestrator};
use kolpulse_core::ErrorKind;
use kolpulse_db::{DbError, Store};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub aggregator: Aggregator,
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Shares the orchestrator's store with the aggregator and handlers.
    #[must_use]
    pub fn new(orchestrator: Orchestrator) -> Self {
        let store = Arc::clone(orchestrator.store());
        Self {
            aggregator: Aggregator::new(Arc::clone(&store)),
            store,
            orchestrator,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ResponseMeta {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    /// Internal errors are logged and replaced by a generic message; every
    /// other kind keeps its message, which names the offending id or field.
    fn from_kind(request_id: String, kind: ErrorKind, error: &dyn std::fmt::Display) -> Self {
        if kind == ErrorKind::Internal {
            tracing::error!(request_id = %request_id, error = %error, "request failed");
            return Self::new(request_id, kind.as_str(), "internal error");
        }
        tracing::debug!(request_id = %request_id, kind = %kind, error = %error, "request rejected");
        Self::new(request_id, kind.as_str(), error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "validation" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "capacity" => StatusCode::UNPROCESSABLE_ENTITY,
            "external_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    ApiError::from_kind(request_id, error.kind(), error)
}

pub(super) fn map_collect_error(request_id: String, error: &CollectError) -> ApiError {
    ApiError::from_kind(request_id, error.kind(), error)
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/emotions",
            get(records::list_records).post(records::create_record),
        )
        .route("/api/v1/emotions/analyze", post(records::analyze_text))
        .route("/api/v1/emotions/stats", get(analytics::stats))
        .route("/api/v1/emotions/trends", get(analytics::trends))
        .route("/api/v1/emotions/heatmap", get(analytics::heatmap))
        .route("/api/v1/emotions/kol-influence", get(analytics::kol_influence))
        .route(
            "/api/v1/emotions/event-comparison",
            get(analytics::event_comparison),
        )
        .route(
            "/api/v1/emotions/{id}",
            get(records::get_record)
                .patch(records::update_record)
                .delete(records::delete_record),
        )
        .route("/api/v1/kols", get(kols::list_kols).post(kols::create_kol))
        .route("/api/v1/kols/batch-import", post(kols::batch_import))
        .route(
            "/api/v1/kols/{id}",
            get(kols::get_kol)
                .put(kols::update_kol)
                .delete(kols::deactivate_kol),
        )
        .route("/api/v1/kols/{id}/emotions", get(kols::emotion_history))
        .route("/api/v1/kols/{id}/collect", post(kols::collect_kol))
        .route(
            "/api/v1/events",
            get(events::list_events).post(events::create_event),
        )
        .route("/api/v1/events/stats", get(events::event_stats))
        .route(
            "/api/v1/events/{id}",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/api/v1/events/{id}/status",
            axum::routing::patch(events::update_status),
        )
        .route(
            "/api/v1/events/{id}/monitoring",
            get(events::monitoring_status)
                .post(events::start_monitoring)
                .delete(events::stop_monitoring),
        )
        .route("/api/v1/events/{id}/metrics", post(events::refresh_metrics))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    store: &'static str,
    monitored_events: usize,
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let monitored_events = state.orchestrator.monitors().running().len();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::new(
                HealthData {
                    status: "ok",
                    store: "ok",
                    monitored_events,
                },
                req_id.0,
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::new(
                    HealthData {
                        status: "degraded",
                        store: "unavailable",
                        monitored_events,
                    },
                    req_id.0,
                )),
            )
        }
    }
}

#[cfg(test)]
mod tests;
