//! Read-only aggregate views over emotion records.

use axum::{
    extract::State,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use kolpulse_analytics::{EmotionStats, EventComparisonRow, Heatmap, KolInfluenceRow, TrendBucket};
use kolpulse_core::{Granularity, ValidationError, Window};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{extract::ApiQuery, map_db_error, ApiError, ApiResponse, AppState};

const MAX_RANKING_LIMIT: usize = 100;

/// Query parameters shared by every analytics endpoint. Each endpoint reads
/// the window plus the extra parameters it needs.
#[derive(Debug, Default, Deserialize)]
pub(super) struct AnalyticsQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub event_id: Option<Uuid>,
    pub kol_id: Option<Uuid>,
    pub granularity: Option<Granularity>,
    pub limit: Option<usize>,
    /// Comma-separated event ids.
    pub event_ids: Option<String>,
}

impl AnalyticsQuery {
    fn window(&self) -> Window {
        Window {
            start_date: self.start_date,
            end_date: self.end_date,
            event_id: self.event_id,
            kol_id: self.kol_id,
        }
    }
}

pub(super) fn parse_event_ids(raw: Option<&str>) -> Result<Vec<Uuid>, ValidationError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|_| ValidationError::new("event_ids", format!("'{s}' is not a UUID")))
        })
        .collect()
}

fn validation_error(req_id: &str, e: &ValidationError) -> ApiError {
    ApiError::new(req_id, "validation", e.to_string())
}

pub(super) async fn stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(params): ApiQuery<AnalyticsQuery>,
) -> Result<Json<ApiResponse<EmotionStats>>, ApiError> {
    let stats = state
        .aggregator
        .stats(&params.window())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(stats, req_id.0)))
}

/// GET /api/v1/emotions/trends?granularity=hour|day|week|month (default day)
pub(super) async fn trends(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(params): ApiQuery<AnalyticsQuery>,
) -> Result<Json<ApiResponse<Vec<TrendBucket>>>, ApiError> {
    let granularity = params.granularity.unwrap_or_default();
    let buckets = state
        .aggregator
        .trends(&params.window(), granularity)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(buckets, req_id.0)))
}

pub(super) async fn heatmap(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(params): ApiQuery<AnalyticsQuery>,
) -> Result<Json<ApiResponse<Heatmap>>, ApiError> {
    let heatmap = state
        .aggregator
        .heatmap(&params.window())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(heatmap, req_id.0)))
}

pub(super) async fn kol_influence(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(params): ApiQuery<AnalyticsQuery>,
) -> Result<Json<ApiResponse<Vec<KolInfluenceRow>>>, ApiError> {
    let limit = params.limit.map(|l| l.clamp(1, MAX_RANKING_LIMIT));
    let rows = state
        .aggregator
        .kol_influence(&params.window(), limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

/// GET /api/v1/emotions/event-comparison?event_ids=a,b,c
///
/// Without `event_ids` every event with records in the window is compared.
pub(super) async fn event_comparison(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(params): ApiQuery<AnalyticsQuery>,
) -> Result<Json<ApiResponse<Vec<EventComparisonRow>>>, ApiError> {
    let event_ids = parse_event_ids(params.event_ids.as_deref())
        .map_err(|e| validation_error(&req_id.0, &e))?;
    let rows = state
        .aggregator
        .event_comparison(&params.window(), &event_ids)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(rows, req_id.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_comma_separated() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let parsed = parse_event_ids(Some(&format!("{a}, {b},"))).unwrap();
        assert_eq!(parsed, vec![a, b]);
        assert!(parse_event_ids(None).unwrap().is_empty());
    }

    #[test]
    fn malformed_event_id_names_the_field() {
        let err = parse_event_ids(Some("not-a-uuid")).unwrap_err();
        assert_eq!(err.field, "event_ids");
    }
}
