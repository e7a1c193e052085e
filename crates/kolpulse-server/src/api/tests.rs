use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use kolpulse_collector::{CollectorSettings, DisabledFeed, Orchestrator};
use kolpulse_core::{EventStatus, NewEvent, NewKol, MAX_ACTIVE_KOLS};
use kolpulse_db::MemoryStore;
use kolpulse_scoring::ScoringEngine;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;

fn test_state() -> AppState {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let engine = ScoringEngine::new(None, Duration::from_secs(1));
    let orchestrator = Orchestrator::new(
        store,
        Arc::new(DisabledFeed),
        Arc::new(engine),
        CollectorSettings {
            inter_kol_delay: Duration::ZERO,
            event_poll_interval: Duration::from_secs(60),
            activity_coefficient: 1.0,
        },
    );
    AppState::new(orchestrator)
}

fn app(state: &AppState) -> Router {
    build_app(state.clone(), AuthState::disabled())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn with_json(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn negative_record() -> Value {
    json!({
        "positive_score": 0.2,
        "negative_score": 0.8,
        "neutral_score": 0.2,
        "overall_score": 0.2,
        "sentiment": "negative",
        "emotions": { "anger": 0.7, "fear": 0.3 },
        "source_id": "kol_x",
        "source_type": "kol"
    })
}

#[test]
fn error_kinds_map_to_status_codes() {
    let cases = [
        ("validation", StatusCode::BAD_REQUEST),
        ("not_found", StatusCode::NOT_FOUND),
        ("conflict", StatusCode::CONFLICT),
        ("capacity", StatusCode::UNPROCESSABLE_ENTITY),
        ("external_unavailable", StatusCode::SERVICE_UNAVAILABLE),
        ("internal", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, status) in cases {
        let response = ApiError::new("req-1", code, "msg").into_response();
        assert_eq!(response.status(), status, "code {code}");
    }
}

#[tokio::test]
async fn health_reports_ok_and_echoes_request_id() {
    let state = test_state();
    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["meta"]["request_id"], "req-42");
}

#[tokio::test]
async fn record_round_trips_through_the_api() {
    let state = test_state();
    let (status, created) = send(
        app(&state),
        with_json("POST", "/api/v1/emotions", &negative_record()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap().to_owned();

    let (status, fetched) = send(app(&state), get(&format!("/api/v1/emotions/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["negative_score"], 0.8);
    assert_eq!(fetched["data"]["overall_score"], 0.2);
    assert_eq!(fetched["data"]["sentiment"], "negative");
    assert_eq!(fetched["data"]["emotions"]["anger"], 0.7);

    let (status, listed) = send(app(&state), get("/api/v1/emotions?sentiment=negative")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"]["total"], 1);

    let (status, _) = send(
        app(&state),
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/emotions/{id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, missing) = send(app(&state), get(&format!("/api/v1/emotions/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(missing["error"]["message"].as_str().unwrap().contains(&id));
}

#[tokio::test]
async fn out_of_range_score_is_rejected_with_its_field() {
    let state = test_state();
    let mut body = negative_record();
    body["overall_score"] = json!(1.5);
    let (status, json) = send(app(&state), with_json("POST", "/api/v1/emotions", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("overall_score"));

    let (_, listed) = send(app(&state), get("/api/v1/emotions")).await;
    assert_eq!(listed["data"]["total"], 0);
}

#[tokio::test]
async fn analyze_scores_and_stores_text() {
    let state = test_state();
    let (status, json) = send(
        app(&state),
        with_json(
            "POST",
            "/api/v1/emotions/analyze",
            &json!({ "text": "Amazing launch, love it" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["sentiment"], "positive");
    assert_eq!(json["data"]["language"], "en");

    let (status, json) = send(
        app(&state),
        with_json("POST", "/api/v1/emotions/analyze", &json!({ "text": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation");
}

#[tokio::test]
async fn empty_stats_are_zero() {
    let state = test_state();
    let (status, json) = send(app(&state), get("/api/v1/emotions/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 0);
    assert_eq!(json["data"]["averageScores"]["overall"], 0.0);

    let (status, json) = send(app(&state), get("/api/v1/emotions/heatmap")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["data"].as_array().unwrap().len(), 72);
}

#[tokio::test]
async fn analytics_filter_by_kol() {
    let state = test_state();
    let kol = state.store.create_kol(NewKol::new("kol_x", 1_000)).await.unwrap();
    let mut record = negative_record();
    record["kol_id"] = json!(kol.id);
    send(app(&state), with_json("POST", "/api/v1/emotions", &record)).await;
    send(app(&state), with_json("POST", "/api/v1/emotions", &negative_record())).await;

    let (_, stats) = send(
        app(&state),
        get(&format!("/api/v1/emotions/stats?kol_id={}", kol.id)),
    )
    .await;
    assert_eq!(stats["data"]["total"], 1);

    let (_, trends) = send(
        app(&state),
        get("/api/v1/emotions/trends?granularity=hour"),
    )
    .await;
    let buckets = trends["data"].as_array().unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["count"], 2);

    let (_, ranking) = send(app(&state), get("/api/v1/emotions/kol-influence")).await;
    assert_eq!(ranking["data"][0]["username"], "kol_x");
}

#[tokio::test]
async fn malformed_event_ids_are_rejected() {
    let state = test_state();
    let (status, json) = send(
        app(&state),
        get("/api/v1/emotions/event-comparison?event_ids=nope"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("event_ids"));
}

#[tokio::test]
async fn duplicate_kol_conflicts() {
    let state = test_state();
    let body = json!({ "username": "kol_x", "followers_count": 10 });
    let (status, _) = send(app(&state), with_json("POST", "/api/v1/kols", &body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, json) = send(app(&state), with_json("POST", "/api/v1/kols", &body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"]["message"].as_str().unwrap().contains("kol_x"));
}

#[tokio::test]
async fn active_kol_cap_is_a_capacity_error() {
    let state = test_state();
    for i in 0..MAX_ACTIVE_KOLS {
        state
            .store
            .create_kol(NewKol::new(format!("kol_{i}"), 10))
            .await
            .unwrap();
    }
    let (status, json) = send(
        app(&state),
        with_json("POST", "/api/v1/kols", &json!({ "username": "one_too_many" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "capacity");

    let (_, listed) = send(app(&state), get("/api/v1/kols?is_active=true")).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), MAX_ACTIVE_KOLS);
}

#[tokio::test]
async fn batch_import_reports_counts() {
    let state = test_state();
    let body = json!([
        { "username": "a" },
        { "username": "b" },
        { "username": "a" }
    ]);
    let (status, json) = send(
        app(&state),
        with_json("POST", "/api/v1/kols/batch-import", &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["success"], 2);
    assert_eq!(json["data"]["failed"], 1);
}

#[tokio::test]
async fn manual_collection_without_a_feed_is_unavailable() {
    let state = test_state();
    let kol = state.store.create_kol(NewKol::new("kol_x", 10)).await.unwrap();
    let (status, json) = send(
        app(&state),
        with_json("POST", &format!("/api/v1/kols/{}/collect", kol.id), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "external_unavailable");
}

#[tokio::test]
async fn soft_deleted_kol_is_kept_inactive() {
    let state = test_state();
    let kol = state.store.create_kol(NewKol::new("kol_x", 10)).await.unwrap();
    let (status, json) = send(
        app(&state),
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/kols/{}", kol.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["is_active"], false);

    let (_, history) = send(app(&state), get(&format!("/api/v1/kols/{}/emotions", kol.id))).await;
    assert_eq!(history["data"]["username"], "kol_x");
    assert!(history["data"]["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn current_event_is_created_active_and_monitored() {
    let state = test_state();
    let body = json!({
        "name": "Launch",
        "type": "campaign",
        "start_date": (Utc::now() - chrono::Duration::hours(1)).to_rfc3339(),
        "keywords": ["launch"],
        "hashtags": ["ai"]
    });
    let (status, json) = send(app(&state), with_json("POST", "/api/v1/events", &body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["status"], "active");
    let id = json["data"]["id"].as_str().unwrap().to_owned();

    let (_, monitoring) = send(
        app(&state),
        get(&format!("/api/v1/events/{id}/monitoring")),
    )
    .await;
    assert_eq!(monitoring["data"]["monitoring"], true);

    let (_, stopped) = send(
        app(&state),
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/events/{id}/monitoring"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(stopped["data"]["monitoring"], false);
    assert!(!state.orchestrator.is_monitoring(id.parse().unwrap()));

    let (_, overview) = send(app(&state), get("/api/v1/events/stats")).await;
    assert_eq!(overview["data"]["total"], 1);
    assert_eq!(overview["data"]["by_type"]["campaign"], 1);
    state.orchestrator.shutdown();
}

#[tokio::test]
async fn illegal_status_change_conflicts() {
    let state = test_state();
    let event = state
        .store
        .create_event(
            NewEvent::new("Later", Utc::now() + chrono::Duration::days(1)),
            EventStatus::Upcoming,
        )
        .await
        .unwrap();
    let (status, json) = send(
        app(&state),
        with_json(
            "PATCH",
            &format!("/api/v1/events/{}/status", event.id),
            &json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "conflict");
}

#[tokio::test]
async fn monitoring_a_completed_event_conflicts() {
    let state = test_state();
    let mut input = NewEvent::new("Wrapped", Utc::now() - chrono::Duration::days(2));
    input.keywords = vec!["launch".to_string()];
    let event = state
        .store
        .create_event(input, EventStatus::Active)
        .await
        .unwrap();
    state
        .store
        .transition_event(event.id, EventStatus::Active, EventStatus::Completed)
        .await
        .unwrap();

    let (status, json) = send(
        app(&state),
        with_json(
            "POST",
            &format!("/api/v1/events/{}/monitoring", event.id),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "conflict");
    assert!(!state.orchestrator.is_monitoring(event.id));
}

#[tokio::test]
async fn patching_hashtags_restarts_monitoring_with_new_terms() {
    let state = test_state();
    let body = json!({
        "name": "Launch",
        "start_date": (Utc::now() - chrono::Duration::hours(1)).to_rfc3339(),
        "hashtags": ["old"]
    });
    let (_, created) = send(app(&state), with_json("POST", "/api/v1/events", &body)).await;
    let id: uuid::Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();

    let (status, json) = send(
        app(&state),
        with_json(
            "PATCH",
            &format!("/api/v1/events/{id}"),
            &json!({ "hashtags": ["new"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["hashtags"], json!(["new"]));
    assert!(state.orchestrator.is_monitoring(id));
    assert_eq!(
        state.orchestrator.event_search_terms(id).await.unwrap(),
        vec!["#new".to_string()]
    );
    state.orchestrator.shutdown();
}

#[tokio::test]
async fn malformed_requests_use_the_error_envelope() {
    let state = test_state();
    let broken_body = Request::builder()
        .method("POST")
        .uri("/api/v1/events")
        .header("content-type", "application/json")
        .header("x-request-id", "req-7")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let (status, json) = send(app(&state), broken_body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation");
    assert_eq!(json["meta"]["request_id"], "req-7");

    let (status, json) = send(app(&state), get("/api/v1/events/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation");

    let (status, json) = send(app(&state), get("/api/v1/events?page=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation");
}

#[tokio::test]
async fn metrics_refresh_on_event_without_records_keeps_defaults() {
    let state = test_state();
    let event = state
        .store
        .create_event(NewEvent::new("Quiet", Utc::now()), EventStatus::Active)
        .await
        .unwrap();
    let (status, json) = send(
        app(&state),
        with_json(
            "POST",
            &format!("/api/v1/events/{}/metrics", event.id),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total_posts"], 0);
    assert_eq!(json["data"]["alert_level"], "low");
}

#[tokio::test]
async fn bearer_auth_guards_protected_routes() {
    let state = test_state();
    let guarded = build_app(state.clone(), AuthState::with_keys(["k-1".to_string()]));

    let (status, json) = send(guarded.clone(), get("/api/v1/kols")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");

    let (status, _) = send(
        guarded.clone(),
        Request::builder()
            .uri("/api/v1/kols")
            .header("authorization", "Bearer k-1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(guarded, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
}
