//! Live integration tests for `PgStore` using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. They need `DATABASE_URL` pointing at a server the
//! harness can create databases on, so they are ignored by default:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test -p kolpulse-db -- --ignored
//! ```

use chrono::{Duration, Utc};
use kolpulse_core::{
    AlertLevel, EmotionPatch, EmotionTrend, EmotionVector, EventMetrics, EventQuery, EventStatus,
    KolPatch, NewEmotionRecord, NewEvent, NewKol, RecordQuery, Sentiment, Window, MAX_ACTIVE_KOLS,
};
use kolpulse_db::{DbError, PgStore, Store};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_record(sentiment: Sentiment, overall: f64) -> NewEmotionRecord {
    NewEmotionRecord {
        positive_score: 0.6,
        negative_score: 0.1,
        neutral_score: 0.3,
        overall_score: overall,
        sentiment,
        emotions: Some(EmotionVector {
            joy: 0.7,
            trust: 0.2,
            ..EmotionVector::default()
        }),
        text: Some("great launch".to_string()),
        language: Some("en".to_string()),
        confidence: Some(0.88),
        keywords: Some(vec!["great".to_string(), "launch".to_string()]),
        metadata: Some(serde_json::json!({ "platform": "twitter" })),
        source_id: Some("kol_alice".to_string()),
        source_type: Some("kol".to_string()),
        kol_id: None,
        event_id: None,
        analyzed_at: None,
    }
}

// ---------------------------------------------------------------------------
// Section 1: Emotion records
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn record_round_trips_through_postgres(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let input = make_record(Sentiment::Positive, 0.8);
    let created = store
        .create_record(input.clone())
        .await
        .expect("create_record failed");
    let fetched = store
        .get_record(created.id)
        .await
        .expect("get_record failed");

    assert_eq!(fetched.sentiment, Sentiment::Positive);
    assert_eq!(fetched.overall_score, 0.8);
    assert_eq!(fetched.emotions, input.emotions);
    assert_eq!(fetched.keywords, input.keywords);
    assert_eq!(fetched.metadata, input.metadata);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn record_with_unknown_kol_is_a_validation_error(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let mut input = make_record(Sentiment::Positive, 0.8);
    input.kol_id = Some(Uuid::new_v4());

    let err = store
        .create_record(input)
        .await
        .expect_err("dangling kol_id should be rejected");
    assert!(matches!(err, DbError::Invalid(ref v) if v.field == "kol_id"));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn batch_insert_rolls_back_on_failure(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let mut dangling = make_record(Sentiment::Negative, 0.2);
    dangling.event_id = Some(Uuid::new_v4());

    store
        .create_records(vec![make_record(Sentiment::Positive, 0.8), dangling])
        .await
        .expect_err("batch with a dangling reference should fail");

    let page = store
        .query_records(&RecordQuery::default())
        .await
        .expect("query_records failed");
    assert_eq!(page.total, 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn batch_rows_read_back_newest_last_inserted_first(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let batch: Vec<NewEmotionRecord> = ["first", "second", "third"]
        .into_iter()
        .map(|text| {
            let mut r = make_record(Sentiment::Neutral, 0.5);
            r.text = Some(text.to_string());
            r
        })
        .collect();
    store
        .create_records(batch)
        .await
        .expect("create_records failed");

    let recent = store
        .recent_by_source("kol_alice", 100)
        .await
        .expect("recent_by_source failed");
    let texts: Vec<_> = recent.iter().filter_map(|r| r.text.as_deref()).collect();
    assert_eq!(texts, vec!["third", "second", "first"]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn update_and_window_queries(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let now = Utc::now();
    let mut old = make_record(Sentiment::Negative, 0.2);
    old.analyzed_at = Some(now - Duration::days(3));
    store.create_record(old).await.expect("create old failed");
    let recent = store
        .create_record(make_record(Sentiment::Neutral, 0.5))
        .await
        .expect("create recent failed");

    let updated = store
        .update_record(
            recent.id,
            EmotionPatch {
                sentiment: Some(Sentiment::Positive),
                ..EmotionPatch::default()
            },
        )
        .await
        .expect("update_record failed");
    assert_eq!(updated.sentiment, Sentiment::Positive);
    assert_eq!(updated.overall_score, 0.5);

    let window = Window {
        start_date: Some(now - Duration::days(1)),
        ..Window::default()
    };
    let scanned = store.scan_records(&window).await.expect("scan failed");
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].id, recent.id);

    let by_source = store
        .recent_by_source("kol_alice", 10)
        .await
        .expect("recent_by_source failed");
    assert_eq!(by_source.len(), 2);
    assert_eq!(by_source[0].id, recent.id);
}

// ---------------------------------------------------------------------------
// Section 2: KOLs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn kol_username_is_unique(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    store
        .create_kol(NewKol::new("alice", 1_000))
        .await
        .expect("first create failed");
    let err = store
        .create_kol(NewKol::new("alice", 10))
        .await
        .expect_err("duplicate username should fail");
    assert!(matches!(err, DbError::Conflict { field: "username", .. }));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn active_kol_cap_is_enforced(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let mut dormant = NewKol::new("dormant", 10);
    dormant.is_active = false;
    let dormant = store.create_kol(dormant).await.expect("dormant failed");
    for i in 0..MAX_ACTIVE_KOLS {
        store
            .create_kol(NewKol::new(format!("kol{i}"), 10))
            .await
            .unwrap_or_else(|e| panic!("create kol{i} failed: {e}"));
    }

    let err = store
        .create_kol(NewKol::new("overflow", 10))
        .await
        .expect_err("51st active KOL should fail");
    assert!(matches!(err, DbError::Capacity { limit: 50, .. }));

    let err = store
        .update_kol(
            dormant.id,
            KolPatch {
                is_active: Some(true),
                ..KolPatch::default()
            },
        )
        .await
        .expect_err("reactivation past the cap should fail");
    assert!(matches!(err, DbError::Capacity { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn kol_scores_and_soft_delete(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let kol = store
        .create_kol(NewKol::new("alice", 1_000))
        .await
        .expect("create failed");
    let scored = store
        .set_kol_scores("alice", 4.0, 4.8)
        .await
        .expect("set_kol_scores failed");
    assert_eq!(scored.emotion_score, 4.0);
    assert_eq!(scored.influence_score, 4.8);

    store.deactivate_kol(kol.id).await.expect("deactivate failed");
    assert!(store.active_kols(50).await.expect("active_kols").is_empty());
    assert!(!store.get_kol(kol.id).await.expect("get_kol").is_active);
}

// ---------------------------------------------------------------------------
// Section 3: Events
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn event_lifecycle_and_kol_association(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let alice = store
        .create_kol(NewKol::new("alice", 1_000))
        .await
        .expect("create kol failed");
    let mut input = NewEvent::new("Spring launch", Utc::now());
    input.kol_ids = vec![alice.id, Uuid::new_v4()];
    input.keywords = vec!["launch".to_string()];

    let event = store
        .create_event(input, EventStatus::Upcoming)
        .await
        .expect("create_event failed");
    assert_eq!(event.kol_ids, vec![alice.id]);
    assert_eq!(event.keywords, vec!["launch".to_string()]);

    store
        .transition_event(event.id, EventStatus::Upcoming, EventStatus::Active)
        .await
        .expect("activate failed");
    let err = store
        .transition_event(event.id, EventStatus::Upcoming, EventStatus::Active)
        .await
        .expect_err("second activation should fail");
    assert!(matches!(
        err,
        DbError::InvalidTransition {
            expected_status: "upcoming",
            ..
        }
    ));

    let kols = store.event_kols(event.id).await.expect("event_kols failed");
    assert_eq!(kols.len(), 1);

    let active = store
        .events_by_status(EventStatus::Active)
        .await
        .expect("events_by_status failed");
    assert_eq!(active.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn event_search_metrics_and_overview(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let event = store
        .create_event(NewEvent::new("Product Launch", Utc::now()), EventStatus::Active)
        .await
        .expect("create_event failed");
    store
        .create_event(NewEvent::new("Outage", Utc::now()), EventStatus::Upcoming)
        .await
        .expect("create_event failed");

    let page = store
        .list_events(&EventQuery {
            search: Some("launch".to_string()),
            ..EventQuery::default()
        })
        .await
        .expect("list_events failed");
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, event.id);

    store
        .set_event_metrics(
            event.id,
            EventMetrics {
                emotion_score: 3.5,
                emotion_trend: EmotionTrend::Negative,
                alert_level: AlertLevel::High,
                total_posts: 40,
            },
        )
        .await
        .expect("set_event_metrics failed");

    let overview = store.event_overview().await.expect("overview failed");
    assert_eq!(overview.total, 2);
    assert_eq!(overview.active, 1);
    assert_eq!(overview.high_alerts, 1);
    assert_eq!(overview.total_posts, 40);
    assert_eq!(overview.by_status.get("upcoming"), Some(&1));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn deleting_an_event_keeps_its_records(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let event = store
        .create_event(NewEvent::new("launch", Utc::now()), EventStatus::Active)
        .await
        .expect("create_event failed");
    let mut input = make_record(Sentiment::Positive, 0.8);
    input.event_id = Some(event.id);
    let record = store.create_record(input).await.expect("create failed");

    store.delete_event(event.id).await.expect("delete failed");
    let kept = store.get_record(record.id).await.expect("record vanished");
    assert_eq!(kept.event_id, None);
}
