//! Aggregator and influence calculator against `MemoryStore`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use kolpulse_analytics::{Aggregator, InfluenceCalculator, RECENT_WINDOW};
use kolpulse_core::{EventStatus, Granularity, NewEmotionRecord, NewEvent, NewKol, Sentiment, Window};
use kolpulse_db::{DbError, MemoryStore, Store};

fn scored(sentiment: Sentiment, overall: f64, minutes_ago: i64) -> NewEmotionRecord {
    NewEmotionRecord {
        positive_score: 0.2,
        negative_score: 0.2,
        neutral_score: 0.2,
        overall_score: overall,
        sentiment,
        emotions: None,
        text: None,
        language: Some("en".to_string()),
        confidence: Some(0.8),
        keywords: None,
        metadata: None,
        source_id: None,
        source_type: None,
        kol_id: None,
        event_id: None,
        analyzed_at: Some(Utc::now() - Duration::minutes(minutes_ago)),
    }
}

fn store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

#[tokio::test]
async fn empty_window_stats_are_zero() {
    let store = store();
    store
        .create_record(scored(Sentiment::Positive, 0.8, 60 * 24 * 10))
        .await
        .unwrap();
    let aggregator = Aggregator::new(store);

    let window = Window {
        start_date: Some(Utc::now() - Duration::days(1)),
        ..Window::default()
    };
    let stats = aggregator.stats(&window).await.unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.average_scores.overall, 0.0);
    assert_eq!(stats.average_scores.positive, 0.0);
}

#[tokio::test]
async fn views_respect_the_kol_window() {
    let store = store();
    let kol = store.create_kol(NewKol::new("kol_x", 5_000)).await.unwrap();
    for (sentiment, overall, ago) in [
        (Sentiment::Positive, 0.8, 30),
        (Sentiment::Positive, 0.8, 20),
        (Sentiment::Negative, 0.2, 10),
    ] {
        let mut input = scored(sentiment, overall, ago);
        input.kol_id = Some(kol.id);
        input.source_id = Some("kol_x".to_string());
        input.source_type = Some("kol".to_string());
        store.create_record(input).await.unwrap();
    }
    store
        .create_record(scored(Sentiment::Neutral, 0.5, 5))
        .await
        .unwrap();
    let aggregator = Aggregator::new(store);

    let window = Window::for_kol(kol.id);
    let stats = aggregator.stats(&window).await.unwrap();
    assert_eq!(stats.total, 3);
    assert!((stats.average_scores.overall - 0.6).abs() < 1e-9);

    let heatmap = aggregator.heatmap(&window).await.unwrap();
    assert_eq!(heatmap.summary.total_analyzed, 3);
    assert_eq!(heatmap.summary.dominant_sentiment, Sentiment::Positive);

    let buckets = aggregator
        .trends(&Window::default(), Granularity::Month)
        .await
        .unwrap();
    let counted: i64 = buckets.iter().map(|b| b.count).sum();
    assert_eq!(counted, 4);

    let ranking = aggregator
        .kol_influence(&Window::default(), None)
        .await
        .unwrap();
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].username.as_deref(), Some("kol_x"));
    assert_eq!(ranking[0].post_count, 3);
}

#[tokio::test]
async fn comparison_names_events() {
    let store = store();
    let launch = store
        .create_event(
            NewEvent::new("Launch week", Utc::now() - Duration::hours(2)),
            EventStatus::Active,
        )
        .await
        .unwrap();
    let mut input = scored(Sentiment::Positive, 0.8, 15);
    input.event_id = Some(launch.id);
    store.create_record(input).await.unwrap();

    let rows = Aggregator::new(store)
        .event_comparison(&Window::default(), &[launch.id])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_name.as_deref(), Some("Launch week"));
    assert_eq!(rows[0].total_posts, 1);
}

#[tokio::test]
async fn recompute_averages_recent_grades() {
    let store = store();
    let kol = store
        .create_kol(NewKol::new("kol_x", 10_000))
        .await
        .unwrap();
    for (sentiment, overall, ago) in [
        (Sentiment::Positive, 0.8, 3),
        (Sentiment::Positive, 0.8, 2),
        (Sentiment::Negative, 0.2, 1),
    ] {
        let mut input = scored(sentiment, overall, ago);
        input.kol_id = Some(kol.id);
        input.source_id = Some("kol_x".to_string());
        store.create_record(input).await.unwrap();
    }

    let recent = store.recent_by_source("kol_x", RECENT_WINDOW).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert!(recent
        .windows(2)
        .all(|pair| pair[0].analyzed_at >= pair[1].analyzed_at));

    let calculator = InfluenceCalculator::new(Arc::clone(&store), 1.0);
    let updated = calculator.recompute("kol_x").await.unwrap();
    let expected = (4.0 + 4.0 + 2.0) / 3.0;
    assert!((updated.emotion_score - expected).abs() < 1e-9);
    assert!((updated.influence_score - 4.0 * 2.0 * (expected / 5.0)).abs() < 1e-9);

    let stored = store.get_kol(kol.id).await.unwrap();
    assert_eq!(stored.emotion_score, updated.emotion_score);
}

#[tokio::test]
async fn explicit_score_update_uses_the_coefficient() {
    let store = store();
    store.create_kol(NewKol::new("quiet", 100)).await.unwrap();
    let calculator = InfluenceCalculator::new(Arc::clone(&store), 0.5);

    let kol = calculator.update_emotion_score("quiet", 5.0).await.unwrap();
    assert_eq!(kol.emotion_score, 5.0);
    assert!((kol.influence_score - 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn unknown_kol_is_not_found() {
    let calculator = InfluenceCalculator::new(store(), 1.0);
    let err = calculator
        .update_emotion_score("ghost", 3.0)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}
