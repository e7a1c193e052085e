use chrono::{TimeZone, Utc};

use super::*;

fn new_record() -> NewEmotionRecord {
    NewEmotionRecord {
        positive_score: 0.8,
        negative_score: 0.2,
        neutral_score: 0.2,
        overall_score: 0.8,
        sentiment: Sentiment::Positive,
        emotions: Some(EmotionVector {
            joy: 0.7,
            trust: 0.4,
            ..EmotionVector::default()
        }),
        text: Some("Launching something great today".to_string()),
        language: Some("en".to_string()),
        confidence: Some(0.9),
        keywords: Some(vec!["launching".to_string()]),
        metadata: Some(serde_json::json!({ "platform": "twitter" })),
        source_id: Some("kol_x".to_string()),
        source_type: Some("twitter".to_string()),
        kol_id: None,
        event_id: None,
        analyzed_at: None,
    }
}

#[test]
fn sentiment_parses_known_labels() {
    assert_eq!("positive".parse::<Sentiment>(), Ok(Sentiment::Positive));
    assert_eq!("mixed".parse::<Sentiment>(), Ok(Sentiment::Mixed));
}

#[test]
fn sentiment_rejects_unknown_label() {
    let err = "ecstatic".parse::<Sentiment>().unwrap_err();
    assert_eq!(err.field, "sentiment");
}

#[test]
fn sentiment_serializes_lowercase() {
    let json = serde_json::to_string(&Sentiment::Negative).unwrap();
    assert_eq!(json, "\"negative\"");
}

#[test]
fn dominant_picks_strongest_dimension() {
    let v = EmotionVector {
        fear: 0.6,
        anticipation: 0.3,
        ..EmotionVector::default()
    };
    assert_eq!(v.dominant(), Emotion::Fear);
}

#[test]
fn dominant_tie_goes_to_first_in_enumeration() {
    let v = EmotionVector {
        anger: 0.4,
        trust: 0.4,
        ..EmotionVector::default()
    };
    assert_eq!(v.dominant(), Emotion::Anger);
}

#[test]
fn dominant_of_zero_vector_is_joy() {
    assert_eq!(EmotionVector::default().dominant(), Emotion::Joy);
}

#[test]
fn emotion_vector_missing_dimensions_default_to_zero() {
    let v: EmotionVector = serde_json::from_str(r#"{"joy":0.5}"#).unwrap();
    assert_eq!(v.joy, 0.5);
    assert_eq!(v.anticipation, 0.0);
}

#[test]
fn validate_accepts_boundaries() {
    let mut r = new_record();
    r.positive_score = 0.0;
    r.negative_score = 1.0;
    assert!(r.validate().is_ok());
}

#[test]
fn validate_rejects_score_above_one() {
    let mut r = new_record();
    r.overall_score = 1.2;
    let err = r.validate().unwrap_err();
    assert_eq!(err.field, "overall_score");
}

#[test]
fn validate_rejects_nan_score() {
    let mut r = new_record();
    r.neutral_score = f64::NAN;
    assert_eq!(r.validate().unwrap_err().field, "neutral_score");
}

#[test]
fn validate_rejects_out_of_range_emotion() {
    let mut r = new_record();
    r.emotions = Some(EmotionVector {
        disgust: -0.1,
        ..EmotionVector::default()
    });
    assert_eq!(r.validate().unwrap_err().field, "emotions.disgust");
}

#[test]
fn validate_rejects_non_object_metadata() {
    let mut r = new_record();
    r.metadata = Some(serde_json::json!(["not", "an", "object"]));
    assert_eq!(r.validate().unwrap_err().field, "metadata");
}

#[test]
fn into_record_defaults_analyzed_at_to_now() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let record = new_record().into_record(Uuid::new_v4(), now);
    assert_eq!(record.analyzed_at, now);
    assert_eq!(record.created_at, now);
}

#[test]
fn into_record_keeps_explicit_analyzed_at() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let analyzed = Utc.with_ymd_and_hms(2026, 2, 28, 9, 30, 0).unwrap();
    let mut input = new_record();
    input.analyzed_at = Some(analyzed);
    let record = input.into_record(Uuid::new_v4(), now);
    assert_eq!(record.analyzed_at, analyzed);
}

#[test]
fn patch_merges_only_present_fields() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
    let mut record = new_record().into_record(Uuid::new_v4(), now);
    let patch = EmotionPatch {
        sentiment: Some(Sentiment::Mixed),
        language: Some("fr".to_string()),
        ..EmotionPatch::default()
    };
    patch.apply(&mut record, later);

    assert_eq!(record.sentiment, Sentiment::Mixed);
    assert_eq!(record.language.as_deref(), Some("fr"));
    assert_eq!(record.positive_score, 0.8);
    assert_eq!(record.text.as_deref(), Some("Launching something great today"));
    assert_eq!(record.updated_at, later);
    assert_eq!(record.created_at, now);
}

#[test]
fn patch_validation_names_field() {
    let patch = EmotionPatch {
        confidence: Some(2.0),
        ..EmotionPatch::default()
    };
    assert_eq!(patch.validate().unwrap_err().field, "confidence");
}

#[test]
fn empty_patch_is_empty() {
    assert!(EmotionPatch::default().is_empty());
    let patch = EmotionPatch {
        text: Some("x".to_string()),
        ..EmotionPatch::default()
    };
    assert!(!patch.is_empty());
}
