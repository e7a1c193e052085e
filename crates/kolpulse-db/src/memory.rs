//! In-process [`Store`] backed by `tokio::sync::RwLock`ed maps.
//!
//! Locks are only held for the duration of a single call. When a call needs
//! more than one map, it locks them in the order kols, events, records.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use kolpulse_core::{
    AlertLevel, EmotionPatch, EmotionRecord, Event, EventMetrics, EventOverview, EventPatch,
    EventQuery, EventStatus, Kol, KolPatch, NewEmotionRecord, NewEvent, NewKol, Page, RecordQuery,
    ValidationError, Window, MAX_ACTIVE_KOLS,
};

use crate::{batch_analyzed_at, DbError, Store};

#[derive(Debug, Default)]
pub struct MemoryStore {
    kols: RwLock<HashMap<Uuid, Kol>>,
    events: RwLock<HashMap<Uuid, Event>>,
    records: RwLock<HashMap<Uuid, EmotionRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(a: &EmotionRecord, b: &EmotionRecord) -> std::cmp::Ordering {
    b.analyzed_at
        .cmp(&a.analyzed_at)
        .then_with(|| a.id.cmp(&b.id))
}

fn by_emotion_score(a: &Kol, b: &Kol) -> std::cmp::Ordering {
    b.emotion_score
        .total_cmp(&a.emotion_score)
        .then_with(|| a.username.cmp(&b.username))
}

fn page_of<T>(items: Vec<T>, offset: u64, limit: u32) -> Page<T> {
    let total = i64::try_from(items.len()).unwrap_or(i64::MAX);
    let items = items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit as usize)
        .collect();
    Page { items, total }
}

fn check_references(
    input: &NewEmotionRecord,
    kols: &HashMap<Uuid, Kol>,
    events: &HashMap<Uuid, Event>,
) -> Result<(), DbError> {
    check_refs(input.kol_id, input.event_id, kols, events)
}

fn check_refs(
    kol_id: Option<Uuid>,
    event_id: Option<Uuid>,
    kols: &HashMap<Uuid, Kol>,
    events: &HashMap<Uuid, Event>,
) -> Result<(), DbError> {
    if let Some(id) = kol_id.filter(|id| !kols.contains_key(id)) {
        return Err(ValidationError::new("kol_id", format!("unknown kol {id}")).into());
    }
    if let Some(id) = event_id.filter(|id| !events.contains_key(id)) {
        return Err(ValidationError::new("event_id", format!("unknown event {id}")).into());
    }
    Ok(())
}

fn active_count(kols: &HashMap<Uuid, Kol>) -> usize {
    kols.values().filter(|k| k.is_active).count()
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_record(&self, input: NewEmotionRecord) -> Result<EmotionRecord, DbError> {
        input.validate()?;
        let kols = self.kols.read().await;
        let events = self.events.read().await;
        check_references(&input, &kols, &events)?;

        let record = input.into_record(Uuid::new_v4(), Utc::now());
        self.records
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn create_records(
        &self,
        inputs: Vec<NewEmotionRecord>,
    ) -> Result<Vec<EmotionRecord>, DbError> {
        let kols = self.kols.read().await;
        let events = self.events.read().await;
        for input in &inputs {
            input.validate()?;
            check_references(input, &kols, &events)?;
        }

        let now = Utc::now();
        let created: Vec<EmotionRecord> = inputs
            .into_iter()
            .enumerate()
            .map(|(i, mut input)| {
                input.analyzed_at.get_or_insert(batch_analyzed_at(now, i));
                input.into_record(Uuid::new_v4(), now)
            })
            .collect();
        let mut records = self.records.write().await;
        for record in &created {
            records.insert(record.id, record.clone());
        }
        Ok(created)
    }

    async fn get_record(&self, id: Uuid) -> Result<EmotionRecord, DbError> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found("emotion record", id))
    }

    async fn update_record(
        &self,
        id: Uuid,
        patch: EmotionPatch,
    ) -> Result<EmotionRecord, DbError> {
        patch.validate()?;
        let kols = self.kols.read().await;
        let events = self.events.read().await;
        check_refs(patch.kol_id, patch.event_id, &kols, &events)?;

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("emotion record", id))?;
        patch.apply(record, Utc::now());
        Ok(record.clone())
    }

    async fn delete_record(&self, id: Uuid) -> Result<(), DbError> {
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::not_found("emotion record", id))
    }

    async fn query_records(&self, query: &RecordQuery) -> Result<Page<EmotionRecord>, DbError> {
        query.validate()?;
        let mut matching: Vec<EmotionRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(newest_first);
        Ok(page_of(matching, query.offset(), query.limit))
    }

    async fn scan_records(&self, window: &Window) -> Result<Vec<EmotionRecord>, DbError> {
        let mut matching: Vec<EmotionRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| window.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| newest_first(b, a));
        Ok(matching)
    }

    async fn recent_by_source(
        &self,
        source_id: &str,
        limit: usize,
    ) -> Result<Vec<EmotionRecord>, DbError> {
        let mut matching: Vec<EmotionRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.source_id.as_deref() == Some(source_id))
            .cloned()
            .collect();
        matching.sort_by(newest_first);
        matching.truncate(limit);
        Ok(matching)
    }

    async fn create_kol(&self, input: NewKol) -> Result<Kol, DbError> {
        input.validate()?;
        let mut kols = self.kols.write().await;
        if kols.values().any(|k| k.username == input.username) {
            return Err(DbError::Conflict {
                entity: "kol",
                field: "username",
                value: input.username,
            });
        }
        if input.is_active && active_count(&kols) >= MAX_ACTIVE_KOLS {
            return Err(DbError::Capacity {
                entity: "kol",
                limit: MAX_ACTIVE_KOLS,
            });
        }
        let kol = input.into_kol(Uuid::new_v4(), Utc::now());
        kols.insert(kol.id, kol.clone());
        Ok(kol)
    }

    async fn get_kol(&self, id: Uuid) -> Result<Kol, DbError> {
        self.kols
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found("kol", id))
    }

    async fn find_kol_by_username(&self, username: &str) -> Result<Kol, DbError> {
        self.kols
            .read()
            .await
            .values()
            .find(|k| k.username == username)
            .cloned()
            .ok_or_else(|| DbError::not_found("kol", username))
    }

    async fn list_kols(&self, is_active: Option<bool>) -> Result<Vec<Kol>, DbError> {
        let mut kols: Vec<Kol> = self
            .kols
            .read()
            .await
            .values()
            .filter(|k| is_active.is_none_or(|active| k.is_active == active))
            .cloned()
            .collect();
        kols.sort_by(by_emotion_score);
        Ok(kols)
    }

    async fn active_kols(&self, limit: usize) -> Result<Vec<Kol>, DbError> {
        let mut kols = self.list_kols(Some(true)).await?;
        kols.truncate(limit);
        Ok(kols)
    }

    async fn update_kol(&self, id: Uuid, patch: KolPatch) -> Result<Kol, DbError> {
        patch.validate()?;
        let mut kols = self.kols.write().await;
        let active = active_count(&kols);
        let kol = kols
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("kol", id))?;
        if patch.reactivates(kol) && active >= MAX_ACTIVE_KOLS {
            return Err(DbError::Capacity {
                entity: "kol",
                limit: MAX_ACTIVE_KOLS,
            });
        }
        patch.apply(kol, Utc::now());
        Ok(kol.clone())
    }

    async fn deactivate_kol(&self, id: Uuid) -> Result<Kol, DbError> {
        let mut kols = self.kols.write().await;
        let kol = kols
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("kol", id))?;
        kol.is_active = false;
        kol.updated_at = Utc::now();
        Ok(kol.clone())
    }

    async fn set_kol_scores(
        &self,
        username: &str,
        emotion_score: f64,
        influence_score: f64,
    ) -> Result<Kol, DbError> {
        let mut kols = self.kols.write().await;
        let kol = kols
            .values_mut()
            .find(|k| k.username == username)
            .ok_or_else(|| DbError::not_found("kol", username))?;
        kol.emotion_score = emotion_score;
        kol.influence_score = influence_score;
        kol.updated_at = Utc::now();
        Ok(kol.clone())
    }

    async fn create_event(&self, input: NewEvent, status: EventStatus) -> Result<Event, DbError> {
        input.validate()?;
        let kols = self.kols.read().await;
        let mut kol_ids: Vec<Uuid> = Vec::new();
        for id in &input.kol_ids {
            if kols.contains_key(id) && !kol_ids.contains(id) {
                kol_ids.push(*id);
            }
        }

        let mut event = input.into_event(Uuid::new_v4(), status, Utc::now());
        event.kol_ids = kol_ids;
        self.events.write().await.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> Result<Event, DbError> {
        self.events
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found("event", id))
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Page<Event>, DbError> {
        query.validate()?;
        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let mut matching: Vec<Event> = self
            .events
            .read()
            .await
            .values()
            .filter(|e| {
                needle
                    .as_ref()
                    .is_none_or(|n| e.name.to_lowercase().contains(n.as_str()))
                    && query.event_type.is_none_or(|t| e.event_type == t)
                    && query.status.is_none_or(|s| e.status == s)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(page_of(matching, query.offset(), query.limit))
    }

    async fn events_by_status(&self, status: EventStatus) -> Result<Vec<Event>, DbError> {
        let mut matching: Vec<Event> = self
            .events
            .read()
            .await
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(matching)
    }

    async fn update_event(&self, id: Uuid, patch: EventPatch) -> Result<Event, DbError> {
        let mut events = self.events.write().await;
        let event = events
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("event", id))?;
        patch.validate(event)?;
        patch.apply(event, Utc::now());
        Ok(event.clone())
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), DbError> {
        let mut events = self.events.write().await;
        if events.remove(&id).is_none() {
            return Err(DbError::not_found("event", id));
        }
        let mut records = self.records.write().await;
        for record in records.values_mut().filter(|r| r.event_id == Some(id)) {
            record.event_id = None;
        }
        Ok(())
    }

    async fn transition_event(
        &self,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<Event, DbError> {
        let mut events = self.events.write().await;
        let event = events
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("event", id))?;
        if event.status != from || !from.can_transition_to(to) {
            return Err(DbError::InvalidTransition {
                id: id.to_string(),
                expected_status: from.as_str(),
            });
        }
        event.status = to;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn set_event_metrics(&self, id: Uuid, metrics: EventMetrics) -> Result<Event, DbError> {
        let mut events = self.events.write().await;
        let event = events
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("event", id))?;
        event.emotion_score = metrics.emotion_score;
        event.emotion_trend = metrics.emotion_trend;
        event.alert_level = metrics.alert_level;
        event.total_posts = metrics.total_posts;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn event_kols(&self, id: Uuid) -> Result<Vec<Kol>, DbError> {
        let kols = self.kols.read().await;
        let events = self.events.read().await;
        let event = events
            .get(&id)
            .ok_or_else(|| DbError::not_found("event", id))?;
        Ok(event
            .kol_ids
            .iter()
            .filter_map(|kol_id| kols.get(kol_id).cloned())
            .collect())
    }

    async fn event_overview(&self) -> Result<EventOverview, DbError> {
        let events = self.events.read().await;
        let mut overview = EventOverview::default();
        for event in events.values() {
            overview.total += 1;
            if event.status == EventStatus::Active {
                overview.active += 1;
            }
            if event.alert_level == AlertLevel::High {
                overview.high_alerts += 1;
            }
            overview.total_posts += event.total_posts;
            *overview
                .by_status
                .entry(event.status.to_string())
                .or_default() += 1;
            *overview
                .by_type
                .entry(event.event_type.to_string())
                .or_default() += 1;
        }
        Ok(overview)
    }

    async fn health_check(&self) -> Result<(), DbError> {
        Ok(())
    }
}
