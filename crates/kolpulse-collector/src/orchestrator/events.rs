use chrono::{DateTime, Utc};
use kolpulse_analytics::event_metrics;
use kolpulse_core::{search_terms, Event, EventPatch, EventStatus, NewEvent, Window};
use kolpulse_db::DbError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::posts::Origin;
use super::{Orchestrator, SweepReport};
use crate::error::CollectError;

/// Events moved by one status sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSweepReport {
    pub activated: Vec<Uuid>,
    pub completed: Vec<Uuid>,
    /// Active events whose monitoring loop was not running, e.g. after a
    /// restart, and has been started again.
    pub resumed: Vec<Uuid>,
    /// Loops stopped because their event is no longer active or is gone.
    pub stopped: Vec<Uuid>,
    pub failed: usize,
}

impl Orchestrator {
    /// Creates an event, `active` when `now` is inside its window and
    /// `upcoming` otherwise. An active event starts monitoring right away;
    /// a monitoring failure is logged and does not fail the creation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] for invalid input or a store failure.
    pub async fn create_event(&self, input: NewEvent) -> Result<Event, DbError> {
        input.validate()?;
        let status = EventStatus::initial(input.start_date, input.end_date, Utc::now());
        let event = self.store.create_event(input, status).await?;
        tracing::info!(event_id = %event.id, name = %event.name, status = %event.status, "created event");
        if event.status == EventStatus::Active {
            if let Err(e) = self.start_event_monitoring(event.id).await {
                tracing::warn!(event_id = %event.id, error = %e, "could not start monitoring");
            }
        }
        Ok(event)
    }

    /// Hard-deletes an event after stopping its monitoring loop.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown id.
    pub async fn delete_event(&self, event_id: Uuid) -> Result<(), DbError> {
        self.monitors.stop(event_id);
        self.store.delete_event(event_id).await
    }

    /// Applies an explicit patch. When the keywords or hashtags change on an
    /// active event, its monitoring loop is restarted with the new term set.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] for an unknown id, an invalid patch, or a store
    /// failure.
    pub async fn update_event(&self, event_id: Uuid, patch: EventPatch) -> Result<Event, DbError> {
        let terms_changed = patch.keywords.is_some() || patch.hashtags.is_some();
        let event = self.store.update_event(event_id, patch).await?;
        if terms_changed && event.status == EventStatus::Active {
            if let Err(e) = self.start_event_monitoring(event_id).await {
                tracing::warn!(event_id = %event_id, error = %e, "could not restart monitoring");
            }
        }
        Ok(event)
    }

    /// Manual status change through the same state machine as the status
    /// sweep. Activation starts monitoring; completion stops it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown id, or
    /// [`DbError::InvalidTransition`] for an illegal move.
    pub async fn set_event_status(
        &self,
        event_id: Uuid,
        next: EventStatus,
    ) -> Result<Event, DbError> {
        let current = self.store.get_event(event_id).await?;
        let event = self
            .store
            .transition_event(event_id, current.status, next)
            .await?;
        tracing::info!(event_id = %event_id, from = %current.status, to = %next, "event status changed");
        match next {
            EventStatus::Active => {
                if let Err(e) = self.start_event_monitoring(event_id).await {
                    tracing::warn!(event_id = %event_id, error = %e, "could not start monitoring");
                }
            }
            EventStatus::Completed => {
                self.stop_event_monitoring(event_id);
            }
            EventStatus::Upcoming => {}
        }
        Ok(event)
    }

    /// The Source Feed search terms for an event: its keywords, `#hashtags`,
    /// and the `@usernames` of its associated KOLs.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown id.
    pub async fn event_search_terms(&self, event_id: Uuid) -> Result<Vec<String>, DbError> {
        let event = self.store.get_event(event_id).await?;
        self.terms_for(&event).await
    }

    async fn terms_for(&self, event: &Event) -> Result<Vec<String>, DbError> {
        let usernames: Vec<String> = self
            .store
            .event_kols(event.id)
            .await?
            .into_iter()
            .map(|kol| kol.username)
            .collect();
        Ok(search_terms(&event.keywords, &event.hashtags, &usernames))
    }

    /// Starts (or restarts) the periodic post collection for an `active`
    /// event and returns the search terms it uses. An event with no terms is
    /// not monitored, and any loop it still had is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown id, or
    /// [`DbError::InvalidTransition`] when the event is not `active`; any
    /// loop left running for it is stopped first.
    pub async fn start_event_monitoring(&self, event_id: Uuid) -> Result<Vec<String>, DbError> {
        let event = self.store.get_event(event_id).await?;
        if event.status != EventStatus::Active {
            self.stop_event_monitoring(event_id);
            return Err(DbError::InvalidTransition {
                id: event_id.to_string(),
                expected_status: EventStatus::Active.as_str(),
            });
        }
        let terms = self.terms_for(&event).await?;
        if terms.is_empty() {
            self.stop_event_monitoring(event_id);
            tracing::debug!(event_id = %event_id, "event has no search terms; not monitoring");
            return Ok(terms);
        }
        let token = self.monitors.register(event_id);
        tracing::info!(event_id = %event_id, terms = ?terms, "starting event monitoring");
        self.spawn_monitor(event_id, terms.clone(), token);
        Ok(terms)
    }

    /// Cancels the event's monitoring loop. Returns whether one was running.
    pub fn stop_event_monitoring(&self, event_id: Uuid) -> bool {
        let stopped = self.monitors.stop(event_id);
        if stopped {
            tracing::info!(event_id = %event_id, "stopped event monitoring");
        }
        stopped
    }

    #[must_use]
    pub fn is_monitoring(&self, event_id: Uuid) -> bool {
        self.monitors.is_running(event_id)
    }

    fn spawn_monitor(&self, event_id: Uuid, terms: Vec<String>, token: CancellationToken) {
        let this = self.clone();
        let interval = self.settings.event_poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    result = this.collect_event_posts(event_id, &terms) => {
                        if let Err(e) = result {
                            tracing::warn!(event_id = %event_id, error = %e, "event collection tick failed");
                        }
                    }
                }
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
            }
            tracing::debug!(event_id = %event_id, "event monitoring loop exited");
        });
    }

    /// One monitoring tick: searches the feed with `terms` and persists the
    /// scored posts against the event.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] on feed or store failure.
    pub async fn collect_event_posts(
        &self,
        event_id: Uuid,
        terms: &[String],
    ) -> Result<usize, CollectError> {
        let posts = self.feed.search(terms).await?;
        let stored = self
            .score_and_store(&posts, Origin::Event { event_id })
            .await?;
        tracing::info!(event_id = %event_id, fetched = posts.len(), stored = stored.len(), "collected event posts");
        Ok(stored.len())
    }

    /// Activates `upcoming` events whose window contains `now` and completes
    /// `active` events whose end date has passed. Activation starts
    /// monitoring; completion stops it. A transition lost to a concurrent
    /// sweep is skipped.
    ///
    /// The sweep then reconciles the monitoring loops with the stored
    /// statuses: every remaining `active` event without a running loop is
    /// resumed, and loops for events that are no longer `active` are
    /// stopped.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] only if the candidate events cannot be read.
    pub async fn run_status_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> Result<StatusSweepReport, CollectError> {
        let mut report = StatusSweepReport::default();

        for event in self.store.events_by_status(EventStatus::Upcoming).await? {
            if !event.should_activate(now) {
                continue;
            }
            match self
                .store
                .transition_event(event.id, EventStatus::Upcoming, EventStatus::Active)
                .await
            {
                Ok(_) => {
                    tracing::info!(event_id = %event.id, name = %event.name, "activated event");
                    report.activated.push(event.id);
                    if let Err(e) = self.start_event_monitoring(event.id).await {
                        tracing::warn!(event_id = %event.id, error = %e, "could not start monitoring");
                    }
                }
                Err(DbError::InvalidTransition { .. }) => {
                    tracing::debug!(event_id = %event.id, "event already moved on");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(event_id = %event.id, error = %e, "event activation failed");
                }
            }
        }

        for event in self.store.events_by_status(EventStatus::Active).await? {
            if !event.should_complete(now) {
                continue;
            }
            match self
                .store
                .transition_event(event.id, EventStatus::Active, EventStatus::Completed)
                .await
            {
                Ok(_) => {
                    self.stop_event_monitoring(event.id);
                    tracing::info!(event_id = %event.id, name = %event.name, "completed event");
                    report.completed.push(event.id);
                }
                Err(DbError::InvalidTransition { .. }) => {
                    tracing::debug!(event_id = %event.id, "event already moved on");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(event_id = %event.id, error = %e, "event completion failed");
                }
            }
        }

        self.reconcile_monitors(now, &mut report).await?;

        tracing::info!(
            activated = report.activated.len(),
            completed = report.completed.len(),
            resumed = report.resumed.len(),
            stopped = report.stopped.len(),
            "event status sweep finished"
        );
        Ok(report)
    }

    async fn reconcile_monitors(
        &self,
        now: DateTime<Utc>,
        report: &mut StatusSweepReport,
    ) -> Result<(), CollectError> {
        for event in self.store.events_by_status(EventStatus::Active).await? {
            if event.should_complete(now) || self.is_monitoring(event.id) {
                continue;
            }
            match self.start_event_monitoring(event.id).await {
                Ok(terms) if !terms.is_empty() => {
                    tracing::info!(event_id = %event.id, name = %event.name, "resumed event monitoring");
                    report.resumed.push(event.id);
                }
                Ok(_) | Err(DbError::NotFound { .. } | DbError::InvalidTransition { .. }) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(event_id = %event.id, error = %e, "could not resume monitoring");
                }
            }
        }

        for event_id in self.monitors.running() {
            match self.store.get_event(event_id).await {
                Ok(event) if event.status == EventStatus::Active => {}
                Ok(_) | Err(DbError::NotFound { .. }) => {
                    if self.stop_event_monitoring(event_id) {
                        report.stopped.push(event_id);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(event_id = %event_id, error = %e, "could not check monitored event");
                }
            }
        }
        Ok(())
    }

    /// Recomputes one event's metrics from its associated records. An event
    /// without records keeps its current metrics and yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on store failure or an unknown id.
    pub async fn update_event_metrics(&self, event_id: Uuid) -> Result<Option<Event>, DbError> {
        let records = self.store.scan_records(&Window::for_event(event_id)).await?;
        match event_metrics(&records) {
            Some(metrics) => {
                let event = self.store.set_event_metrics(event_id, metrics).await?;
                tracing::debug!(
                    event_id = %event_id,
                    emotion_score = metrics.emotion_score,
                    alert_level = %metrics.alert_level,
                    "updated event metrics"
                );
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    /// Refreshes the metrics of every active event. Running it twice with no
    /// new records in between writes identical metrics.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] only if the active events cannot be read.
    pub async fn run_metrics_sweep(&self) -> Result<SweepReport, CollectError> {
        let events = self.store.events_by_status(EventStatus::Active).await?;
        let mut report = SweepReport::default();
        for event in &events {
            match self.update_event_metrics(event.id).await {
                Ok(Some(_)) => report.processed += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(event_id = %event.id, error = %e, "event metrics update failed");
                }
            }
        }
        tracing::info!(
            updated = report.processed,
            without_records = report.skipped,
            failed = report.failed,
            "event metrics sweep finished"
        );
        Ok(report)
    }
}
