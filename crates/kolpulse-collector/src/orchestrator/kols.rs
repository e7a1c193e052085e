use kolpulse_core::{Kol, NewKol, MAX_ACTIVE_KOLS};
use kolpulse_db::DbError;
use serde::Serialize;

use super::posts::Origin;
use super::{Orchestrator, SweepReport};
use crate::error::CollectError;

/// Result of one run of the per-KOL pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct KolCollection {
    pub username: String,
    pub fetched: usize,
    pub stored: usize,
    /// The KOL after its scores were recomputed.
    pub kol: Kol,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchImportReport {
    pub success: usize,
    pub failed: usize,
}

impl Orchestrator {
    /// Fetches the KOL's latest posts, scores them in fetch order, persists
    /// them, then recomputes the KOL's emotion and influence scores from its
    /// newest records (including the ones just written).
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Db`] with `NotFound` for an unknown username,
    /// [`CollectError::Feed`] if the feed fails, or any store failure.
    pub async fn collect_kol_data(&self, username: &str) -> Result<KolCollection, CollectError> {
        let kol = self.store.find_kol_by_username(username).await?;
        let posts = self.feed.fetch_user_posts(username).await?;
        let stored = self
            .score_and_store(
                &posts,
                Origin::Kol {
                    username,
                    kol_id: kol.id,
                },
            )
            .await?;
        let kol = self.influence.recompute(username).await?;
        tracing::info!(
            kol = %username,
            fetched = posts.len(),
            stored = stored.len(),
            emotion_score = kol.emotion_score,
            "collected kol posts"
        );
        Ok(KolCollection {
            username: username.to_owned(),
            fetched: posts.len(),
            stored: stored.len(),
            kol,
        })
    }

    /// One pass of the per-KOL pipeline over every active KOL, highest
    /// emotion score first, pausing between KOLs. A failing KOL is logged
    /// and does not stop the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] only if the active KOL list cannot be read.
    pub async fn run_kol_sweep(&self) -> Result<SweepReport, CollectError> {
        let kols = self.store.active_kols(MAX_ACTIVE_KOLS).await?;
        tracing::info!(kols = kols.len(), "starting kol collection sweep");

        let mut report = SweepReport::default();
        for (i, kol) in kols.iter().enumerate() {
            if i > 0 && !self.settings.inter_kol_delay.is_zero() {
                tokio::select! {
                    () = self.monitors.root().cancelled() => {}
                    () = tokio::time::sleep(self.settings.inter_kol_delay) => {}
                }
            }
            if self.is_shut_down() {
                report.skipped = kols.len() - i;
                tracing::warn!(remaining = report.skipped, "kol sweep interrupted by shutdown");
                break;
            }
            match self.collect_kol_data(&kol.username).await {
                Ok(_) => report.processed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(kol = %kol.username, error = %e, "kol collection failed");
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            "kol collection sweep finished"
        );
        Ok(report)
    }

    /// Creates a KOL and, if it is active, starts its first collection in
    /// the background.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] for invalid input, a duplicate username, or a full
    /// active roster.
    pub async fn create_kol(&self, input: NewKol) -> Result<Kol, DbError> {
        let kol = self.store.create_kol(input).await?;
        tracing::info!(kol = %kol.username, id = %kol.id, "created kol");
        if kol.is_active {
            self.spawn_initial_collection(kol.username.clone());
        }
        Ok(kol)
    }

    /// Creates each KOL in turn through the same checks as [`Self::create_kol`].
    pub async fn batch_import(&self, inputs: Vec<NewKol>) -> BatchImportReport {
        let mut report = BatchImportReport::default();
        for input in inputs {
            let username = input.username.clone();
            match self.create_kol(input).await {
                Ok(_) => report.success += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(kol = %username, error = %e, "batch import skipped kol");
                }
            }
        }
        report
    }

    fn spawn_initial_collection(&self, username: String) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.collect_kol_data(&username).await {
                tracing::warn!(kol = %username, error = %e, "initial collection failed");
            }
        });
    }
}
