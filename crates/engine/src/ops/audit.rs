//! Scrape audit ledger operations and the global concurrency guard.

use chrono::{Duration, Utc};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, QuerySelect, prelude::*};
use tracing::{info, warn};

use crate::{EngineError, ResultEngine, ScrapeEvent, ScrapeStatus, scrape_events};

use super::Engine;

/// A `started` row older than this is considered abandoned (process died
/// mid-run) and no longer blocks new runs.
pub const STALE_RUN_MINUTES: i64 = 20;

impl Engine {
    /// Concurrency guard: rejects a new run while any vendor's run is
    /// in flight. Stale `started` rows are ignored so a crashed process
    /// never wedges the pipeline.
    pub async fn ensure_no_active_run(&self) -> ResultEngine<()> {
        let threshold = Utc::now() - Duration::minutes(STALE_RUN_MINUTES);
        let active = scrape_events::Entity::find()
            .filter(scrape_events::Column::Status.eq(ScrapeStatus::Started.as_str()))
            .filter(scrape_events::Column::CreatedAt.gt(threshold))
            .one(&self.database)
            .await?;

        match active {
            Some(row) => Err(EngineError::Concurrency(format!(
                "a scrape for {} is already running",
                row.vendor
            ))),
            None => Ok(()),
        }
    }

    pub async fn insert_scrape_audit(&self, event: &ScrapeEvent) -> ResultEngine<()> {
        scrape_events::ActiveModel::from(event)
            .insert(&self.database)
            .await?;
        info!(
            id = %event.id,
            vendor = %event.vendor.as_str(),
            triggered_by = %event.triggered_by,
            "scrape run started"
        );
        Ok(())
    }

    /// Finalize the audit row. Failures here are wrapped so callers can
    /// tell "the run failed" apart from "the run finished but the ledger
    /// write failed".
    pub async fn update_scrape_audit(
        &self,
        id: Uuid,
        status: ScrapeStatus,
        message: Option<String>,
        report_json: Option<String>,
        duration_seconds: f64,
    ) -> ResultEngine<()> {
        let active = scrape_events::ActiveModel {
            id: ActiveValue::Unchanged(id.to_string()),
            status: ActiveValue::Set(status.as_str().to_string()),
            message: ActiveValue::Set(message),
            report_json: ActiveValue::Set(report_json),
            duration_seconds: ActiveValue::Set(Some(duration_seconds)),
            ..Default::default()
        };
        active
            .update(&self.database)
            .await
            .map_err(|err| EngineError::Finalization(err.to_string()))?;
        info!(%id, status = status.as_str(), "scrape run finalized");
        Ok(())
    }

    /// Recent audit rows, newest first.
    ///
    /// Stale `started` rows are reported as `failed` ("timed out") so the
    /// listing never shows a phantom in-flight run, but the stored rows
    /// are left untouched.
    pub async fn list_scrape_events(&self, limit: u64) -> ResultEngine<Vec<ScrapeEvent>> {
        let threshold = Utc::now() - Duration::minutes(STALE_RUN_MINUTES);
        let rows = scrape_events::Entity::find()
            .order_by_desc(scrape_events::Column::CreatedAt)
            .limit(limit)
            .all(&self.database)
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let mut event = ScrapeEvent::try_from(row)?;
            if event.status == ScrapeStatus::Started && event.created_at < threshold {
                warn!(id = %event.id, "reporting stale started run as timed out");
                event.status = ScrapeStatus::Failed;
                event.message = Some("timed out".to_string());
            }
            events.push(event);
        }
        Ok(events)
    }

    /// Delete terminal audit rows older than `keep_days`, returning the
    /// number removed. `started` rows are kept regardless of age so a
    /// stuck run stays visible.
    pub async fn prune_scrape_events(&self, keep_days: i64) -> ResultEngine<u64> {
        let cutoff = Utc::now() - Duration::days(keep_days);
        let result = scrape_events::Entity::delete_many()
            .filter(scrape_events::Column::CreatedAt.lt(cutoff))
            .filter(scrape_events::Column::Status.ne(ScrapeStatus::Started.as_str()))
            .exec(&self.database)
            .await?;
        if result.rows_affected > 0 {
            info!(removed = result.rows_affected, "pruned old scrape events");
        }
        Ok(result.rows_affected)
    }
}
