//! The scrape-run audit ledger.
//!
//! One row per attempt, inserted as `started` before any external call and
//! updated exactly once to a terminal status. The ledger is also the
//! concurrency guard's source of truth: an in-flight run is a `started`
//! row younger than the stale threshold.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Vendor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Started,
    Success,
    Failed,
    Cancelled,
}

impl ScrapeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Started
    }
}

impl TryFrom<&str> for ScrapeStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "started" => Ok(Self::Started),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::Validation(format!(
                "invalid scrape status: {other}"
            ))),
        }
    }
}

/// Counters accumulated over one run; serialized into `report_json`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub saved_transactions: u32,
    pub updated_transactions: u32,
    pub duplicate_transactions: u32,
    pub failed_transactions: u32,
    pub bank_transactions: u32,
    pub skipped_cards: u32,
    pub accounts_processed: u32,
}

impl RunStats {
    /// One-line human summary stored in the audit row's `message`.
    pub fn summary(&self) -> String {
        format!(
            "saved {}, updated {}, duplicates {}, failed {}, skipped cards {}",
            self.saved_transactions,
            self.updated_transactions,
            self.duplicate_transactions,
            self.failed_transactions,
            self.skipped_cards
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrapeEvent {
    pub id: Uuid,
    pub triggered_by: String,
    pub vendor: Vendor,
    pub start_date: Date,
    pub status: ScrapeStatus,
    pub message: Option<String>,
    pub report_json: Option<String>,
    pub duration_seconds: Option<f64>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scrape_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub triggered_by: String,
    pub vendor: String,
    pub start_date: Date,
    pub status: String,
    pub message: Option<String>,
    pub report_json: Option<String>,
    pub duration_seconds: Option<f64>,
    pub retry_count: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ScrapeEvent> for ActiveModel {
    fn from(event: &ScrapeEvent) -> Self {
        Self {
            id: ActiveValue::Set(event.id.to_string()),
            triggered_by: ActiveValue::Set(event.triggered_by.clone()),
            vendor: ActiveValue::Set(event.vendor.as_str().to_string()),
            start_date: ActiveValue::Set(event.start_date),
            status: ActiveValue::Set(event.status.as_str().to_string()),
            message: ActiveValue::Set(event.message.clone()),
            report_json: ActiveValue::Set(event.report_json.clone()),
            duration_seconds: ActiveValue::Set(event.duration_seconds),
            retry_count: ActiveValue::Set(event.retry_count),
            created_at: ActiveValue::Set(event.created_at),
        }
    }
}

impl TryFrom<Model> for ScrapeEvent {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("scrape event not exists".to_string()))?,
            triggered_by: model.triggered_by,
            vendor: Vendor::try_from(model.vendor.as_str())?,
            start_date: model.start_date,
            status: ScrapeStatus::try_from(model.status.as_str())?,
            message: model.message,
            report_json: model.report_json,
            duration_seconds: model.duration_seconds,
            retry_count: model.retry_count,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_summary_mentions_all_counters() {
        let stats = RunStats {
            saved_transactions: 3,
            updated_transactions: 1,
            duplicate_transactions: 2,
            failed_transactions: 0,
            bank_transactions: 3,
            skipped_cards: 1,
            accounts_processed: 2,
        };
        let summary = stats.summary();
        assert!(summary.contains("saved 3"));
        assert!(summary.contains("skipped cards 1"));
    }

    #[test]
    fn report_json_uses_camel_case() {
        let json = serde_json::to_string(&RunStats::default()).unwrap();
        assert!(json.contains("savedTransactions"));
        assert!(json.contains("skippedCards"));
    }
}
