use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod credential {
    use super::*;

    /// Request body for storing a vendor login.
    ///
    /// `password` arrives in plain text over the local connection and is
    /// obfuscated by the engine before it is persisted.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct CredentialNew {
        pub vendor: String,
        pub nickname: String,
        pub username: Option<String>,
        pub password: String,
        pub id_number: Option<String>,
        pub user_code: Option<String>,
        pub card6_digits: Option<String>,
        pub bank_account_number: Option<String>,
    }

    /// A stored credential; never includes the secret.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct CredentialView {
        pub id: Uuid,
        pub vendor: String,
        pub nickname: String,
        pub username: Option<String>,
        pub card6_digits: Option<String>,
        pub bank_account_number: Option<String>,
        pub last_synced_at: Option<DateTime<Utc>>,
    }
}

pub mod transaction {
    use super::*;

    /// Query parameters for the transaction listing.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionList {
        pub vendor: Option<String>,
        pub category: Option<String>,
        pub account_number: Option<String>,
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
        pub uncategorized_only: Option<bool>,
        pub limit: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub identifier: String,
        pub vendor: String,
        pub date: NaiveDate,
        pub processed_date: NaiveDate,
        pub name: String,
        pub price_minor: i64,
        pub category: Option<String>,
        pub category_source: Option<String>,
        pub account_number: String,
        pub status: String,
        pub kind: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
    }

    /// Manual category edit body.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryUpdate {
        pub category: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryRename {
        pub from: String,
        pub to: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RenameResponse {
        pub renamed: u64,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct WipeRequest {
        pub vendor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WipeResponse {
        pub removed: u64,
    }
}

pub mod scrape {
    use super::*;

    /// Request body for starting a scrape run.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScrapeStart {
        pub credential_id: Uuid,
        pub start_date: NaiveDate,
        pub show_browser: Option<bool>,
        pub log_requests: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScrapeEventView {
        pub id: Uuid,
        pub triggered_by: String,
        pub vendor: String,
        pub start_date: NaiveDate,
        pub status: String,
        pub message: Option<String>,
        pub report: Option<serde_json::Value>,
        pub duration_seconds: Option<f64>,
        pub retry_count: i32,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScrapeEventsResponse {
        pub events: Vec<ScrapeEventView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CancelResponse {
        pub cancelled: bool,
    }
}

pub mod rules {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleNew {
        pub name_pattern: String,
        pub target_category: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct RuleUpdate {
        pub name_pattern: Option<String>,
        pub target_category: Option<String>,
        pub is_active: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleView {
        pub id: Uuid,
        pub name_pattern: String,
        pub target_category: String,
        pub is_active: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MappingSet {
        pub source_category: String,
        pub target_category: String,
    }
}

pub mod settings {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettingWrite {
        pub value: serde_json::Value,
    }
}

pub mod ownership {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OwnershipView {
        pub id: Uuid,
        pub vendor: String,
        pub account_number: String,
        pub credential_id: Uuid,
        pub linked_bank_account_id: Option<Uuid>,
        pub custom_bank_account_number: Option<String>,
        pub custom_bank_account_nickname: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    /// Relink body; linked id and custom fields are mutually exclusive.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct OwnershipRelink {
        pub linked_bank_account_id: Option<Uuid>,
        pub custom_bank_account_number: Option<String>,
        pub custom_bank_account_nickname: Option<String>,
    }
}
