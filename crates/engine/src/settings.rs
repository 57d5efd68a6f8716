//! Key/value application settings (JSON values), with typed accessors for
//! the knobs the scrape pipeline reads.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const UPDATE_CATEGORY_ON_RESCRAPE: &str = "update_category_on_rescrape";
pub const SCRAPER_TIMEOUT_MS: &str = "scraper_timeout_ms";
pub const ISRACARD_SCRAPE_CATEGORIES: &str = "isracard_scrape_categories";
pub const BILLING_CYCLE_START_DAY: &str = "billing_cycle_start_day";
pub const SYNC_ENABLED: &str = "sync_enabled";

/// Typed view over the settings the pipeline consumes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeSettings {
    pub update_category_on_rescrape: bool,
    pub scraper_timeout_ms: u64,
    pub isracard_scrape_categories: bool,
    /// 1–28; consumed by downstream reporting, validated on write here.
    pub billing_cycle_start_day: u8,
    pub sync_enabled: bool,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            update_category_on_rescrape: false,
            scraper_timeout_ms: 60_000,
            isracard_scrape_categories: false,
            billing_cycle_start_day: 11,
            sync_enabled: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "app_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    /// JSON-encoded value.
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
