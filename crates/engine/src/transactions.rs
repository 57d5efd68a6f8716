//! Transaction primitives.
//!
//! A `Transaction` is one scraped bank/card movement. The pair
//! `(identifier, vendor)` is the primary key: re-scraping the same row
//! must update in place, never duplicate.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, Vendor};

/// Provenance of a stored category.
///
/// `Cache` doubles as the manual-edit marker: the update API stamps it on
/// user edits, and the re-scrape policy refuses to clobber such rows
/// unless `update_category_on_rescrape` is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    Cache,
    Rule,
    Mapping,
    Scraper,
}

impl CategorySource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Rule => "rule",
            Self::Mapping => "mapping",
            Self::Scraper => "scraper",
        }
    }
}

impl TryFrom<&str> for CategorySource {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cache" => Ok(Self::Cache),
            "rule" => Ok(Self::Rule),
            "mapping" => Ok(Self::Mapping),
            "scraper" => Ok(Self::Scraper),
            other => Err(EngineError::Validation(format!(
                "invalid category source: {other}"
            ))),
        }
    }
}

/// Normalized lookup key for a merchant description.
///
/// Used for the category memo (same normalized name reuses the prior
/// category) and stored denormalized in `name_norm`.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub identifier: String,
    pub vendor: Vendor,
    pub date: Date,
    pub processed_date: Date,
    pub name: String,
    /// Signed amount in minor units (agorot); negative = expense.
    pub price_minor: i64,
    pub category: Option<String>,
    pub category_source: Option<CategorySource>,
    pub account_number: String,
    pub installments_number: Option<i32>,
    pub installments_total: Option<i32>,
    pub original_amount_minor: Option<i64>,
    pub original_currency: Option<String>,
    pub charged_currency: Option<String>,
    pub status: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_bank(&self) -> bool {
        self.vendor.is_bank()
    }

    pub fn name_norm(&self) -> String {
        normalize_name(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub identifier: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub vendor: String,
    pub date: Date,
    pub processed_date: Date,
    pub name: String,
    pub name_norm: String,
    pub price_minor: i64,
    pub category: Option<String>,
    pub category_source: Option<String>,
    pub account_number: String,
    pub installments_number: Option<i32>,
    pub installments_total: Option<i32>,
    pub original_amount_minor: Option<i64>,
    pub original_currency: Option<String>,
    pub charged_currency: Option<String>,
    pub status: String,
    pub kind: String,
    pub channel: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            identifier: ActiveValue::Set(tx.identifier.clone()),
            vendor: ActiveValue::Set(tx.vendor.as_str().to_string()),
            date: ActiveValue::Set(tx.date),
            processed_date: ActiveValue::Set(tx.processed_date),
            name: ActiveValue::Set(tx.name.clone()),
            name_norm: ActiveValue::Set(tx.name_norm()),
            price_minor: ActiveValue::Set(tx.price_minor),
            category: ActiveValue::Set(tx.category.clone()),
            category_source: ActiveValue::Set(
                tx.category_source.map(|s| s.as_str().to_string()),
            ),
            account_number: ActiveValue::Set(tx.account_number.clone()),
            installments_number: ActiveValue::Set(tx.installments_number),
            installments_total: ActiveValue::Set(tx.installments_total),
            original_amount_minor: ActiveValue::Set(tx.original_amount_minor),
            original_currency: ActiveValue::Set(tx.original_currency.clone()),
            charged_currency: ActiveValue::Set(tx.charged_currency.clone()),
            status: ActiveValue::Set(tx.status.clone()),
            kind: ActiveValue::Set(tx.kind.clone()),
            channel: ActiveValue::Set(tx.vendor.kind().as_str().to_string()),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let category_source = model
            .category_source
            .as_deref()
            .map(CategorySource::try_from)
            .transpose()?;
        Ok(Self {
            identifier: model.identifier,
            vendor: Vendor::try_from(model.vendor.as_str())?,
            date: model.date,
            processed_date: model.processed_date,
            name: model.name,
            price_minor: model.price_minor,
            category: model.category,
            category_source,
            account_number: model.account_number,
            installments_number: model.installments_number,
            installments_total: model.installments_total,
            original_amount_minor: model.original_amount_minor,
            original_currency: model.original_currency,
            charged_currency: model.charged_currency,
            status: model.status,
            kind: model.kind,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
