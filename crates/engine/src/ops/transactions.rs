//! Read and manual-edit operations over stored transactions.

use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, QuerySelect, prelude::*};
use tracing::info;

use crate::{CategorySource, EngineError, ResultEngine, Transaction, Vendor, transactions};

use super::Engine;

/// Optional filters for transaction listing.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub vendor: Option<Vendor>,
    pub category: Option<String>,
    pub account_number: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub uncategorized_only: bool,
    pub limit: Option<u64>,
}

impl Engine {
    /// Newest-first listing with optional filters.
    pub async fn list_transactions(
        &self,
        filter: TransactionListFilter,
    ) -> ResultEngine<Vec<Transaction>> {
        let mut query = transactions::Entity::find()
            .order_by_desc(transactions::Column::Date)
            .order_by_desc(transactions::Column::ProcessedDate);

        if let Some(vendor) = filter.vendor {
            query = query.filter(transactions::Column::Vendor.eq(vendor.as_str()));
        }
        if let Some(category) = &filter.category {
            query = query.filter(transactions::Column::Category.eq(category.clone()));
        }
        if let Some(account_number) = &filter.account_number {
            query = query.filter(transactions::Column::AccountNumber.eq(account_number.clone()));
        }
        if let Some(from) = filter.from_date {
            query = query.filter(transactions::Column::Date.gte(from));
        }
        if let Some(to) = filter.to_date {
            query = query.filter(transactions::Column::Date.lte(to));
        }
        if filter.uncategorized_only {
            query = query.filter(transactions::Column::Category.is_null());
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let rows = query.all(&self.database).await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    /// Manual category edit.
    ///
    /// Stamps the cache source so re-scrapes keep the user's choice, and
    /// feeds the memo so later rows with the same description inherit it.
    pub async fn set_transaction_category(
        &self,
        identifier: &str,
        vendor: Vendor,
        category: &str,
    ) -> ResultEngine<()> {
        let category = category.trim();
        if category.is_empty() {
            return Err(EngineError::Validation(
                "category must not be empty".to_string(),
            ));
        }

        let key = (identifier.to_string(), vendor.as_str().to_string());
        let existing = transactions::Entity::find_by_id(key)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;

        let name = existing.name.clone();
        let active = transactions::ActiveModel {
            identifier: ActiveValue::Unchanged(existing.identifier),
            vendor: ActiveValue::Unchanged(existing.vendor),
            category: ActiveValue::Set(Some(category.to_string())),
            category_source: ActiveValue::Set(Some(CategorySource::Cache.as_str().to_string())),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };
        active.update(&self.database).await?;

        self.remember_category(&name, category);
        Ok(())
    }

    pub async fn delete_transaction(&self, identifier: &str, vendor: Vendor) -> ResultEngine<()> {
        let key = (identifier.to_string(), vendor.as_str().to_string());
        let result = transactions::Entity::delete_by_id(key)
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(
                "transaction not exists".to_string(),
            ));
        }
        Ok(())
    }

    /// Delete every stored transaction, optionally scoped to one vendor.
    /// Returns the number of rows removed.
    pub async fn wipe_transactions(&self, vendor: Option<Vendor>) -> ResultEngine<u64> {
        let mut query = transactions::Entity::delete_many();
        if let Some(vendor) = vendor {
            query = query.filter(transactions::Column::Vendor.eq(vendor.as_str()));
        }
        let result = query.exec(&self.database).await?;
        self.invalidate_category_cache();
        info!(
            removed = result.rows_affected,
            vendor = vendor.map(|v| v.as_str()).unwrap_or("all"),
            "wiped transactions"
        );
        Ok(result.rows_affected)
    }
}
