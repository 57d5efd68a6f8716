//! Row-level ingestion: idempotent transaction upsert, card ownership
//! claims, and the persistent description → category memo.

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, prelude::*};
use tracing::{debug, warn};

use crate::{
    CardOwnership, CategorySource, ResultEngine, Transaction, Vendor, ownership, transactions,
};

use super::Engine;

/// What an upsert did with the incoming row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Duplicate,
}

/// Knobs controlling re-scrape behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpsertPolicy {
    /// When false, rows whose category was manually edited keep it.
    pub update_category_on_rescrape: bool,
}

/// Result of a card ownership claim for one scraped account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnershipOutcome {
    /// First sighting; the account now belongs to the credential.
    Claimed,
    /// Already owned by this credential.
    Confirmed,
    /// Owned by a different credential; the account must be skipped.
    Conflict { owner_credential_id: String },
}

impl Engine {
    /// Insert or update one scraped transaction, keyed on
    /// `(identifier, vendor)`.
    ///
    /// Re-scraping an unchanged row is a no-op (`Duplicate`). A changed
    /// amount, status, or installment position updates in place. A manually
    /// edited category is preserved unless the policy allows
    /// re-categorization.
    pub async fn upsert_transaction(
        &self,
        tx: &Transaction,
        policy: UpsertPolicy,
    ) -> ResultEngine<UpsertOutcome> {
        let key = (tx.identifier.clone(), tx.vendor.as_str().to_string());
        let existing = transactions::Entity::find_by_id(key.clone())
            .one(&self.database)
            .await?;

        let Some(existing) = existing else {
            match transactions::ActiveModel::from(tx).insert(&self.database).await {
                Ok(_) => return Ok(UpsertOutcome::Inserted),
                Err(insert_err) => {
                    // A concurrent writer may have won the insert; treat the
                    // row as existing only if it is actually there now.
                    if transactions::Entity::find_by_id(key)
                        .one(&self.database)
                        .await?
                        .is_some()
                    {
                        warn!(
                            identifier = %tx.identifier,
                            vendor = %tx.vendor.as_str(),
                            "insert raced an existing row, treating as duplicate"
                        );
                        return Ok(UpsertOutcome::Duplicate);
                    }
                    return Err(insert_err.into());
                }
            }
        };

        let manual_edit = existing.category_source.as_deref() == Some(CategorySource::Cache.as_str());
        let keep_category = manual_edit && !policy.update_category_on_rescrape;

        let mut active = transactions::ActiveModel {
            identifier: ActiveValue::Unchanged(existing.identifier.clone()),
            vendor: ActiveValue::Unchanged(existing.vendor.clone()),
            ..Default::default()
        };
        let mut changed = false;

        if existing.price_minor != tx.price_minor {
            active.price_minor = ActiveValue::Set(tx.price_minor);
            changed = true;
        }
        if existing.status != tx.status {
            active.status = ActiveValue::Set(tx.status.clone());
            changed = true;
        }
        if existing.processed_date != tx.processed_date {
            active.processed_date = ActiveValue::Set(tx.processed_date);
            changed = true;
        }
        // Installments advance on re-scrape (1/12 becomes 2/12).
        if existing.installments_number != tx.installments_number {
            active.installments_number = ActiveValue::Set(tx.installments_number);
            changed = true;
        }
        if existing.installments_total != tx.installments_total {
            active.installments_total = ActiveValue::Set(tx.installments_total);
            changed = true;
        }

        if !keep_category {
            let new_category = tx.category.clone();
            let new_source = tx.category_source.map(|s| s.as_str().to_string());
            if new_category.is_some()
                && (existing.category != new_category || existing.category_source != new_source)
            {
                active.category = ActiveValue::Set(new_category);
                active.category_source = ActiveValue::Set(new_source);
                changed = true;
            }
        }

        if !changed {
            return Ok(UpsertOutcome::Duplicate);
        }

        active.updated_at = ActiveValue::Set(tx.updated_at);
        active.update(&self.database).await?;
        debug!(
            identifier = %tx.identifier,
            vendor = %tx.vendor.as_str(),
            "updated existing transaction in place"
        );
        Ok(UpsertOutcome::Updated)
    }

    /// Claim or confirm ownership of `(vendor, account_number)` for a
    /// credential. A conflicting claim is reported, never overwritten.
    pub async fn claim_ownership(
        &self,
        vendor: Vendor,
        account_number: &str,
        credential_id: Uuid,
    ) -> ResultEngine<OwnershipOutcome> {
        let existing = ownership::Entity::find()
            .filter(ownership::Column::Vendor.eq(vendor.as_str()))
            .filter(ownership::Column::AccountNumber.eq(account_number))
            .one(&self.database)
            .await?;

        match existing {
            Some(row) if row.credential_id == credential_id.to_string() => {
                Ok(OwnershipOutcome::Confirmed)
            }
            Some(row) => {
                warn!(
                    vendor = %vendor.as_str(),
                    account_number,
                    owner = %row.credential_id,
                    "account already owned by another credential"
                );
                Ok(OwnershipOutcome::Conflict {
                    owner_credential_id: row.credential_id,
                })
            }
            None => {
                let claim =
                    CardOwnership::new(vendor, account_number.to_string(), credential_id);
                ownership::ActiveModel::from(&claim)
                    .insert(&self.database)
                    .await?;
                debug!(
                    vendor = %vendor.as_str(),
                    account_number,
                    credential = %credential_id,
                    "claimed account ownership"
                );
                Ok(OwnershipOutcome::Claimed)
            }
        }
    }

    /// Most recent stored category for a merchant description, by its
    /// normalized name. Seeds the in-memory memo at run start.
    pub async fn lookup_stored_category(&self, name: &str) -> ResultEngine<Option<String>> {
        let row = transactions::Entity::find()
            .filter(transactions::Column::NameNorm.eq(crate::normalize_name(name)))
            .filter(transactions::Column::Category.is_not_null())
            .order_by_desc(transactions::Column::Date)
            .one(&self.database)
            .await?;
        Ok(row.and_then(|r| r.category))
    }
}
