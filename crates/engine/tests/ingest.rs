use chrono::{Duration, NaiveDate, Utc};
use sea_orm::Database;
use uuid::Uuid;

use engine::{
    CategoryMapping, CategorySource, Engine, EngineError, OwnershipOutcome, ScrapeEvent,
    ScrapeStatus, Transaction, TransactionListFilter, UpsertOutcome, UpsertPolicy, Vendor,
    VendorCredential,
};
use migration::MigratorTrait;

async fn engine() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

/// Ownership rows reference a stored credential, so tests claiming
/// accounts need a real one.
async fn stored_credential(engine: &Engine, nickname: &str) -> Uuid {
    let mut credential = VendorCredential::new(Vendor::Max, nickname.to_string());
    credential.username = Some("alice".to_string());
    credential.set_password("pw");
    credential.card6_digits = Some("123456".to_string());
    engine.create_credential(&credential).await.unwrap();
    credential.id
}

fn sample_tx(identifier: &str, vendor: Vendor) -> Transaction {
    let now = Utc::now();
    Transaction {
        identifier: identifier.to_string(),
        vendor,
        date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
        processed_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
        name: "SUPER-PHARM TLV".to_string(),
        price_minor: -4590,
        category: Some("Pharmacy".to_string()),
        category_source: Some(CategorySource::Scraper),
        account_number: "1234".to_string(),
        installments_number: None,
        installments_total: None,
        original_amount_minor: None,
        original_currency: None,
        charged_currency: Some("ILS".to_string()),
        status: "completed".to_string(),
        kind: "normal".to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn upsert_is_idempotent_on_identifier_and_vendor() {
    let engine = engine().await;
    let tx = sample_tx("t-1", Vendor::Max);

    let first = engine
        .upsert_transaction(&tx, UpsertPolicy::default())
        .await
        .unwrap();
    assert_eq!(first, UpsertOutcome::Inserted);

    let second = engine
        .upsert_transaction(&tx, UpsertPolicy::default())
        .await
        .unwrap();
    assert_eq!(second, UpsertOutcome::Duplicate);

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn same_identifier_different_vendor_is_a_new_row() {
    let engine = engine().await;
    engine
        .upsert_transaction(&sample_tx("t-1", Vendor::Max), UpsertPolicy::default())
        .await
        .unwrap();
    let outcome = engine
        .upsert_transaction(&sample_tx("t-1", Vendor::Isracard), UpsertPolicy::default())
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);
}

#[tokio::test]
async fn changed_amount_updates_in_place() {
    let engine = engine().await;
    let mut tx = sample_tx("t-1", Vendor::Max);
    engine
        .upsert_transaction(&tx, UpsertPolicy::default())
        .await
        .unwrap();

    tx.price_minor = -5090;
    tx.status = "completed".to_string();
    let outcome = engine
        .upsert_transaction(&tx, UpsertPolicy::default())
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored[0].price_minor, -5090);
}

#[tokio::test]
async fn advancing_installment_updates_in_place() {
    let engine = engine().await;
    let mut tx = sample_tx("t-1", Vendor::Max);
    tx.installments_number = Some(1);
    tx.installments_total = Some(12);
    engine
        .upsert_transaction(&tx, UpsertPolicy::default())
        .await
        .unwrap();

    tx.installments_number = Some(2);
    let outcome = engine
        .upsert_transaction(&tx, UpsertPolicy::default())
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored[0].installments_number, Some(2));
    assert_eq!(stored[0].installments_total, Some(12));
}

#[tokio::test]
async fn manual_category_survives_rescrape_by_default() {
    let engine = engine().await;
    let mut tx = sample_tx("t-1", Vendor::Max);
    engine
        .upsert_transaction(&tx, UpsertPolicy::default())
        .await
        .unwrap();

    engine
        .set_transaction_category("t-1", Vendor::Max, "Health")
        .await
        .unwrap();

    tx.category = Some("Retail".to_string());
    engine
        .upsert_transaction(&tx, UpsertPolicy::default())
        .await
        .unwrap();

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored[0].category.as_deref(), Some("Health"));
    assert_eq!(stored[0].category_source, Some(CategorySource::Cache));
}

#[tokio::test]
async fn rescrape_policy_can_override_manual_category() {
    let engine = engine().await;
    let mut tx = sample_tx("t-1", Vendor::Max);
    engine
        .upsert_transaction(&tx, UpsertPolicy::default())
        .await
        .unwrap();
    engine
        .set_transaction_category("t-1", Vendor::Max, "Health")
        .await
        .unwrap();

    tx.category = Some("Retail".to_string());
    let outcome = engine
        .upsert_transaction(
            &tx,
            UpsertPolicy {
                update_category_on_rescrape: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored[0].category.as_deref(), Some("Retail"));
}

#[tokio::test]
async fn stored_category_lookup_uses_normalized_name() {
    let engine = engine().await;
    engine
        .upsert_transaction(&sample_tx("t-1", Vendor::Max), UpsertPolicy::default())
        .await
        .unwrap();

    let found = engine
        .lookup_stored_category("  super-pharm tlv  ")
        .await
        .unwrap();
    assert_eq!(found.as_deref(), Some("Pharmacy"));

    let missing = engine.lookup_stored_category("unknown").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn ownership_claim_then_confirm_then_conflict() {
    let engine = engine().await;
    let owner = stored_credential(&engine, "owner card").await;
    let intruder = stored_credential(&engine, "second card").await;

    let first = engine
        .claim_ownership(Vendor::Max, "5678", owner)
        .await
        .unwrap();
    assert_eq!(first, OwnershipOutcome::Claimed);

    let second = engine
        .claim_ownership(Vendor::Max, "5678", owner)
        .await
        .unwrap();
    assert_eq!(second, OwnershipOutcome::Confirmed);

    let third = engine
        .claim_ownership(Vendor::Max, "5678", intruder)
        .await
        .unwrap();
    assert_eq!(
        third,
        OwnershipOutcome::Conflict {
            owner_credential_id: owner.to_string()
        }
    );

    // The other vendor's namespace is untouched.
    let other_vendor = engine
        .claim_ownership(Vendor::Isracard, "5678", intruder)
        .await
        .unwrap();
    assert_eq!(other_vendor, OwnershipOutcome::Claimed);
}

fn audit_event(status: ScrapeStatus, age_minutes: i64) -> ScrapeEvent {
    ScrapeEvent {
        id: Uuid::new_v4(),
        triggered_by: "test".to_string(),
        vendor: Vendor::Leumi,
        start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        status,
        message: None,
        report_json: None,
        duration_seconds: None,
        retry_count: 0,
        created_at: Utc::now() - Duration::minutes(age_minutes),
    }
}

#[tokio::test]
async fn active_run_blocks_new_runs() {
    let engine = engine().await;
    engine
        .insert_scrape_audit(&audit_event(ScrapeStatus::Started, 5))
        .await
        .unwrap();

    let err = engine.ensure_no_active_run().await.unwrap_err();
    assert!(matches!(err, EngineError::Concurrency(_)));
}

#[tokio::test]
async fn stale_started_run_does_not_block() {
    let engine = engine().await;
    engine
        .insert_scrape_audit(&audit_event(ScrapeStatus::Started, 30))
        .await
        .unwrap();

    assert!(engine.ensure_no_active_run().await.is_ok());
}

#[tokio::test]
async fn stale_started_run_is_listed_as_timed_out() {
    let engine = engine().await;
    engine
        .insert_scrape_audit(&audit_event(ScrapeStatus::Started, 30))
        .await
        .unwrap();

    let events = engine.list_scrape_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, ScrapeStatus::Failed);
    assert_eq!(events[0].message.as_deref(), Some("timed out"));
}

#[tokio::test]
async fn prune_keeps_started_rows() {
    let engine = engine().await;
    engine
        .insert_scrape_audit(&audit_event(ScrapeStatus::Success, 60 * 24 * 40))
        .await
        .unwrap();
    engine
        .insert_scrape_audit(&audit_event(ScrapeStatus::Started, 60 * 24 * 40))
        .await
        .unwrap();

    let removed = engine.prune_scrape_events(30).await.unwrap();
    assert_eq!(removed, 1);

    let events = engine.list_scrape_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn rename_category_touches_transactions_rules_and_mappings() {
    let engine = engine().await;
    engine
        .upsert_transaction(&sample_tx("t-1", Vendor::Max), UpsertPolicy::default())
        .await
        .unwrap();
    engine.create_rule("pharm", "Pharmacy").await.unwrap();
    engine
        .set_category_mapping(&CategoryMapping {
            source_category: "Drugstores".to_string(),
            target_category: "Pharmacy".to_string(),
        })
        .await
        .unwrap();

    let renamed = engine.rename_category("Pharmacy", "Health").await.unwrap();
    assert_eq!(renamed, 1);

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored[0].category.as_deref(), Some("Health"));

    let rules = engine.list_rules().await.unwrap();
    assert_eq!(rules[0].target_category, "Health");

    let mappings = engine.list_category_mappings().await.unwrap();
    assert_eq!(mappings[0].target_category, "Health");
}

#[tokio::test]
async fn settings_validation_rejects_bad_billing_day() {
    let engine = engine().await;
    let err = engine
        .set_setting("billing_cycle_start_day", serde_json::json!(31))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    engine
        .set_setting("billing_cycle_start_day", serde_json::json!(15))
        .await
        .unwrap();
    let settings = engine.scrape_settings().await.unwrap();
    assert_eq!(settings.billing_cycle_start_day, 15);
}

#[tokio::test]
async fn unset_settings_fall_back_to_defaults() {
    let engine = engine().await;
    let settings = engine.scrape_settings().await.unwrap();
    assert!(!settings.update_category_on_rescrape);
    assert_eq!(settings.scraper_timeout_ms, 60_000);
    assert_eq!(settings.billing_cycle_start_day, 11);
}

#[tokio::test]
async fn transaction_filter_by_vendor_and_category() {
    let engine = engine().await;
    engine
        .upsert_transaction(&sample_tx("t-1", Vendor::Max), UpsertPolicy::default())
        .await
        .unwrap();
    engine
        .upsert_transaction(&sample_tx("t-2", Vendor::Leumi), UpsertPolicy::default())
        .await
        .unwrap();

    let only_max = engine
        .list_transactions(TransactionListFilter {
            vendor: Some(Vendor::Max),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(only_max.len(), 1);
    assert_eq!(only_max[0].vendor, Vendor::Max);

    let none = engine
        .list_transactions(TransactionListFilter {
            category: Some("Missing".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(none.is_empty());
}
