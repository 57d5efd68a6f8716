use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::Database;
use uuid::Uuid;

use engine::progress::{ProgressMessage, ProgressReporter};
use engine::{
    CancelFlag, Engine, EngineError, ScrapeOutcome, ScrapeRequest, ScrapeRunCmd, ScrapeStatus,
    ScrapedAccount, ScrapedTransaction, Scraper, ScraperEvent, ScraperEventFn, ScraperFailure,
    ScraperStep, TransactionListFilter, Vendor, VendorCredential,
};
use migration::MigratorTrait;
use tokio::sync::mpsc::UnboundedReceiver;

async fn engine() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

async fn card_credential(engine: &Engine) -> VendorCredential {
    let mut credential = VendorCredential::new(Vendor::Max, "my max".to_string());
    credential.username = Some("alice".to_string());
    credential.set_password("pw");
    credential.card6_digits = Some("123456".to_string());
    engine.create_credential(&credential).await.unwrap();
    credential
}

async fn bank_credential(engine: &Engine) -> VendorCredential {
    let mut credential = VendorCredential::new(Vendor::Leumi, "main".to_string());
    credential.username = Some("alice".to_string());
    credential.set_password("pw");
    credential.bank_account_number = Some("12-345-67890".to_string());
    engine.create_credential(&credential).await.unwrap();
    credential
}

fn scraped_tx(identifier: &str, name: &str, amount: f64) -> ScrapedTransaction {
    ScrapedTransaction {
        identifier: identifier.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
        processed_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
        name: name.to_string(),
        charged_amount: amount,
        original_amount: None,
        original_currency: None,
        charged_currency: Some("ILS".to_string()),
        category: None,
        status: "completed".to_string(),
        kind: "normal".to_string(),
        installments: None,
    }
}

fn cmd(credential: &VendorCredential) -> ScrapeRunCmd {
    ScrapeRunCmd {
        credential_id: credential.id,
        start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        triggered_by: "test".to_string(),
        show_browser: false,
        log_requests: false,
        retry_count: 0,
    }
}

/// Scraper double returning canned accounts and replaying login steps.
struct FakeScraper {
    accounts: Vec<ScrapedAccount>,
    failure: Option<ScraperFailure>,
    calls: AtomicUsize,
}

impl FakeScraper {
    fn with_accounts(accounts: Vec<ScrapedAccount>) -> Self {
        Self {
            accounts,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(failure: ScraperFailure) -> Self {
        Self {
            accounts: Vec::new(),
            failure: Some(failure),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Scraper for FakeScraper {
    async fn scrape(
        &self,
        _request: ScrapeRequest,
        on_event: ScraperEventFn<'_>,
    ) -> Result<ScrapeOutcome, ScraperFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        on_event(ScraperEvent::Step(ScraperStep::Initializing));
        on_event(ScraperEvent::Step(ScraperStep::LoginStarted));
        if let Some(failure) = &self.failure {
            on_event(ScraperEvent::Step(ScraperStep::LoginFailed));
            return Err(failure.clone());
        }
        on_event(ScraperEvent::Step(ScraperStep::LoginSuccess));
        on_event(ScraperEvent::Step(ScraperStep::FetchingTransactions));
        on_event(ScraperEvent::Step(ScraperStep::EndScraping));
        Ok(ScrapeOutcome {
            accounts: self.accounts.clone(),
        })
    }
}

fn drain(rx: &mut UnboundedReceiver<ProgressMessage>) -> Vec<ProgressMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

#[tokio::test]
async fn successful_run_persists_rows_and_closes_audit() {
    let engine = engine().await;
    let credential = card_credential(&engine).await;
    let scraper = FakeScraper::with_accounts(vec![ScrapedAccount {
        account_number: "5678".to_string(),
        transactions: vec![
            scraped_tx("t-1", "SUPER-PHARM", -45.90),
            scraped_tx("t-2", "RAMI LEVY", -120.00),
        ],
    }]);
    let (reporter, mut rx) = ProgressReporter::channel();

    let report = engine
        .run_scrape(&scraper, cmd(&credential), &reporter, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(report.status, ScrapeStatus::Success);
    assert_eq!(report.stats.saved_transactions, 2);
    assert_eq!(report.stats.accounts_processed, 1);

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);

    let events = engine.list_scrape_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, ScrapeStatus::Success);
    assert!(events[0].duration_seconds.is_some());

    // Success touches the credential's sync marker.
    let refreshed = engine.get_credential(credential.id).await.unwrap();
    assert!(refreshed.last_synced_at.is_some());

    let messages = drain(&mut rx);
    let last = messages.last().unwrap();
    assert_eq!(last.kind(), "complete");
    let terminal_count = messages.iter().filter(|m| m.is_terminal()).count();
    assert_eq!(terminal_count, 1);
}

#[tokio::test]
async fn rerun_of_same_data_counts_duplicates() {
    let engine = engine().await;
    let credential = card_credential(&engine).await;
    let accounts = vec![ScrapedAccount {
        account_number: "5678".to_string(),
        transactions: vec![scraped_tx("t-1", "SUPER-PHARM", -45.90)],
    }];

    let scraper = FakeScraper::with_accounts(accounts.clone());
    engine
        .run_scrape(
            &scraper,
            cmd(&credential),
            &ProgressReporter::detached(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    let report = engine
        .run_scrape(
            &scraper,
            cmd(&credential),
            &ProgressReporter::detached(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.stats.saved_transactions, 0);
    assert_eq!(report.stats.duplicate_transactions, 1);

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn login_failure_reports_credential_hint() {
    let engine = engine().await;
    let credential = card_credential(&engine).await;
    let scraper = FakeScraper::failing(ScraperFailure::new("invalidPassword", "wrong password"));
    let (reporter, mut rx) = ProgressReporter::channel();

    let report = engine
        .run_scrape(&scraper, cmd(&credential), &reporter, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(report.status, ScrapeStatus::Failed);

    let events = engine.list_scrape_events(10).await.unwrap();
    assert_eq!(events[0].status, ScrapeStatus::Failed);
    assert!(
        events[0]
            .message
            .as_deref()
            .unwrap()
            .contains("invalidPassword")
    );

    let messages = drain(&mut rx);
    let error = messages
        .iter()
        .find_map(|m| match m {
            ProgressMessage::Error { message, hint } => Some((message.clone(), hint.clone())),
            _ => None,
        })
        .unwrap();
    assert!(error.0.contains("wrong password"));
    assert!(error.1.unwrap().contains("credentials"));
}

#[tokio::test]
async fn concurrent_run_is_rejected() {
    let engine = engine().await;
    let credential = card_credential(&engine).await;

    // Simulate an in-flight run.
    engine
        .insert_scrape_audit(&engine::ScrapeEvent {
            id: Uuid::new_v4(),
            triggered_by: "other".to_string(),
            vendor: Vendor::Leumi,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            status: ScrapeStatus::Started,
            message: None,
            report_json: None,
            duration_seconds: None,
            retry_count: 0,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let scraper = FakeScraper::with_accounts(Vec::new());
    let err = engine
        .run_scrape(
            &scraper,
            cmd(&credential),
            &ProgressReporter::detached(),
            &CancelFlag::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Concurrency(_)));
    assert_eq!(scraper.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_keeps_partial_data() {
    let engine = engine().await;
    let credential = card_credential(&engine).await;
    let scraper = FakeScraper::with_accounts(vec![ScrapedAccount {
        account_number: "5678".to_string(),
        transactions: vec![scraped_tx("t-1", "SUPER-PHARM", -45.90)],
    }]);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = engine
        .run_scrape(
            &scraper,
            cmd(&credential),
            &ProgressReporter::detached(),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.status, ScrapeStatus::Cancelled);

    let events = engine.list_scrape_events(10).await.unwrap();
    assert_eq!(events[0].status, ScrapeStatus::Cancelled);
}

#[tokio::test]
async fn conflicting_account_is_skipped() {
    let engine = engine().await;
    let credential = card_credential(&engine).await;
    let mut other = VendorCredential::new(Vendor::Max, "other max".to_string());
    other.username = Some("bob".to_string());
    other.set_password("pw");
    other.card6_digits = Some("654321".to_string());
    engine.create_credential(&other).await.unwrap();
    engine
        .claim_ownership(Vendor::Max, "5678", other.id)
        .await
        .unwrap();

    let scraper = FakeScraper::with_accounts(vec![ScrapedAccount {
        account_number: "5678".to_string(),
        transactions: vec![scraped_tx("t-1", "SUPER-PHARM", -45.90)],
    }]);
    let report = engine
        .run_scrape(
            &scraper,
            cmd(&credential),
            &ProgressReporter::detached(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status, ScrapeStatus::Success);
    assert_eq!(report.stats.skipped_cards, 1);
    assert_eq!(report.stats.saved_transactions, 0);

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn bank_rows_get_bank_fallback_category() {
    let engine = engine().await;
    let credential = bank_credential(&engine).await;
    let scraper = FakeScraper::with_accounts(vec![ScrapedAccount {
        account_number: "12-345-67890".to_string(),
        transactions: vec![scraped_tx("t-1", "VISA CHARGE", -500.00)],
    }]);

    let report = engine
        .run_scrape(
            &scraper,
            cmd(&credential),
            &ProgressReporter::detached(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.stats.bank_transactions, 1);

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored[0].category.as_deref(), Some("Bank"));
    assert_eq!(stored[0].category_source, None);
}

#[tokio::test]
async fn bank_account_ownership_is_claimed() {
    let engine = engine().await;
    let credential = bank_credential(&engine).await;
    let scraper = FakeScraper::with_accounts(vec![ScrapedAccount {
        account_number: "12-345-67890".to_string(),
        transactions: vec![scraped_tx("t-1", "VISA CHARGE", -500.00)],
    }]);

    engine
        .run_scrape(
            &scraper,
            cmd(&credential),
            &ProgressReporter::detached(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    let ownerships = engine.list_ownerships().await.unwrap();
    assert_eq!(ownerships.len(), 1);
    assert_eq!(ownerships[0].vendor, Vendor::Leumi);
    assert_eq!(ownerships[0].account_number, "12-345-67890");
    assert_eq!(ownerships[0].credential_id, credential.id);
}

#[tokio::test]
async fn rules_beat_scraper_categories_during_a_run() {
    let engine = engine().await;
    let credential = card_credential(&engine).await;
    engine.create_rule("pharm", "Health").await.unwrap();

    let mut tx = scraped_tx("t-1", "SUPER-PHARM", -45.90);
    tx.category = Some("Retail".to_string());
    let scraper = FakeScraper::with_accounts(vec![ScrapedAccount {
        account_number: "5678".to_string(),
        transactions: vec![tx],
    }]);

    engine
        .run_scrape(
            &scraper,
            cmd(&credential),
            &ProgressReporter::detached(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    let stored = engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(stored[0].category.as_deref(), Some("Health"));
}

#[tokio::test]
async fn progress_percent_is_monotonic() {
    let engine = engine().await;
    let credential = card_credential(&engine).await;
    let scraper = FakeScraper::with_accounts(vec![ScrapedAccount {
        account_number: "5678".to_string(),
        transactions: vec![scraped_tx("t-1", "SUPER-PHARM", -45.90)],
    }]);
    let (reporter, mut rx) = ProgressReporter::channel();

    engine
        .run_scrape(&scraper, cmd(&credential), &reporter, &CancelFlag::new())
        .await
        .unwrap();

    let messages = drain(&mut rx);
    let mut last_percent = 0;
    for message in &messages {
        if let ProgressMessage::Progress(update) = message {
            assert!(update.percent >= last_percent);
            last_percent = update.percent;
        }
    }
    assert_eq!(last_percent, 100);
}
