//! The scrape run orchestrator.
//!
//! One run: guard, credential prep, audit insert, scraper session,
//! per-account ownership claims, per-row categorize + upsert, then a
//! single finalization that closes the audit row and emits the terminal
//! progress message. Row failures never abort the run; cancellation stops
//! work at the next checkpoint and keeps everything already persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveValue, prelude::*};
use tracing::{info, warn};

use crate::categorize::{CategoryCache, CategoryRequest, CategoryResolver, ResolverContext};
use crate::progress::{ProgressPhase, ProgressReporter};
use crate::scraper::{
    ScrapeOutcome, ScrapeRequest, ScrapedAccount, ScrapedTransaction, Scraper, ScraperEvent,
    ScraperFailure,
};
use crate::settings::ScrapeSettings;
use crate::{
    CategorizationRule, EngineError, ResultEngine, RunStats, ScrapeEvent, ScrapeStatus,
    Transaction, Vendor, VendorCredential, credentials,
};

use super::ingest::{OwnershipOutcome, UpsertOutcome, UpsertPolicy};
use super::Engine;

/// Cooperative cancellation handle shared between the server and a run.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// True when both handles control the same run.
    pub fn same_run(&self, other: &CancelFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Everything a caller provides to start a run.
#[derive(Clone, Debug)]
pub struct ScrapeRunCmd {
    pub credential_id: Uuid,
    pub start_date: NaiveDate,
    pub triggered_by: String,
    pub show_browser: bool,
    pub log_requests: bool,
    pub retry_count: i32,
}

/// Final shape of one run, mirrored into the audit row.
#[derive(Clone, Debug, PartialEq)]
pub struct ScrapeReport {
    pub event_id: Uuid,
    pub vendor: Vendor,
    pub status: ScrapeStatus,
    pub stats: RunStats,
    pub message: Option<String>,
    pub duration_seconds: f64,
}

enum RunEnd {
    Success(RunStats),
    Cancelled(RunStats),
    ScraperFailed {
        failure: ScraperFailure,
        stats: RunStats,
    },
}

impl Engine {
    /// Run one scrape end to end.
    ///
    /// All outcomes, including engine errors, finalize the audit row and
    /// emit exactly one terminal progress message before returning.
    pub async fn run_scrape(
        &self,
        scraper: &dyn Scraper,
        cmd: ScrapeRunCmd,
        reporter: &ProgressReporter,
        cancel: &CancelFlag,
    ) -> ResultEngine<ScrapeReport> {
        let started = Instant::now();

        reporter.progress(ProgressPhase::Initialization, 2, "checking for active runs");
        if let Err(err) = self.ensure_no_active_run().await {
            reporter.error(err.to_string(), None);
            return Err(err);
        }

        let (credential, payload) = match self.prepare_credential(cmd.credential_id).await {
            Ok(prepared) => prepared,
            Err(err) => {
                reporter.error(err.to_string(), None);
                return Err(err);
            }
        };
        let settings = match self.scrape_settings().await {
            Ok(settings) => settings,
            Err(err) => {
                reporter.error(err.to_string(), None);
                return Err(err);
            }
        };

        let event = ScrapeEvent {
            id: Uuid::new_v4(),
            triggered_by: cmd.triggered_by.clone(),
            vendor: credential.vendor,
            start_date: cmd.start_date,
            status: ScrapeStatus::Started,
            message: None,
            report_json: None,
            duration_seconds: None,
            retry_count: cmd.retry_count,
            created_at: Utc::now(),
        };
        if let Err(err) = self.insert_scrape_audit(&event).await {
            reporter.error(err.to_string(), None);
            return Err(err);
        }

        let outcome = self
            .execute_scrape(
                scraper,
                &cmd,
                &credential,
                payload,
                &settings,
                reporter,
                cancel,
            )
            .await;
        let duration_seconds = started.elapsed().as_secs_f64();

        // Single finalization site: the audit row is closed exactly once,
        // whatever happened above.
        let (status, message, stats, run_error, hint) = match outcome {
            Ok(RunEnd::Success(stats)) => {
                (ScrapeStatus::Success, Some(stats.summary()), stats, None, None)
            }
            Ok(RunEnd::Cancelled(stats)) => (
                ScrapeStatus::Cancelled,
                Some("cancelled by user".to_string()),
                stats,
                None,
                None,
            ),
            Ok(RunEnd::ScraperFailed { failure, stats }) => {
                let hint = failure.is_credential_failure().then(|| {
                    format!(
                        "check the stored credentials for {}",
                        credential.vendor.as_str()
                    )
                });
                (
                    ScrapeStatus::Failed,
                    Some(format!("{}: {}", failure.error_type, failure.message)),
                    stats,
                    None,
                    hint,
                )
            }
            Err(err) => (
                ScrapeStatus::Failed,
                Some(err.to_string()),
                RunStats::default(),
                Some(err),
                None,
            ),
        };

        let report_json = serde_json::to_string(&stats).ok();
        if let Err(err) = self
            .update_scrape_audit(
                event.id,
                status,
                message.clone(),
                report_json,
                duration_seconds,
            )
            .await
        {
            reporter.error(err.to_string(), None);
            return Err(err);
        }

        match status {
            ScrapeStatus::Success => {
                // The audit row is already terminal; losing the sync stamp
                // is not worth failing the run over.
                if let Err(err) = self.touch_last_synced(credential.id).await {
                    warn!(credential = %credential.id, error = %err, "failed to stamp last sync");
                }
                reporter.complete(run_summary_json(status, &stats, duration_seconds));
            }
            ScrapeStatus::Cancelled => {
                reporter.complete(run_summary_json(status, &stats, duration_seconds));
            }
            _ => {
                let text = message
                    .clone()
                    .unwrap_or_else(|| "scrape failed".to_string());
                reporter.error(text, hint);
            }
        }

        if let Some(err) = run_error {
            return Err(err);
        }

        Ok(ScrapeReport {
            event_id: event.id,
            vendor: credential.vendor,
            status,
            stats,
            message,
            duration_seconds,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_scrape(
        &self,
        scraper: &dyn Scraper,
        cmd: &ScrapeRunCmd,
        credential: &VendorCredential,
        payload: crate::CredentialPayload,
        settings: &ScrapeSettings,
        reporter: &ProgressReporter,
        cancel: &CancelFlag,
    ) -> ResultEngine<RunEnd> {
        let vendor = credential.vendor;
        let request = ScrapeRequest {
            vendor,
            start_date: cmd.start_date,
            credentials: payload,
            timeout: Duration::from_millis(settings.scraper_timeout_ms),
            show_browser: cmd.show_browser,
            fetch_categories: settings.isracard_scrape_categories && !vendor.is_bank(),
            log_requests: cmd.log_requests,
        };

        reporter.progress(ProgressPhase::Initialization, 8, "launching scraper");
        let event_reporter = reporter.clone();
        let on_event = move |event: ScraperEvent| match event {
            ScraperEvent::Step(step) => event_reporter.scraper_step(step),
            ScraperEvent::Network(diagnostic) => event_reporter.network(diagnostic),
        };

        let outcome: ScrapeOutcome = match scraper.scrape(request, &on_event).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                return Ok(RunEnd::ScraperFailed {
                    failure,
                    stats: RunStats::default(),
                });
            }
        };

        let mut stats = RunStats::default();
        if cancel.is_cancelled() {
            return Ok(RunEnd::Cancelled(stats));
        }

        let rules = self.list_rules().await?;
        let mappings: HashMap<String, String> = self
            .list_category_mappings()
            .await?
            .into_iter()
            .map(|m| (m.source_category, m.target_category))
            .collect();
        let resolver = CategoryResolver::with_default_chain();
        let mut run_cache = CategoryCache::default();
        let policy = UpsertPolicy {
            update_category_on_rescrape: settings.update_category_on_rescrape,
        };

        let total = outcome.accounts.len().max(1) as u32;
        for (index, account) in outcome.accounts.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(RunEnd::Cancelled(stats));
            }

            let claim = self
                .claim_ownership(vendor, &account.account_number, credential.id)
                .await?;
            if let OwnershipOutcome::Conflict {
                owner_credential_id,
            } = claim
            {
                warn!(
                    account_number = %account.account_number,
                    owner = %owner_credential_id,
                    "skipping account owned by another credential"
                );
                stats.skipped_cards += 1;
                continue;
            }

            let percent = 60 + (index as u32 * 20 / total) as u8;
            reporter.progress(
                ProgressPhase::Processing,
                percent,
                format!("processing account {}", account.account_number),
            );

            self.ingest_account(
                vendor,
                account,
                &resolver,
                &rules,
                &mappings,
                &mut run_cache,
                policy,
                &mut stats,
                cancel,
            )
            .await?;
            if cancel.is_cancelled() {
                return Ok(RunEnd::Cancelled(stats));
            }
            stats.accounts_processed += 1;

            let percent = 80 + ((index as u32 + 1) * 18 / total) as u8;
            reporter.progress(
                ProgressPhase::Saving,
                percent,
                format!("saved account {}", account.account_number),
            );
        }

        info!(
            vendor = %vendor.as_str(),
            saved = stats.saved_transactions,
            updated = stats.updated_transactions,
            duplicates = stats.duplicate_transactions,
            failed = stats.failed_transactions,
            "scrape run processed all accounts"
        );
        Ok(RunEnd::Success(stats))
    }

    /// Ingest one account's rows. A failing row is counted and logged,
    /// never fatal to the run.
    #[allow(clippy::too_many_arguments)]
    async fn ingest_account(
        &self,
        vendor: Vendor,
        account: &ScrapedAccount,
        resolver: &CategoryResolver,
        rules: &[CategorizationRule],
        mappings: &HashMap<String, String>,
        run_cache: &mut CategoryCache,
        policy: UpsertPolicy,
        stats: &mut RunStats,
        cancel: &CancelFlag,
    ) -> ResultEngine<()> {
        for scraped in &account.transactions {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let result = self
                .ingest_row(
                    vendor,
                    &account.account_number,
                    scraped,
                    resolver,
                    rules,
                    mappings,
                    run_cache,
                    policy,
                )
                .await;
            match result {
                Ok(outcome) => {
                    match outcome {
                        UpsertOutcome::Inserted => stats.saved_transactions += 1,
                        UpsertOutcome::Updated => stats.updated_transactions += 1,
                        UpsertOutcome::Duplicate => stats.duplicate_transactions += 1,
                    }
                    if vendor.is_bank() {
                        stats.bank_transactions += 1;
                    }
                }
                Err(err) => {
                    stats.failed_transactions += 1;
                    warn!(
                        identifier = %scraped.identifier,
                        vendor = %vendor.as_str(),
                        error = %err,
                        "failed to ingest transaction, continuing"
                    );
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn ingest_row(
        &self,
        vendor: Vendor,
        account_number: &str,
        scraped: &ScrapedTransaction,
        resolver: &CategoryResolver,
        rules: &[CategorizationRule],
        mappings: &HashMap<String, String>,
        run_cache: &mut CategoryCache,
        policy: UpsertPolicy,
    ) -> ResultEngine<UpsertOutcome> {
        // Warm the run cache from the shared memo, then from storage.
        if run_cache.get(&scraped.name).is_none() {
            if let Some(category) = self.cached_category(&scraped.name) {
                run_cache.insert(&scraped.name, category);
            } else if let Some(category) = self.lookup_stored_category(&scraped.name).await? {
                self.remember_category(&scraped.name, &category);
                run_cache.insert(&scraped.name, category);
            }
        }

        let price_minor = scraped.price_minor();
        let request = CategoryRequest {
            name: &scraped.name,
            scraper_category: scraped.category.as_deref(),
            is_bank: vendor.is_bank(),
            price_minor,
        };
        let ctx = ResolverContext {
            cache: run_cache,
            rules,
            mappings,
        };
        let resolved = resolver.resolve(&request, &ctx);

        let now = Utc::now();
        let tx = Transaction {
            identifier: scraped.identifier.clone(),
            vendor,
            date: scraped.date,
            processed_date: scraped.processed_date,
            name: scraped.name.clone(),
            price_minor,
            category: resolved.as_ref().map(|r| r.category.clone()),
            category_source: resolved.as_ref().and_then(|r| r.source),
            account_number: account_number.to_string(),
            installments_number: scraped.installments.map(|i| i.number),
            installments_total: scraped.installments.map(|i| i.total),
            original_amount_minor: scraped.original_amount_minor(),
            original_currency: scraped.original_currency.clone(),
            charged_currency: scraped.charged_currency.clone(),
            status: scraped.status.clone(),
            kind: scraped.kind.clone(),
            created_at: now,
            updated_at: now,
        };

        let outcome = self.upsert_transaction(&tx, policy).await?;
        if outcome == UpsertOutcome::Inserted {
            if let Some(resolved) = &tx.category {
                self.remember_category(&tx.name, resolved);
                run_cache.insert(&tx.name, resolved.clone());
            }
        }
        Ok(outcome)
    }

    async fn prepare_credential(
        &self,
        credential_id: Uuid,
    ) -> ResultEngine<(VendorCredential, crate::CredentialPayload)> {
        let model = credentials::Entity::find_by_id(credential_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("credential not exists".to_string()))?;
        let credential = VendorCredential::try_from(model)?;
        let payload = credential.payload()?;
        Ok((credential, payload))
    }

    async fn touch_last_synced(&self, credential_id: Uuid) -> ResultEngine<()> {
        let active = credentials::ActiveModel {
            id: ActiveValue::Unchanged(credential_id.to_string()),
            last_synced_at: ActiveValue::Set(Some(Utc::now())),
            ..Default::default()
        };
        active.update(&self.database).await?;
        Ok(())
    }
}

fn run_summary_json(status: ScrapeStatus, stats: &RunStats, duration_seconds: f64) -> serde_json::Value {
    let mut summary = serde_json::to_value(stats).unwrap_or(serde_json::Value::Null);
    if let serde_json::Value::Object(map) = &mut summary {
        map.insert(
            "status".to_string(),
            serde_json::Value::String(status.as_str().to_string()),
        );
        map.insert(
            "durationSeconds".to_string(),
            serde_json::json!(duration_seconds),
        );
    }
    summary
}
