//! Contract for the external scraper collaborator.
//!
//! The real implementation drives a browser-automation session against the
//! vendor's site; this crate only knows the shapes it consumes and the
//! step events it forwards into the progress stream. Tests plug in fakes.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{CredentialPayload, Vendor};

/// Everything the scraper needs for one vendor session.
#[derive(Clone, Debug)]
pub struct ScrapeRequest {
    pub vendor: Vendor,
    /// Earliest transaction date to fetch.
    pub start_date: NaiveDate,
    pub credentials: CredentialPayload,
    pub timeout: Duration,
    pub show_browser: bool,
    pub fetch_categories: bool,
    pub log_requests: bool,
}

/// One scraped account with its transactions, as returned by the scraper.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedAccount {
    pub account_number: String,
    pub transactions: Vec<ScrapedTransaction>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedTransaction {
    pub identifier: String,
    pub date: NaiveDate,
    pub processed_date: NaiveDate,
    pub name: String,
    /// Decimal amount as reported upstream; negative = expense.
    pub charged_amount: f64,
    #[serde(default)]
    pub original_amount: Option<f64>,
    #[serde(default)]
    pub original_currency: Option<String>,
    #[serde(default)]
    pub charged_currency: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub installments: Option<Installments>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Installments {
    pub number: i32,
    pub total: i32,
}

impl ScrapedTransaction {
    /// Minor-unit (agorot) representation; the only one the store keeps,
    /// so re-scrape equality is an exact integer compare.
    pub fn price_minor(&self) -> i64 {
        to_minor(self.charged_amount)
    }

    pub fn original_amount_minor(&self) -> Option<i64> {
        self.original_amount.map(to_minor)
    }
}

fn to_minor(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Named step events forwarded by the scraper during a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScraperStep {
    Initializing,
    LoginStarted,
    LoginSuccess,
    LoginFailed,
    FetchingTransactions,
    AccountDetailsReceived,
    ProcessingAccount,
    EndScraping,
}

impl ScraperStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::LoginStarted => "loginStarted",
            Self::LoginSuccess => "loginSuccess",
            Self::LoginFailed => "loginFailed",
            Self::FetchingTransactions => "fetchingTransactions",
            Self::AccountDetailsReceived => "accountDetailsReceived",
            Self::ProcessingAccount => "processingAccount",
            Self::EndScraping => "endScraping",
        }
    }
}

/// Progress callback payload: either a named step or a raw `network`
/// diagnostic passed through to the client untranslated.
#[derive(Clone, Debug)]
pub enum ScraperEvent {
    Step(ScraperStep),
    Network(serde_json::Value),
}

/// Failure from the collaborator (a thrown error or `success: false`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScraperFailure {
    pub error_type: String,
    pub message: String,
}

impl ScraperFailure {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Login-shaped failures get a "re-check credentials" hint downstream.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self.error_type.as_str(),
            "invalidPassword" | "changePassword" | "loginFailed"
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScrapeOutcome {
    pub accounts: Vec<ScrapedAccount>,
}

pub type ScraperEventFn<'a> = &'a (dyn Fn(ScraperEvent) + Send + Sync);

/// The external scraper, invoked once per run.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(
        &self,
        request: ScrapeRequest,
        on_event: ScraperEventFn<'_>,
    ) -> Result<ScrapeOutcome, ScraperFailure>;
}

/// Placeholder wiring for deployments without a scraper bridge configured.
pub struct ScraperUnavailable;

#[async_trait]
impl Scraper for ScraperUnavailable {
    async fn scrape(
        &self,
        request: ScrapeRequest,
        _on_event: ScraperEventFn<'_>,
    ) -> Result<ScrapeOutcome, ScraperFailure> {
        Err(ScraperFailure::new(
            "generic",
            format!(
                "no scraper bridge configured for vendor {}",
                request.vendor.as_str()
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_convert_to_minor_units() {
        let tx = ScrapedTransaction {
            identifier: "1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            processed_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            name: "x".to_string(),
            charged_amount: -123.45,
            original_amount: Some(29.99),
            original_currency: Some("USD".to_string()),
            charged_currency: Some("ILS".to_string()),
            category: None,
            status: "completed".to_string(),
            kind: "normal".to_string(),
            installments: None,
        };
        assert_eq!(tx.price_minor(), -12345);
        assert_eq!(tx.original_amount_minor(), Some(2999));
    }
}
