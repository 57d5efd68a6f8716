//! Ingestion engine for scraped Israeli bank and credit card data.
//!
//! The [`Engine`] owns the database and exposes the scrape orchestrator,
//! transaction dedup/upsert, category resolution, card ownership and the
//! audit ledger. The external scraper is a trait object supplied by the
//! caller; progress flows out through a [`ProgressReporter`] channel.

pub use credentials::{CredentialPayload, VendorCredential};
pub use error::EngineError;
pub use ops::{
    CancelFlag, Engine, EngineBuilder, OwnershipOutcome, STALE_RUN_MINUTES, ScrapeReport,
    ScrapeRunCmd, TransactionListFilter, UpsertOutcome, UpsertPolicy,
};
pub use ownership::CardOwnership;
pub use progress::{ProgressMessage, ProgressPhase, ProgressReporter, ProgressUpdate};
pub use rules::{CategorizationRule, CategoryMapping};
pub use scrape_events::{RunStats, ScrapeEvent, ScrapeStatus};
pub use scraper::{
    Installments, ScrapeOutcome, ScrapeRequest, ScrapedAccount, ScrapedTransaction, Scraper,
    ScraperEvent, ScraperEventFn, ScraperFailure, ScraperStep, ScraperUnavailable,
};
pub use settings::ScrapeSettings;
pub use transactions::{CategorySource, Transaction, normalize_name};
pub use vendors::{CredentialShape, Vendor, VendorKind};

pub mod categorize;
mod credentials;
mod error;
mod ops;
mod ownership;
pub mod progress;
mod rules;
mod scrape_events;
mod scraper;
pub mod settings;
mod transactions;
mod vendors;

type ResultEngine<T> = Result<T, EngineError>;
