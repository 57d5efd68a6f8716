//! The module contains the errors the ingestion engine can raise.
//!
//! The taxonomy follows the run lifecycle:
//!
//! - [`Concurrency`] another scrape run is already in flight.
//! - [`Validation`] bad input before any external call (unknown vendor,
//!   missing credential field).
//! - [`Finalization`] the terminal audit write failed after the data
//!   writes were already committed.
//!
//! Scraper failures are not errors here: they are a run outcome, closed
//! into the audit row by the orchestrator.
//!
//! [`Concurrency`]: EngineError::Concurrency
//! [`Validation`]: EngineError::Validation
//! [`Finalization`]: EngineError::Finalization
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("another scrape is already running: {0}")]
    Concurrency(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("finalization failed: {0}")]
    Finalization(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Concurrency(a), Self::Concurrency(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Finalization(a), Self::Finalization(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
