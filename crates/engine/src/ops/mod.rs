use std::sync::Mutex;

use sea_orm::DatabaseConnection;

use crate::ResultEngine;
use crate::categorize::CategoryCache;

mod audit;
mod credentials;
mod ingest;
mod ownership;
mod rules;
mod scrape;
mod settings;
mod transactions;

pub use audit::STALE_RUN_MINUTES;
pub use ingest::{OwnershipOutcome, UpsertOutcome, UpsertPolicy};
pub use scrape::{CancelFlag, ScrapeReport, ScrapeRunCmd};
pub use transactions::TransactionListFilter;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    /// Description → category memo shared across runs; `std::sync::Mutex`
    /// because it is never held across an await point.
    category_cache: Mutex<CategoryCache>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    /// Drops every cached description → category memo.
    pub fn invalidate_category_cache(&self) {
        if let Ok(mut cache) = self.category_cache.lock() {
            cache.invalidate();
        }
    }

    pub(crate) fn cached_category(&self, name: &str) -> Option<String> {
        self.category_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(name).map(str::to_string))
    }

    pub(crate) fn remember_category(&self, name: &str, category: &str) {
        if let Ok(mut cache) = self.category_cache.lock() {
            cache.insert(name, category);
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            category_cache: Mutex::new(CategoryCache::default()),
        })
    }
}
