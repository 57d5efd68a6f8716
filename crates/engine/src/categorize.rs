//! Ordered fallback category resolution.
//!
//! Precedence is cache → rule → mapping → scraper, then a fixed fallback
//! (bank rows default to "Bank", positive amounts to "Income"). Each
//! strategy has the same `(request, context) -> Option<String>` contract
//! so the order is explicit and each step testable in isolation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::rules::CategorizationRule;
use crate::transactions::{CategorySource, normalize_name};

pub const FALLBACK_BANK_CATEGORY: &str = "Bank";
pub const FALLBACK_INCOME_CATEGORY: &str = "Income";

/// Description → category memo over prior transactions.
///
/// An explicit object injected into the orchestrator (never a process
/// global) so tests can seed and expire entries deterministically.
#[derive(Debug)]
pub struct CategoryCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug)]
struct CacheEntry {
    category: String,
    inserted_at: Instant,
}

impl CategoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let entry = self.entries.get(&normalize_name(name))?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(&entry.category)
    }

    pub fn insert(&mut self, name: &str, category: impl Into<String>) {
        self.entries.insert(
            normalize_name(name),
            CacheEntry {
                category: category.into(),
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }
}

impl Default for CategoryCache {
    fn default() -> Self {
        // Long enough to span a slow run; invalidated on category writes.
        Self::new(Duration::from_secs(15 * 60))
    }
}

/// One transaction's inputs to resolution.
#[derive(Clone, Copy, Debug)]
pub struct CategoryRequest<'a> {
    pub name: &'a str,
    pub scraper_category: Option<&'a str>,
    pub is_bank: bool,
    pub price_minor: i64,
}

/// Per-run lookup data, loaded once by the orchestrator.
pub struct ResolverContext<'a> {
    pub cache: &'a CategoryCache,
    pub rules: &'a [CategorizationRule],
    pub mappings: &'a HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCategory {
    pub category: String,
    /// `None` for the fixed fallbacks ("Bank"/"Income").
    pub source: Option<CategorySource>,
}

pub trait CategoryStrategy: Send + Sync {
    fn source(&self) -> CategorySource;
    fn resolve(&self, request: &CategoryRequest, ctx: &ResolverContext) -> Option<String>;
}

struct CacheStrategy;

impl CategoryStrategy for CacheStrategy {
    fn source(&self) -> CategorySource {
        CategorySource::Cache
    }

    fn resolve(&self, request: &CategoryRequest, ctx: &ResolverContext) -> Option<String> {
        ctx.cache.get(request.name).map(str::to_string)
    }
}

struct RuleStrategy;

impl CategoryStrategy for RuleStrategy {
    fn source(&self) -> CategorySource {
        CategorySource::Rule
    }

    fn resolve(&self, request: &CategoryRequest, ctx: &ResolverContext) -> Option<String> {
        ctx.rules
            .iter()
            .find(|rule| rule.matches(request.name))
            .map(|rule| rule.target_category.clone())
    }
}

struct MappingStrategy;

impl CategoryStrategy for MappingStrategy {
    fn source(&self) -> CategorySource {
        CategorySource::Mapping
    }

    fn resolve(&self, request: &CategoryRequest, ctx: &ResolverContext) -> Option<String> {
        let scraped = request.scraper_category?;
        ctx.mappings.get(scraped).cloned()
    }
}

struct ScraperStrategy;

impl CategoryStrategy for ScraperStrategy {
    fn source(&self) -> CategorySource {
        CategorySource::Scraper
    }

    fn resolve(&self, request: &CategoryRequest, _ctx: &ResolverContext) -> Option<String> {
        request
            .scraper_category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

pub struct CategoryResolver {
    strategies: Vec<Box<dyn CategoryStrategy>>,
}

impl CategoryResolver {
    /// The canonical chain: cache → rule → mapping → scraper.
    pub fn with_default_chain() -> Self {
        Self {
            strategies: vec![
                Box::new(CacheStrategy),
                Box::new(RuleStrategy),
                Box::new(MappingStrategy),
                Box::new(ScraperStrategy),
            ],
        }
    }

    pub fn resolve(
        &self,
        request: &CategoryRequest,
        ctx: &ResolverContext,
    ) -> Option<ResolvedCategory> {
        for strategy in &self.strategies {
            if let Some(category) = strategy.resolve(request, ctx) {
                return Some(ResolvedCategory {
                    category,
                    source: Some(strategy.source()),
                });
            }
        }

        if request.is_bank {
            return Some(ResolvedCategory {
                category: FALLBACK_BANK_CATEGORY.to_string(),
                source: None,
            });
        }
        if request.price_minor > 0 {
            return Some(ResolvedCategory {
                category: FALLBACK_INCOME_CATEGORY.to_string(),
                source: None,
            });
        }
        None
    }
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::with_default_chain()
    }
}
