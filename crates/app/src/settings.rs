//! File/env configuration for the application binary.
//!
//! Read from `heshbon.toml` next to the binary, overridable with
//! `HESHBON__`-prefixed environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Option<Server>,
}

#[derive(Debug, Deserialize)]
pub struct App {
    /// Log level filter (error, warn, info, debug, trace).
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
    /// Days of scrape audit history the janitor keeps.
    pub audit_keep_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name("heshbon").required(false))
            .add_source(Environment::with_prefix("HESHBON").separator("__"))
            .build()?
            .try_deserialize()
    }
}
