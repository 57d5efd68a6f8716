//! Typed access to the key/value settings store.

use sea_orm::{ActiveValue, prelude::*};

use crate::settings::{
    self, BILLING_CYCLE_START_DAY, ISRACARD_SCRAPE_CATEGORIES, SCRAPER_TIMEOUT_MS,
    SYNC_ENABLED, ScrapeSettings, UPDATE_CATEGORY_ON_RESCRAPE,
};
use crate::{EngineError, ResultEngine};

use super::Engine;

impl Engine {
    /// The pipeline settings, falling back to defaults for unset keys and
    /// ignoring values that fail to parse.
    pub async fn scrape_settings(&self) -> ResultEngine<ScrapeSettings> {
        let mut out = ScrapeSettings::default();
        let rows = settings::Entity::find().all(&self.database).await?;
        for row in rows {
            let value: serde_json::Value = match serde_json::from_str(&row.value) {
                Ok(value) => value,
                Err(_) => continue,
            };
            match row.key.as_str() {
                UPDATE_CATEGORY_ON_RESCRAPE => {
                    if let Some(v) = value.as_bool() {
                        out.update_category_on_rescrape = v;
                    }
                }
                SCRAPER_TIMEOUT_MS => {
                    if let Some(v) = value.as_u64() {
                        out.scraper_timeout_ms = v;
                    }
                }
                ISRACARD_SCRAPE_CATEGORIES => {
                    if let Some(v) = value.as_bool() {
                        out.isracard_scrape_categories = v;
                    }
                }
                BILLING_CYCLE_START_DAY => {
                    if let Some(v) = value.as_u64() {
                        out.billing_cycle_start_day = v.min(u8::MAX as u64) as u8;
                    }
                }
                SYNC_ENABLED => {
                    if let Some(v) = value.as_bool() {
                        out.sync_enabled = v;
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }

    pub async fn get_setting(&self, key: &str) -> ResultEngine<Option<serde_json::Value>> {
        let row = settings::Entity::find_by_id(key.to_string())
            .one(&self.database)
            .await?;
        Ok(row.and_then(|r| serde_json::from_str(&r.value).ok()))
    }

    /// Write one setting, validating the known keys.
    pub async fn set_setting(&self, key: &str, value: serde_json::Value) -> ResultEngine<()> {
        validate_setting(key, &value)?;
        let encoded = value.to_string();

        let existing = settings::Entity::find_by_id(key.to_string())
            .one(&self.database)
            .await?;
        match existing {
            Some(_) => {
                let active = settings::ActiveModel {
                    key: ActiveValue::Unchanged(key.to_string()),
                    value: ActiveValue::Set(encoded),
                };
                active.update(&self.database).await?;
            }
            None => {
                let active = settings::ActiveModel {
                    key: ActiveValue::Set(key.to_string()),
                    value: ActiveValue::Set(encoded),
                };
                active.insert(&self.database).await?;
            }
        }
        Ok(())
    }
}

fn validate_setting(key: &str, value: &serde_json::Value) -> ResultEngine<()> {
    match key {
        UPDATE_CATEGORY_ON_RESCRAPE | ISRACARD_SCRAPE_CATEGORIES | SYNC_ENABLED => {
            if !value.is_boolean() {
                return Err(EngineError::Validation(format!("{key} must be a boolean")));
            }
        }
        SCRAPER_TIMEOUT_MS => match value.as_u64() {
            Some(ms) if (1_000..=600_000).contains(&ms) => {}
            _ => {
                return Err(EngineError::Validation(
                    "scraper_timeout_ms must be between 1000 and 600000".to_string(),
                ));
            }
        },
        BILLING_CYCLE_START_DAY => match value.as_u64() {
            // 29-31 would skip months; capped so every month has the day.
            Some(day) if (1..=28).contains(&day) => {}
            _ => {
                return Err(EngineError::Validation(
                    "billing_cycle_start_day must be between 1 and 28".to_string(),
                ));
            }
        },
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_day_outside_range_is_rejected() {
        assert!(validate_setting(BILLING_CYCLE_START_DAY, &serde_json::json!(29)).is_err());
        assert!(validate_setting(BILLING_CYCLE_START_DAY, &serde_json::json!(0)).is_err());
        assert!(validate_setting(BILLING_CYCLE_START_DAY, &serde_json::json!(11)).is_ok());
    }

    #[test]
    fn boolean_keys_reject_non_booleans() {
        assert!(validate_setting(SYNC_ENABLED, &serde_json::json!("yes")).is_err());
        assert!(validate_setting(SYNC_ENABLED, &serde_json::json!(true)).is_ok());
    }

    #[test]
    fn timeout_bounds_are_enforced() {
        assert!(validate_setting(SCRAPER_TIMEOUT_MS, &serde_json::json!(500)).is_err());
        assert!(validate_setting(SCRAPER_TIMEOUT_MS, &serde_json::json!(60_000)).is_ok());
    }
}
