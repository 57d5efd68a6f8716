//! CRUD for categorization rules and scraper-category mappings, plus the
//! transactional category rename.

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

use crate::rules::{mapping_entity, rule_entity};
use crate::{CategorizationRule, CategoryMapping, EngineError, ResultEngine, transactions};

use super::{Engine, with_tx};

impl Engine {
    pub async fn list_rules(&self) -> ResultEngine<Vec<CategorizationRule>> {
        let rows = rule_entity::Entity::find()
            .order_by_asc(rule_entity::Column::CreatedAt)
            .all(&self.database)
            .await?;
        rows.into_iter().map(CategorizationRule::try_from).collect()
    }

    pub async fn create_rule(
        &self,
        name_pattern: &str,
        target_category: &str,
    ) -> ResultEngine<CategorizationRule> {
        let pattern = name_pattern.trim();
        if pattern.is_empty() {
            return Err(EngineError::Validation(
                "rule pattern must not be empty".to_string(),
            ));
        }
        let category = target_category.trim();
        if category.is_empty() {
            return Err(EngineError::Validation(
                "rule category must not be empty".to_string(),
            ));
        }

        let rule = CategorizationRule::new(pattern.to_string(), category.to_string());
        rule_entity::ActiveModel::from(&rule)
            .insert(&self.database)
            .await?;
        self.invalidate_category_cache();
        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        id: Uuid,
        name_pattern: Option<&str>,
        target_category: Option<&str>,
        is_active: Option<bool>,
    ) -> ResultEngine<CategorizationRule> {
        let model = rule_entity::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("rule not exists".to_string()))?;

        let mut active = rule_entity::ActiveModel {
            id: ActiveValue::Unchanged(model.id.clone()),
            ..Default::default()
        };
        if let Some(pattern) = name_pattern.map(str::trim) {
            if pattern.is_empty() {
                return Err(EngineError::Validation(
                    "rule pattern must not be empty".to_string(),
                ));
            }
            active.name_pattern = ActiveValue::Set(pattern.to_string());
        }
        if let Some(category) = target_category.map(str::trim) {
            if category.is_empty() {
                return Err(EngineError::Validation(
                    "rule category must not be empty".to_string(),
                ));
            }
            active.target_category = ActiveValue::Set(category.to_string());
        }
        if let Some(is_active_flag) = is_active {
            active.is_active = ActiveValue::Set(is_active_flag);
        }

        let updated = active.update(&self.database).await?;
        self.invalidate_category_cache();
        CategorizationRule::try_from(updated)
    }

    pub async fn delete_rule(&self, id: Uuid) -> ResultEngine<()> {
        let result = rule_entity::Entity::delete_by_id(id.to_string())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("rule not exists".to_string()));
        }
        self.invalidate_category_cache();
        Ok(())
    }

    pub async fn list_category_mappings(&self) -> ResultEngine<Vec<CategoryMapping>> {
        let rows = mapping_entity::Entity::find()
            .order_by_asc(mapping_entity::Column::SourceCategory)
            .all(&self.database)
            .await?;
        Ok(rows.into_iter().map(CategoryMapping::from).collect())
    }

    /// Insert or replace the mapping for a scraper-supplied category.
    pub async fn set_category_mapping(&self, mapping: &CategoryMapping) -> ResultEngine<()> {
        let existing = mapping_entity::Entity::find_by_id(mapping.source_category.clone())
            .one(&self.database)
            .await?;
        match existing {
            Some(_) => {
                let active = mapping_entity::ActiveModel {
                    source_category: ActiveValue::Unchanged(mapping.source_category.clone()),
                    target_category: ActiveValue::Set(mapping.target_category.clone()),
                };
                active.update(&self.database).await?;
            }
            None => {
                mapping_entity::ActiveModel::from(mapping)
                    .insert(&self.database)
                    .await?;
            }
        }
        self.invalidate_category_cache();
        Ok(())
    }

    pub async fn delete_category_mapping(&self, source_category: &str) -> ResultEngine<()> {
        let result = mapping_entity::Entity::delete_by_id(source_category.to_string())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("mapping not exists".to_string()));
        }
        self.invalidate_category_cache();
        Ok(())
    }

    /// Rename a category everywhere it appears: stored transactions, rule
    /// targets, and mapping targets, in one transaction. Returns the number
    /// of transactions touched.
    pub async fn rename_category(&self, from: &str, to: &str) -> ResultEngine<u64> {
        let from = from.trim();
        let to = to.trim();
        if from.is_empty() || to.is_empty() {
            return Err(EngineError::Validation(
                "category names must not be empty".to_string(),
            ));
        }
        if from == to {
            return Ok(0);
        }

        let renamed: u64 = with_tx!(self, |tx| {
            let result = transactions::Entity::update_many()
                .col_expr(transactions::Column::Category, Expr::value(to))
                .filter(transactions::Column::Category.eq(from))
                .exec(&tx)
                .await?;

            rule_entity::Entity::update_many()
                .col_expr(rule_entity::Column::TargetCategory, Expr::value(to))
                .filter(rule_entity::Column::TargetCategory.eq(from))
                .exec(&tx)
                .await?;

            mapping_entity::Entity::update_many()
                .col_expr(mapping_entity::Column::TargetCategory, Expr::value(to))
                .filter(mapping_entity::Column::TargetCategory.eq(from))
                .exec(&tx)
                .await?;

            Ok::<u64, EngineError>(result.rows_affected)
        })?;

        self.invalidate_category_cache();
        info!(from, to, transactions = renamed, "renamed category");
        Ok(renamed)
    }
}
