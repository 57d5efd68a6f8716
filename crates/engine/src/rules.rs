//! User categorization rules and scraper-category mappings.
//!
//! Rules are case-insensitive substring matches against the transaction
//! name; mappings redirect a scraper-supplied category to a user-chosen
//! one. Both feed the resolver chain in [`crate::categorize`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategorizationRule {
    pub id: Uuid,
    pub name_pattern: String,
    pub target_category: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CategorizationRule {
    pub fn new(name_pattern: String, target_category: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name_pattern,
            target_category,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Case-insensitive substring match; inactive rules never match.
    pub fn matches(&self, name: &str) -> bool {
        self.is_active && name.to_lowercase().contains(&self.name_pattern.to_lowercase())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub source_category: String,
    pub target_category: String,
}

pub mod rule_entity {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "categorization_rules")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub name_pattern: String,
        pub target_category: String,
        pub is_active: bool,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<&CategorizationRule> for ActiveModel {
        fn from(rule: &CategorizationRule) -> Self {
            Self {
                id: ActiveValue::Set(rule.id.to_string()),
                name_pattern: ActiveValue::Set(rule.name_pattern.clone()),
                target_category: ActiveValue::Set(rule.target_category.clone()),
                is_active: ActiveValue::Set(rule.is_active),
                created_at: ActiveValue::Set(rule.created_at),
            }
        }
    }

    impl TryFrom<Model> for CategorizationRule {
        type Error = EngineError;

        fn try_from(model: Model) -> ResultEngine<Self> {
            Ok(CategorizationRule {
                id: Uuid::parse_str(&model.id)
                    .map_err(|_| EngineError::KeyNotFound("rule not exists".to_string()))?,
                name_pattern: model.name_pattern,
                target_category: model.target_category,
                is_active: model.is_active,
                created_at: model.created_at,
            })
        }
    }
}

pub mod mapping_entity {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "category_mappings")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub source_category: String,
        pub target_category: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<&CategoryMapping> for ActiveModel {
        fn from(mapping: &CategoryMapping) -> Self {
            Self {
                source_category: ActiveValue::Set(mapping.source_category.clone()),
                target_category: ActiveValue::Set(mapping.target_category.clone()),
            }
        }
    }

    impl From<Model> for CategoryMapping {
        fn from(model: Model) -> Self {
            CategoryMapping {
                source_category: model.source_category,
                target_category: model.target_category,
            }
        }
    }
}
