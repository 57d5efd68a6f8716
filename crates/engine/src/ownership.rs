//! Card ownership: which stored credential "owns" a scraped account number.
//!
//! `(vendor, account_number)` is unique. The first scrape that sees an
//! account number claims it for the invoking credential; later scrapes must
//! confirm the same claim. Reporting joins on this table, so a silent
//! reassignment would corrupt budget and category rollups.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Vendor};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardOwnership {
    pub id: Uuid,
    pub vendor: Vendor,
    pub account_number: String,
    pub credential_id: Uuid,
    /// Points a card at the bank-account credential it is billed from.
    /// Mutually exclusive with the custom display fields below.
    pub linked_bank_account_id: Option<Uuid>,
    pub custom_bank_account_number: Option<String>,
    pub custom_bank_account_nickname: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CardOwnership {
    pub fn new(vendor: Vendor, account_number: String, credential_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            vendor,
            account_number,
            credential_id,
            linked_bank_account_id: None,
            custom_bank_account_number: None,
            custom_bank_account_nickname: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "card_ownership")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub vendor: String,
    pub account_number: String,
    pub credential_id: String,
    pub linked_bank_account_id: Option<String>,
    pub custom_bank_account_number: Option<String>,
    pub custom_bank_account_nickname: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CardOwnership> for ActiveModel {
    fn from(ownership: &CardOwnership) -> Self {
        Self {
            id: ActiveValue::Set(ownership.id.to_string()),
            vendor: ActiveValue::Set(ownership.vendor.as_str().to_string()),
            account_number: ActiveValue::Set(ownership.account_number.clone()),
            credential_id: ActiveValue::Set(ownership.credential_id.to_string()),
            linked_bank_account_id: ActiveValue::Set(
                ownership.linked_bank_account_id.map(|id| id.to_string()),
            ),
            custom_bank_account_number: ActiveValue::Set(
                ownership.custom_bank_account_number.clone(),
            ),
            custom_bank_account_nickname: ActiveValue::Set(
                ownership.custom_bank_account_nickname.clone(),
            ),
            created_at: ActiveValue::Set(ownership.created_at),
        }
    }
}

impl TryFrom<Model> for CardOwnership {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("ownership not exists".to_string()))?,
            vendor: Vendor::try_from(model.vendor.as_str())?,
            account_number: model.account_number,
            credential_id: Uuid::parse_str(&model.credential_id)
                .map_err(|_| EngineError::KeyNotFound("credential not exists".to_string()))?,
            linked_bank_account_id: model
                .linked_bank_account_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            custom_bank_account_number: model.custom_bank_account_number,
            custom_bank_account_nickname: model.custom_bank_account_nickname,
            created_at: model.created_at,
        })
    }
}
