//! Read and relink operations over card ownership rows.

use sea_orm::{ActiveValue, QueryOrder, prelude::*};

use crate::{CardOwnership, EngineError, ResultEngine, ownership};

use super::Engine;

impl Engine {
    pub async fn list_ownerships(&self) -> ResultEngine<Vec<CardOwnership>> {
        let rows = ownership::Entity::find()
            .order_by_asc(ownership::Column::CreatedAt)
            .all(&self.database)
            .await?;
        rows.into_iter().map(CardOwnership::try_from).collect()
    }

    /// Point a card at the bank account it is billed from.
    ///
    /// Either a linked bank credential or a custom display pair, never
    /// both; passing neither clears the link.
    pub async fn relink_ownership(
        &self,
        id: Uuid,
        linked_bank_account_id: Option<Uuid>,
        custom_bank_account_number: Option<String>,
        custom_bank_account_nickname: Option<String>,
    ) -> ResultEngine<CardOwnership> {
        let has_custom =
            custom_bank_account_number.is_some() || custom_bank_account_nickname.is_some();
        if linked_bank_account_id.is_some() && has_custom {
            return Err(EngineError::Validation(
                "linked bank account and custom display fields are mutually exclusive".to_string(),
            ));
        }

        let model = ownership::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("ownership not exists".to_string()))?;

        let active = ownership::ActiveModel {
            id: ActiveValue::Unchanged(model.id),
            linked_bank_account_id: ActiveValue::Set(
                linked_bank_account_id.map(|l| l.to_string()),
            ),
            custom_bank_account_number: ActiveValue::Set(custom_bank_account_number),
            custom_bank_account_nickname: ActiveValue::Set(custom_bank_account_nickname),
            ..Default::default()
        };
        let updated = active.update(&self.database).await?;
        CardOwnership::try_from(updated)
    }

    pub async fn delete_ownership(&self, id: Uuid) -> ResultEngine<()> {
        let result = ownership::Entity::delete_by_id(id.to_string())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("ownership not exists".to_string()));
        }
        Ok(())
    }
}
