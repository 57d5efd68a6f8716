//! CRUD over stored vendor credentials.

use sea_orm::{QueryOrder, prelude::*};
use tracing::info;

use crate::{EngineError, ResultEngine, VendorCredential, credentials};

use super::Engine;

impl Engine {
    pub async fn list_credentials(&self) -> ResultEngine<Vec<VendorCredential>> {
        let rows = credentials::Entity::find()
            .order_by_asc(credentials::Column::CreatedAt)
            .all(&self.database)
            .await?;
        rows.into_iter().map(VendorCredential::try_from).collect()
    }

    pub async fn get_credential(&self, id: Uuid) -> ResultEngine<VendorCredential> {
        let model = credentials::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("credential not exists".to_string()))?;
        VendorCredential::try_from(model)
    }

    /// Persist a new credential. The payload is validated up front so a
    /// broken login is caught at save time, not mid-run.
    pub async fn create_credential(&self, credential: &VendorCredential) -> ResultEngine<()> {
        credential.payload()?;
        credentials::ActiveModel::from(credential)
            .insert(&self.database)
            .await?;
        info!(
            id = %credential.id,
            vendor = %credential.vendor.as_str(),
            "stored new credential"
        );
        Ok(())
    }

    pub async fn delete_credential(&self, id: Uuid) -> ResultEngine<()> {
        let result = credentials::Entity::delete_by_id(id.to_string())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("credential not exists".to_string()));
        }
        Ok(())
    }
}
