//! Stored vendor logins and the per-vendor credential payload.
//!
//! Secrets live base64-obfuscated in the database and are decoded only
//! here, at the credential-prep boundary, right before the payload is
//! handed to the external scraper.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{CredentialShape, EngineError, ResultEngine, Vendor, VendorKind};

#[derive(Clone, Debug, PartialEq)]
pub struct VendorCredential {
    pub id: Uuid,
    pub vendor: Vendor,
    pub nickname: String,
    pub username: Option<String>,
    /// Base64-obfuscated; decode via [`VendorCredential::payload`].
    pub password: Option<String>,
    pub id_number: Option<String>,
    pub user_code: Option<String>,
    pub card6_digits: Option<String>,
    pub bank_account_number: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// What the external scraper receives for a login, shaped per vendor.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CredentialPayload {
    UserPassword {
        username: String,
        password: String,
    },
    IdPasswordCode {
        id: String,
        password: String,
        num: String,
    },
    IdCardDigitsPassword {
        id: String,
        card6_digits: String,
        password: String,
    },
}

impl VendorCredential {
    pub fn new(vendor: Vendor, nickname: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            vendor,
            nickname,
            username: None,
            password: None,
            id_number: None,
            user_code: None,
            card6_digits: None,
            bank_account_number: None,
            last_synced_at: None,
            created_at: Utc::now(),
        }
    }

    /// Obfuscate and store a secret.
    pub fn set_password(&mut self, plain: &str) {
        self.password = Some(BASE64.encode(plain));
    }

    fn decoded_password(&self) -> ResultEngine<String> {
        let encoded = self.require("password", self.password.as_deref())?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|_| EngineError::Validation("stored password is corrupt".to_string()))?;
        String::from_utf8(bytes)
            .map_err(|_| EngineError::Validation("stored password is corrupt".to_string()))
    }

    fn require(&self, label: &str, value: Option<&str>) -> ResultEngine<String> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Ok(v.to_string()),
            None => Err(EngineError::Validation(format!(
                "{} credential is missing required field `{label}`",
                self.vendor.as_str()
            ))),
        }
    }

    /// Build the scraper payload, validating the vendor's required fields.
    ///
    /// Card vendors additionally require the card digits, bank vendors the
    /// bank account number, so downstream ownership rows always have a
    /// stable anchor.
    pub fn payload(&self) -> ResultEngine<CredentialPayload> {
        match self.vendor.kind() {
            VendorKind::CreditCard => {
                self.require("card6_digits", self.card6_digits.as_deref())?;
            }
            VendorKind::Bank => {
                self.require("bank_account_number", self.bank_account_number.as_deref())?;
            }
        }

        let password = self.decoded_password()?;
        match self.vendor.credential_shape() {
            CredentialShape::UserPassword => Ok(CredentialPayload::UserPassword {
                username: self.require("username", self.username.as_deref())?,
                password,
            }),
            CredentialShape::IdPasswordCode => Ok(CredentialPayload::IdPasswordCode {
                id: self.require("id_number", self.id_number.as_deref())?,
                password,
                num: self.require("user_code", self.user_code.as_deref())?,
            }),
            CredentialShape::IdCardDigitsPassword => {
                Ok(CredentialPayload::IdCardDigitsPassword {
                    id: self.require("id_number", self.id_number.as_deref())?,
                    card6_digits: self.require("card6_digits", self.card6_digits.as_deref())?,
                    password,
                })
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "vendor_credentials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub vendor: String,
    pub nickname: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub id_number: Option<String>,
    pub user_code: Option<String>,
    pub card6_digits: Option<String>,
    pub bank_account_number: Option<String>,
    pub last_synced_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&VendorCredential> for ActiveModel {
    fn from(credential: &VendorCredential) -> Self {
        Self {
            id: ActiveValue::Set(credential.id.to_string()),
            vendor: ActiveValue::Set(credential.vendor.as_str().to_string()),
            nickname: ActiveValue::Set(credential.nickname.clone()),
            username: ActiveValue::Set(credential.username.clone()),
            password: ActiveValue::Set(credential.password.clone()),
            id_number: ActiveValue::Set(credential.id_number.clone()),
            user_code: ActiveValue::Set(credential.user_code.clone()),
            card6_digits: ActiveValue::Set(credential.card6_digits.clone()),
            bank_account_number: ActiveValue::Set(credential.bank_account_number.clone()),
            last_synced_at: ActiveValue::Set(credential.last_synced_at),
            created_at: ActiveValue::Set(credential.created_at),
        }
    }
}

impl TryFrom<Model> for VendorCredential {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("credential not exists".to_string()))?,
            vendor: Vendor::try_from(model.vendor.as_str())?,
            nickname: model.nickname,
            username: model.username,
            password: model.password,
            id_number: model.id_number,
            user_code: model.user_code,
            card6_digits: model.card6_digits,
            bank_account_number: model.bank_account_number,
            last_synced_at: model.last_synced_at,
            created_at: model.created_at,
        })
    }
}
