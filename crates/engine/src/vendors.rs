//! The fixed set of scrapeable institutions.
//!
//! Every scraped transaction and every stored credential is keyed by a
//! `Vendor`. The set is closed: the external scraper only knows how to
//! drive these sites, and the credential shape it expects differs per
//! vendor.

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// A bank or credit-card institution supported by the scraper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Vendor {
    Hapoalim,
    Leumi,
    Discount,
    Mizrahi,
    Otsar,
    Beinleumi,
    Isracard,
    Amex,
    Max,
    VisaCal,
}

/// Whether a vendor is a bank or a credit-card company.
///
/// Drives the derived `channel` tag on stored transactions and the
/// fallback category for uncategorized bank rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VendorKind {
    Bank,
    CreditCard,
}

impl VendorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::CreditCard => "credit_card",
        }
    }
}

/// The credential fields the external scraper expects for a vendor.
///
/// The source sites duck-type this per login form; here it is an explicit
/// table so validation can happen before any external call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialShape {
    /// `username` + `password`.
    UserPassword,
    /// `id_number` + `password` + `user_code`.
    IdPasswordCode,
    /// `id_number` + `card6_digits` + `password`.
    IdCardDigitsPassword,
}

impl Vendor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hapoalim => "hapoalim",
            Self::Leumi => "leumi",
            Self::Discount => "discount",
            Self::Mizrahi => "mizrahi",
            Self::Otsar => "otsarHahayal",
            Self::Beinleumi => "beinleumi",
            Self::Isracard => "isracard",
            Self::Amex => "amex",
            Self::Max => "max",
            Self::VisaCal => "visaCal",
        }
    }

    pub fn kind(self) -> VendorKind {
        match self {
            Self::Hapoalim
            | Self::Leumi
            | Self::Discount
            | Self::Mizrahi
            | Self::Otsar
            | Self::Beinleumi => VendorKind::Bank,
            Self::Isracard | Self::Amex | Self::Max | Self::VisaCal => VendorKind::CreditCard,
        }
    }

    pub fn is_bank(self) -> bool {
        self.kind() == VendorKind::Bank
    }

    pub fn credential_shape(self) -> CredentialShape {
        match self {
            Self::Discount | Self::Mizrahi => CredentialShape::IdPasswordCode,
            Self::Isracard | Self::Amex => CredentialShape::IdCardDigitsPassword,
            Self::Hapoalim | Self::Leumi | Self::Otsar | Self::Beinleumi | Self::Max
            | Self::VisaCal => CredentialShape::UserPassword,
        }
    }
}

impl TryFrom<&str> for Vendor {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "hapoalim" => Ok(Self::Hapoalim),
            "leumi" => Ok(Self::Leumi),
            "discount" => Ok(Self::Discount),
            "mizrahi" => Ok(Self::Mizrahi),
            "otsarHahayal" => Ok(Self::Otsar),
            "beinleumi" => Ok(Self::Beinleumi),
            "isracard" => Ok(Self::Isracard),
            "amex" => Ok(Self::Amex),
            "max" => Ok(Self::Max),
            "visaCal" => Ok(Self::VisaCal),
            other => Err(EngineError::Validation(format!("unknown vendor: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_round_trips_through_str() {
        for vendor in [
            Vendor::Hapoalim,
            Vendor::Leumi,
            Vendor::Discount,
            Vendor::Mizrahi,
            Vendor::Otsar,
            Vendor::Beinleumi,
            Vendor::Isracard,
            Vendor::Amex,
            Vendor::Max,
            Vendor::VisaCal,
        ] {
            assert_eq!(Vendor::try_from(vendor.as_str()).unwrap(), vendor);
        }
    }

    #[test]
    fn unknown_vendor_is_a_validation_error() {
        let err = Vendor::try_from("monopoly-bank").unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn card_vendors_are_not_banks() {
        assert!(Vendor::Leumi.is_bank());
        assert!(!Vendor::Isracard.is_bank());
        assert_eq!(Vendor::Max.kind().as_str(), "credit_card");
    }
}
