//! Domain enums shared across the CDP services
//!
//! Each enum round-trips through the exact strings stored in the database
//! and exchanged in CSV files. The CHECK constraints in the schema
//! (see `db::init`) list the same strings; keep the two in sync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Loan product carried by an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "Employee Loan")]
    EmployeeLoan,
    #[serde(rename = "TW Loyalty")]
    TwLoyalty,
    #[serde(rename = "Top-up")]
    TopUp,
    #[serde(rename = "Preapproved")]
    Preapproved,
    #[serde(rename = "Prospect")]
    Prospect,
    #[serde(rename = "Insta")]
    Insta,
    #[serde(rename = "E-aggregator")]
    EAggregator,
}

impl ProductType {
    /// All product types, in priority order (highest first)
    pub const ALL: [ProductType; 7] = [
        ProductType::EmployeeLoan,
        ProductType::TwLoyalty,
        ProductType::TopUp,
        ProductType::Preapproved,
        ProductType::Prospect,
        ProductType::Insta,
        ProductType::EAggregator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::EmployeeLoan => "Employee Loan",
            ProductType::TwLoyalty => "TW Loyalty",
            ProductType::TopUp => "Top-up",
            ProductType::Preapproved => "Preapproved",
            ProductType::Prospect => "Prospect",
            ProductType::Insta => "Insta",
            ProductType::EAggregator => "E-aggregator",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Employee Loan" => Ok(ProductType::EmployeeLoan),
            "TW Loyalty" => Ok(ProductType::TwLoyalty),
            "Top-up" => Ok(ProductType::TopUp),
            "Preapproved" => Ok(ProductType::Preapproved),
            "Prospect" => Ok(ProductType::Prospect),
            "Insta" => Ok(ProductType::Insta),
            "E-aggregator" => Ok(ProductType::EAggregator),
            other => Err(Error::InvalidInput(format!(
                "Unknown product type: '{}'",
                other
            ))),
        }
    }
}

/// How an offer arrived relative to the customer's history
///
/// `Fresh` is the generic incoming type; ingestion rewrites it to `NewOld`
/// (existing customer) or `NewNew` (newly created customer) when the source
/// does not say. `Enrich` updates an existing active offer in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferType {
    #[serde(rename = "Fresh")]
    Fresh,
    #[serde(rename = "Enrich")]
    Enrich,
    #[serde(rename = "New-old")]
    NewOld,
    #[serde(rename = "New-new")]
    NewNew,
}

impl OfferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferType::Fresh => "Fresh",
            OfferType::Enrich => "Enrich",
            OfferType::NewOld => "New-old",
            OfferType::NewNew => "New-new",
        }
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Fresh" => Ok(OfferType::Fresh),
            "Enrich" => Ok(OfferType::Enrich),
            "New-old" => Ok(OfferType::NewOld),
            "New-new" => Ok(OfferType::NewNew),
            other => Err(Error::InvalidInput(format!(
                "Unknown offer type: '{}'",
                other
            ))),
        }
    }
}

/// Offer lifecycle status
///
/// `Active` and `Inactive` are live states; `Expired` and `Duplicate`
/// are terminal and eligible for retention purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferStatus {
    #[serde(rename = "Active")]
    Active,
    #[serde(rename = "Inactive")]
    Inactive,
    #[serde(rename = "Expired")]
    Expired,
    #[serde(rename = "Duplicate")]
    Duplicate,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Active => "Active",
            OfferStatus::Inactive => "Inactive",
            OfferStatus::Expired => "Expired",
            OfferStatus::Duplicate => "Duplicate",
        }
    }

    /// Terminal statuses are never revived and age out via retention
    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferStatus::Expired | OfferStatus::Duplicate)
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Active" => Ok(OfferStatus::Active),
            "Inactive" => Ok(OfferStatus::Inactive),
            "Expired" => Ok(OfferStatus::Expired),
            "Duplicate" => Ok(OfferStatus::Duplicate),
            other => Err(Error::InvalidInput(format!(
                "Unknown offer status: '{}'",
                other
            ))),
        }
    }
}

/// Customer identifier columns, in match-precedence order
///
/// Deduplication probes identifiers in this order and the first match wins,
/// so the ordering here is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Mobile,
    Pan,
    Aadhaar,
    Ucid,
    PrevLan,
}

impl IdentifierKind {
    /// Match-precedence order used by deduplication
    pub const ORDERED: [IdentifierKind; 5] = [
        IdentifierKind::Mobile,
        IdentifierKind::Pan,
        IdentifierKind::Aadhaar,
        IdentifierKind::Ucid,
        IdentifierKind::PrevLan,
    ];

    /// Column name in the customers table
    pub fn column(&self) -> &'static str {
        match self {
            IdentifierKind::Mobile => "mobile",
            IdentifierKind::Pan => "pan",
            IdentifierKind::Aadhaar => "aadhaar",
            IdentifierKind::Ucid => "ucid",
            IdentifierKind::PrevLan => "prev_lan",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_type_round_trips() {
        for p in ProductType::ALL {
            assert_eq!(p.as_str().parse::<ProductType>().unwrap(), p);
        }
    }

    #[test]
    fn product_type_serde_matches_display() {
        let json = serde_json::to_string(&ProductType::TwLoyalty).unwrap();
        assert_eq!(json, "\"TW Loyalty\"");
        let back: ProductType = serde_json::from_str("\"E-aggregator\"").unwrap();
        assert_eq!(back, ProductType::EAggregator);
    }

    #[test]
    fn offer_type_round_trips() {
        for t in [
            OfferType::Fresh,
            OfferType::Enrich,
            OfferType::NewOld,
            OfferType::NewNew,
        ] {
            assert_eq!(t.as_str().parse::<OfferType>().unwrap(), t);
        }
    }

    #[test]
    fn status_round_trips_and_terminality() {
        for s in [
            OfferStatus::Active,
            OfferStatus::Inactive,
            OfferStatus::Expired,
            OfferStatus::Duplicate,
        ] {
            assert_eq!(s.as_str().parse::<OfferStatus>().unwrap(), s);
        }
        assert!(!OfferStatus::Active.is_terminal());
        assert!(!OfferStatus::Inactive.is_terminal());
        assert!(OfferStatus::Expired.is_terminal());
        assert!(OfferStatus::Duplicate.is_terminal());
    }

    #[test]
    fn unknown_strings_are_rejected() {
        assert!("Personal Loan".parse::<ProductType>().is_err());
        assert!("fresh".parse::<OfferType>().is_err());
        assert!("ACTIVE".parse::<OfferStatus>().is_err());
    }

    #[test]
    fn identifier_order_is_mobile_first() {
        assert_eq!(IdentifierKind::ORDERED[0], IdentifierKind::Mobile);
        assert_eq!(IdentifierKind::ORDERED[4], IdentifierKind::PrevLan);
    }
}
