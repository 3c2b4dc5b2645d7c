//! Customer deduplication
//!
//! Matches an incoming partial customer record against existing rows by
//! identifier equality, probing identifiers in the fixed order of
//! `IdentifierKind::ORDERED`. The first match wins; further matches on other
//! identifiers are reported as conflicts, not merged.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::customers;
use crate::db::models::Customer;
use crate::types::IdentifierKind;
use crate::{Error, Result};

/// An incoming partial customer record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerInput {
    pub mobile: Option<String>,
    pub pan: Option<String>,
    pub aadhaar: Option<String>,
    pub ucid: Option<String>,
    pub prev_lan: Option<String>,
    pub segment: Option<String>,
    pub dnd: Option<bool>,
    /// Free-form attributes merged key-wise onto the stored JSON
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl CustomerInput {
    fn identifier(&self, kind: IdentifierKind) -> Option<&str> {
        let value = match kind {
            IdentifierKind::Mobile => &self.mobile,
            IdentifierKind::Pan => &self.pan,
            IdentifierKind::Aadhaar => &self.aadhaar,
            IdentifierKind::Ucid => &self.ucid,
            IdentifierKind::PrevLan => &self.prev_lan,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// True when at least one identifier is supplied
    pub fn has_identifier(&self) -> bool {
        IdentifierKind::ORDERED
            .iter()
            .any(|k| self.identifier(*k).is_some())
    }
}

/// Result of deduplicating one incoming record
#[derive(Debug, Clone)]
pub enum DedupOutcome {
    /// An existing customer matched; non-null incoming fields were merged in.
    /// `conflicts` lists other existing customers matched by different
    /// identifiers (first match by identifier order won).
    Matched {
        customer: Customer,
        conflicts: Vec<Uuid>,
    },
    /// No match; a new customer row was created
    Created { customer: Customer },
}

impl DedupOutcome {
    pub fn customer(&self) -> &Customer {
        match self {
            DedupOutcome::Matched { customer, .. } => customer,
            DedupOutcome::Created { customer } => customer,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, DedupOutcome::Matched { .. })
    }
}

/// Find existing customers matching any supplied identifier, in identifier
/// order, without writing anything. Used by the eligibility lookup.
pub async fn find_matches(pool: &SqlitePool, input: &CustomerInput) -> Result<Vec<Customer>> {
    let mut matches: Vec<Customer> = Vec::new();

    for kind in IdentifierKind::ORDERED {
        let Some(value) = input.identifier(kind) else {
            continue;
        };
        if let Some(customer) = customers::find_by_identifier(pool, kind, value).await? {
            if !matches.iter().any(|m| m.guid == customer.guid) {
                matches.push(customer);
            }
        }
    }

    Ok(matches)
}

/// Deduplicate an incoming record: merge onto the first matching customer,
/// or insert a new row when nothing matches
pub async fn dedup_customer(pool: &SqlitePool, input: &CustomerInput) -> Result<DedupOutcome> {
    if !input.has_identifier() {
        return Err(Error::InvalidInput(
            "Customer record has no identifiers".to_string(),
        ));
    }

    // Probe identifiers in order, remembering which kinds matched a row
    // other than the winner: those values belong to the losing row and must
    // not be copied onto the winner (the unique index would reject them).
    let mut winner: Option<Customer> = None;
    let mut conflicts: Vec<Uuid> = Vec::new();
    let mut blocked: Vec<IdentifierKind> = Vec::new();

    for kind in IdentifierKind::ORDERED {
        let Some(value) = input.identifier(kind) else {
            continue;
        };
        if let Some(customer) = customers::find_by_identifier(pool, kind, value).await? {
            match &winner {
                None => winner = Some(customer),
                Some(w) if w.guid == customer.guid => {}
                Some(_) => {
                    if !conflicts.contains(&customer.guid) {
                        conflicts.push(customer.guid);
                    }
                    blocked.push(kind);
                }
            }
        }
    }

    match winner {
        Some(winner) => {
            let merged = merge_input(winner, input, &blocked);
            customers::update_customer(pool, &merged).await?;

            Ok(DedupOutcome::Matched {
                customer: merged,
                conflicts,
            })
        }
        None => {
            let now = Utc::now();
            let customer = Customer {
                guid: Uuid::new_v4(),
                mobile: input.mobile.clone().filter(|v| !v.trim().is_empty()),
                pan: input.pan.clone().filter(|v| !v.trim().is_empty()),
                aadhaar: input.aadhaar.clone().filter(|v| !v.trim().is_empty()),
                ucid: input.ucid.clone().filter(|v| !v.trim().is_empty()),
                prev_lan: input.prev_lan.clone().filter(|v| !v.trim().is_empty()),
                attributes: serde_json::Value::Object(input.attributes.clone()),
                segment: input.segment.clone(),
                dnd: input.dnd.unwrap_or(false),
                created_at: now,
                updated_at: now,
            };
            customers::insert_customer(pool, &customer).await?;

            Ok(DedupOutcome::Created { customer })
        }
    }
}

/// Merge non-null incoming fields onto an existing customer
///
/// Identifiers only fill NULL columns - they never overwrite a different
/// stored value, and kinds listed in `blocked` (matched to a conflicting
/// row) are skipped entirely. Attributes merge key-wise with incoming
/// values winning. Segment and DND overwrite when supplied.
fn merge_input(mut existing: Customer, input: &CustomerInput, blocked: &[IdentifierKind]) -> Customer {
    let fill = |slot: &mut Option<String>, kind: IdentifierKind| {
        if slot.is_none() && !blocked.contains(&kind) {
            if let Some(v) = input.identifier(kind) {
                *slot = Some(v.to_string());
            }
        }
    };

    fill(&mut existing.mobile, IdentifierKind::Mobile);
    fill(&mut existing.pan, IdentifierKind::Pan);
    fill(&mut existing.aadhaar, IdentifierKind::Aadhaar);
    fill(&mut existing.ucid, IdentifierKind::Ucid);
    fill(&mut existing.prev_lan, IdentifierKind::PrevLan);

    if !input.attributes.is_empty() {
        let merged = match existing.attributes.as_object() {
            Some(stored) => {
                let mut merged = stored.clone();
                for (key, value) in &input.attributes {
                    merged.insert(key.clone(), value.clone());
                }
                merged
            }
            None => input.attributes.clone(),
        };
        existing.attributes = serde_json::Value::Object(merged);
    }

    if let Some(segment) = &input.segment {
        existing.segment = Some(segment.clone());
    }
    if let Some(dnd) = input.dnd {
        existing.dnd = dnd;
    }

    existing.updated_at = Utc::now();
    existing
}
