//! Offer precedence resolution
//!
//! A declarative priority table over product types plus a pure
//! `resolve(existing, incoming) -> Decision` function. All business rules for
//! what happens when a new offer arrives for a customer with active offers
//! live here; callers execute the returned `Decision` against the database
//! (see `ingest::apply_decision`).
//!
//! Rules:
//! - A strictly higher-priority incoming offer expires every active offer
//!   and is created Active.
//! - Equal priority (including the Insta / E-aggregator tie) never disturbs
//!   the incumbent: the newcomer is recorded as Duplicate.
//! - A strictly outranked incoming offer is rejected.
//! - An active offer whose journey has started is never expired; a would-be
//!   winner is recorded as Duplicate against it instead.
//! - An Enrich offer refreshes a same-product active offer in place. With no
//!   active offers it degrades to a fresh create; with active offers of other
//!   products only, it competes as a fresh offer of its product type.

use uuid::Uuid;

use crate::types::{OfferType, ProductType};

/// Priority table: product type -> priority integer (higher wins)
///
/// The Insta / E-aggregator tie at the bottom is deliberate.
pub const PRODUCT_PRIORITY: [(ProductType, i32); 7] = [
    (ProductType::EmployeeLoan, 60),
    (ProductType::TwLoyalty, 50),
    (ProductType::TopUp, 40),
    (ProductType::Preapproved, 30),
    (ProductType::Prospect, 20),
    (ProductType::Insta, 10),
    (ProductType::EAggregator, 10),
];

/// Priority for a product type
pub fn priority(product: ProductType) -> i32 {
    PRODUCT_PRIORITY
        .iter()
        .find(|(p, _)| *p == product)
        .map(|(_, prio)| *prio)
        .unwrap_or(0)
}

/// The facts about an existing active offer that the resolver needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveOffer {
    pub offer_id: Uuid,
    pub product_type: ProductType,
    pub journey_started: bool,
}

/// The facts about an incoming offer that the resolver needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingOffer {
    pub product_type: ProductType,
    pub offer_type: OfferType,
}

/// What to do with an incoming offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No competing active offer: write the new offer as Active
    CreateActive,
    /// Refresh the targeted active offer in place (Enrich); no new row
    Enrich { target: Uuid },
    /// Expire the listed offers, then write the new offer as Active
    ExpireAndCreate { expire: Vec<Uuid> },
    /// Keep the incumbent; write the new offer with status Duplicate
    MarkNewDuplicate { kept: Uuid },
    /// Outranked: write nothing but the audit trail
    Reject { reason: String },
}

/// Resolve an incoming offer against the customer's active offers
///
/// Pure function: no I/O, no clock reads. `existing` must contain only
/// offers with status Active; the caller filters.
pub fn resolve(existing: &[ActiveOffer], incoming: &IncomingOffer) -> Decision {
    if existing.is_empty() {
        return Decision::CreateActive;
    }

    // Enrich targets a same-product active offer; otherwise it competes
    // like a fresh offer of its product type.
    if incoming.offer_type == OfferType::Enrich {
        if let Some(target) = existing
            .iter()
            .find(|o| o.product_type == incoming.product_type)
        {
            return Decision::Enrich {
                target: target.offer_id,
            };
        }
    }

    let new_priority = priority(incoming.product_type);

    // Best incumbent: highest priority, first-in on ties (max_by_key would
    // keep the last tied element, so pick strictly-greater replacements only)
    let mut best = existing[0];
    for offer in &existing[1..] {
        if priority(offer.product_type) > priority(best.product_type) {
            best = *offer;
        }
    }
    let best_priority = priority(best.product_type);

    if new_priority > best_priority {
        // A started journey pins the incumbent regardless of rank
        if let Some(pinned) = existing.iter().find(|o| o.journey_started) {
            return Decision::MarkNewDuplicate {
                kept: pinned.offer_id,
            };
        }
        return Decision::ExpireAndCreate {
            expire: existing.iter().map(|o| o.offer_id).collect(),
        };
    }

    if new_priority == best_priority {
        return Decision::MarkNewDuplicate {
            kept: best.offer_id,
        };
    }

    Decision::Reject {
        reason: format!(
            "outranked by active {} offer {}",
            best.product_type, best.offer_id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(product: ProductType) -> ActiveOffer {
        ActiveOffer {
            offer_id: Uuid::new_v4(),
            product_type: product,
            journey_started: false,
        }
    }

    fn journeying(product: ProductType) -> ActiveOffer {
        ActiveOffer {
            journey_started: true,
            ..active(product)
        }
    }

    fn fresh(product: ProductType) -> IncomingOffer {
        IncomingOffer {
            product_type: product,
            offer_type: OfferType::Fresh,
        }
    }

    fn enrich(product: ProductType) -> IncomingOffer {
        IncomingOffer {
            product_type: product,
            offer_type: OfferType::Enrich,
        }
    }

    #[test]
    fn priority_table_matches_business_order() {
        // Employee Loan > TW Loyalty > Top-up > Preapproved > Prospect > Insta/E-aggregator
        assert!(priority(ProductType::EmployeeLoan) > priority(ProductType::TwLoyalty));
        assert!(priority(ProductType::TwLoyalty) > priority(ProductType::TopUp));
        assert!(priority(ProductType::TopUp) > priority(ProductType::Preapproved));
        assert!(priority(ProductType::Preapproved) > priority(ProductType::Prospect));
        assert!(priority(ProductType::Prospect) > priority(ProductType::Insta));
        assert_eq!(
            priority(ProductType::Insta),
            priority(ProductType::EAggregator)
        );
    }

    #[test]
    fn no_active_offers_creates_active() {
        let decision = resolve(&[], &fresh(ProductType::Insta));
        assert_eq!(decision, Decision::CreateActive);
    }

    #[test]
    fn higher_priority_expires_incumbent() {
        let incumbent = active(ProductType::Preapproved);
        let decision = resolve(&[incumbent], &fresh(ProductType::TopUp));
        assert_eq!(
            decision,
            Decision::ExpireAndCreate {
                expire: vec![incumbent.offer_id]
            }
        );
    }

    #[test]
    fn higher_priority_expires_all_incumbents() {
        let a = active(ProductType::Prospect);
        let b = active(ProductType::Insta);
        let decision = resolve(&[a, b], &fresh(ProductType::EmployeeLoan));
        assert_eq!(
            decision,
            Decision::ExpireAndCreate {
                expire: vec![a.offer_id, b.offer_id]
            }
        );
    }

    #[test]
    fn equal_priority_marks_newcomer_duplicate() {
        let incumbent = active(ProductType::Preapproved);
        let decision = resolve(&[incumbent], &fresh(ProductType::Preapproved));
        assert_eq!(
            decision,
            Decision::MarkNewDuplicate {
                kept: incumbent.offer_id
            }
        );
    }

    #[test]
    fn insta_vs_eaggregator_tie_keeps_first_in() {
        let incumbent = active(ProductType::EAggregator);
        let decision = resolve(&[incumbent], &fresh(ProductType::Insta));
        assert_eq!(
            decision,
            Decision::MarkNewDuplicate {
                kept: incumbent.offer_id
            }
        );
    }

    #[test]
    fn lower_priority_is_rejected() {
        let incumbent = active(ProductType::EmployeeLoan);
        let decision = resolve(&[incumbent], &fresh(ProductType::Insta));
        match decision {
            Decision::Reject { reason } => {
                assert!(reason.contains("Employee Loan"));
            }
            other => panic!("expected Reject, got {:?}", other),
        }
    }

    #[test]
    fn started_journey_blocks_expiry() {
        let incumbent = journeying(ProductType::Prospect);
        let decision = resolve(&[incumbent], &fresh(ProductType::EmployeeLoan));
        assert_eq!(
            decision,
            Decision::MarkNewDuplicate {
                kept: incumbent.offer_id
            }
        );
    }

    #[test]
    fn journey_on_any_incumbent_pins_the_set() {
        let quiet = active(ProductType::Insta);
        let pinned = journeying(ProductType::Prospect);
        let decision = resolve(&[quiet, pinned], &fresh(ProductType::TopUp));
        assert_eq!(
            decision,
            Decision::MarkNewDuplicate {
                kept: pinned.offer_id
            }
        );
    }

    #[test]
    fn enrich_targets_same_product_active_offer() {
        let incumbent = active(ProductType::TopUp);
        let decision = resolve(&[incumbent], &enrich(ProductType::TopUp));
        assert_eq!(
            decision,
            Decision::Enrich {
                target: incumbent.offer_id
            }
        );
    }

    #[test]
    fn enrich_with_no_active_offers_creates() {
        let decision = resolve(&[], &enrich(ProductType::TopUp));
        assert_eq!(decision, Decision::CreateActive);
    }

    #[test]
    fn enrich_against_other_products_competes_as_fresh() {
        // Enrich for Top-up against an active Prospect: no same-product
        // target, so it outranks and expires like a fresh Top-up would.
        let incumbent = active(ProductType::Prospect);
        let decision = resolve(&[incumbent], &enrich(ProductType::TopUp));
        assert_eq!(
            decision,
            Decision::ExpireAndCreate {
                expire: vec![incumbent.offer_id]
            }
        );
    }

    #[test]
    fn enrich_outranked_by_other_product_is_rejected() {
        let incumbent = active(ProductType::EmployeeLoan);
        let decision = resolve(&[incumbent], &enrich(ProductType::Insta));
        assert!(matches!(decision, Decision::Reject { .. }));
    }

    #[test]
    fn ties_among_incumbents_keep_first_listed() {
        let first = active(ProductType::Insta);
        let second = active(ProductType::EAggregator);
        let decision = resolve(&[first, second], &fresh(ProductType::EAggregator));
        assert_eq!(
            decision,
            Decision::MarkNewDuplicate {
                kept: first.offer_id
            }
        );
    }
}
