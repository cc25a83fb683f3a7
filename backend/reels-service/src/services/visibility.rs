//! Visibility filtering over candidate batches.
//!
//! Every retriever and the trending path run their raw reel fetches
//! through here after one batch product-facts query; nothing downstream
//! sees an invisible reel. A reel pointing at a missing or broken
//! product is simply filtered out, never an error, so one bad record
//! cannot take down a feed page.

use std::collections::HashMap;

use uuid::Uuid;

use super::Candidate;
use crate::models::{ProductFacts, Reel, TierSource};

/// Apply the visibility predicate to a fetched batch, tagging survivors
/// with their product facts and originating tier.
pub fn visible_candidates(
    reels: Vec<Reel>,
    facts: &HashMap<Uuid, ProductFacts>,
    source: TierSource,
) -> Vec<Candidate> {
    reels
        .into_iter()
        .filter_map(|reel| {
            let product = facts.get(&reel.product_id);
            if reel.is_visible(product) {
                Some(Candidate {
                    facts: product.cloned(),
                    reel,
                    source,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Visible reels only, without candidate tagging (trending/followed
/// feeds that bypass the tier pipeline).
pub fn visible_reels(reels: Vec<Reel>, facts: &HashMap<Uuid, ProductFacts>) -> Vec<Reel> {
    reels
        .into_iter()
        .filter(|reel| reel.is_visible(facts.get(&reel.product_id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApprovalState;
    use chrono::Utc;

    fn reel() -> Reel {
        Reel {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            description: String::new(),
            video_url: String::new(),
            thumbnail_url: None,
            duration_seconds: None,
            views_count: 0,
            likes_count: 0,
            shares_count: 0,
            is_active: true,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn facts_for(reel: &Reel, stock: i64) -> ProductFacts {
        ProductFacts {
            product_id: reel.product_id,
            merchant_id: reel.merchant_id,
            deleted: false,
            active: true,
            approval: ApprovalState::Approved,
            stock_qty: stock,
            category_id: None,
        }
    }

    #[test]
    fn test_filters_missing_product_and_zero_stock() {
        let ok = reel();
        let no_product = reel();
        let no_stock = reel();

        let mut facts = HashMap::new();
        facts.insert(ok.product_id, facts_for(&ok, 3));
        facts.insert(no_stock.product_id, facts_for(&no_stock, 0));

        let ok_id = ok.id;
        let out = visible_candidates(
            vec![ok, no_product, no_stock],
            &facts,
            TierSource::General,
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reel.id, ok_id);
        assert_eq!(out[0].source, TierSource::General);
        assert!(out[0].facts.is_some());
    }

    #[test]
    fn test_visible_reels_shape() {
        let ok = reel();
        let mut inactive = reel();
        inactive.is_active = false;

        let mut facts = HashMap::new();
        facts.insert(ok.product_id, facts_for(&ok, 1));
        facts.insert(inactive.product_id, facts_for(&inactive, 1));

        let out = visible_reels(vec![ok.clone(), inactive], &facts);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, ok.id);
    }
}
