//! Followed-merchant tier: reels from merchants in the user's follow
//! set, newest first, at most three per merchant selected up front.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::{InteractionRepo, ReelRepo};
use crate::error::Result;
use crate::models::TierSource;
use crate::services::visibility::visible_candidates;
use crate::services::Candidate;

/// Per-merchant cap applied during selection, not after.
const MAX_PER_MERCHANT: usize = 3;

/// Fetch factor to survive visibility filtering and the merchant cap.
const OVERFETCH: i64 = 2;

pub struct FollowedTier {
    reels: Arc<ReelRepo>,
    interactions: Arc<InteractionRepo>,
}

impl FollowedTier {
    pub fn new(reels: Arc<ReelRepo>, interactions: Arc<InteractionRepo>) -> Self {
        Self {
            reels,
            interactions,
        }
    }
}

#[async_trait]
impl super::CandidateTier for FollowedTier {
    fn source(&self) -> TierSource {
        TierSource::Followed
    }

    async fn retrieve(
        &self,
        user_id: Uuid,
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Candidate>> {
        let merchant_ids: Vec<Uuid> = self
            .interactions
            .follows_for(user_id)
            .await?
            .iter()
            .map(|follow| follow.merchant_id)
            .collect();
        if merchant_ids.is_empty() {
            return Ok(Vec::new());
        }

        let fetched = self
            .reels
            .recent_by_merchants(&merchant_ids, limit * OVERFETCH, excluded)
            .await?;

        let product_ids: Vec<Uuid> = fetched.iter().map(|r| r.product_id).collect();
        let facts = self.reels.batch_product_facts(&product_ids).await?;

        let mut per_merchant: HashMap<Uuid, usize> = HashMap::new();
        let mut selected = Vec::new();

        for candidate in visible_candidates(fetched, &facts, TierSource::Followed) {
            let count = per_merchant.entry(candidate.reel.merchant_id).or_insert(0);
            if *count >= MAX_PER_MERCHANT {
                continue;
            }
            *count += 1;
            selected.push(candidate);
            if selected.len() >= limit as usize {
                break;
            }
        }

        Ok(selected)
    }
}
