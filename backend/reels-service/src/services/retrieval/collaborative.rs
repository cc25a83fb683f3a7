//! Collaborative tier: reels liked by users whose taste overlaps the
//! target user's (at least three liked reels in common), excluding
//! everything the target already liked. Users with fewer than three
//! likes of their own get nothing; the signal is too thin.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::{InteractionRepo, ReelRepo};
use crate::error::Result;
use crate::models::TierSource;
use crate::services::visibility::visible_candidates;
use crate::services::Candidate;

const MIN_OWN_LIKES: usize = 3;
const MIN_COMMON_LIKES: i64 = 3;
const OVERFETCH: i64 = 2;

pub struct CollaborativeTier {
    reels: Arc<ReelRepo>,
    interactions: Arc<InteractionRepo>,
}

impl CollaborativeTier {
    pub fn new(reels: Arc<ReelRepo>, interactions: Arc<InteractionRepo>) -> Self {
        Self {
            reels,
            interactions,
        }
    }
}

#[async_trait]
impl super::CandidateTier for CollaborativeTier {
    fn source(&self) -> TierSource {
        TierSource::SimilarUsers
    }

    async fn retrieve(
        &self,
        user_id: Uuid,
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Candidate>> {
        let liked: Vec<Uuid> = self
            .interactions
            .likes_for(user_id)
            .await?
            .iter()
            .map(|like| like.reel_id)
            .collect();
        if liked.len() < MIN_OWN_LIKES {
            return Ok(Vec::new());
        }

        let reel_ids = self
            .interactions
            .similar_user_liked_reels(user_id, &liked, MIN_COMMON_LIKES, limit * OVERFETCH, excluded)
            .await?;
        if reel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let fetched = self.reels.get_reels_by_ids(&reel_ids).await?;

        // Restore the like-count ordering the id query produced
        let mut by_id: std::collections::HashMap<Uuid, _> =
            fetched.into_iter().map(|r| (r.id, r)).collect();
        let ordered: Vec<_> = reel_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();

        let product_ids: Vec<Uuid> = ordered.iter().map(|r| r.product_id).collect();
        let facts = self.reels.batch_product_facts(&product_ids).await?;

        let mut candidates = visible_candidates(ordered, &facts, TierSource::SimilarUsers);
        candidates.truncate(limit as usize);
        Ok(candidates)
    }
}
