//! Trending tier: engagement-scored recent reels.
//!
//! Candidates are always drawn from the last `candidate_days` days
//! (default 7) no matter which scoring window is in play; the 24h
//! scoring window then decides who actually trends.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::db::ReelRepo;
use crate::error::Result;
use crate::models::TierSource;
use crate::services::trending::rank_by_trending;
use crate::services::visibility::visible_reels;
use crate::services::Candidate;

const TIER_WINDOW_HOURS: f64 = 24.0;
const OVERFETCH: i64 = 3;

pub struct TrendingTier {
    reels: Arc<ReelRepo>,
    candidate_days: i64,
}

impl TrendingTier {
    pub fn new(reels: Arc<ReelRepo>, candidate_days: i64) -> Self {
        Self {
            reels,
            candidate_days,
        }
    }
}

#[async_trait]
impl super::CandidateTier for TrendingTier {
    fn source(&self) -> TierSource {
        TierSource::Trending
    }

    async fn retrieve(
        &self,
        _user_id: Uuid,
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Candidate>> {
        let now = Utc::now();
        let cutoff = now - Duration::days(self.candidate_days);

        let fetched = self
            .reels
            .created_since(cutoff, limit * OVERFETCH, excluded)
            .await?;

        let product_ids: Vec<Uuid> = fetched.iter().map(|r| r.product_id).collect();
        let facts = self.reels.batch_product_facts(&product_ids).await?;

        let visible = visible_reels(fetched, &facts);
        let ranked = rank_by_trending(visible, TIER_WINDOW_HOURS, now);

        Ok(ranked
            .into_iter()
            .take(limit as usize)
            .map(|reel| Candidate {
                facts: facts.get(&reel.product_id).cloned(),
                reel,
                source: TierSource::Trending,
            })
            .collect())
    }
}
