//! General fallback tier: newest visible reels globally, used to fill
//! whatever the signal-driven tiers left open.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::ReelRepo;
use crate::error::Result;
use crate::models::TierSource;
use crate::services::visibility::visible_candidates;
use crate::services::Candidate;

const OVERFETCH: i64 = 2;

pub struct GeneralTier {
    reels: Arc<ReelRepo>,
}

impl GeneralTier {
    pub fn new(reels: Arc<ReelRepo>) -> Self {
        Self { reels }
    }
}

#[async_trait]
impl super::CandidateTier for GeneralTier {
    fn source(&self) -> TierSource {
        TierSource::General
    }

    async fn retrieve(
        &self,
        _user_id: Uuid,
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Candidate>> {
        let fetched = self.reels.recent_candidates(limit * OVERFETCH, excluded).await?;

        let product_ids: Vec<Uuid> = fetched.iter().map(|r| r.product_id).collect();
        let facts = self.reels.batch_product_facts(&product_ids).await?;

        let mut candidates = visible_candidates(fetched, &facts, TierSource::General);
        candidates.truncate(limit as usize);
        Ok(candidates)
    }
}
