//! Multi-tier candidate retrieval.
//!
//! Each tier is an independent strategy returning bounded, deduplicated,
//! visible candidates from one signal source. The layer runs them in
//! priority order, deduplicates across tiers (first source wins), and
//! reports which tiers contributed. A failing tier degrades the pool
//! with a warning instead of failing the request.

mod category;
mod collaborative;
mod followed;
mod general;
mod trending;

pub use category::CategoryTier;
pub use collaborative::CollaborativeTier;
pub use followed::FollowedTier;
pub use general::GeneralTier;
pub use trending::TrendingTier;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use super::Candidate;
use crate::db::{InteractionRepo, PreferenceRepo, ReelRepo};
use crate::error::Result;
use crate::models::TierSource;

/// One candidate-retrieval strategy.
#[async_trait]
pub trait CandidateTier: Send + Sync {
    fn source(&self) -> TierSource;

    async fn retrieve(
        &self,
        user_id: Uuid,
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Candidate>>;
}

/// Share of the candidate pool each tier is asked for.
#[derive(Debug, Clone, Copy)]
pub struct TierMix {
    pub followed: f64,
    pub category: f64,
    pub trending: f64,
    pub similar: f64,
}

impl Default for TierMix {
    fn default() -> Self {
        Self {
            followed: 0.4,
            category: 0.3,
            trending: 0.2,
            similar: 0.1,
        }
    }
}

impl TierMix {
    pub fn limit_for(&self, source: TierSource, target: usize) -> i64 {
        let fraction = match source {
            TierSource::Followed => self.followed,
            TierSource::Category => self.category,
            TierSource::Trending => self.trending,
            TierSource::SimilarUsers => self.similar,
            TierSource::General => 1.0,
        };
        ((target as f64 * fraction).ceil() as i64).max(1)
    }
}

/// Runs the tiers and assembles the deduplicated candidate pool.
pub struct RetrievalLayer {
    tiers: Vec<Box<dyn CandidateTier>>,
    general: GeneralTier,
    mix: TierMix,
}

impl RetrievalLayer {
    pub fn new(
        reel_repo: Arc<ReelRepo>,
        interaction_repo: Arc<InteractionRepo>,
        preference_repo: Arc<PreferenceRepo>,
        trending_candidate_days: i64,
    ) -> Self {
        let tiers: Vec<Box<dyn CandidateTier>> = vec![
            Box::new(FollowedTier::new(
                reel_repo.clone(),
                interaction_repo.clone(),
            )),
            Box::new(CategoryTier::new(reel_repo.clone(), preference_repo)),
            Box::new(TrendingTier::new(
                reel_repo.clone(),
                trending_candidate_days,
            )),
            Box::new(CollaborativeTier::new(reel_repo.clone(), interaction_repo)),
        ];

        Self {
            tiers,
            general: GeneralTier::new(reel_repo),
            mix: TierMix::default(),
        }
    }

    /// Gather roughly `target` candidates across all tiers, general fill
    /// last. Returns the pool and the tiers that contributed.
    pub async fn gather(
        &self,
        user_id: Uuid,
        target: usize,
    ) -> Result<(Vec<Candidate>, Vec<TierSource>)> {
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut pool: Vec<Candidate> = Vec::new();
        let mut tiers_used: Vec<TierSource> = Vec::new();

        for tier in &self.tiers {
            let limit = self.mix.limit_for(tier.source(), target);
            let excluded: Vec<Uuid> = seen.iter().copied().collect();

            match tier.retrieve(user_id, limit, &excluded).await {
                Ok(candidates) => {
                    let mut contributed = false;
                    for candidate in candidates {
                        if seen.insert(candidate.reel.id) {
                            pool.push(candidate);
                            contributed = true;
                        }
                    }
                    if contributed {
                        tiers_used.push(tier.source());
                    }
                }
                Err(e) => {
                    warn!(tier = %tier.source(), error = %e, "candidate tier failed, degrading");
                }
            }
        }

        // General fill for any shortfall
        if pool.len() < target {
            let missing = (target - pool.len()) as i64;
            let excluded: Vec<Uuid> = seen.iter().copied().collect();
            match self.general.retrieve(user_id, missing, &excluded).await {
                Ok(candidates) => {
                    let mut contributed = false;
                    for candidate in candidates {
                        if seen.insert(candidate.reel.id) {
                            pool.push(candidate);
                            contributed = true;
                        }
                    }
                    if contributed {
                        tiers_used.push(TierSource::General);
                    }
                }
                Err(e) => {
                    warn!(tier = "general", error = %e, "fill tier failed, degrading");
                }
            }
        }

        debug!(
            user_id = %user_id,
            pool = pool.len(),
            tiers = ?tiers_used,
            "candidate retrieval complete"
        );

        Ok((pool, tiers_used))
    }

    /// Direct access to the general tier for the cold-start selector.
    pub fn general_tier(&self) -> &GeneralTier {
        &self.general
    }

    /// Direct access to specific tiers for the cold-start selector.
    pub fn tier(&self, source: TierSource) -> Option<&dyn CandidateTier> {
        self.tiers
            .iter()
            .find(|t| t.source() == source)
            .map(|t| t.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_mix_limits() {
        let mix = TierMix::default();
        assert_eq!(mix.limit_for(TierSource::Followed, 20), 8);
        assert_eq!(mix.limit_for(TierSource::Category, 20), 6);
        assert_eq!(mix.limit_for(TierSource::Trending, 20), 4);
        assert_eq!(mix.limit_for(TierSource::SimilarUsers, 20), 2);
        assert_eq!(mix.limit_for(TierSource::General, 20), 20);
        // Never zero, even for tiny pages
        assert_eq!(mix.limit_for(TierSource::SimilarUsers, 1), 1);
    }
}
