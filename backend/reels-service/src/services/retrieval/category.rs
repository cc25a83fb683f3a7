//! Category tier: reels whose product category is among the user's top
//! five categories by decayed preference score.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::{PreferenceRepo, ReelRepo};
use crate::error::Result;
use crate::models::TierSource;
use crate::services::scoring::effective_score;
use crate::services::visibility::visible_candidates;
use crate::services::Candidate;

const TOP_CATEGORIES: usize = 5;
const MAX_PER_CATEGORY: usize = 5;
const OVERFETCH: i64 = 2;

pub struct CategoryTier {
    reels: Arc<ReelRepo>,
    preferences: Arc<PreferenceRepo>,
}

impl CategoryTier {
    pub fn new(reels: Arc<ReelRepo>, preferences: Arc<PreferenceRepo>) -> Self {
        Self { reels, preferences }
    }
}

#[async_trait]
impl super::CandidateTier for CategoryTier {
    fn source(&self) -> TierSource {
        TierSource::Category
    }

    async fn retrieve(
        &self,
        user_id: Uuid,
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Candidate>> {
        let now = Utc::now();

        // Top categories by decayed affinity, not raw stored score
        let mut prefs: Vec<(Uuid, f64)> = self
            .preferences
            .preferences_for(user_id)
            .await?
            .iter()
            .map(|p| (p.category_id, effective_score(p, now)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        prefs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        prefs.truncate(TOP_CATEGORIES);

        if prefs.is_empty() {
            return Ok(Vec::new());
        }

        let affinity: HashMap<Uuid, f64> = prefs.iter().copied().collect();
        let category_ids: Vec<Uuid> = prefs.iter().map(|(id, _)| *id).collect();

        let fetched = self
            .reels
            .recent_by_categories(&category_ids, limit * OVERFETCH, excluded)
            .await?;

        let product_ids: Vec<Uuid> = fetched.iter().map(|r| r.product_id).collect();
        let facts = self.reels.batch_product_facts(&product_ids).await?;

        let mut candidates = visible_candidates(fetched, &facts, TierSource::Category);

        // Strongest preference first, then recency
        candidates.sort_by(|a, b| {
            let score_a = a.category_id().and_then(|c| affinity.get(&c)).copied().unwrap_or(0.0);
            let score_b = b.category_id().and_then(|c| affinity.get(&c)).copied().unwrap_or(0.0);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.reel.created_at.cmp(&a.reel.created_at))
        });

        let mut per_category: HashMap<Uuid, usize> = HashMap::new();
        let mut selected = Vec::new();

        for candidate in candidates {
            if let Some(category_id) = candidate.category_id() {
                let count = per_category.entry(category_id).or_insert(0);
                if *count >= MAX_PER_CATEGORY {
                    continue;
                }
                *count += 1;
            }
            selected.push(candidate);
            if selected.len() >= limit as usize {
                break;
            }
        }

        Ok(selected)
    }
}
