//! Feed generation pipelines.
//!
//! Read path: cache lookup → cold-start decision → tier retrieval →
//! context scoring → diversity selection → pagination → write-through
//! cache. Cache trouble never fails a request; the page is recomputed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CachedFeedPage, FeedCache, FeedKey};
use crate::config::FeedConfig;
use crate::db::{InteractionRepo, PreferenceRepo, ReelRepo};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{FeedInfo, FeedReel, Reel, TierSource, TimeWindow};

use super::diversity::{select_diverse, DiversityCaps};
use super::retrieval::{CandidateTier, RetrievalLayer};
use super::scoring::{build_context, effective_score, final_score};
use super::trending::rank_by_trending;
use super::visibility::visible_reels;
use super::{Candidate, ScoredCandidate};

/// Cold-start page mix.
const COLD_START_TRENDING_SHARE: f64 = 0.7;
const COLD_START_CATEGORY_SHARE: f64 = 0.3;

/// One page of feed output.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub reels: Vec<FeedReel>,
    pub feed_info: FeedInfo,
}

pub struct FeedEngine {
    reels: Arc<ReelRepo>,
    interactions: Arc<InteractionRepo>,
    preferences: Arc<PreferenceRepo>,
    retrieval: RetrievalLayer,
    cache: FeedCache,
    config: FeedConfig,
}

impl FeedEngine {
    pub fn new(
        reels: Arc<ReelRepo>,
        interactions: Arc<InteractionRepo>,
        preferences: Arc<PreferenceRepo>,
        cache: FeedCache,
        config: FeedConfig,
    ) -> Self {
        let retrieval = RetrievalLayer::new(
            reels.clone(),
            interactions.clone(),
            preferences.clone(),
            config.trending_candidate_days,
        );

        Self {
            reels,
            interactions,
            preferences,
            retrieval,
            cache,
            config,
        }
    }

    /// Personalized feed for one user.
    pub async fn get_personalized_feed(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<FeedPage> {
        validate_paging(page, page_size)?;

        let key = FeedKey::Recommended {
            user_id,
            page,
            page_size,
        };
        if let Some(cached) = self.cached_page(&key).await {
            return self.hydrate(cached, Some(user_id)).await;
        }

        // Unknown users get a typed error, not an empty feed
        let created_at = self
            .interactions
            .account_created_at(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;

        let now = Utc::now();
        let account_age_days = (now - created_at).num_days();
        let interaction_total = self.interactions.interaction_total(user_id).await?;

        let cold_start = is_cold_start(interaction_total, account_age_days, &self.config);

        let started = std::time::Instant::now();
        let page_out = if cold_start {
            debug!(
                user_id = %user_id,
                interactions = interaction_total,
                account_age_days,
                "serving cold-start feed"
            );
            self.cold_start_feed(user_id, page, page_size).await?
        } else {
            self.full_pipeline_feed(user_id, page, page_size).await?
        };

        metrics::observe_generation("recommended", started.elapsed());
        metrics::record_feed_request(
            "recommended",
            page_out
                .feed_info
                .feed_variant
                .as_deref()
                .unwrap_or("full"),
        );

        self.store_page(&key, &page_out).await;
        Ok(page_out)
    }

    /// Full tiered pipeline: retrieval → scoring → diversity → page.
    async fn full_pipeline_feed(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<FeedPage> {
        let now = Utc::now();
        let target = (page as usize) * (page_size as usize);

        let (pool, tiers_used) = self.retrieval.gather(user_id, target).await?;

        // Batch context inputs: one query each per request
        let followed: HashSet<Uuid> = self
            .interactions
            .follows_for(user_id)
            .await?
            .iter()
            .map(|follow| follow.merchant_id)
            .collect();

        let preferences: HashMap<Uuid, f64> = self
            .preferences
            .preferences_for(user_id)
            .await?
            .iter()
            .map(|p| (p.category_id, effective_score(p, now)))
            .collect();

        let pool_ids: Vec<Uuid> = pool.iter().map(|c| c.reel.id).collect();
        let durations: HashMap<Uuid, i32> = self
            .interactions
            .views_for(user_id, &pool_ids)
            .await?
            .into_iter()
            .filter_map(|view| view.view_duration.map(|d| (view.reel_id, d)))
            .collect();

        let scored: Vec<ScoredCandidate> = pool
            .into_iter()
            .map(|candidate| {
                let decayed = candidate
                    .category_id()
                    .and_then(|c| preferences.get(&c))
                    .copied()
                    .unwrap_or(0.0);
                let ctx = build_context(
                    &candidate,
                    followed.contains(&candidate.reel.merchant_id),
                    decayed,
                    durations.get(&candidate.reel.id).copied(),
                    now,
                );
                ScoredCandidate {
                    score: final_score(&ctx),
                    candidate,
                }
            })
            .collect();

        let selected = select_diverse(scored, target, DiversityCaps::default());
        let page_items = paginate(selected, page, page_size);

        info!(
            user_id = %user_id,
            page,
            returned = page_items.len(),
            tiers = ?tiers_used,
            "personalized feed generated"
        );

        let candidates: Vec<Candidate> = page_items.into_iter().map(|s| s.candidate).collect();
        self.build_page(
            candidates,
            FeedInfo::new("recommended", tiers_used, now),
            Some(user_id),
        )
        .await
    }

    /// Simplified pipeline for users with too little history: 70%
    /// trending, 30% category (general when no preferences), general
    /// fill. Skips the final scorer and diversity ranker so a near-empty
    /// preference vector cannot dominate the page.
    async fn cold_start_feed(&self, user_id: Uuid, page: u32, page_size: u32) -> Result<FeedPage> {
        let now = Utc::now();
        let target = (page as usize) * (page_size as usize);

        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut pool: Vec<Candidate> = Vec::new();
        let mut tiers_used: Vec<TierSource> = Vec::new();

        let trending_limit = ((target as f64 * COLD_START_TRENDING_SHARE).ceil() as i64).max(1);
        let category_limit = ((target as f64 * COLD_START_CATEGORY_SHARE).ceil() as i64).max(1);

        for (source, limit) in [
            (TierSource::Trending, trending_limit),
            (TierSource::Category, category_limit),
        ] {
            let tier = match self.retrieval.tier(source) {
                Some(tier) => tier,
                None => continue,
            };
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
                        tiers_used.push(source);
                    }
                }
                Err(e) => warn!(tier = %source, error = %e, "cold-start tier failed, degrading"),
            }
        }

        if pool.len() < target {
            let missing = (target - pool.len()) as i64;
            let excluded: Vec<Uuid> = seen.iter().copied().collect();
            match self
                .retrieval
                .general_tier()
                .retrieve(user_id, missing, &excluded)
                .await
            {
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
                Err(e) => warn!(error = %e, "cold-start general fill failed"),
            }
        }

        let start = ((page - 1) as usize) * (page_size as usize);
        let page_items: Vec<Candidate> = pool
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        self.build_page(
            page_items,
            FeedInfo::new("recommended", tiers_used, now).cold_start(),
            Some(user_id),
        )
        .await
    }

    /// Public trending feed. Candidates always come from the last
    /// `trending_candidate_days`; the requested window only moves the
    /// score cutoff.
    pub async fn get_trending_feed(
        &self,
        page: u32,
        page_size: u32,
        window: TimeWindow,
    ) -> Result<FeedPage> {
        validate_paging(page, page_size)?;

        let key = FeedKey::Trending {
            window,
            page,
            page_size,
        };
        if let Some(cached) = self.cached_page(&key).await {
            return self.hydrate(cached, None).await;
        }

        let started = std::time::Instant::now();
        let now = Utc::now();
        let cutoff = now - Duration::days(self.config.trending_candidate_days);
        let fetch_limit = ((page as i64) * (page_size as i64) * 3).max(60);

        let fetched = self.reels.created_since(cutoff, fetch_limit, &[]).await?;
        let product_ids: Vec<Uuid> = fetched.iter().map(|r| r.product_id).collect();
        let facts = self.reels.batch_product_facts(&product_ids).await?;

        let ranked = rank_by_trending(visible_reels(fetched, &facts), window.hours(), now);

        let start = ((page - 1) as usize) * (page_size as usize);
        let page_reels: Vec<Reel> = ranked
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        let candidates: Vec<Candidate> = page_reels
            .into_iter()
            .map(|reel| Candidate {
                facts: facts.get(&reel.product_id).cloned(),
                reel,
                source: TierSource::Trending,
            })
            .collect();

        metrics::observe_generation("trending", started.elapsed());
        metrics::record_feed_request("trending", "full");

        let page_out = self
            .build_page(
                candidates,
                FeedInfo::new("trending", vec![TierSource::Trending], now),
                None,
            )
            .await?;

        self.store_page(&key, &page_out).await;
        Ok(page_out)
    }

    /// Reels from the user's followed merchants, newest first.
    pub async fn get_followed_feed(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<FeedPage> {
        validate_paging(page, page_size)?;

        let key = FeedKey::Following {
            user_id,
            page,
            page_size,
        };
        if let Some(cached) = self.cached_page(&key).await {
            return self.hydrate(cached, Some(user_id)).await;
        }

        self.interactions
            .account_created_at(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;

        let now = Utc::now();
        let merchant_ids: Vec<Uuid> = self
            .interactions
            .follows_for(user_id)
            .await?
            .iter()
            .map(|follow| follow.merchant_id)
            .collect();

        let mut visible = Vec::new();
        if !merchant_ids.is_empty() {
            let fetch_limit = ((page as i64) * (page_size as i64) * 2).max(40);
            let fetched = self
                .reels
                .recent_by_merchants(&merchant_ids, fetch_limit, &[])
                .await?;
            let product_ids: Vec<Uuid> = fetched.iter().map(|r| r.product_id).collect();
            let facts = self.reels.batch_product_facts(&product_ids).await?;
            visible = visible_reels(fetched, &facts)
                .into_iter()
                .map(|reel| Candidate {
                    facts: facts.get(&reel.product_id).cloned(),
                    reel,
                    source: TierSource::Followed,
                })
                .collect();
        }

        let start = ((page - 1) as usize) * (page_size as usize);
        let page_items: Vec<Candidate> = visible
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        let tiers = if page_items.is_empty() {
            Vec::new()
        } else {
            vec![TierSource::Followed]
        };

        metrics::record_feed_request("following", "full");

        let page_out = self
            .build_page(page_items, FeedInfo::new("following", tiers, now), Some(user_id))
            .await?;

        self.store_page(&key, &page_out).await;
        Ok(page_out)
    }

    // ========== cache plumbing ==========

    /// Cache read that fails open: any Redis trouble is a miss.
    async fn cached_page(&self, key: &FeedKey) -> Option<CachedFeedPage> {
        match self.cache.get_page(key).await {
            Ok(Some(page)) => {
                metrics::record_cache_event("hit");
                Some(page)
            }
            Ok(None) => {
                metrics::record_cache_event("miss");
                None
            }
            Err(e) => {
                metrics::record_cache_event("error");
                warn!(error = %e, "feed cache read failed, recomputing");
                None
            }
        }
    }

    async fn store_page(&self, key: &FeedKey, page: &FeedPage) {
        let cached = CachedFeedPage {
            reel_ids: page.reels.iter().map(|r| r.reel_id).collect(),
            feed_info: page.feed_info.clone(),
            cached_at: Utc::now(),
        };
        if let Err(e) = self.cache.put_page(key, &cached).await {
            warn!(error = %e, "feed cache write failed, serving uncached");
        }
    }

    /// Rebuild a page from cached IDs. Reel objects always come from the
    /// primary store so counters are current.
    async fn hydrate(&self, cached: CachedFeedPage, user_id: Option<Uuid>) -> Result<FeedPage> {
        let fetched = self.reels.get_reels_by_ids(&cached.reel_ids).await?;
        let mut by_id: HashMap<Uuid, Reel> = fetched.into_iter().map(|r| (r.id, r)).collect();

        let ordered: Vec<Reel> = cached
            .reel_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();

        let product_ids: Vec<Uuid> = ordered.iter().map(|r| r.product_id).collect();
        let facts = self.reels.batch_product_facts(&product_ids).await?;

        let candidates: Vec<Candidate> = ordered
            .into_iter()
            .map(|reel| Candidate {
                facts: facts.get(&reel.product_id).cloned(),
                reel,
                source: TierSource::General,
            })
            .collect();

        self.build_page(candidates, cached.feed_info, user_id).await
    }

    /// Assemble response objects, resolving is-liked in one batch.
    async fn build_page(
        &self,
        candidates: Vec<Candidate>,
        feed_info: FeedInfo,
        user_id: Option<Uuid>,
    ) -> Result<FeedPage> {
        let liked = match user_id {
            Some(user_id) => {
                let ids: Vec<Uuid> = candidates.iter().map(|c| c.reel.id).collect();
                self.interactions.batch_check_liked(user_id, &ids).await?
            }
            None => HashMap::new(),
        };

        let reels = candidates
            .iter()
            .map(|c| {
                FeedReel::build(
                    &c.reel,
                    c.facts.as_ref(),
                    liked.get(&c.reel.id).copied().unwrap_or(false),
                )
            })
            .collect();

        Ok(FeedPage { reels, feed_info })
    }
}

/// Cold-start trigger: too little history, or too young an account.
pub fn is_cold_start(interaction_total: i64, account_age_days: i64, config: &FeedConfig) -> bool {
    interaction_total < config.cold_start_min_interactions
        || account_age_days < config.cold_start_min_account_days
}

fn validate_paging(page: u32, page_size: u32) -> Result<()> {
    if page == 0 {
        return Err(AppError::BadRequest("page starts at 1".to_string()));
    }
    if page_size == 0 || page_size > 100 {
        return Err(AppError::BadRequest(
            "page_size must be between 1 and 100".to_string(),
        ));
    }
    Ok(())
}

/// Slice the diversity-selected pool down to the requested page. Deep
/// pages shrink when content runs out.
fn paginate(selected: Vec<ScoredCandidate>, page: u32, page_size: u32) -> Vec<ScoredCandidate> {
    let start = ((page - 1) as usize) * (page_size as usize);
    selected
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_start_trigger() {
        let config = FeedConfig::default();
        // Too little history
        assert!(is_cold_start(2, 100, &config));
        // Too young an account, plenty of history
        assert!(is_cold_start(50, 1, &config));
        // Established user
        assert!(!is_cold_start(3, 7, &config));
    }

    #[test]
    fn test_validate_paging() {
        assert!(validate_paging(1, 20).is_ok());
        assert!(validate_paging(0, 20).is_err());
        assert!(validate_paging(1, 0).is_err());
        assert!(validate_paging(1, 101).is_err());
        assert!(validate_paging(3, 100).is_ok());
    }

    #[test]
    fn test_paginate_shrinks_past_end() {
        let selected: Vec<ScoredCandidate> = Vec::new();
        assert!(paginate(selected, 4, 20).is_empty());
    }
}
