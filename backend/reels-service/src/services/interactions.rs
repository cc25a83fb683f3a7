//! Interaction write path.
//!
//! Each operation is one logical unit: store write, atomic counter
//! update, category preference delta, cache invalidation. Duplicate
//! likes/follows surface as Conflict so callers can render "already
//! liked"; a cache that is down only costs freshness, never the write.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::FeedCache;
use crate::db::{InteractionRepo, PreferenceRepo, ReelRepo};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::Reel;

use super::scoring::{view_preference_delta, LIKE_DELTA, ORDER_DELTA, UNLIKE_DELTA};

/// Result of a view write.
#[derive(Debug, Clone, Copy)]
pub struct ViewOutcome {
    /// Whether this view counted toward the reel's view counter.
    pub fresh_view: bool,
    pub views_count: i64,
}

pub struct InteractionService {
    reels: Arc<ReelRepo>,
    interactions: Arc<InteractionRepo>,
    preferences: Arc<PreferenceRepo>,
    cache: FeedCache,
    view_history_cap: i64,
}

impl InteractionService {
    pub fn new(
        reels: Arc<ReelRepo>,
        interactions: Arc<InteractionRepo>,
        preferences: Arc<PreferenceRepo>,
        cache: FeedCache,
        view_history_cap: i64,
    ) -> Self {
        Self {
            reels,
            interactions,
            preferences,
            cache,
            view_history_cap,
        }
    }

    /// Like a reel. Errors with Conflict when the like already exists
    /// (including the loser of a concurrent race); returns the new like
    /// count otherwise.
    pub async fn record_like(&self, user_id: Uuid, reel_id: Uuid) -> Result<i64> {
        self.ensure_user(user_id).await?;
        let reel = self.require_reel(reel_id).await?;

        let created = self.interactions.insert_like(user_id, reel_id).await?;
        if !created {
            return Err(AppError::Conflict("reel already liked".to_string()));
        }

        let likes_count = self.reels.increment_likes(reel_id).await?;
        self.bump_preference(user_id, &reel, LIKE_DELTA).await;
        self.invalidate_user_cache(user_id).await;
        metrics::record_interaction("like");

        Ok(likes_count)
    }

    /// Remove a like. Errors with NotFound when there is nothing to
    /// remove; the counter floors at zero either way.
    pub async fn record_unlike(&self, user_id: Uuid, reel_id: Uuid) -> Result<i64> {
        self.ensure_user(user_id).await?;
        let reel = self.require_reel(reel_id).await?;

        let removed = self.interactions.delete_like(user_id, reel_id).await?;
        if !removed {
            return Err(AppError::NotFound("like".to_string()));
        }

        let likes_count = self.reels.decrement_likes(reel_id).await?;
        self.bump_preference(user_id, &reel, UNLIKE_DELTA).await;
        self.invalidate_user_cache(user_id).await;
        metrics::record_interaction("unlike");

        Ok(likes_count)
    }

    /// Record a view. The view row is always upserted; the counter only
    /// moves for a fresh view: first ever, or a rewatch whose duration
    /// grew by at least 25%.
    pub async fn record_view(
        &self,
        user_id: Uuid,
        reel_id: Uuid,
        duration_seconds: Option<i32>,
    ) -> Result<ViewOutcome> {
        self.ensure_user(user_id).await?;
        let reel = self.require_reel(reel_id).await?;

        let upsert = self
            .interactions
            .upsert_view(user_id, reel_id, duration_seconds)
            .await?;

        let fresh_view = is_fresh_view(upsert.existed, upsert.previous_duration, duration_seconds);

        let views_count = if fresh_view {
            self.reels.increment_views(reel_id).await?
        } else {
            reel.views_count
        };

        let evicted = self
            .interactions
            .trim_view_history(user_id, self.view_history_cap)
            .await?;
        if evicted > 0 {
            debug!(user_id = %user_id, evicted, "trimmed view history");
        }

        let delta = view_preference_delta(duration_seconds, reel.duration_seconds);
        self.bump_preference(user_id, &reel, delta).await;
        metrics::record_interaction("view");

        Ok(ViewOutcome {
            fresh_view,
            views_count,
        })
    }

    /// Record a share; re-sharing refreshes the timestamp without
    /// touching the counter. Returns the current share count.
    pub async fn record_share(&self, user_id: Uuid, reel_id: Uuid) -> Result<i64> {
        self.ensure_user(user_id).await?;
        let reel = self.require_reel(reel_id).await?;

        let (_, created) = self.interactions.create_share(user_id, reel_id).await?;
        let shares_count = if created {
            self.reels.increment_shares(reel_id).await?
        } else {
            reel.shares_count
        };
        metrics::record_interaction("share");

        Ok(shares_count)
    }

    /// Follow a merchant. Duplicate follow is a Conflict, an unknown
    /// merchant a NotFound.
    pub async fn follow(&self, user_id: Uuid, merchant_id: Uuid) -> Result<()> {
        self.ensure_user(user_id).await?;
        if !self.interactions.merchant_exists(merchant_id).await? {
            return Err(AppError::NotFound("merchant".to_string()));
        }

        let created = self.interactions.insert_follow(user_id, merchant_id).await?;
        if !created {
            return Err(AppError::Conflict("already following".to_string()));
        }

        self.invalidate_user_cache(user_id).await;
        metrics::record_interaction("follow");
        Ok(())
    }

    /// Unfollow. Absent relation is NotFound.
    pub async fn unfollow(&self, user_id: Uuid, merchant_id: Uuid) -> Result<()> {
        self.ensure_user(user_id).await?;

        let removed = self.interactions.delete_follow(user_id, merchant_id).await?;
        if !removed {
            return Err(AppError::NotFound("follow".to_string()));
        }

        self.invalidate_user_cache(user_id).await;
        metrics::record_interaction("unfollow");
        Ok(())
    }

    /// External purchase signal: strengthens the buyer's affinity for
    /// the product's category. No counters, no cache invalidation.
    pub async fn record_order_signal(&self, user_id: Uuid, product_id: Uuid) -> Result<()> {
        if let Some(category_id) = self.reels.category_of(product_id).await? {
            self.preferences
                .apply_delta(user_id, category_id, ORDER_DELTA)
                .await?;
        }
        Ok(())
    }

    /// New-reel publication hook: trending and recommended pages may now
    /// be stale everywhere, so the whole discovery index goes.
    pub async fn on_reel_published(&self, reel_id: Uuid) {
        debug!(reel_id = %reel_id, "invalidating discovery caches for new reel");
        if let Err(e) = self.cache.invalidate_discovery().await {
            warn!(error = %e, "discovery cache invalidation failed");
        }
    }

    async fn require_reel(&self, reel_id: Uuid) -> Result<Reel> {
        self.reels
            .get_reel(reel_id)
            .await?
            .ok_or_else(|| AppError::NotFound("reel".to_string()))
    }

    async fn ensure_user(&self, user_id: Uuid) -> Result<()> {
        self.interactions
            .account_created_at(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("user".to_string()))
    }

    /// Preference updates ride along with interactions; losing one to a
    /// transient error must not fail the write itself.
    async fn bump_preference(&self, user_id: Uuid, reel: &Reel, delta: f64) {
        let category_id = match self.reels.category_of(reel.product_id).await {
            Ok(Some(category_id)) => category_id,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "category lookup failed, skipping preference update");
                return;
            }
        };

        if let Err(e) = self
            .preferences
            .apply_delta(user_id, category_id, delta)
            .await
        {
            warn!(error = %e, "preference update failed");
        }
    }

    async fn invalidate_user_cache(&self, user_id: Uuid) {
        if let Err(e) = self.cache.invalidate_user(user_id).await {
            warn!(user_id = %user_id, error = %e, "user cache invalidation failed");
        }
    }
}

/// First view, or a rewatch whose duration grew by at least 25%.
fn is_fresh_view(existed: bool, previous: Option<i32>, new: Option<i32>) -> bool {
    if !existed {
        return true;
    }
    match new {
        Some(new) => {
            let previous = previous.unwrap_or(0);
            new > previous && new as f64 >= previous as f64 * 1.25
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_view_is_fresh() {
        assert!(is_fresh_view(false, None, None));
        assert!(is_fresh_view(false, None, Some(10)));
    }

    #[test]
    fn test_rewatch_without_duration_is_not_fresh() {
        assert!(!is_fresh_view(true, Some(10), None));
        assert!(!is_fresh_view(true, None, None));
    }

    #[test]
    fn test_rewatch_duration_increase_threshold() {
        // 25% over 40s is 50s
        assert!(is_fresh_view(true, Some(40), Some(50)));
        assert!(!is_fresh_view(true, Some(40), Some(49)));
        assert!(!is_fresh_view(true, Some(40), Some(40)));
        // First measured duration on a previously untimed view
        assert!(is_fresh_view(true, None, Some(5)));
        assert!(!is_fresh_view(true, None, Some(0)));
    }
}
