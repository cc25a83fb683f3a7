//! Interaction repository: likes, views, shares, merchant follows.
//!
//! Idempotency is enforced by unique constraints plus `ON CONFLICT`
//! handling, so two concurrent likes from the same user resolve to a
//! single row and the loser surfaces as "already exists" rather than a
//! constraint error.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{MerchantFollow, ReelLike, ReelShare, ReelView};

/// Outcome of a view upsert. The caller decides whether the view counts
/// as fresh; this struct only reports what was stored before.
#[derive(Debug, Clone, Copy)]
pub struct ViewUpsert {
    pub existed: bool,
    pub previous_duration: Option<i32>,
}

#[derive(Clone)]
pub struct InteractionRepo {
    pool: PgPool,
}

impl InteractionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========== Likes ==========

    /// Idempotent create; returns true if a new row was inserted.
    pub async fn insert_like(&self, user_id: Uuid, reel_id: Uuid) -> Result<bool> {
        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO reel_likes (user_id, reel_id, created_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id, reel_id) DO NOTHING \
             RETURNING reel_id",
        )
        .bind(user_id)
        .bind(reel_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }

    /// Idempotent delete; returns true if a row was removed.
    pub async fn delete_like(&self, user_id: Uuid, reel_id: Uuid) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM reel_likes WHERE user_id = $1 AND reel_id = $2")
            .bind(user_id)
            .bind(reel_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    pub async fn has_liked(&self, user_id: Uuid, reel_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reel_likes WHERE user_id = $1 AND reel_id = $2)",
        )
        .bind(user_id)
        .bind(reel_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    pub async fn likes_for(&self, user_id: Uuid) -> Result<Vec<ReelLike>> {
        let likes = sqlx::query_as::<_, ReelLike>(
            "SELECT user_id, reel_id, created_at FROM reel_likes \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(likes)
    }

    /// Batch is-liked lookup for a feed page.
    pub async fn batch_check_liked(
        &self,
        user_id: Uuid,
        reel_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, bool>> {
        if reel_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let liked: Vec<Uuid> = sqlx::query_scalar(
            "SELECT reel_id FROM reel_likes WHERE user_id = $1 AND reel_id = ANY($2)",
        )
        .bind(user_id)
        .bind(reel_ids)
        .fetch_all(&self.pool)
        .await?;

        let liked_set: HashSet<Uuid> = liked.into_iter().collect();
        Ok(reel_ids
            .iter()
            .map(|id| (*id, liked_set.contains(id)))
            .collect())
    }

    /// Reels liked by users who share at least `min_common` likes with
    /// the target user, excluding everything the target already liked,
    /// ordered by like-count among those users, then recency.
    pub async fn similar_user_liked_reels(
        &self,
        user_id: Uuid,
        liked_reel_ids: &[Uuid],
        min_common: i64,
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Uuid>> {
        if liked_reel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT rl.reel_id \
             FROM reel_likes rl \
             WHERE rl.user_id IN ( \
                 SELECT user_id FROM reel_likes \
                 WHERE reel_id = ANY($2) AND user_id <> $1 \
                 GROUP BY user_id \
                 HAVING COUNT(*) >= $3 \
             ) \
               AND NOT (rl.reel_id = ANY($2)) \
               AND NOT (rl.reel_id = ANY($4)) \
             GROUP BY rl.reel_id \
             ORDER BY COUNT(*) DESC, MAX(rl.created_at) DESC \
             LIMIT $5",
        )
        .bind(user_id)
        .bind(liked_reel_ids)
        .bind(min_common)
        .bind(excluded)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    // ========== Views ==========

    /// Upsert the (user, reel) view row: `viewed_at` is always refreshed,
    /// the duration only moves forward when a new one is supplied.
    pub async fn upsert_view(
        &self,
        user_id: Uuid,
        reel_id: Uuid,
        duration_seconds: Option<i32>,
    ) -> Result<ViewUpsert> {
        let previous: Option<Option<i32>> = sqlx::query_scalar(
            "SELECT view_duration FROM reel_views WHERE user_id = $1 AND reel_id = $2",
        )
        .bind(user_id)
        .bind(reel_id)
        .fetch_optional(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO reel_views (user_id, reel_id, viewed_at, view_duration) \
             VALUES ($1, $2, NOW(), $3) \
             ON CONFLICT (user_id, reel_id) DO UPDATE \
             SET viewed_at = NOW(), \
                 view_duration = COALESCE(EXCLUDED.view_duration, reel_views.view_duration)",
        )
        .bind(user_id)
        .bind(reel_id)
        .bind(duration_seconds)
        .execute(&self.pool)
        .await?;

        Ok(ViewUpsert {
            existed: previous.is_some(),
            previous_duration: previous.flatten(),
        })
    }

    /// Keep only the most recent `cap` view rows for the user; evicts the
    /// oldest so the interaction history stays bounded without a
    /// separate retention job. Returns the number of evicted rows.
    pub async fn trim_view_history(&self, user_id: Uuid, cap: i64) -> Result<u64> {
        let evicted = sqlx::query(
            "DELETE FROM reel_views \
             WHERE user_id = $1 \
               AND reel_id NOT IN ( \
                 SELECT reel_id FROM reel_views \
                 WHERE user_id = $1 \
                 ORDER BY viewed_at DESC \
                 LIMIT $2 \
             )",
        )
        .bind(user_id)
        .bind(cap)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(evicted)
    }

    /// The user's view rows for the given reels.
    pub async fn views_for(&self, user_id: Uuid, reel_ids: &[Uuid]) -> Result<Vec<ReelView>> {
        if reel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let views = sqlx::query_as::<_, ReelView>(
            "SELECT user_id, reel_id, viewed_at, view_duration FROM reel_views \
             WHERE user_id = $1 AND reel_id = ANY($2)",
        )
        .bind(user_id)
        .bind(reel_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(views)
    }

    // ========== Shares ==========

    /// Upsert the share row (re-sharing refreshes `shared_at`).
    /// Returns `(share, was_created)`.
    pub async fn create_share(&self, user_id: Uuid, reel_id: Uuid) -> Result<(ReelShare, bool)> {
        let existed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reel_shares WHERE user_id = $1 AND reel_id = $2)",
        )
        .bind(user_id)
        .bind(reel_id)
        .fetch_one(&self.pool)
        .await?;

        let share = sqlx::query_as::<_, ReelShare>(
            "INSERT INTO reel_shares (user_id, reel_id, shared_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id, reel_id) DO UPDATE SET shared_at = NOW() \
             RETURNING user_id, reel_id, shared_at",
        )
        .bind(user_id)
        .bind(reel_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((share, !existed))
    }

    // ========== Follows ==========

    /// Idempotent create follow; returns true if a new row was inserted.
    pub async fn insert_follow(&self, user_id: Uuid, merchant_id: Uuid) -> Result<bool> {
        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO merchant_follows (user_id, merchant_id, followed_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id, merchant_id) DO NOTHING \
             RETURNING merchant_id",
        )
        .bind(user_id)
        .bind(merchant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }

    /// Idempotent delete; returns true if a row was removed.
    pub async fn delete_follow(&self, user_id: Uuid, merchant_id: Uuid) -> Result<bool> {
        let affected =
            sqlx::query("DELETE FROM merchant_follows WHERE user_id = $1 AND merchant_id = $2")
                .bind(user_id)
                .bind(merchant_id)
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(affected > 0)
    }

    pub async fn merchant_exists(&self, merchant_id: Uuid) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM merchants WHERE id = $1)")
                .bind(merchant_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    pub async fn is_following(&self, user_id: Uuid, merchant_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM merchant_follows WHERE user_id = $1 AND merchant_id = $2)",
        )
        .bind(user_id)
        .bind(merchant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    pub async fn follows_for(&self, user_id: Uuid) -> Result<Vec<MerchantFollow>> {
        let follows = sqlx::query_as::<_, MerchantFollow>(
            "SELECT user_id, merchant_id, followed_at FROM merchant_follows \
             WHERE user_id = $1 ORDER BY followed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(follows)
    }

    // ========== Cold-start inputs ==========

    /// Total likes + views + follows for the cold-start trigger.
    pub async fn interaction_total(&self, user_id: Uuid) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM reel_likes WHERE user_id = $1) \
                  + (SELECT COUNT(*) FROM reel_views WHERE user_id = $1) \
                  + (SELECT COUNT(*) FROM merchant_follows WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Account creation timestamp; `None` when the user does not exist.
    pub async fn account_created_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let created_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT created_at FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(created_at)
    }
}
