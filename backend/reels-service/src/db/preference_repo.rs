//! Category preference repository.
//!
//! Scores are clamped to [0, 1] inside the upsert statement, so no
//! read-modify-write cycle can push them out of range under concurrency.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::CategoryPreference;

const PREFERENCE_COLUMNS: &str =
    "user_id, category_id, preference_score, interaction_count, last_interaction_at";

#[derive(Clone)]
pub struct PreferenceRepo {
    pool: PgPool,
}

impl PreferenceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add `delta` to the stored score (creating the row lazily), clamp
    /// to [0, 1], bump the interaction count and stamp the time.
    pub async fn apply_delta(&self, user_id: Uuid, category_id: Uuid, delta: f64) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_category_preferences \
                 (user_id, category_id, preference_score, interaction_count, last_interaction_at) \
             VALUES ($1, $2, LEAST(1.0, GREATEST(0.0, $3)), 1, NOW()) \
             ON CONFLICT (user_id, category_id) DO UPDATE \
             SET preference_score = LEAST(1.0, GREATEST(0.0, \
                     user_category_preferences.preference_score + $3)), \
                 interaction_count = user_category_preferences.interaction_count + 1, \
                 last_interaction_at = NOW()",
        )
        .bind(user_id)
        .bind(category_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All stored preferences for a user, strongest first.
    pub async fn preferences_for(&self, user_id: Uuid) -> Result<Vec<CategoryPreference>> {
        let prefs = sqlx::query_as::<_, CategoryPreference>(&format!(
            "SELECT {PREFERENCE_COLUMNS} FROM user_category_preferences \
             WHERE user_id = $1 ORDER BY preference_score DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(prefs)
    }

    /// Users with any interaction since `cutoff`, for the periodic
    /// recompute job.
    pub async fn users_active_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        let user_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM ( \
                 SELECT user_id FROM reel_likes WHERE created_at >= $1 \
                 UNION ALL \
                 SELECT user_id FROM reel_views WHERE viewed_at >= $1 \
             ) active \
             LIMIT $2",
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(user_ids)
    }

    /// Per-category like counts for a user, over the linked products.
    pub async fn like_counts_by_category(&self, user_id: Uuid) -> Result<Vec<(Uuid, i64)>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT p.category_id, COUNT(*) \
             FROM reel_likes rl \
             JOIN reels r ON r.id = rl.reel_id \
             JOIN products p ON p.id = r.product_id \
             WHERE rl.user_id = $1 AND p.category_id IS NOT NULL \
             GROUP BY p.category_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Per-category view counts for a user, over the linked products.
    pub async fn view_counts_by_category(&self, user_id: Uuid) -> Result<Vec<(Uuid, i64)>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT p.category_id, COUNT(*) \
             FROM reel_views rv \
             JOIN reels r ON r.id = rv.reel_id \
             JOIN products p ON p.id = r.product_id \
             WHERE rv.user_id = $1 AND p.category_id IS NOT NULL \
             GROUP BY p.category_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
