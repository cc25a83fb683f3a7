//! Reel repository
//!
//! Candidate fetches deliberately filter only reel-level flags
//! (`deleted_at`, `is_active`) in SQL; product-level visibility is decided
//! in code after one batch facts query, so there are no hidden per-row
//! joins and no N+1 access patterns.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ApprovalState, ProductFacts, Reel};

const REEL_COLUMNS: &str = "id, merchant_id, product_id, description, video_url, thumbnail_url, \
     duration_seconds, views_count, likes_count, shares_count, is_active, created_at, deleted_at";

#[derive(Clone)]
pub struct ReelRepo {
    pool: PgPool,
}

impl ReelRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_reel(&self, reel_id: Uuid) -> Result<Option<Reel>> {
        let reel = sqlx::query_as::<_, Reel>(&format!(
            "SELECT {REEL_COLUMNS} FROM reels WHERE id = $1"
        ))
        .bind(reel_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reel)
    }

    /// Fetch reels by id. Order of the result is unspecified; callers
    /// that rehydrate cached pages re-sort by the cached id list.
    pub async fn get_reels_by_ids(&self, reel_ids: &[Uuid]) -> Result<Vec<Reel>> {
        if reel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let reels = sqlx::query_as::<_, Reel>(&format!(
            "SELECT {REEL_COLUMNS} FROM reels WHERE id = ANY($1)"
        ))
        .bind(reel_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(reels)
    }

    /// Newest candidate reels globally.
    pub async fn recent_candidates(&self, limit: i64, excluded: &[Uuid]) -> Result<Vec<Reel>> {
        let reels = sqlx::query_as::<_, Reel>(&format!(
            "SELECT {REEL_COLUMNS} FROM reels \
             WHERE deleted_at IS NULL AND is_active \
               AND NOT (id = ANY($1)) \
             ORDER BY created_at DESC \
             LIMIT $2"
        ))
        .bind(excluded)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reels)
    }

    /// Newest candidate reels owned by any of the given merchants.
    pub async fn recent_by_merchants(
        &self,
        merchant_ids: &[Uuid],
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Reel>> {
        if merchant_ids.is_empty() {
            return Ok(Vec::new());
        }

        let reels = sqlx::query_as::<_, Reel>(&format!(
            "SELECT {REEL_COLUMNS} FROM reels \
             WHERE deleted_at IS NULL AND is_active \
               AND merchant_id = ANY($1) \
               AND NOT (id = ANY($2)) \
             ORDER BY created_at DESC \
             LIMIT $3"
        ))
        .bind(merchant_ids)
        .bind(excluded)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reels)
    }

    /// Newest candidate reels whose linked product sits in one of the
    /// given categories.
    pub async fn recent_by_categories(
        &self,
        category_ids: &[Uuid],
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Reel>> {
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }

        let reels = sqlx::query_as::<_, Reel>(
            "SELECT r.id, r.merchant_id, r.product_id, r.description, r.video_url, \
                    r.thumbnail_url, r.duration_seconds, r.views_count, r.likes_count, \
                    r.shares_count, r.is_active, r.created_at, r.deleted_at \
             FROM reels r \
             JOIN products p ON p.id = r.product_id \
             WHERE r.deleted_at IS NULL AND r.is_active \
               AND p.category_id = ANY($1) \
               AND NOT (r.id = ANY($2)) \
             ORDER BY r.created_at DESC \
             LIMIT $3",
        )
        .bind(category_ids)
        .bind(excluded)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reels)
    }

    /// Candidate reels created since `cutoff`, newest first.
    pub async fn created_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
        excluded: &[Uuid],
    ) -> Result<Vec<Reel>> {
        let reels = sqlx::query_as::<_, Reel>(&format!(
            "SELECT {REEL_COLUMNS} FROM reels \
             WHERE deleted_at IS NULL AND is_active \
               AND created_at >= $1 \
               AND NOT (id = ANY($2)) \
             ORDER BY created_at DESC \
             LIMIT $3"
        ))
        .bind(cutoff)
        .bind(excluded)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reels)
    }

    /// One batch query for the product facts of a candidate set.
    pub async fn batch_product_facts(
        &self,
        product_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ProductFacts>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<
            _,
            (
                Uuid,           // product id
                Uuid,           // merchant id
                bool,           // deleted
                bool,           // active
                String,         // approval status
                i64,            // stock qty
                Option<Uuid>,   // category
            ),
        >(
            "SELECT id, merchant_id, deleted_at IS NOT NULL AS deleted, is_active, \
                    approval_status, stock_qty, category_id \
             FROM products \
             WHERE id = ANY($1)",
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;

        let facts = rows
            .into_iter()
            .map(
                |(product_id, merchant_id, deleted, active, approval, stock_qty, category_id)| {
                    (
                        product_id,
                        ProductFacts {
                            product_id,
                            merchant_id,
                            deleted,
                            active,
                            approval: ApprovalState::parse(&approval),
                            stock_qty,
                            category_id,
                        },
                    )
                },
            )
            .collect();

        Ok(facts)
    }

    /// Category of a single product, for the preference write path.
    pub async fn category_of(&self, product_id: Uuid) -> Result<Option<Uuid>> {
        let category: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT category_id FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(category.flatten())
    }

    // Counter updates run as single atomic statements so concurrent
    // writers on a popular reel never lose increments.

    pub async fn increment_views(&self, reel_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE reels SET views_count = views_count + 1 WHERE id = $1 RETURNING views_count",
        )
        .bind(reel_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn increment_likes(&self, reel_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE reels SET likes_count = likes_count + 1 WHERE id = $1 RETURNING likes_count",
        )
        .bind(reel_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Floors at zero; unliking an already-zero reel is a no-op.
    pub async fn decrement_likes(&self, reel_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE reels SET likes_count = GREATEST(likes_count - 1, 0) \
             WHERE id = $1 RETURNING likes_count",
        )
        .bind(reel_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn increment_shares(&self, reel_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE reels SET shares_count = shares_count + 1 WHERE id = $1 RETURNING shares_count",
        )
        .bind(reel_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
