//! Redis-backed feed page cache.
//!
//! Values are ordered reel-ID lists plus feed metadata, never full reel
//! objects: pages are rehydrated from Postgres on every hit so counter
//! updates are not served stale.
//!
//! Cache keys:
//! - `reels:feed:recommended:{user_id}:{page}:{page_size}`
//! - `reels:feed:following:{user_id}:{page}:{page_size}`
//! - `reels:feed:trending:{window}:{page}:{page_size}`
//!
//! Invalidation goes through explicit secondary index sets instead of a
//! SCAN over key patterns:
//! - `reels:feed:index:user:{user_id}` → that user's entry keys
//! - `reels:feed:index:discovery` → every recommended/trending entry key
//!
//! Index sets get a TTL comfortably above the entry TTL, so orphaned
//! members age out on their own.

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{FeedInfo, TimeWindow};

/// Extra lifetime granted to index sets beyond their entries.
const INDEX_TTL_SLACK_SECS: u64 = 120;

/// Cached feed page: ordered IDs plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedFeedPage {
    pub reel_ids: Vec<Uuid>,
    pub feed_info: FeedInfo,
    pub cached_at: DateTime<Utc>,
}

/// Cache key for one feed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKey {
    Recommended {
        user_id: Uuid,
        page: u32,
        page_size: u32,
    },
    Following {
        user_id: Uuid,
        page: u32,
        page_size: u32,
    },
    Trending {
        window: TimeWindow,
        page: u32,
        page_size: u32,
    },
}

impl FeedKey {
    pub fn redis_key(&self) -> String {
        match self {
            Self::Recommended {
                user_id,
                page,
                page_size,
            } => format!("reels:feed:recommended:{}:{}:{}", user_id, page, page_size),
            Self::Following {
                user_id,
                page,
                page_size,
            } => format!("reels:feed:following:{}:{}:{}", user_id, page, page_size),
            Self::Trending {
                window,
                page,
                page_size,
            } => format!("reels:feed:trending:{}:{}:{}", window, page, page_size),
        }
    }

    /// Index sets this key must be registered in.
    fn index_keys(&self) -> Vec<String> {
        match self {
            Self::Recommended { user_id, .. } => vec![
                user_index_key(*user_id),
                discovery_index_key(),
            ],
            Self::Following { user_id, .. } => vec![user_index_key(*user_id)],
            Self::Trending { .. } => vec![discovery_index_key()],
        }
    }
}

fn user_index_key(user_id: Uuid) -> String {
    format!("reels:feed:index:user:{}", user_id)
}

fn discovery_index_key() -> String {
    "reels:feed:index:discovery".to_string()
}

/// Feed page cache over a shared Redis connection.
///
/// Every method returns `Err` on Redis trouble; callers treat that as a
/// miss and recompute (the cache is an optimization, not a source of
/// truth).
#[derive(Clone)]
pub struct FeedCache {
    conn: ConnectionManager,
    feed_ttl_secs: u64,
    trending_ttl_secs: u64,
}

impl FeedCache {
    pub async fn connect(
        redis_url: &str,
        feed_ttl_secs: u64,
        trending_ttl_secs: u64,
    ) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            feed_ttl_secs,
            trending_ttl_secs,
        })
    }

    /// Connection health check, used by the readiness probe.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    pub async fn get_page(&self, key: &FeedKey) -> Result<Option<CachedFeedPage>> {
        let mut conn = self.conn.clone();
        let redis_key = key.redis_key();

        let value: Option<String> = conn.get(&redis_key).await?;
        match value {
            Some(json) => match serde_json::from_str::<CachedFeedPage>(&json) {
                Ok(page) => {
                    debug!(key = %redis_key, "feed cache hit");
                    Ok(Some(page))
                }
                Err(e) => {
                    // A malformed entry is as good as a miss
                    debug!(key = %redis_key, error = %e, "discarding undecodable cache entry");
                    Ok(None)
                }
            },
            None => {
                debug!(key = %redis_key, "feed cache miss");
                Ok(None)
            }
        }
    }

    /// Write-through: store the page and register its key in the
    /// relevant index sets.
    pub async fn put_page(&self, key: &FeedKey, page: &CachedFeedPage) -> Result<()> {
        let mut conn = self.conn.clone();
        let redis_key = key.redis_key();
        let ttl = match key {
            FeedKey::Trending { .. } => self.trending_ttl_secs,
            _ => self.feed_ttl_secs,
        };

        let json = serde_json::to_string(page)
            .map_err(|e| crate::error::AppError::Internal(format!("cache serialization: {e}")))?;

        let _: () = conn.set_ex(&redis_key, json, ttl).await?;

        for index in key.index_keys() {
            let _: () = conn.sadd(&index, &redis_key).await?;
            let _: () = conn
                .expire(&index, (ttl + INDEX_TTL_SLACK_SECS) as i64)
                .await?;
        }

        debug!(key = %redis_key, ttl_secs = ttl, "cached feed page");
        Ok(())
    }

    /// Drop all cached pages for one user (all feed types, all pages).
    /// Direct index lookup, no key scanning.
    pub async fn invalidate_user(&self, user_id: Uuid) -> Result<u64> {
        self.invalidate_index(&user_index_key(user_id)).await
    }

    /// Drop every recommended/trending page. Called on new-reel
    /// publication; deliberately broad.
    pub async fn invalidate_discovery(&self) -> Result<u64> {
        self.invalidate_index(&discovery_index_key()).await
    }

    async fn invalidate_index(&self, index_key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();

        let members: Vec<String> = conn.smembers(index_key).await?;
        let mut deleted = 0u64;

        if !members.is_empty() {
            deleted = conn.del(&members).await?;
        }
        let _: () = conn.del(index_key).await?;

        if deleted > 0 {
            debug!(index = %index_key, entries = deleted, "invalidated feed cache entries");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_key_format() {
        let user_id = Uuid::nil();
        let key = FeedKey::Recommended {
            user_id,
            page: 1,
            page_size: 20,
        };
        assert_eq!(
            key.redis_key(),
            format!("reels:feed:recommended:{}:1:20", user_id)
        );

        let key = FeedKey::Trending {
            window: TimeWindow::SevenDays,
            page: 2,
            page_size: 10,
        };
        assert_eq!(key.redis_key(), "reels:feed:trending:7d:2:10");
    }

    #[test]
    fn test_index_membership() {
        let user_id = Uuid::nil();

        let recommended = FeedKey::Recommended {
            user_id,
            page: 1,
            page_size: 20,
        };
        let indexes = recommended.index_keys();
        assert!(indexes.contains(&user_index_key(user_id)));
        assert!(indexes.contains(&discovery_index_key()));

        let following = FeedKey::Following {
            user_id,
            page: 1,
            page_size: 20,
        };
        assert_eq!(following.index_keys(), vec![user_index_key(user_id)]);

        let trending = FeedKey::Trending {
            window: TimeWindow::TwentyFourHours,
            page: 1,
            page_size: 20,
        };
        assert_eq!(trending.index_keys(), vec![discovery_index_key()]);
    }

    #[test]
    fn test_cached_page_round_trip() {
        let page = CachedFeedPage {
            reel_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            feed_info: FeedInfo::new(
                "recommended",
                vec![crate::models::TierSource::Followed],
                Utc::now(),
            ),
            cached_at: Utc::now(),
        };

        let json = serde_json::to_string(&page).unwrap();
        let decoded: CachedFeedPage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.reel_ids, page.reel_ids);
        assert_eq!(decoded.feed_info.feed_type, "recommended");
    }
}
