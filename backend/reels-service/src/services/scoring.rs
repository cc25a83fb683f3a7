//! Final rank scoring.
//!
//! Combines tier membership, decayed category affinity, trending signal
//! and recency into one scalar per candidate. Scores order a single
//! response and are never stored.

use chrono::{DateTime, Utc};

use super::trending::score_reel;
use super::Candidate;
use crate::models::{CategoryPreference, TierSource};

// Tier weights
const FOLLOWED_WEIGHT: f64 = 10.0;
const FRESH_FOLLOWED_BONUS: f64 = 2.0;
const CATEGORY_WEIGHT: f64 = 5.0;
const TRENDING_WEIGHT: f64 = 3.0;
const SIMILAR_USER_WEIGHT: f64 = 2.0;

/// Trending contribution is always computed over a 24h window, whatever
/// window the trending tier itself used.
const CONTEXT_TRENDING_WINDOW_HOURS: f64 = 24.0;

const RECENCY_WINDOW_HOURS: f64 = 24.0;

// Preference deltas applied by the write path
pub const LIKE_DELTA: f64 = 0.30;
pub const UNLIKE_DELTA: f64 = -0.15;
pub const ORDER_DELTA: f64 = 0.20;

/// Pre-computed inputs for one candidate.
#[derive(Debug, Clone, Default)]
pub struct ReelContext {
    pub is_followed_merchant: bool,
    /// Followed merchant and the reel is younger than 24h.
    pub fresh_from_followed: bool,
    /// Decayed category preference plus watch boost, capped at 1.0.
    pub category_score: f64,
    pub trending_score: f64,
    /// 1.0 iff the candidate came out of the collaborative tier.
    pub similar_user_score: f64,
    /// Linear 1.0 → 0.0 over the first 24 hours.
    pub recency_bonus: f64,
}

/// Recency decay factor for a stored preference score.
///
/// Full weight within 7 days, linear decay to 0.5 by day 30, then a slow
/// slide floored at 0.1.
pub fn preference_decay_factor(last_interaction_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - last_interaction_at).num_days();
    if days <= 7 {
        1.0
    } else if days <= 30 {
        1.0 - (days - 7) as f64 / 46.0
    } else {
        (0.5 - (days - 30) as f64 / 120.0).max(0.1)
    }
}

/// The decayed affinity that actually feeds ranking.
pub fn effective_score(pref: &CategoryPreference, now: DateTime<Utc>) -> f64 {
    pref.preference_score * preference_decay_factor(pref.last_interaction_at, now)
}

/// Extra category affinity earned by actually watching the reel.
pub fn watch_boost(view_duration_secs: i32, reel_duration_secs: i32) -> f64 {
    if reel_duration_secs <= 0 {
        return 0.0;
    }
    let pct = (view_duration_secs as f64 / reel_duration_secs as f64).min(1.0);
    if pct >= 0.8 {
        0.2
    } else if pct >= 0.5 {
        0.1
    } else {
        0.0
    }
}

/// Preference delta for a view, scaled by watch percentage. Unknown
/// durations earn the minimum.
pub fn view_preference_delta(
    view_duration_secs: Option<i32>,
    reel_duration_secs: Option<i32>,
) -> f64 {
    match (view_duration_secs, reel_duration_secs) {
        (Some(viewed), Some(total)) if total > 0 => {
            let pct = (viewed as f64 / total as f64).min(1.0);
            if pct >= 0.8 {
                0.10
            } else if pct >= 0.5 {
                0.05
            } else {
                0.02
            }
        }
        _ => 0.02,
    }
}

/// Assemble the scoring context for one candidate from batch-fetched
/// inputs.
pub fn build_context(
    candidate: &Candidate,
    is_followed_merchant: bool,
    decayed_preference: f64,
    view_duration_secs: Option<i32>,
    now: DateTime<Utc>,
) -> ReelContext {
    let reel = &candidate.reel;
    let age_hours = reel.age_hours(now);

    let boost = match (view_duration_secs, reel.duration_seconds) {
        (Some(viewed), Some(total)) => watch_boost(viewed, total),
        _ => 0.0,
    };

    ReelContext {
        is_followed_merchant,
        fresh_from_followed: is_followed_merchant && age_hours < 24.0,
        category_score: (decayed_preference + boost).min(1.0),
        trending_score: score_reel(reel, CONTEXT_TRENDING_WINDOW_HOURS, now),
        similar_user_score: if candidate.source == TierSource::SimilarUsers {
            1.0
        } else {
            0.0
        },
        recency_bonus: if age_hours < RECENCY_WINDOW_HOURS {
            1.0 - age_hours / RECENCY_WINDOW_HOURS
        } else {
            0.0
        },
    }
}

pub fn final_score(ctx: &ReelContext) -> f64 {
    let mut score = 0.0;

    if ctx.is_followed_merchant {
        score += FOLLOWED_WEIGHT;
        if ctx.fresh_from_followed {
            score += FRESH_FOLLOWED_BONUS;
        }
    }

    score += ctx.category_score * CATEGORY_WEIGHT;
    score += ctx.trending_score * TRENDING_WEIGHT;
    score += ctx.similar_user_score * SIMILAR_USER_WEIGHT;
    score += ctx.recency_bonus;

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn pref(score: f64, days_ago: i64, now: DateTime<Utc>) -> CategoryPreference {
        CategoryPreference {
            user_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            preference_score: score,
            interaction_count: 1,
            last_interaction_at: now - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_decay_boundaries() {
        let now = Utc::now();
        assert_eq!(preference_decay_factor(now - Duration::days(3), now), 1.0);
        assert_eq!(preference_decay_factor(now - Duration::days(7), now), 1.0);

        // Day 30 lands at the bottom of the linear segment
        let at_30 = preference_decay_factor(now - Duration::days(30), now);
        assert!((at_30 - 0.5).abs() < 0.001);

        // Between 7 and 30: strictly between 0.5 and 1.0
        let mid = preference_decay_factor(now - Duration::days(18), now);
        assert!(mid < 1.0 && mid > 0.5);

        // Far past floors at 0.1
        let ancient = preference_decay_factor(now - Duration::days(365), now);
        assert_eq!(ancient, 0.1);
    }

    #[test]
    fn test_effective_score_uses_decay() {
        let now = Utc::now();
        let fresh = pref(0.8, 1, now);
        let stale = pref(0.8, 60, now);
        assert!(effective_score(&fresh, now) > effective_score(&stale, now));
        assert_eq!(effective_score(&fresh, now), 0.8);
    }

    #[test]
    fn test_watch_boost_thresholds() {
        assert_eq!(watch_boost(48, 60), 0.2); // 80%
        assert_eq!(watch_boost(30, 60), 0.1); // 50%
        assert_eq!(watch_boost(10, 60), 0.0);
        assert_eq!(watch_boost(10, 0), 0.0);
    }

    #[test]
    fn test_view_preference_delta() {
        assert_eq!(view_preference_delta(Some(50), Some(60)), 0.10);
        assert_eq!(view_preference_delta(Some(31), Some(60)), 0.05);
        assert_eq!(view_preference_delta(Some(5), Some(60)), 0.02);
        assert_eq!(view_preference_delta(None, Some(60)), 0.02);
        assert_eq!(view_preference_delta(Some(50), None), 0.02);
    }

    #[test]
    fn test_followed_dominates() {
        let followed = ReelContext {
            is_followed_merchant: true,
            fresh_from_followed: true,
            ..Default::default()
        };
        let unrelated = ReelContext {
            category_score: 1.0,
            trending_score: 1.0,
            similar_user_score: 1.0,
            recency_bonus: 1.0,
            ..Default::default()
        };
        // 12.0 vs 5 + 3 + 2 + 1 = 11.0
        assert!(final_score(&followed) > final_score(&unrelated));
    }

    #[test]
    fn test_category_score_capped_at_one() {
        let now = Utc::now();
        let candidate = Candidate {
            reel: crate::models::Reel {
                id: Uuid::new_v4(),
                merchant_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                description: String::new(),
                video_url: String::new(),
                thumbnail_url: None,
                duration_seconds: Some(60),
                views_count: 0,
                likes_count: 0,
                shares_count: 0,
                is_active: true,
                created_at: now - Duration::hours(48),
                deleted_at: None,
            },
            facts: None,
            source: TierSource::Category,
        };

        let ctx = build_context(&candidate, false, 0.95, Some(60), now);
        assert_eq!(ctx.category_score, 1.0);
        assert_eq!(ctx.recency_bonus, 0.0);
        assert!(!ctx.fresh_from_followed);
    }

    #[test]
    fn test_similar_user_flag_from_source() {
        let now = Utc::now();
        let reel = crate::models::Reel {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            description: String::new(),
            video_url: String::new(),
            thumbnail_url: None,
            duration_seconds: None,
            views_count: 0,
            likes_count: 0,
            shares_count: 0,
            is_active: true,
            created_at: now,
            deleted_at: None,
        };

        let similar = Candidate {
            reel: reel.clone(),
            facts: None,
            source: TierSource::SimilarUsers,
        };
        let general = Candidate {
            reel,
            facts: None,
            source: TierSource::General,
        };

        assert_eq!(build_context(&similar, false, 0.0, None, now).similar_user_score, 1.0);
        assert_eq!(build_context(&general, false, 0.0, None, now).similar_user_score, 0.0);
    }
}
