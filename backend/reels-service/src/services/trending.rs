//! Time-decayed trending score.
//!
//! Deterministic and side-effect free; ties are broken by recency when
//! sorting. Reels older than the scoring window score exactly zero and
//! are dropped from trending output.

use chrono::{DateTime, Utc};

use crate::models::Reel;

/// Engagement weights: shares signal hardest, views weakest.
const LIKE_WEIGHT: f64 = 2.0;
const VIEW_WEIGHT: f64 = 1.0;
const SHARE_WEIGHT: f64 = 3.0;

/// Multiplier for reels younger than six hours.
const FRESH_BOOST: f64 = 1.5;
const FRESH_BOOST_MAX_AGE_HOURS: f64 = 6.0;

/// Score a reel's engagement within `window_hours`.
///
/// `engagement / (age + 1)^2`, boosted 1.5x inside the first six hours;
/// zero outside the window.
pub fn trending_score(
    likes: i64,
    views: i64,
    shares: i64,
    age_hours: f64,
    window_hours: f64,
) -> f64 {
    if age_hours > window_hours {
        return 0.0;
    }

    let engagement =
        likes as f64 * LIKE_WEIGHT + views as f64 * VIEW_WEIGHT + shares as f64 * SHARE_WEIGHT;

    let mut score = engagement / ((age_hours + 1.0) * (age_hours + 1.0));

    if age_hours < FRESH_BOOST_MAX_AGE_HOURS {
        score *= FRESH_BOOST;
    }

    score
}

pub fn score_reel(reel: &Reel, window_hours: f64, now: DateTime<Utc>) -> f64 {
    trending_score(
        reel.likes_count,
        reel.views_count,
        reel.shares_count,
        reel.age_hours(now),
        window_hours,
    )
}

/// Sort reels by trending score, dropping zero scores; ties broken by
/// recency.
pub fn rank_by_trending(reels: Vec<Reel>, window_hours: f64, now: DateTime<Utc>) -> Vec<Reel> {
    let mut scored: Vec<(f64, Reel)> = reels
        .into_iter()
        .filter_map(|reel| {
            let score = score_reel(&reel, window_hours, now);
            (score > 0.0).then_some((score, reel))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
    });

    scored.into_iter().map(|(_, reel)| reel).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn reel_with(likes: i64, views: i64, shares: i64, age_hours: i64, now: DateTime<Utc>) -> Reel {
        Reel {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            description: String::new(),
            video_url: String::new(),
            thumbnail_url: None,
            duration_seconds: None,
            views_count: views,
            likes_count: likes,
            shares_count: shares,
            is_active: true,
            created_at: now - Duration::hours(age_hours),
            deleted_at: None,
        }
    }

    #[test]
    fn test_outside_window_scores_zero() {
        assert_eq!(trending_score(100, 100, 100, 30.0, 24.0), 0.0);
        assert!(trending_score(100, 100, 100, 23.0, 24.0) > 0.0);
    }

    #[test]
    fn test_decay_with_age() {
        let young = trending_score(10, 10, 10, 7.0, 24.0);
        let old = trending_score(10, 10, 10, 20.0, 24.0);
        assert!(young > old);
    }

    #[test]
    fn test_fresh_boost_under_six_hours() {
        // Same engagement at the 6h boundary: the boosted side only gets
        // the 1.5x factor below six hours
        let at_six = trending_score(10, 0, 0, 6.0, 24.0);
        let just_under = trending_score(10, 0, 0, 5.999, 24.0);
        assert!(just_under > at_six * 1.4);
    }

    #[test]
    fn test_engagement_weights() {
        // One share (3.0) outweighs one like (2.0) outweighs one view (1.0)
        let share = trending_score(0, 0, 1, 1.0, 24.0);
        let like = trending_score(1, 0, 0, 1.0, 24.0);
        let view = trending_score(0, 1, 0, 1.0, 24.0);
        assert!(share > like && like > view);
    }

    #[test]
    fn test_rank_excludes_expired_and_sorts() {
        let now = Utc::now();
        let old = reel_with(50, 50, 50, 30, now);
        let newer = reel_with(5, 5, 5, 1, now);
        let newest_quiet = reel_with(0, 1, 0, 2, now);

        let old_id = old.id;
        let newer_id = newer.id;

        let ranked = rank_by_trending(vec![old, newest_quiet, newer], 24.0, now);

        assert!(ranked.iter().all(|r| r.id != old_id));
        assert_eq!(ranked.first().map(|r| r.id), Some(newer_id));
    }

    #[test]
    fn test_zero_engagement_is_dropped() {
        let now = Utc::now();
        let silent = reel_with(0, 0, 0, 1, now);
        assert!(rank_by_trending(vec![silent], 24.0, now).is_empty());
    }
}
