//! Periodic category preference recompute.
//!
//! Rebuilds affinity scores from stored behavior (likes weigh 3x views)
//! for recently active users, normalized per user so one heavy category
//! cannot saturate everything. Runs as an explicitly owned task with
//! injected dependencies and a shutdown signal; nothing global.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::PreferenceRepo;
use crate::error::Result;

const LIKE_WEIGHT: f64 = 0.3;
const VIEW_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct PreferenceRefreshConfig {
    pub interval: Duration,
    /// Users active within this window are recomputed.
    pub activity_window_hours: i64,
    pub max_users_per_cycle: i64,
}

impl Default for PreferenceRefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            activity_window_hours: 24,
            max_users_per_cycle: 500,
        }
    }
}

/// Run the recompute loop until the shutdown signal flips.
pub async fn run_preference_refresh(
    preferences: Arc<PreferenceRepo>,
    config: PreferenceRefreshConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        interval_secs = config.interval.as_secs(),
        activity_window_hours = config.activity_window_hours,
        "starting preference refresh job"
    );

    loop {
        tokio::select! {
            _ = sleep(config.interval) => {
                match run_cycle(&preferences, &config).await {
                    Ok(updated) => {
                        debug!(users_updated = updated, "preference refresh cycle completed");
                    }
                    Err(e) => {
                        warn!(error = %e, "preference refresh cycle failed");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("preference refresh job stopping");
                    return;
                }
            }
        }
    }
}

async fn run_cycle(
    preferences: &PreferenceRepo,
    config: &PreferenceRefreshConfig,
) -> Result<usize> {
    let cutoff = Utc::now() - chrono::Duration::hours(config.activity_window_hours);
    let users = preferences
        .users_active_since(cutoff, config.max_users_per_cycle)
        .await?;

    let mut updated = 0;
    for user_id in users {
        if let Err(e) = recompute_user(preferences, user_id).await {
            warn!(user_id = %user_id, error = %e, "preference recompute failed for user");
            continue;
        }
        updated += 1;
    }

    Ok(updated)
}

async fn recompute_user(preferences: &PreferenceRepo, user_id: Uuid) -> Result<()> {
    let likes = preferences.like_counts_by_category(user_id).await?;
    let views = preferences.view_counts_by_category(user_id).await?;

    let scores = weighted_category_scores(&likes, &views);
    for (category_id, score) in scores {
        preferences.apply_delta(user_id, category_id, score).await?;
    }

    Ok(())
}

/// Combine like/view counts into per-category deltas, normalized so the
/// strongest category lands at 1.0.
fn weighted_category_scores(
    likes: &[(Uuid, i64)],
    views: &[(Uuid, i64)],
) -> Vec<(Uuid, f64)> {
    let mut raw: HashMap<Uuid, f64> = HashMap::new();
    for (category_id, count) in likes {
        *raw.entry(*category_id).or_insert(0.0) += *count as f64 * LIKE_WEIGHT;
    }
    for (category_id, count) in views {
        *raw.entry(*category_id).or_insert(0.0) += *count as f64 * VIEW_WEIGHT;
    }

    let max = raw.values().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }

    raw.into_iter()
        .map(|(category_id, score)| (category_id, (score / max).min(1.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_scores_normalized() {
        let food = Uuid::new_v4();
        let tech = Uuid::new_v4();

        let likes = vec![(food, 10_i64)]; // 3.0
        let views = vec![(food, 5_i64), (tech, 15_i64)]; // food +0.5, tech 1.5

        let mut scores = weighted_category_scores(&likes, &views);
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        assert_eq!(scores[0].0, food);
        assert_eq!(scores[0].1, 1.0);
        let tech_score = scores.iter().find(|(c, _)| *c == tech).unwrap().1;
        assert!((tech_score - 1.5 / 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_activity_no_scores() {
        assert!(weighted_category_scores(&[], &[]).is_empty());
    }
}
