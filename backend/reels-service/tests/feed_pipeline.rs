//! End-to-end checks of the ranking pipeline over its pure pieces:
//! context scoring, final scoring, diversity selection and the trending
//! window, composed the way the feed engine composes them.

use chrono::{Duration, Utc};
use uuid::Uuid;

use reels_service::config::FeedConfig;
use reels_service::models::{ApprovalState, ProductFacts, Reel, TierSource};
use reels_service::{
    build_context, final_score, is_cold_start, rank_by_trending, select_diverse, trending_score,
    Candidate, DiversityCaps, ScoredCandidate,
};

fn reel(merchant_id: Uuid, age_hours: i64) -> Reel {
    let now = Utc::now();
    Reel {
        id: Uuid::new_v4(),
        merchant_id,
        product_id: Uuid::new_v4(),
        description: "reel".to_string(),
        video_url: "https://cdn.example.com/v.mp4".to_string(),
        thumbnail_url: None,
        duration_seconds: Some(30),
        views_count: 0,
        likes_count: 0,
        shares_count: 0,
        is_active: true,
        created_at: now - Duration::hours(age_hours),
        deleted_at: None,
    }
}

fn candidate(merchant_id: Uuid, category_id: Option<Uuid>, age_hours: i64, source: TierSource) -> Candidate {
    let reel = reel(merchant_id, age_hours);
    let facts = ProductFacts {
        product_id: reel.product_id,
        merchant_id,
        deleted: false,
        active: true,
        approval: ApprovalState::Approved,
        stock_qty: 10,
        category_id,
    };
    Candidate {
        reel,
        facts: Some(facts),
        source,
    }
}

/// Score candidates the way the engine does, with a fixed followed set.
fn score_pool(pool: Vec<Candidate>, followed: &[Uuid]) -> Vec<ScoredCandidate> {
    let now = Utc::now();
    pool.into_iter()
        .map(|c| {
            let is_followed = followed.contains(&c.reel.merchant_id);
            let ctx = build_context(&c, is_followed, 0.0, None, now);
            ScoredCandidate {
                score: final_score(&ctx),
                candidate: c,
            }
        })
        .collect()
}

#[test]
fn followed_merchant_reels_outrank_unrelated() {
    let followed_merchant = Uuid::new_v4();
    let mut pool: Vec<Candidate> = (0..5)
        .map(|i| candidate(followed_merchant, None, i + 1, TierSource::Followed))
        .collect();
    for i in 0..10 {
        pool.push(candidate(Uuid::new_v4(), None, i + 1, TierSource::General));
    }

    let scored = score_pool(pool, &[followed_merchant]);
    let selected = select_diverse(scored, 10, DiversityCaps::default());

    // The merchant cap admits three followed reels, and every one of
    // them ranks above every unrelated reel
    let followed_positions: Vec<usize> = selected
        .iter()
        .enumerate()
        .filter(|(_, s)| s.candidate.reel.merchant_id == followed_merchant)
        .map(|(i, _)| i)
        .collect();

    assert_eq!(followed_positions, vec![0, 1, 2]);
    assert_eq!(selected.len(), 10);
}

#[test]
fn diversity_caps_hold_across_tiers() {
    let merchants: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let category = Uuid::new_v4();

    // 4 merchants x 5 reels, all in one category
    let mut pool = Vec::new();
    for merchant in &merchants {
        for i in 0..5 {
            pool.push(candidate(*merchant, Some(category), i + 1, TierSource::General));
        }
    }

    let scored = score_pool(pool, &[]);
    let selected = select_diverse(scored, 12, DiversityCaps::default());

    // Category cap (5) binds before the merchant caps could fill 12
    assert_eq!(selected.len(), 5);
    for merchant in &merchants {
        let per_merchant = selected
            .iter()
            .filter(|s| s.candidate.reel.merchant_id == *merchant)
            .count();
        assert!(per_merchant <= 3);
    }
}

#[test]
fn page_of_eight_spanning_three_merchants_respects_caps() {
    let merchants: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let mut pool = Vec::new();
    for (mi, merchant) in merchants.iter().enumerate() {
        for i in 0..6 {
            // Distinct category per merchant so only the merchant cap binds
            pool.push(candidate(
                *merchant,
                Some(Uuid::from_u128(mi as u128 + 1)),
                i + 1,
                TierSource::General,
            ));
        }
    }

    let scored = score_pool(pool, &[]);
    let selected = select_diverse(scored, 8, DiversityCaps::default());

    assert_eq!(selected.len(), 8);
    for merchant in &merchants {
        let per_merchant = selected
            .iter()
            .filter(|s| s.candidate.reel.merchant_id == *merchant)
            .count();
        assert!(per_merchant <= 3, "merchant cap violated");
    }
}

#[test]
fn trending_window_excludes_old_reels() {
    // Identical engagement, 1h vs 30h old, 24h window
    let fresh = trending_score(10, 20, 5, 1.0, 24.0);
    let stale = trending_score(10, 20, 5, 30.0, 24.0);

    assert!(fresh > 0.0);
    assert_eq!(stale, 0.0);

    let now = Utc::now();
    let mut young = reel(Uuid::new_v4(), 1);
    young.likes_count = 10;
    young.views_count = 20;
    young.shares_count = 5;
    let mut old = reel(Uuid::new_v4(), 30);
    old.likes_count = 10;
    old.views_count = 20;
    old.shares_count = 5;

    let young_id = young.id;
    let ranked = rank_by_trending(vec![old, young], 24.0, now);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].id, young_id);
}

#[test]
fn cold_start_gate_matches_config() {
    let config = FeedConfig::default();

    // Brand-new account with zero interactions
    assert!(is_cold_start(0, 1, &config));
    // Old account with sparse history still cold-starts
    assert!(is_cold_start(2, 400, &config));
    // Enough history on a week-old account goes through the full pipeline
    assert!(!is_cold_start(10, 8, &config));
}

#[test]
fn deep_pages_shrink_when_content_runs_out() {
    let pool: Vec<Candidate> = (0..6)
        .map(|i| candidate(Uuid::new_v4(), None, i + 1, TierSource::General))
        .collect();

    let scored = score_pool(pool, &[]);
    // Ask for more than exists
    let selected = select_diverse(scored, 20, DiversityCaps::default());
    assert_eq!(selected.len(), 6);
}

#[test]
fn invisible_candidates_never_enter_the_pool() {
    let merchant = Uuid::new_v4();
    let visible = candidate(merchant, None, 1, TierSource::General);

    let mut hidden = candidate(merchant, None, 1, TierSource::General);
    if let Some(facts) = hidden.facts.as_mut() {
        facts.stock_qty = 0;
    }

    // The visibility predicate is what the tiers apply before pooling
    assert!(visible.reel.is_visible(visible.facts.as_ref()));
    assert!(!hidden.reel.is_visible(hidden.facts.as_ref()));
}
