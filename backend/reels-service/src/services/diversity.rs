//! Diversity-constrained selection.
//!
//! Greedy walk over the score-sorted candidate pool, accepting an item
//! only while its merchant and category stay under their caps. The caps
//! apply to the whole output, not per tier. Best effort: a page may come
//! back short rather than violate a cap.

use std::collections::HashMap;

use uuid::Uuid;

use super::ScoredCandidate;

#[derive(Debug, Clone, Copy)]
pub struct DiversityCaps {
    pub max_per_merchant: usize,
    pub max_per_category: usize,
}

impl Default for DiversityCaps {
    fn default() -> Self {
        Self {
            max_per_merchant: 3,
            max_per_category: 5,
        }
    }
}

/// Sort by final score (ties: newer first) and greedily select up to
/// `page_size` candidates under the caps.
pub fn select_diverse(
    mut pool: Vec<ScoredCandidate>,
    page_size: usize,
    caps: DiversityCaps,
) -> Vec<ScoredCandidate> {
    pool.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.candidate.reel.created_at.cmp(&a.candidate.reel.created_at))
    });

    let mut selected = Vec::with_capacity(page_size.min(pool.len()));
    let mut merchant_counts: HashMap<Uuid, usize> = HashMap::new();
    let mut category_counts: HashMap<Uuid, usize> = HashMap::new();

    for item in pool {
        if selected.len() >= page_size {
            break;
        }

        let merchant_id = item.candidate.reel.merchant_id;
        if merchant_counts.get(&merchant_id).copied().unwrap_or(0) >= caps.max_per_merchant {
            continue;
        }

        let category_id = item.candidate.category_id();
        if let Some(category_id) = category_id {
            if category_counts.get(&category_id).copied().unwrap_or(0) >= caps.max_per_category {
                continue;
            }
        }

        *merchant_counts.entry(merchant_id).or_insert(0) += 1;
        if let Some(category_id) = category_id {
            *category_counts.entry(category_id).or_insert(0) += 1;
        }
        selected.push(item);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Reel, TierSource};
    use crate::services::Candidate;
    use chrono::{Duration, Utc};

    fn scored(merchant: Uuid, category: Option<Uuid>, score: f64) -> ScoredCandidate {
        let facts = category.map(|category_id| crate::models::ProductFacts {
            product_id: Uuid::new_v4(),
            merchant_id: merchant,
            deleted: false,
            active: true,
            approval: crate::models::ApprovalState::Approved,
            stock_qty: 1,
            category_id: Some(category_id),
        });

        ScoredCandidate {
            candidate: Candidate {
                reel: Reel {
                    id: Uuid::new_v4(),
                    merchant_id: merchant,
                    product_id: Uuid::new_v4(),
                    description: String::new(),
                    video_url: String::new(),
                    thumbnail_url: None,
                    duration_seconds: None,
                    views_count: 0,
                    likes_count: 0,
                    shares_count: 0,
                    is_active: true,
                    created_at: Utc::now() - Duration::minutes((score * 10.0) as i64),
                    deleted_at: None,
                },
                facts,
                source: TierSource::General,
            },
            score,
        }
    }

    #[test]
    fn test_merchant_cap_holds() {
        let merchant = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut pool: Vec<ScoredCandidate> = (0..6)
            .map(|i| scored(merchant, None, 10.0 - i as f64))
            .collect();
        pool.extend((0..6).map(|i| scored(other, None, 1.0 - i as f64 * 0.1)));

        let selected = select_diverse(pool, 10, DiversityCaps::default());

        let from_merchant = selected
            .iter()
            .filter(|s| s.candidate.reel.merchant_id == merchant)
            .count();
        assert_eq!(from_merchant, 3);
        assert_eq!(selected.len(), 6);
    }

    #[test]
    fn test_category_cap_holds() {
        let category = Uuid::new_v4();
        let pool: Vec<ScoredCandidate> = (0..8)
            .map(|i| scored(Uuid::new_v4(), Some(category), 8.0 - i as f64))
            .collect();

        let selected = select_diverse(pool, 8, DiversityCaps::default());
        assert_eq!(selected.len(), 5);
    }

    #[test]
    fn test_caps_scoped_to_whole_output() {
        // 3 merchants x 4 reels each; page of 12 must keep 3 per merchant
        let merchants: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut pool = Vec::new();
        for (mi, merchant) in merchants.iter().enumerate() {
            for i in 0..4 {
                pool.push(scored(*merchant, None, 20.0 - (mi * 4 + i) as f64));
            }
        }

        let selected = select_diverse(pool, 12, DiversityCaps::default());
        assert_eq!(selected.len(), 9);
        for merchant in &merchants {
            let n = selected
                .iter()
                .filter(|s| s.candidate.reel.merchant_id == *merchant)
                .count();
            assert!(n <= 3);
        }
    }

    #[test]
    fn test_sorted_by_score_descending() {
        let pool = vec![
            scored(Uuid::new_v4(), None, 1.0),
            scored(Uuid::new_v4(), None, 5.0),
            scored(Uuid::new_v4(), None, 3.0),
        ];

        let selected = select_diverse(pool, 3, DiversityCaps::default());
        let scores: Vec<f64> = selected.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn test_page_size_respected() {
        let pool: Vec<ScoredCandidate> = (0..20)
            .map(|i| scored(Uuid::new_v4(), None, 20.0 - i as f64))
            .collect();
        let selected = select_diverse(pool, 7, DiversityCaps::default());
        assert_eq!(selected.len(), 7);
    }

    #[test]
    fn test_uncategorized_items_skip_category_cap() {
        let pool: Vec<ScoredCandidate> = (0..8)
            .map(|i| scored(Uuid::new_v4(), None, 8.0 - i as f64))
            .collect();
        let selected = select_diverse(pool, 8, DiversityCaps::default());
        assert_eq!(selected.len(), 8);
    }
}
