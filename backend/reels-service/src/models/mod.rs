mod feed_view;

pub use feed_view::FeedReel;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A merchant-uploaded product video.
///
/// Counters are mutated only through atomic SQL updates in `ReelRepo`;
/// `likes_count` floors at zero on decrement. Reels are soft-deleted
/// (`deleted_at`), never removed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reel {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub product_id: Uuid,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub views_count: i64,
    pub likes_count: i64,
    pub shares_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Reel {
    /// Hours elapsed since creation, never negative.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        ((now - self.created_at).num_seconds().max(0) as f64) / 3600.0
    }

    /// Compute why this reel must not appear in any feed, reel-level
    /// checks first, then product-level. Empty means visible.
    ///
    /// Stock and approval change independently of the reel, so this is
    /// recomputed on every read and never persisted.
    pub fn disabling_reasons(&self, product: Option<&ProductFacts>) -> Vec<DisablingReason> {
        let mut reasons = Vec::new();

        if self.deleted_at.is_some() {
            reasons.push(DisablingReason::ReelDeleted);
        }
        if !self.is_active {
            reasons.push(DisablingReason::ReelInactive);
        }

        let facts = match product {
            Some(facts) => facts,
            None => {
                reasons.push(DisablingReason::ProductNotFound);
                return reasons;
            }
        };

        if facts.deleted {
            reasons.push(DisablingReason::ProductDeleted);
        }
        if !facts.active {
            reasons.push(DisablingReason::ProductInactive);
        }
        match facts.approval {
            ApprovalState::Approved => {}
            ApprovalState::Pending => reasons.push(DisablingReason::ProductPendingApproval),
            ApprovalState::Rejected => reasons.push(DisablingReason::ProductRejected),
        }
        if facts.merchant_id != self.merchant_id {
            reasons.push(DisablingReason::ProductMerchantMismatch);
        }
        if facts.stock_qty <= 0 {
            reasons.push(DisablingReason::ProductOutOfStock);
        }

        reasons
    }

    pub fn is_visible(&self, product: Option<&ProductFacts>) -> bool {
        self.disabling_reasons(product).is_empty()
    }
}

/// Current facts about a reel's linked product, read from the catalog in
/// one batch query per candidate set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductFacts {
    pub product_id: Uuid,
    pub merchant_id: Uuid,
    pub deleted: bool,
    pub active: bool,
    pub approval: ApprovalState,
    pub stock_qty: i64,
    pub category_id: Option<Uuid>,
}

/// Admin approval state of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    Approved,
    Pending,
    Rejected,
}

impl ApprovalState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Approved => "approved",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
        }
    }

    /// Anything unknown is treated as pending, the conservative state.
    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reason a reel is excluded from feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisablingReason {
    ReelDeleted,
    ReelInactive,
    ProductNotFound,
    ProductDeleted,
    ProductInactive,
    ProductPendingApproval,
    ProductRejected,
    ProductMerchantMismatch,
    ProductOutOfStock,
}

impl DisablingReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ReelDeleted => "REEL_DELETED",
            Self::ReelInactive => "REEL_INACTIVE",
            Self::ProductNotFound => "PRODUCT_NOT_FOUND",
            Self::ProductDeleted => "PRODUCT_DELETED",
            Self::ProductInactive => "PRODUCT_INACTIVE",
            Self::ProductPendingApproval => "PRODUCT_PENDING_APPROVAL",
            Self::ProductRejected => "PRODUCT_REJECTED",
            Self::ProductMerchantMismatch => "PRODUCT_MERCHANT_MISMATCH",
            Self::ProductOutOfStock => "PRODUCT_OUT_OF_STOCK",
        }
    }
}

impl std::fmt::Display for DisablingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Candidate-retrieval tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierSource {
    Followed,
    Category,
    Trending,
    SimilarUsers,
    General,
}

impl TierSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Followed => "followed",
            Self::Category => "category",
            Self::Trending => "trending",
            Self::SimilarUsers => "similar_users",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for TierSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Time window for trending scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl TimeWindow {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TwentyFourHours => "24h",
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
        }
    }

    pub fn hours(&self) -> f64 {
        match self {
            Self::TwentyFourHours => 24.0,
            Self::SevenDays => 168.0,
            Self::ThirtyDays => 720.0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(Self::TwentyFourHours),
            "7d" => Some(Self::SevenDays),
            "30d" => Some(Self::ThirtyDays),
            _ => None,
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a feed page was produced; returned with every page for
/// observability and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedInfo {
    pub feed_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_variant: Option<String>,
    pub tiers_used: Vec<TierSource>,
    pub generated_at: DateTime<Utc>,
}

impl FeedInfo {
    pub fn new(feed_type: &str, tiers_used: Vec<TierSource>, generated_at: DateTime<Utc>) -> Self {
        Self {
            feed_type: feed_type.to_string(),
            feed_variant: None,
            tiers_used,
            generated_at,
        }
    }

    pub fn cold_start(mut self) -> Self {
        self.feed_variant = Some("cold_start".to_string());
        self
    }
}

/// A user's like on a reel; unique per (user, reel).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReelLike {
    pub user_id: Uuid,
    pub reel_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A user's view of a reel; unique per (user, reel), mutable on rewatch.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReelView {
    pub user_id: Uuid,
    pub reel_id: Uuid,
    pub viewed_at: DateTime<Utc>,
    pub view_duration: Option<i32>,
}

/// A user's share of a reel; re-sharing refreshes `shared_at`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReelShare {
    pub user_id: Uuid,
    pub reel_id: Uuid,
    pub shared_at: DateTime<Utc>,
}

/// A user following a merchant; unique per pair.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MerchantFollow {
    pub user_id: Uuid,
    pub merchant_id: Uuid,
    pub followed_at: DateTime<Utc>,
}

/// Stored per-(user, category) affinity. The raw score is clamped to
/// [0, 1]; ranking consumes the time-decayed value, never this one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryPreference {
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub preference_score: f64,
    pub interaction_count: i64,
    pub last_interaction_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn visible_reel() -> Reel {
        Reel {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            description: "demo".to_string(),
            video_url: "https://cdn.example.com/v.mp4".to_string(),
            thumbnail_url: None,
            duration_seconds: Some(30),
            views_count: 0,
            likes_count: 0,
            shares_count: 0,
            is_active: true,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn matching_facts(reel: &Reel) -> ProductFacts {
        ProductFacts {
            product_id: reel.product_id,
            merchant_id: reel.merchant_id,
            deleted: false,
            active: true,
            approval: ApprovalState::Approved,
            stock_qty: 5,
            category_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn test_visible_reel_has_no_reasons() {
        let reel = visible_reel();
        let facts = matching_facts(&reel);
        assert!(reel.is_visible(Some(&facts)));
        assert!(reel.disabling_reasons(Some(&facts)).is_empty());
    }

    #[test]
    fn test_each_trigger_independently_disables() {
        let reel = visible_reel();
        let facts = matching_facts(&reel);

        let mut deleted = reel.clone();
        deleted.deleted_at = Some(Utc::now());
        assert_eq!(
            deleted.disabling_reasons(Some(&facts)),
            vec![DisablingReason::ReelDeleted]
        );

        let mut inactive = reel.clone();
        inactive.is_active = false;
        assert_eq!(
            inactive.disabling_reasons(Some(&facts)),
            vec![DisablingReason::ReelInactive]
        );

        let mut out_of_stock = facts.clone();
        out_of_stock.stock_qty = 0;
        assert_eq!(
            reel.disabling_reasons(Some(&out_of_stock)),
            vec![DisablingReason::ProductOutOfStock]
        );

        let mut rejected = facts.clone();
        rejected.approval = ApprovalState::Rejected;
        assert_eq!(
            reel.disabling_reasons(Some(&rejected)),
            vec![DisablingReason::ProductRejected]
        );

        // Clearing one trigger restores visibility only when no other remains
        let mut both = facts.clone();
        both.stock_qty = 0;
        both.approval = ApprovalState::Pending;
        let reasons = reel.disabling_reasons(Some(&both));
        assert_eq!(reasons.len(), 2);
        both.stock_qty = 3;
        assert_eq!(
            reel.disabling_reasons(Some(&both)),
            vec![DisablingReason::ProductPendingApproval]
        );
        both.approval = ApprovalState::Approved;
        assert!(reel.is_visible(Some(&both)));
    }

    #[test]
    fn test_missing_product_short_circuits() {
        let mut reel = visible_reel();
        reel.is_active = false;
        let reasons = reel.disabling_reasons(None);
        assert_eq!(
            reasons,
            vec![
                DisablingReason::ReelInactive,
                DisablingReason::ProductNotFound
            ]
        );
    }

    #[test]
    fn test_merchant_mismatch() {
        let reel = visible_reel();
        let mut facts = matching_facts(&reel);
        facts.merchant_id = Uuid::new_v4();
        assert_eq!(
            reel.disabling_reasons(Some(&facts)),
            vec![DisablingReason::ProductMerchantMismatch]
        );
    }

    #[test]
    fn test_age_hours_never_negative() {
        let mut reel = visible_reel();
        reel.created_at = Utc::now() + Duration::hours(2);
        assert_eq!(reel.age_hours(Utc::now()), 0.0);
    }

    #[test]
    fn test_time_window_parse() {
        assert_eq!(TimeWindow::parse("24h"), Some(TimeWindow::TwentyFourHours));
        assert_eq!(TimeWindow::parse("7d"), Some(TimeWindow::SevenDays));
        assert_eq!(TimeWindow::parse("30d"), Some(TimeWindow::ThirtyDays));
        assert_eq!(TimeWindow::parse("1h"), None);
        assert_eq!(TimeWindow::SevenDays.hours(), 168.0);
    }

    #[test]
    fn test_feed_info_cold_start_variant() {
        let info = FeedInfo::new(
            "recommended",
            vec![TierSource::Trending, TierSource::General],
            Utc::now(),
        )
        .cold_start();
        assert_eq!(info.feed_variant.as_deref(), Some("cold_start"));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["tiers_used"][0], "trending");
        assert_eq!(json["feed_variant"], "cold_start");
    }
}
