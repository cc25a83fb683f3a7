mod feed;
mod interactions;

pub use feed::{get_followed_feed, get_personalized_feed, get_trending_feed, FeedQueryParams};
pub use interactions::{
    follow_merchant, like_reel, share_reel, unfollow_merchant, unlike_reel, view_reel,
};

use std::sync::Arc;

use crate::services::feed::FeedEngine;
use crate::services::interactions::InteractionService;

/// Shared handler state.
pub struct AppState {
    pub feed: Arc<FeedEngine>,
    pub interactions: Arc<InteractionService>,
}
