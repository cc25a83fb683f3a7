pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

// Re-export the ranking pipeline pieces for tests and embedding callers
pub use services::diversity::{select_diverse, DiversityCaps};
pub use services::feed::{is_cold_start, FeedEngine, FeedPage};
pub use services::interactions::InteractionService;
pub use services::scoring::{
    build_context, effective_score, final_score, preference_decay_factor, ReelContext,
};
pub use services::trending::{rank_by_trending, trending_score};
pub use services::{Candidate, ScoredCandidate};
