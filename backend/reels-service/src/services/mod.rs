pub mod diversity;
pub mod feed;
pub mod interactions;
pub mod retrieval;
pub mod scoring;
pub mod trending;
pub mod visibility;

use uuid::Uuid;

use crate::models::{ProductFacts, Reel, TierSource};

/// A reel that survived visibility filtering in some tier, carrying the
/// product facts it was checked against and the tier that produced it.
/// When the same reel comes out of several tiers, the first source wins.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub reel: Reel,
    pub facts: Option<ProductFacts>,
    pub source: TierSource,
}

impl Candidate {
    pub fn category_id(&self) -> Option<Uuid> {
        self.facts.as_ref().and_then(|f| f.category_id)
    }
}

/// A candidate with its final rank score attached. The score orders the
/// page and is never persisted.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}
