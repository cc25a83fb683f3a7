mod interaction_repo;
mod preference_repo;
mod reel_repo;

pub use interaction_repo::{InteractionRepo, ViewUpsert};
pub use preference_repo::PreferenceRepo;
pub use reel_repo::ReelRepo;
