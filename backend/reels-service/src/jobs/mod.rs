mod preference_refresh;

pub use preference_refresh::{run_preference_refresh, PreferenceRefreshConfig};
