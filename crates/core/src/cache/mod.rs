mod error;
mod expiry;
mod keys;
mod patterns;
mod stats;
mod traits;
mod value;

pub use error::{CacheError, Result};
pub use expiry::{CacheClass, Expiry};
pub use keys::{
    all_parts_pattern, parts_key, project_data_pattern, project_key, session_key, temp_key,
    user_key, user_sessions_pattern, PARTS_PREFIX, PROJECT_PREFIX, SESSION_PREFIX, TEMP_PREFIX,
    UPLOADED_FILES_PATTERN, USER_PREFIX,
};
pub use patterns::pattern_matches;
pub use stats::{CacheStats, RemoteStats};
pub use traits::{BlockingCache, Cache};
pub use value::CachedValue;
