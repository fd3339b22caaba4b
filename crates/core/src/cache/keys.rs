//! Cache key namespace.
//!
//! Every cached value lives under one of a handful of prefixes so that
//! related entries can be invalidated together with a glob pattern.

/// Prefix for login session entries.
pub const SESSION_PREFIX: &str = "session:";
/// Prefix for cached user profiles.
pub const USER_PREFIX: &str = "user:";
/// Prefix for cached project data.
pub const PROJECT_PREFIX: &str = "project:";
/// Prefix for cached parts listings.
pub const PARTS_PREFIX: &str = "parts:";
/// Prefix for short-lived scratch values.
pub const TEMP_PREFIX: &str = "temp:";

/// Returns the cache key for a session.
pub fn session_key(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

/// Returns the cache key for a user's profile.
pub fn user_key(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Returns the cache key for a project's data.
pub fn project_key(project_id: &str) -> String {
    format!("{PROJECT_PREFIX}{project_id}")
}

/// Returns the cache key for a project's parts listing.
pub fn parts_key(project_id: &str) -> String {
    format!("{PARTS_PREFIX}{project_id}")
}

/// Returns the cache key for a scratch value.
pub fn temp_key(id: &str) -> String {
    format!("{TEMP_PREFIX}{id}")
}

/// Returns the pattern matching every session scoped to a user
/// (`session:{user_id}:*`).
pub fn user_sessions_pattern(user_id: &str) -> String {
    format!("{SESSION_PREFIX}{user_id}:*")
}

/// Returns the pattern matching every derived entry of a project
/// (`project:{project_id}:*`).
pub fn project_data_pattern(project_id: &str) -> String {
    format!("{PROJECT_PREFIX}{project_id}:*")
}

/// Returns the pattern matching every parts listing.
pub fn all_parts_pattern() -> String {
    format!("{PARTS_PREFIX}*")
}

/// Pattern for the cached upload listings, invalidated after every upload.
pub const UPLOADED_FILES_PATTERN: &str = "uploaded_files:*";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::pattern_matches;

    #[test]
    fn test_prefixed_keys() {
        assert_eq!(session_key("abc"), "session:abc");
        assert_eq!(user_key("42"), "user:42");
        assert_eq!(project_key("p-1"), "project:p-1");
        assert_eq!(parts_key("p-1"), "parts:p-1");
        assert_eq!(temp_key("upload-7"), "temp:upload-7");
    }

    #[test]
    fn test_user_sessions_pattern() {
        let pattern = user_sessions_pattern("42");
        assert_eq!(pattern, "session:42:*");
        assert!(pattern_matches(&pattern, "session:42:web"));
        assert!(!pattern_matches(&pattern, "session:420:web"));
        assert!(!pattern_matches(&pattern, "user:42"));
    }

    #[test]
    fn test_project_data_pattern() {
        let pattern = project_data_pattern("p-1");
        assert_eq!(pattern, "project:p-1:*");
        assert!(pattern_matches(&pattern, "project:p-1:bom"));
        assert!(!pattern_matches(&pattern, "project:p-1"));
    }

    #[test]
    fn test_all_parts_pattern() {
        let pattern = all_parts_pattern();
        assert!(pattern_matches(&pattern, &parts_key("A")));
        assert!(pattern_matches(&pattern, "parts:all"));
        assert!(!pattern_matches(&pattern, "project:A"));
    }

    #[test]
    fn test_uploaded_files_pattern() {
        assert!(pattern_matches(UPLOADED_FILES_PATTERN, "uploaded_files:all"));
        assert!(!pattern_matches(UPLOADED_FILES_PATTERN, "projects:all"));
    }
}
