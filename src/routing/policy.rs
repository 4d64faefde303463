//! TTL categories and write-path invalidation table.
//!
//! Both tables match by substring, so they over-invalidate resources that
//! share a name fragment and fall back to clearing everything for paths
//! that name no known resource.

use std::time::Duration;

/// Prefix of every stored HTTP response key.
pub const HTTP_CACHE_NAMESPACE: &str = "http_cache";

const INVALIDATION_RULES: &[(&str, &[&str])] = &[
    ("files", &["http_cache:*files*", "http_cache:*health*"]),
    ("paths", &["http_cache:*paths*", "http_cache:*health*"]),
    ("upload", &["http_cache:*files*", "http_cache:*health*"]),
];

const FALLBACK_PATTERNS: &[&str] = &["http_cache:*"];

const TTL_RULES: &[(&str, Duration)] = &[
    ("health", Duration::from_secs(30)),
    ("files", Duration::from_secs(5 * 60)),
    ("paths", Duration::from_secs(15 * 60)),
];

/// Key patterns to clear after a successful mutation of `path`.
/// The first resource name found in the lowercased path wins.
pub fn invalidation_patterns(path: &str) -> &'static [&'static str] {
    let path = path.to_lowercase();
    INVALIDATION_RULES
        .iter()
        .find(|(resource, _)| path.contains(resource))
        .map(|(_, patterns)| *patterns)
        .unwrap_or(FALLBACK_PATTERNS)
}

/// TTL for a response cache key, by the first category it mentions.
pub fn ttl_for_key(key: &str, default: Duration) -> Duration {
    TTL_RULES
        .iter()
        .find(|(category, _)| key.contains(category))
        .map(|(_, ttl)| *ttl)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidation_table() {
        assert_eq!(
            invalidation_patterns("/api/v1/files/abc"),
            ["http_cache:*files*", "http_cache:*health*"]
        );
        assert_eq!(
            invalidation_patterns("/API/V1/PATHS"),
            ["http_cache:*paths*", "http_cache:*health*"]
        );
        assert_eq!(
            invalidation_patterns("/api/v1/upload"),
            ["http_cache:*files*", "http_cache:*health*"]
        );
        assert_eq!(invalidation_patterns("/api/v1/audit"), ["http_cache:*"]);
    }

    #[test]
    fn test_ttl_categories() {
        let default = Duration::from_secs(300);
        assert_eq!(ttl_for_key("http_cache:api/v1/health/detailed", default), Duration::from_secs(30));
        assert_eq!(ttl_for_key("http_cache:api/v1/paths", default), Duration::from_secs(900));
        assert_eq!(ttl_for_key("http_cache:api/v1/files/x", default), Duration::from_secs(300));
        assert_eq!(ttl_for_key("http_cache:api/v1/other", Duration::from_secs(7)), Duration::from_secs(7));
    }
}
