//! Cacheable route matching.
//!
//! # Responsibilities
//! - Decide whether a request is eligible for the response cache
//! - Match configured route prefixes against the request path
//!
//! # Design Decisions
//! - Only GET is cacheable
//! - Trailing slashes are ignored on the request path
//! - A route ending in `/` matches by prefix; any other route matches exactly
//! - Path matching is case-sensitive

use axum::http::Method;

use crate::config::HttpCacheConfig;

/// Matches one configured route against a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    route: String,
    prefix: bool,
}

impl PathPrefixMatcher {
    /// `"/api/v1/files/"` matches `/api/v1/files` and everything under it;
    /// `"/api/v1/status"` matches only itself.
    pub fn new(route: impl Into<String>) -> Self {
        let route = route.into();
        let prefix = route.ends_with('/');
        Self {
            route: route.trim_end_matches('/').to_string(),
            prefix,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        if self.prefix {
            path.starts_with(&self.route)
        } else {
            path == self.route
        }
    }
}

/// The set of routes whose GET responses may be cached.
#[derive(Debug, Clone, Default)]
pub struct CacheableRoutes {
    matchers: Vec<PathPrefixMatcher>,
}

impl CacheableRoutes {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            matchers: routes.into_iter().map(PathPrefixMatcher::new).collect(),
        }
    }

    pub fn from_config(config: &HttpCacheConfig) -> Self {
        Self::new(config.cacheable_routes.iter().cloned())
    }

    pub fn is_cacheable(&self, method: &Method, path: &str) -> bool {
        method == Method::GET && self.matchers.iter().any(|m| m.matches(path))
    }
}

/// POST, PUT, PATCH and DELETE.
pub fn is_mutating(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}
