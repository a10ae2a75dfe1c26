//! HTTP cache control module
//!
//! Picks a `Cache-Control` value from the class of content being served.

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// Must not be cached at all
    NoCache,
}

const ONE_YEAR: u32 = 31_536_000;
const ONE_DAY: u32 = 86_400;
const ONE_HOUR: u32 = 3_600;

impl CachePolicy {
    /// Choose a policy for a response.
    ///
    /// `executed` is true when the body came from a backend script.
    pub fn for_content(content_type: &str, executed: bool) -> Self {
        if content_type.starts_with("image/") {
            Self::Public(ONE_YEAR)
        } else if content_type.contains("javascript") || content_type.starts_with("text/css") {
            Self::Public(ONE_DAY)
        } else if content_type == "application/json" || executed {
            Self::NoCache
        } else {
            Self::Public(ONE_HOUR)
        }
    }

    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::NoCache => "no-cache, no-store, must-revalidate".to_string(),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::Public(ONE_HOUR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_by_content_class() {
        assert_eq!(CachePolicy::for_content("image/png", false), CachePolicy::Public(ONE_YEAR));
        assert_eq!(
            CachePolicy::for_content("text/javascript", false),
            CachePolicy::Public(ONE_DAY)
        );
        assert_eq!(CachePolicy::for_content("text/css", false), CachePolicy::Public(ONE_DAY));
        assert_eq!(CachePolicy::for_content("application/json", false), CachePolicy::NoCache);
        assert_eq!(CachePolicy::for_content("text/html", false), CachePolicy::default());
    }

    #[test]
    fn test_executed_output_is_never_cached() {
        assert_eq!(
            CachePolicy::for_content("text/html; charset=utf-8", true),
            CachePolicy::NoCache
        );
    }

    #[test]
    fn test_header_values() {
        assert_eq!(
            CachePolicy::Public(3600).to_header_value(),
            "public, max-age=3600"
        );
        assert_eq!(
            CachePolicy::NoCache.to_header_value(),
            "no-cache, no-store, must-revalidate"
        );
    }
}
