//! HTTP cache control module
//!
//! Maps a resolved file's extension to a TTL and derives the
//! `Cache-Control`/`Expires`/`Pragma` headers plus the fixed security headers.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

/// TTL applied to extensions missing from the table (1 hour)
pub const DEFAULT_TTL: u64 = 3600;

const ONE_YEAR: u64 = 31_536_000;
const THIRTY_DAYS: u64 = 2_592_000;

/// Built-in extension -> TTL table (seconds)
pub(crate) const BUILTIN_RULES: &[(&str, u64)] = &[
    // SPA shell must always be revalidated
    ("html", 0),
    ("css", ONE_YEAR),
    ("js", ONE_YEAR),
    ("woff", ONE_YEAR),
    ("woff2", ONE_YEAR),
    ("ttf", ONE_YEAR),
    ("png", THIRTY_DAYS),
    ("jpg", THIRTY_DAYS),
    ("jpeg", THIRTY_DAYS),
    ("gif", THIRTY_DAYS),
    ("svg", THIRTY_DAYS),
    ("ico", THIRTY_DAYS),
];

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u64),
    /// Never reuse without revalidation
    NoStore,
}

impl CachePolicy {
    pub const fn from_ttl(ttl: u64) -> Self {
        if ttl == 0 {
            Self::NoStore
        } else {
            Self::Public(ttl)
        }
    }

    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::NoStore => "no-cache, no-store, must-revalidate".to_string(),
        }
    }
}

/// Extension -> TTL table, immutable once built
#[derive(Debug, Clone)]
pub struct CacheRules {
    rules: HashMap<String, u64>,
    default_ttl: u64,
}

impl CacheRules {
    /// Build the table from the built-in rules, then apply configured overrides
    pub fn new(default_ttl: u64, overrides: &HashMap<String, u64>) -> Self {
        let mut rules: HashMap<String, u64> = BUILTIN_RULES
            .iter()
            .map(|(ext, ttl)| ((*ext).to_string(), *ttl))
            .collect();
        for (ext, ttl) in overrides {
            rules.insert(normalize_extension(ext), *ttl);
        }
        Self { rules, default_ttl }
    }

    /// TTL for an extension (case-insensitive, leading dot optional)
    pub fn ttl_for(&self, extension: Option<&str>) -> u64 {
        extension
            .and_then(|ext| self.rules.get(&normalize_extension(ext)))
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Headers for an extension, with `Expires` computed from the current time
    pub fn headers_for(&self, extension: Option<&str>) -> CacheHeaders {
        CacheHeaders::at(self.ttl_for(extension), Utc::now())
    }
}

impl Default for CacheRules {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, &HashMap::new())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Ordered set of cache and security headers for one response
#[derive(Debug, Clone)]
pub struct CacheHeaders {
    headers: Vec<(&'static str, String)>,
}

impl CacheHeaders {
    pub fn for_ttl(ttl: u64) -> Self {
        Self::at(ttl, Utc::now())
    }

    pub fn at(ttl: u64, now: DateTime<Utc>) -> Self {
        let policy = CachePolicy::from_ttl(ttl);
        let mut headers = vec![("Cache-Control", policy.to_header_value())];

        match policy {
            CachePolicy::Public(max_age) => {
                let expires = i64::try_from(max_age)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .and_then(|delta| now.checked_add_signed(delta))
                    .unwrap_or(now);
                headers.push(("Expires", format_http_date(expires)));
            }
            CachePolicy::NoStore => {
                headers.push(("Pragma", "no-cache".to_string()));
                headers.push(("Expires", "0".to_string()));
            }
        }

        headers.push(("X-Content-Type-Options", "nosniff".to_string()));
        headers.push(("X-Frame-Options", "SAMEORIGIN".to_string()));
        Self { headers }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.headers.iter().map(|(name, value)| (*name, value.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
