//! HTML extraction modules
//!
//! Holds the record type produced by extraction and the heuristic that
//! builds it from profile pages.

mod following_extractor;

pub use following_extractor::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Href substrings that mark an anchor as a possible profile link
pub const FOLLOWING_URL_PATTERNS: &[&str] = &[
    "/friends",
    "/friends_mutual",
    "/following",
    "/profile.php",
    "facebook.com",
];

/// Anchor text fragments that identify navigation and page chrome
pub const NAVIGATION_TERMS: &[&str] = &[
    "home",
    "create",
    "marketplace",
    "groups",
    "friends",
    "watch",
    "menu",
    "log in",
    "log out",
    "privacy",
    "terms",
];

/// Base URL used to resolve relative links when none is configured
pub const DEFAULT_BASE_URL: &str = "https://www.facebook.com";

/// Single "following" entry extracted from a profile page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowingProfile {
    /// Numeric profile id, last path segment, or the full URL
    pub id: String,
    pub image: Option<String>,
    pub title: String,
    pub subtitle_text: Option<String>,
    /// Absolute URL, unique within one page
    pub url: String,
    pub username: Option<String>,
    /// Auxiliary data attributes; `None` rather than empty
    pub profile_details: Option<BTreeMap<String, String>>,
}

/// Errors raised when a page cannot be turned into a document at all
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("page is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}
