//! Anchor-based "following" extraction
//!
//! Uses the scraper crate to walk profile links and turn each distinct
//! target into a [`FollowingProfile`].

use std::collections::{BTreeMap, HashSet};

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{
    ExtractError, FollowingProfile, DEFAULT_BASE_URL, FOLLOWING_URL_PATTERNS, NAVIGATION_TERMS,
};

/// Anchor data attributes copied into `profile_details`
const ANCHOR_DETAIL_ATTRS: &[(&str, &str)] = &[
    ("data-gt", "data_gt"),
    ("data-hovercard", "data_hovercard"),
];

/// Extracts following entries, resolving relative links against a base URL
#[derive(Debug, Clone)]
pub struct FollowingExtractor {
    base_url: String,
    base: Option<Url>,
}

impl Default for FollowingExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl FollowingExtractor {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&format!("{}/", base_url)).ok();
        Self { base_url, base }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Extract profiles from raw page bytes
    ///
    /// Fails only when the bytes are not valid UTF-8; anything that decodes
    /// is handled by [`FollowingExtractor::extract`].
    pub fn extract_bytes(
        &self,
        raw: &[u8],
        limit: Option<usize>,
    ) -> Result<Vec<FollowingProfile>, ExtractError> {
        let html = std::str::from_utf8(raw)?;
        Ok(self.extract(html, limit))
    }

    /// Extract profiles in document order, deduplicated by URL, capped at `limit`
    pub fn extract(&self, html: &str, limit: Option<usize>) -> Vec<FollowingProfile> {
        if limit == Some(0) {
            return vec![];
        }

        let document = Html::parse_document(html);
        let candidates = find_candidate_anchors(&document);
        debug!(count = candidates.len(), "found candidate anchors");

        let mut seen: HashSet<String> = HashSet::new();
        let mut profiles = Vec::new();

        for anchor in candidates {
            let href = match anchor.value().attr("href") {
                Some(h) if !h.is_empty() => h,
                _ => continue,
            };

            let full_url = self.normalize_url(href);
            if !seen.insert(full_url.clone()) {
                continue;
            }

            profiles.push(build_profile(&anchor, full_url));

            if limit.is_some_and(|max| profiles.len() >= max) {
                break;
            }
        }

        profiles
    }

    /// Turn an href into an absolute URL
    ///
    /// Absolute links pass through untouched, protocol-relative links get
    /// `https:`, everything else is joined onto the base URL.
    pub fn normalize_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        if href.starts_with("//") {
            return format!("https:{}", href);
        }

        let relative = href.trim_start_matches('/');
        match self.base.as_ref().map(|base| base.join(relative)) {
            Some(Ok(absolute)) => absolute.to_string(),
            _ => format!("{}/{}", self.base_url, relative),
        }
    }
}

/// Extract profiles using the default base URL
pub fn parse_following_html(html: &str, limit: Option<usize>) -> Vec<FollowingProfile> {
    FollowingExtractor::default().extract(html, limit)
}

/// Anchors whose href looks like a profile link and whose text is not navigation
fn find_candidate_anchors(document: &Html) -> Vec<ElementRef<'_>> {
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return vec![],
    };

    document
        .select(&selector)
        .filter(|anchor| {
            let href = anchor.value().attr("href").unwrap_or("");
            if !FOLLOWING_URL_PATTERNS.iter().any(|p| href.contains(p)) {
                return false;
            }

            let text = visible_text(anchor);
            if text.is_empty() {
                return false;
            }

            let lower = text.to_lowercase();
            !NAVIGATION_TERMS.iter().any(|term| lower.contains(term))
        })
        .collect()
}

fn build_profile(anchor: &ElementRef<'_>, full_url: String) -> FollowingProfile {
    let card = enclosing_card(anchor);

    let subtitle_text = non_empty_attr(anchor, "aria-label")
        .or_else(|| non_empty_attr(anchor, "title"))
        .or_else(|| card.as_ref().and_then(card_subtitle));

    let image = first_descendant(anchor, "img")
        .and_then(|img| non_empty_attr(&img, "src").or_else(|| non_empty_attr(&img, "data-src")));

    let (id, username) = derive_identity(&full_url);

    let mut details = BTreeMap::new();
    for (attr, key) in ANCHOR_DETAIL_ATTRS {
        if let Some(value) = non_empty_attr(anchor, attr) {
            details.insert(key.to_string(), value);
        }
    }
    if let Some(profile_id) = card.as_ref().and_then(|c| non_empty_attr(c, "data-profile-id")) {
        details.insert("data_profile_id".to_string(), profile_id);
    }

    FollowingProfile {
        id,
        image,
        title: visible_text(anchor),
        subtitle_text,
        url: full_url,
        username,
        profile_details: if details.is_empty() { None } else { Some(details) },
    }
}

/// Derive `(id, username)` from a normalized profile URL
///
/// `profile.php?id=N` yields the numeric id. Otherwise the last path segment
/// is the id, and also the username when it is not purely numeric. The full
/// URL is the fallback id.
fn derive_identity(full_url: &str) -> (String, Option<String>) {
    let parsed = match Url::parse(full_url) {
        Ok(u) => u,
        Err(_) => return (full_url.to_string(), None),
    };

    if parsed.path().contains("profile.php") {
        let id = parsed
            .query_pairs()
            .find(|(key, value)| key == "id" && is_numeric(value))
            .map(|(_, value)| value.into_owned());
        return (id.unwrap_or_else(|| full_url.to_string()), None);
    }

    let last_segment = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(String::from);

    match last_segment {
        Some(segment) if is_numeric(&segment) => (segment, None),
        Some(segment) => (segment.clone(), Some(segment)),
        None => (full_url.to_string(), None),
    }
}

/// Nearest ancestor that is a following-list card
fn enclosing_card<'a>(anchor: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    anchor.ancestors().filter_map(ElementRef::wrap).find(|el| {
        el.value().attr("data-testid") == Some("follow_list_item")
            || el.value().classes().any(|c| c == "following-item")
    })
}

fn card_subtitle(card: &ElementRef<'_>) -> Option<String> {
    let subtitle = first_descendant(card, ".following-subtitle")?;
    let text = visible_text(&subtitle);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn first_descendant<'a>(element: &ElementRef<'a>, selector_str: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector_str).ok()?;
    element.select(&selector).next()
}

/// Text nodes, each trimmed, concatenated without a separator
///
/// `Log<b>in</b>` reads as "Login", not "Log in".
fn visible_text(element: &ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

fn non_empty_attr(element: &ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
    <html>
      <body>
        <div data-testid="follow_list_item" class="following-item" data-profile-id="100064487118317">
          <a href="https://www.facebook.com/UncutMagazine">
            <img src="https://scontent-ams4-1.xx.fbcdn.net/photo1.jpg" />
            <span class="following-title">Uncut Magazine</span>
          </a>
          <div class="following-subtitle"></div>
        </div>
        <div data-testid="follow_list_item" class="following-item" data-profile-id="100012345678900">
          <a href="https://www.facebook.com/example.profile">
            <img src="https://example.com/photo.jpg" />
            <span class="following-title">Example Profile</span>
          </a>
          <div class="following-subtitle">Music · Artist</div>
        </div>
      </body>
    </html>
    "#;

    #[test]
    fn test_sample_document() {
        let profiles = parse_following_html(SAMPLE_HTML, None);
        assert_eq!(profiles.len(), 2);

        let first = &profiles[0];
        assert_eq!(first.title, "Uncut Magazine");
        assert_eq!(first.url, "https://www.facebook.com/UncutMagazine");
        assert_eq!(first.id, "UncutMagazine");
        assert_eq!(first.username.as_deref(), Some("UncutMagazine"));
        assert_eq!(first.subtitle_text, None);
        assert!(first
            .image
            .as_deref()
            .unwrap()
            .starts_with("https://scontent-ams4-1.xx.fbcdn.net"));
        assert_eq!(
            first.profile_details.as_ref().unwrap()["data_profile_id"],
            "100064487118317"
        );

        let second = &profiles[1];
        assert_eq!(second.title, "Example Profile");
        assert_eq!(second.subtitle_text.as_deref(), Some("Music · Artist"));
        assert_eq!(second.url, "https://www.facebook.com/example.profile");
    }

    #[test]
    fn test_sample_document_respects_limit() {
        let profiles = parse_following_html(SAMPLE_HTML, Some(1));
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].title, "Uncut Magazine");

        assert!(parse_following_html(SAMPLE_HTML, Some(0)).is_empty());
        assert_eq!(parse_following_html(SAMPLE_HTML, Some(10)).len(), 2);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let html = r#"
        <a href="/alice/following">Alice Original</a>
        <a href="https://www.facebook.com/bob">Bob</a>
        <a href="https://www.facebook.com/alice/following">Alice Again</a>
        <a href="//www.facebook.com/bob">Bob Again</a>
        <a href="https://www.facebook.com/carol">Carol</a>
        "#;

        let profiles = parse_following_html(html, None);
        let titles: Vec<&str> = profiles.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Alice Original", "Bob", "Carol"]);
        assert_eq!(profiles[0].url, "https://www.facebook.com/alice/following");

        let urls: HashSet<&str> = profiles.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls.len(), profiles.len());
    }

    #[test]
    fn test_navigation_anchors_skipped() {
        let html = r#"
        <a href="https://www.facebook.com/login">Log In</a>
        <a href="https://www.facebook.com/login">LOG IN</a>
        <a href="https://www.facebook.com/">Home</a>
        <a href="https://www.facebook.com/privacy/policy">Privacy Center</a>
        <a href="https://www.facebook.com/someone/friends">See all friends</a>
        <a href="https://www.facebook.com/jane.doe">Jane Doe</a>
        "#;

        let profiles = parse_following_html(html, None);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].title, "Jane Doe");
    }

    #[test]
    fn test_non_profile_and_empty_anchors_skipped() {
        let html = r#"
        <a href="https://example.com/about">About us</a>
        <a href="https://www.facebook.com/ghost"><img src="x.jpg"></a>
        <a href="https://www.facebook.com/ghost">   </a>
        <a>No href</a>
        <a href="/following/kim">Kim</a>
        "#;

        let profiles = parse_following_html(html, None);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].url, "https://www.facebook.com/following/kim");
    }

    #[test]
    fn test_normalize_url() {
        let extractor = FollowingExtractor::new("https://m.facebook.com/");
        assert_eq!(extractor.base_url(), "https://m.facebook.com");
        assert_eq!(
            extractor.normalize_url("http://www.facebook.com/a"),
            "http://www.facebook.com/a"
        );
        assert_eq!(
            extractor.normalize_url("//www.facebook.com/a"),
            "https://www.facebook.com/a"
        );
        assert_eq!(
            extractor.normalize_url("/profile.php?id=42"),
            "https://m.facebook.com/profile.php?id=42"
        );
        // Three slashes still count as protocol-relative
        assert_eq!(
            extractor.normalize_url("///profile.php?id=42"),
            "https:///profile.php?id=42"
        );
        assert_eq!(
            extractor.normalize_url("someone/following"),
            "https://m.facebook.com/someone/following"
        );
    }

    #[test]
    fn test_identity_derivation() {
        assert_eq!(
            derive_identity("https://www.facebook.com/profile.php?id=12345&sk=following"),
            ("12345".to_string(), None)
        );
        assert_eq!(
            derive_identity("https://www.facebook.com/profile.php?sk=following"),
            ("https://www.facebook.com/profile.php?sk=following".to_string(), None)
        );
        assert_eq!(
            derive_identity("https://www.facebook.com/pages/category/SomePage/98765/"),
            ("98765".to_string(), None)
        );
        assert_eq!(
            derive_identity("https://www.facebook.com/jane.doe"),
            ("jane.doe".to_string(), Some("jane.doe".to_string()))
        );
        assert_eq!(
            derive_identity("https://www.facebook.com/"),
            ("https://www.facebook.com/".to_string(), None)
        );
    }

    #[test]
    fn test_optional_fields() {
        let html = r#"
        <a href="/profile.php?id=777" aria-label="Friend since 2019" data-gt='{"type":"xtracking"}' data-hovercard="/ajax/hovercard/user.php?id=777">
            <img data-src="https://cdn.example.com/lazy.jpg">
            Sam Smith
        </a>
        <a href="https://www.facebook.com/pat" title="Photographer"><img src="" data-src="https://cdn.example.com/pat.jpg">Pat</a>
        "#;

        let profiles = parse_following_html(html, None);
        assert_eq!(profiles.len(), 2);

        let sam = &profiles[0];
        assert_eq!(sam.id, "777");
        assert_eq!(sam.username, None);
        assert_eq!(sam.title, "Sam Smith");
        assert_eq!(sam.subtitle_text.as_deref(), Some("Friend since 2019"));
        assert_eq!(sam.image.as_deref(), Some("https://cdn.example.com/lazy.jpg"));
        let details = sam.profile_details.as_ref().unwrap();
        assert_eq!(details["data_gt"], r#"{"type":"xtracking"}"#);
        assert_eq!(details["data_hovercard"], "/ajax/hovercard/user.php?id=777");

        let pat = &profiles[1];
        assert_eq!(pat.subtitle_text.as_deref(), Some("Photographer"));
        assert_eq!(pat.image.as_deref(), Some("https://cdn.example.com/pat.jpg"));
        assert_eq!(pat.profile_details, None);
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        let html = r#"<div><a href="https://www.facebook.com/broken.page">Broken <b>Markup</a></span><p><a href="/next"#;
        let profiles = parse_following_html(html, None);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].title, "BrokenMarkup");
    }

    #[test]
    fn test_visible_text_concatenates_nodes() {
        let html = r#"
        <a href="https://www.facebook.com/jane.doe">Jane<span>Doe</span></a>
        <a href="https://www.facebook.com/login.studio">Log<b>in</b> Studio</a>
        <a href="https://www.facebook.com/spaced">  Uncut
            <span> Magazine </span></a>
        "#;

        let titles: Vec<String> = parse_following_html(html, None)
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["JaneDoe", "LoginStudio", "UncutMagazine"]);
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        let extractor = FollowingExtractor::default();
        let err = extractor
            .extract_bytes(&[0x3c, 0x61, 0xff, 0xfe], None)
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidEncoding(_)));

        let ok = extractor
            .extract_bytes(SAMPLE_HTML.as_bytes(), Some(1))
            .unwrap();
        assert_eq!(ok.len(), 1);
    }
}
