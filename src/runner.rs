//! Sequential scraping across many profile URLs
//!
//! [`FollowingScraper`] fetches each URL once, extracts its following
//! entries and keeps a global item budget. A failing URL is logged and
//! reported, never fatal for the run.

use std::time::Duration;

use tracing::{debug, info, info_span, warn, Span};

use crate::extractors::{ExtractError, FollowingExtractor, FollowingProfile};
use crate::fetch::{FetchError, PageFetcher, DEFAULT_TIMEOUT};
use crate::input::ProfileTarget;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to parse {url}: {source}")]
    Extract {
        url: String,
        #[source]
        source: ExtractError,
    },
}

/// Profiles scraped for one input target
#[derive(Debug, Clone)]
pub struct ProfileBatch {
    /// Position of the target in the input list
    pub index: usize,
    pub url: String,
    pub profiles: Vec<FollowingProfile>,
}

/// URL that was skipped and why
#[derive(Debug)]
pub struct UrlFailure {
    pub index: usize,
    pub url: String,
    pub error: ScrapeError,
}

/// Outcome of a whole run, in input order
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub batches: Vec<ProfileBatch>,
    pub failures: Vec<UrlFailure>,
}

impl ScrapeReport {
    pub fn total_profiles(&self) -> usize {
        self.batches.iter().map(|b| b.profiles.len()).sum()
    }

    /// Aggregated profiles across all successful URLs
    pub fn profiles(&self) -> impl Iterator<Item = &FollowingProfile> {
        self.batches.iter().flat_map(|b| b.profiles.iter())
    }

    pub fn into_profiles(self) -> Vec<FollowingProfile> {
        self.batches.into_iter().flat_map(|b| b.profiles).collect()
    }
}

/// Drives a [`PageFetcher`] and a [`FollowingExtractor`] over a list of URLs
pub struct FollowingScraper<F> {
    fetcher: F,
    extractor: FollowingExtractor,
    timeout: Duration,
    span: Span,
}

impl<F: PageFetcher> FollowingScraper<F> {
    pub fn new(fetcher: F, extractor: FollowingExtractor) -> Self {
        Self {
            fetcher,
            extractor,
            timeout: DEFAULT_TIMEOUT,
            span: info_span!("following_scraper"),
        }
    }

    /// Per-request timeout handed to the fetcher
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Span that scopes every log line this scraper emits
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn extractor(&self) -> &FollowingExtractor {
        &self.extractor
    }

    /// Fetch one profile page and extract up to `limit` entries
    pub fn scrape_profile(
        &self,
        profile_url: &str,
        limit: Option<usize>,
    ) -> Result<Vec<FollowingProfile>, ScrapeError> {
        let _entered = self.span.enter();

        let resolved = self.extractor.normalize_url(profile_url);
        debug!(url = %resolved, "resolved profile URL");

        let body = self.fetcher.fetch(&resolved, self.timeout)?;
        self.extractor
            .extract_bytes(&body, limit)
            .map_err(|source| ScrapeError::Extract {
                url: resolved,
                source,
            })
    }

    /// Scrape plain URLs under one global budget
    pub fn scrape<S: AsRef<str>>(&self, urls: &[S], max_items: Option<usize>) -> ScrapeReport {
        let targets: Vec<ProfileTarget> = urls
            .iter()
            .map(|url| ProfileTarget::new(url.as_ref()))
            .collect();
        self.scrape_targets(&targets, max_items)
    }

    /// Scrape targets in order
    ///
    /// Each URL gets the smaller of its own cap and the remaining global
    /// budget. The budget shrinks by what each URL actually returned and the
    /// loop stops once it is spent.
    pub fn scrape_targets(
        &self,
        targets: &[ProfileTarget],
        max_items: Option<usize>,
    ) -> ScrapeReport {
        let _entered = self.span.enter();
        let mut report = ScrapeReport::default();
        let mut remaining = max_items;

        for (index, target) in targets.iter().enumerate() {
            if remaining == Some(0) {
                debug!(skipped = targets.len() - index, "item budget exhausted");
                break;
            }

            let limit = match (target.max_items, remaining) {
                (Some(own), Some(left)) => Some(own.min(left)),
                (own, left) => own.or(left),
            };

            info!(url = %target.url, "scraping profile");
            match self.scrape_profile(&target.url, limit) {
                Ok(profiles) => {
                    if let Some(left) = remaining.as_mut() {
                        *left = left.saturating_sub(profiles.len());
                    }
                    info!(url = %target.url, count = profiles.len(), "scraped profile");
                    report.batches.push(ProfileBatch {
                        index,
                        url: target.url.clone(),
                        profiles,
                    });
                }
                Err(error) => {
                    warn!(url = %target.url, error = %error, "skipping profile");
                    report.failures.push(UrlFailure {
                        index,
                        url: target.url.clone(),
                        error,
                    });
                }
            }
        }

        report
    }
}
