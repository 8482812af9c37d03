//! Page fetching
//!
//! The orchestrator only needs "give me the body of this URL"; [`UreqFetcher`]
//! is the blocking HTTP implementation used by the binary.

use std::time::Duration;

/// Desktop browser user agent so profile pages come back with standard markup
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.8";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: ureq::Error,
    },
}

/// Source of raw page bodies
pub trait PageFetcher {
    /// Fetch `url`, failing on transport errors and non-success statuses
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError>;
}

impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(url, timeout)
    }
}

/// Blocking fetcher backed by a shared ureq agent
#[derive(Debug, Clone)]
pub struct UreqFetcher {
    agent: ureq::Agent,
    accept_language: String,
}

impl Default for UreqFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT, DEFAULT_ACCEPT_LANGUAGE)
    }
}

impl UreqFetcher {
    pub fn new(user_agent: &str, accept_language: &str) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(DEFAULT_TIMEOUT))
                .user_agent(user_agent)
                .build(),
        );

        Self {
            agent,
            accept_language: accept_language.to_string(),
        }
    }
}

impl PageFetcher for UreqFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let transport = |source: ureq::Error| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .agent
            .get(url)
            .header("Accept-Language", self.accept_language.as_str())
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()
            .map_err(|err| match err {
                ureq::Error::StatusCode(status) => FetchError::Status {
                    url: url.to_string(),
                    status,
                },
                other => transport(other),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.into_body().read_to_vec().map_err(transport)
    }
}
