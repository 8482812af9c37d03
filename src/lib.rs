//! Following-list scraper
//!
//! Extracts "following" entries from public profile pages and exports them:
//! - Anchor heuristics over profile HTML (scraper crate)
//! - Relative timestamp parsing ("5 mins", "Yesterday at 14:30")
//! - JSON, JSON-lines and CSV export
//! - Sequential multi-URL runs with a global item budget

pub mod app;
pub mod config;
pub mod export;
pub mod extractors;
pub mod fetch;
pub mod format;
pub mod input;
pub mod logging;
pub mod relative_time;
pub mod runner;

pub use app::{run, RunError, RunSummary};
pub use export::{export_records, ExportError, ExportFormat};
pub use extractors::*;
pub use fetch::{FetchError, PageFetcher, UreqFetcher};
pub use format::{to_records, ProfileRecord, Record};
pub use relative_time::{parse_relative_time, to_iso_utc};
pub use runner::{FollowingScraper, ScrapeError, ScrapeReport};
