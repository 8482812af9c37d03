//! Input lists of profile URLs
//!
//! Plain text files hold one URL per line; blank lines and `#` comments are
//! ignored. A `.json` file holds an array of targets with optional per-entry
//! caps and export formats:
//!
//! ```json
//! [{ "url": "https://www.facebook.com/someone/following", "maxItems": 2, "exportFormats": ["json", "csv"] }]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::export::ExportFormat;

/// One profile page to scrape
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileTarget {
    pub url: String,
    #[serde(default, alias = "max_items")]
    pub max_items: Option<usize>,
    #[serde(default, alias = "export_formats")]
    pub export_formats: Vec<ExportFormat>,
}

impl ProfileTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_items: None,
            export_formats: vec![],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("no URLs found in input file {}", .0.display())]
    NoUrls(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid target list in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// URLs from a plain text list, in file order
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Read a plain text URL list
pub fn read_input_urls(path: &Path) -> Result<Vec<String>, InputError> {
    let text = read_input(path)?;
    Ok(parse_url_list(&text))
}

/// Load scrape targets from a text or `.json` input file
///
/// Fails when the file is missing or yields no URLs.
pub fn load_targets(path: &Path) -> Result<Vec<ProfileTarget>, InputError> {
    let text = read_input(path)?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let targets: Vec<ProfileTarget> = if is_json {
        let parsed: Vec<ProfileTarget> =
            serde_json::from_str(&text).map_err(|source| InputError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        parsed
            .into_iter()
            .map(|mut target| {
                target.url = target.url.trim().to_string();
                target
            })
            .filter(|target| !target.url.is_empty())
            .collect()
    } else {
        parse_url_list(&text)
            .into_iter()
            .map(ProfileTarget::new)
            .collect()
    };

    if targets.is_empty() {
        return Err(InputError::NoUrls(path.to_path_buf()));
    }

    debug!(count = targets.len(), path = %path.display(), "loaded input targets");
    Ok(targets)
}

fn read_input(path: &Path) -> Result<String, InputError> {
    if !path.is_file() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })
}
