//! End-to-end run: read targets, scrape, export

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use url::Url;

use crate::config::Settings;
use crate::export::{resolve_format, write_records, ExportError, ExportFormat};
use crate::extractors::FollowingExtractor;
use crate::fetch::PageFetcher;
use crate::format::{to_records, ProfileRecord};
use crate::input::{load_targets, InputError};
use crate::runner::{FollowingScraper, ProfileBatch, ScrapeReport};

/// Path segments that describe a list view rather than a profile
const LIST_SEGMENTS: &[&str] = &["following", "friends", "friends_mutual", "profile.php"];
const MAX_SLUG_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// What a completed run produced
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub targets: usize,
    pub records: usize,
    pub failed_urls: usize,
    /// Files written, with their format
    pub outputs: Vec<(PathBuf, ExportFormat)>,
}

/// Run the whole pipeline with the given fetcher
///
/// Input and format problems fail before any page is fetched. Individual
/// URLs that fail are skipped. Any export failure fails the run; with an
/// output directory no per-profile file from that run is left behind.
pub fn run<F: PageFetcher>(settings: &Settings, fetcher: F) -> Result<RunSummary, RunError> {
    let format = resolve_format(&settings.output_file, settings.output_format.as_deref())?;
    let targets = load_targets(&settings.input_file)?;

    let scraper = FollowingScraper::new(fetcher, FollowingExtractor::new(&settings.base_url))
        .with_timeout(settings.timeout());

    info!(
        profiles = targets.len(),
        max_items = ?settings.max_items,
        "starting scrape"
    );
    let report = scraper.scrape_targets(&targets, settings.max_items);
    info!(
        records = report.total_profiles(),
        failed = report.failures.len(),
        "scraping completed"
    );

    let mut summary = RunSummary {
        targets: targets.len(),
        records: report.total_profiles(),
        failed_urls: report.failures.len(),
        outputs: vec![],
    };

    match &settings.output_dir {
        Some(dir) => {
            let mut staged = Vec::new();
            for batch in &report.batches {
                let formats = targets
                    .get(batch.index)
                    .map(|t| t.export_formats.as_slice())
                    .filter(|formats| !formats.is_empty())
                    .unwrap_or(std::slice::from_ref(&format));
                if let Err(err) = stage_batch(batch, dir, formats, &mut staged) {
                    discard(staged.iter().map(|file| &file.partial));
                    return Err(err.into());
                }
            }
            summary.outputs = commit(staged)?;
        }
        None => {
            summary.outputs.push(export_report(report, &settings.output_file, format)?);
        }
    }

    Ok(summary)
}

fn export_report(
    report: ScrapeReport,
    path: &Path,
    format: ExportFormat,
) -> Result<(PathBuf, ExportFormat), ExportError> {
    let entries: Vec<ProfileRecord> = report
        .into_profiles()
        .into_iter()
        .map(ProfileRecord::from)
        .collect();
    write_records(&to_records(&entries), path, format)?;
    Ok((path.to_path_buf(), format))
}

/// Export file written under a temporary name until the whole run succeeds
struct StagedFile {
    partial: PathBuf,
    path: PathBuf,
    format: ExportFormat,
}

fn stage_batch(
    batch: &ProfileBatch,
    dir: &Path,
    formats: &[ExportFormat],
    staged: &mut Vec<StagedFile>,
) -> Result<(), ExportError> {
    let entries: Vec<ProfileRecord> = batch
        .profiles
        .iter()
        .cloned()
        .map(ProfileRecord::from)
        .collect();
    let records = to_records(&entries);
    let stem = format!("{:02}_{}", batch.index, slug_from_url(&batch.url));

    for &format in formats {
        let name = format!("{}.{}", stem, format.extension());
        let partial = dir.join(format!(".{name}.partial"));
        let path = dir.join(name);
        // Recorded before writing so a half-written file is cleaned up too
        staged.push(StagedFile {
            partial: partial.clone(),
            path,
            format,
        });
        write_records(&records, &partial, format)?;
    }
    Ok(())
}

/// Move staged files into place; on failure remove everything from this run
fn commit(staged: Vec<StagedFile>) -> Result<Vec<(PathBuf, ExportFormat)>, ExportError> {
    for (done, file) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(&file.partial, &file.path) {
            discard(staged[..done].iter().map(|f| &f.path));
            discard(staged[done..].iter().map(|f| &f.partial));
            return Err(ExportError::Io {
                path: file.path.clone(),
                source,
            });
        }
    }

    debug!(files = staged.len(), "per-profile exports committed");
    Ok(staged
        .into_iter()
        .map(|file| (file.path, file.format))
        .collect())
}

fn discard<'a>(paths: impl Iterator<Item = &'a PathBuf>) {
    for path in paths {
        if let Err(err) = fs::remove_file(path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "failed to remove partial export");
            }
        }
    }
}

/// File-name friendly identifier for a profile URL
///
/// Uses the first path segment that names a profile, else the `id` query
/// parameter, else `profile`.
pub fn slug_from_url(url: &str) -> String {
    let raw = Url::parse(url).ok().and_then(|parsed| {
        let from_path = parsed
            .path_segments()
            .and_then(|mut segments| {
                segments.find(|s| !s.is_empty() && !LIST_SEGMENTS.contains(s))
            })
            .map(String::from);
        from_path.or_else(|| {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "id")
                .map(|(_, value)| value.into_owned())
        })
    });

    let slug: String = raw
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(MAX_SLUG_LEN)
        .collect();

    let slug = slug.trim_matches(|c: char| c == '_' || c == '.');
    if slug.is_empty() {
        "profile".to_string()
    } else {
        slug.to_string()
    }
}
