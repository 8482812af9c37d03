use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, warn};

use following_scraper::config::{Settings, SettingsOverrides};
use following_scraper::logging::{init_logging, LogHandle};
use following_scraper::{run, UreqFetcher};

#[derive(Parser, Debug)]
#[command(
    name = "following-scraper",
    about = "Scrape following lists from public profile pages and export them"
)]
struct Cli {
    /// JSON settings file (default: config/settings.json)
    #[arg(short = 'c', long, value_name = "PATH", env = "FOLLOWING_SCRAPER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Profile URLs, one per line, or a .json target list
    #[arg(short, long, value_name = "PATH")]
    input_file: Option<PathBuf>,

    /// Where the aggregated export is written
    #[arg(short, long, value_name = "PATH")]
    output_file: Option<PathBuf>,

    /// json, jsonl or csv; inferred from the output file when omitted
    #[arg(short, long)]
    format: Option<String>,

    /// Maximum entries across all profiles
    #[arg(short, long)]
    max_items: Option<usize>,

    /// Export each profile to its own file in this directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    /// Base URL for resolving relative profile links
    #[arg(long)]
    base_url: Option<String>,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            input_file: self.input_file.clone(),
            output_file: self.output_file.clone(),
            output_format: self.format.clone(),
            max_items: self.max_items,
            log_level: self.log_level.clone(),
            output_dir: self.output_dir.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log = init_logging("info");

    match try_main(&cli, &log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: &Cli, log: &LogHandle) -> anyhow::Result<()> {
    let settings = Settings::load(cli.settings.as_deref()).with_overrides(cli.overrides());

    if let Err(err) = log.set_level(&settings.log_level) {
        warn!(level = %settings.log_level, error = %err, "ignoring invalid log level");
    }
    debug!(?settings, "effective configuration");

    let summary = run(&settings, UreqFetcher::default()).context("scrape run failed")?;

    for (path, format) in &summary.outputs {
        info!(path = %path.display(), %format, "output saved");
    }
    info!(
        profiles = summary.targets,
        records = summary.records,
        failed = summary.failed_urls,
        "done"
    );
    Ok(())
}
