//! Record export to JSON, JSON-lines and CSV files

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::format::Record;

/// Output encoding for exported records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ExportFormat {
    Json,
    JsonLines,
    Csv,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported output format '{0}' (supported: csv, json, jsonl)")]
    UnsupportedFormat(String),
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::JsonLines => "jsonl",
            ExportFormat::Csv => "csv",
        }
    }

    /// File extension used when naming output files
    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    /// Infer the format from a file extension; no extension means JSON
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if !ext.is_empty() => ext.parse(),
            _ => Ok(ExportFormat::Json),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" | "jsonlines" | "ndjson" => Ok(ExportFormat::JsonLines),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for ExportFormat {
    type Error = ExportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the explicit format if given (blank counts as absent), else infer from `path`
pub fn resolve_format(path: &Path, explicit: Option<&str>) -> Result<ExportFormat, ExportError> {
    match explicit.map(str::trim).filter(|f| !f.is_empty()) {
        Some(format) => format.parse(),
        None => ExportFormat::from_path(path),
    }
}

/// Validate the format, then write `records` to `path`
///
/// The format is resolved before anything touches the filesystem, so an
/// unsupported value leaves no file behind. Returns the format used.
pub fn export_records(
    records: &[Record],
    path: &Path,
    format: Option<&str>,
) -> Result<ExportFormat, ExportError> {
    let format = resolve_format(path, format)?;
    write_records(records, path, format)?;
    Ok(format)
}

/// Write `records` to `path` in an already resolved format
pub fn write_records(
    records: &[Record],
    path: &Path,
    format: ExportFormat,
) -> Result<(), ExportError> {
    debug!(
        count = records.len(),
        path = %path.display(),
        %format,
        "exporting records"
    );

    ensure_parent_dir(path)?;

    match format {
        ExportFormat::Json => write_json(records, path)?,
        ExportFormat::JsonLines => write_jsonl(records, path)?,
        ExportFormat::Csv => write_csv(records, path)?,
    }

    info!(path = %path.display(), %format, "export complete");
    Ok(())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), ExportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(io_error(parent))
        }
        _ => Ok(()),
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>, ExportError> {
    File::create(path).map(BufWriter::new).map_err(io_error(path))
}

fn write_json(records: &[Record], path: &Path) -> Result<(), ExportError> {
    let mut writer = create_file(path)?;
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush().map_err(io_error(path))
}

fn write_jsonl(records: &[Record], path: &Path) -> Result<(), ExportError> {
    let mut writer = create_file(path)?;
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n").map_err(io_error(path))?;
    }
    writer.flush().map_err(io_error(path))
}

fn write_csv(records: &[Record], path: &Path) -> Result<(), ExportError> {
    if records.is_empty() {
        create_file(path)?;
        return Ok(());
    }

    // Sorted union keeps the header stable across heterogeneous records
    let headers: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .collect();

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(create_file(path)?);

    writer.write_record(headers.iter().copied())?;
    for record in records {
        writer.write_record(headers.iter().map(|key| csv_cell(record.get(*key))))?;
    }

    writer.flush().map_err(io_error(path))
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
