//! Source feed readers
//!
//! Three heterogeneous external feeds report on the same catalog items,
//! matched by SKU. Each reader knows how to locate the latest instance of
//! its feed and turn it into a uniform stream of raw records; the formats
//! stay hidden behind the `FeedReader` trait so the reconciler never sees
//! them.
//!
//! Feeds are read once per run and never written. A missing feed is an
//! ordinary condition (`locate` returns `Ok(None)`), a broken row is
//! skipped and counted, and only a file that cannot be read at all aborts
//! that one source.

pub mod pim;
pub mod qpi;
pub mod status;

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

pub use pim::PimReader;
pub use qpi::QpiReader;
pub use status::StatusReader;

/// Identity of a sync source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    /// QPI validation extract (CSV)
    Qpi,
    /// Marketplace status snapshot (TSV, dated files)
    Status,
    /// PIM extract (XLSX workbook)
    Pim,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Qpi => "qpi",
            SourceTag::Status => "status",
            SourceTag::Pim => "pim",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feed reader errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// One row could not be parsed; skip it and continue
    #[error("malformed record: {0}")]
    Malformed(String),

    /// The feed exists but cannot be read at all; abort this source
    #[error("cannot read feed {path}: {detail}")]
    Unreadable { path: PathBuf, detail: String },
}

impl FeedError {
    pub fn unreadable(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        FeedError::Unreadable {
            path: path.into(),
            detail: detail.to_string(),
        }
    }
}

/// Handle to one located feed instance
///
/// Resolved fresh at the start of every run; a newer snapshot appearing
/// mid-read is picked up next run, not this one.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    pub path: PathBuf,
}

/// One raw feed row: lowercased header name to trimmed value
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    values: HashMap<String, String>,
}

impl RawRecord {
    /// Build a record by zipping headers with row values
    ///
    /// Header names are lowercased and trimmed so column lookup is
    /// case-insensitive; cells beyond the header row are dropped.
    pub fn from_row<'a>(
        headers: &[String],
        cells: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut values = HashMap::with_capacity(headers.len());
        for (header, cell) in headers.iter().zip(cells) {
            if !header.is_empty() {
                values.insert(header.clone(), cell.trim().to_string());
            }
        }
        RawRecord { values }
    }

    /// Look up a column by its lowercased header name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Like `get`, but empty strings count as absent
    pub fn get_non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.is_empty())
    }
}

/// Normalize raw header cells into lookup keys
pub(crate) fn normalize_headers<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    raw.into_iter()
        .map(|h| h.trim().to_lowercase())
        .collect()
}

/// Finite, restartable stream of raw records from one feed instance
pub type RecordStream = Box<dyn Iterator<Item = Result<RawRecord, FeedError>> + Send>;

/// Open a delimited tabular feed as a record stream
///
/// Shared by the CSV and TSV readers. The file is streamed row by row;
/// a row that fails to parse surfaces as `Malformed` and the stream
/// continues with the next row.
pub(crate) fn open_delimited_stream(
    path: &std::path::Path,
    delimiter: u8,
) -> Result<RecordStream, FeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| FeedError::unreadable(path, e))?;

    let headers = normalize_headers(
        reader
            .headers()
            .map_err(|e| FeedError::unreadable(path, e))?
            .iter(),
    );

    Ok(Box::new(reader.into_records().map(move |row| match row {
        Ok(row) => Ok(RawRecord::from_row(&headers, row.iter())),
        Err(e) => Err(FeedError::Malformed(e.to_string())),
    })))
}

/// Uniform capability interface over the three feed formats
pub trait FeedReader: Send {
    /// Which source this reader feeds
    fn source(&self) -> SourceTag;

    /// Locate the latest instance of the feed
    ///
    /// `Ok(None)` means the feed is absent this run: skip this source,
    /// do not abort the others.
    fn locate(&self) -> Result<Option<SnapshotHandle>, FeedError>;

    /// Open the located instance as a record stream
    fn read(&self, handle: &SnapshotHandle) -> Result<RecordStream, FeedError>;
}
