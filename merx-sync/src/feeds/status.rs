//! Marketplace status snapshot reader
//!
//! The marketplace export lands as a new dated file per day in one
//! directory (`status_YYYY-MM-DD.tsv`); older snapshots stick around.
//! Only the latest file is read, chosen by name sort. The date component
//! is zero-padded, so lexicographic order equals chronological order. Columns: `sku`, `listing_id`, `listed`, `status`.

use std::path::PathBuf;

use chrono::NaiveDate;

use super::{open_delimited_stream, FeedError, FeedReader, RecordStream, SnapshotHandle, SourceTag};

const SNAPSHOT_PREFIX: &str = "status_";
const SNAPSHOT_SUFFIX: &str = ".tsv";

/// Reader for the marketplace status snapshot directory
pub struct StatusReader {
    snapshot_dir: PathBuf,
}

impl StatusReader {
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
        }
    }
}

/// Does this filename match the dated snapshot naming convention?
fn is_snapshot_name(name: &str) -> bool {
    let Some(dated) = name
        .strip_prefix(SNAPSHOT_PREFIX)
        .and_then(|rest| rest.strip_suffix(SNAPSHOT_SUFFIX))
    else {
        return false;
    };
    NaiveDate::parse_from_str(dated, "%Y-%m-%d").is_ok()
}

impl FeedReader for StatusReader {
    fn source(&self) -> SourceTag {
        SourceTag::Status
    }

    fn locate(&self) -> Result<Option<SnapshotHandle>, FeedError> {
        let entries = match std::fs::read_dir(&self.snapshot_dir) {
            Ok(entries) => entries,
            // Directory not there yet: the feed is absent, not broken
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FeedError::unreadable(&self.snapshot_dir, e)),
        };

        let mut latest: Option<String> = None;
        for entry in entries {
            let entry = entry.map_err(|e| FeedError::unreadable(&self.snapshot_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_snapshot_name(&name) {
                continue;
            }
            if latest.as_deref().map_or(true, |current| name.as_str() > current) {
                latest = Some(name);
            }
        }

        Ok(latest.map(|name| SnapshotHandle {
            path: self.snapshot_dir.join(name),
        }))
    }

    fn read(&self, handle: &SnapshotHandle) -> Result<RecordStream, FeedError> {
        open_delimited_stream(&handle.path, b'\t')
    }
}
