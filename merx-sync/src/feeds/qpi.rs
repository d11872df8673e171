//! QPI validation extract reader
//!
//! The QPI feed is a single rolling CSV file at a well-known path,
//! refreshed in place by the vendor validation system. Columns:
//! `Vendor SKU`, `Item Name`, `Legal Name`, `Brand`, `UPC`, `Length`,
//! `Width`, `Height`, `Weight`.

use std::path::PathBuf;

use super::{open_delimited_stream, FeedError, FeedReader, RecordStream, SnapshotHandle, SourceTag};

/// Reader for the QPI validation extract
pub struct QpiReader {
    feed_path: PathBuf,
}

impl QpiReader {
    pub fn new(feed_path: impl Into<PathBuf>) -> Self {
        Self {
            feed_path: feed_path.into(),
        }
    }
}

impl FeedReader for QpiReader {
    fn source(&self) -> SourceTag {
        SourceTag::Qpi
    }

    fn locate(&self) -> Result<Option<SnapshotHandle>, FeedError> {
        if self.feed_path.is_file() {
            Ok(Some(SnapshotHandle {
                path: self.feed_path.clone(),
            }))
        } else {
            Ok(None)
        }
    }

    fn read(&self, handle: &SnapshotHandle) -> Result<RecordStream, FeedError> {
        open_delimited_stream(&handle.path, b',')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_locate_missing_feed_is_not_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let reader = QpiReader::new(temp.path().join("qpi.csv"));

        assert!(reader.locate().unwrap().is_none());
    }

    #[test]
    fn test_streams_rows_and_skips_malformed_ones() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("qpi.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Vendor SKU,Item Name,Brand").unwrap();
        writeln!(file, "A-100,Widget,Acme").unwrap();
        writeln!(file, "A-101,\"Unbalanced,row,too,many,fields\",Acme,extra").unwrap();
        writeln!(file, "A-102,Sprocket,Acme").unwrap();
        drop(file);

        let reader = QpiReader::new(&path);
        let handle = reader.locate().unwrap().unwrap();
        let rows: Vec<_> = reader.read(&handle).unwrap().collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().get("vendor sku"), Some("A-100"));
        assert!(matches!(rows[1], Err(FeedError::Malformed(_))));
        assert_eq!(rows[2].as_ref().unwrap().get("item name"), Some("Sprocket"));
    }
}
