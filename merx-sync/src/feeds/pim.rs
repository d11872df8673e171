//! PIM extract reader
//!
//! The product-information-management system exports a single workbook;
//! item facts live on the first sheet. The XLSX container cannot be
//! streamed, so the sheet is loaded fully and iterated from memory.
//! Columns: `SKU`, `Product Title`, `Brand Name`, `Legal Name`, `UPC`,
//! `Package Length`, `Package Width`, `Package Height`, `Package Weight`.

use std::path::PathBuf;

use calamine::{open_workbook_auto, Data, Reader};

use super::{normalize_headers, FeedError, FeedReader, RawRecord, RecordStream, SnapshotHandle, SourceTag};

/// Reader for the PIM extract workbook
pub struct PimReader {
    workbook_path: PathBuf,
}

impl PimReader {
    pub fn new(workbook_path: impl Into<PathBuf>) -> Self {
        Self {
            workbook_path: workbook_path.into(),
        }
    }
}

/// Render one cell as the raw string the mapper expects
///
/// Numeric cells print without a trailing `.0` so UPCs and whole-number
/// dimensions round-trip the way they look in the sheet.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        other => other.to_string(),
    }
}

impl FeedReader for PimReader {
    fn source(&self) -> SourceTag {
        SourceTag::Pim
    }

    fn locate(&self) -> Result<Option<SnapshotHandle>, FeedError> {
        if self.workbook_path.is_file() {
            Ok(Some(SnapshotHandle {
                path: self.workbook_path.clone(),
            }))
        } else {
            Ok(None)
        }
    }

    fn read(&self, handle: &SnapshotHandle) -> Result<RecordStream, FeedError> {
        let mut workbook =
            open_workbook_auto(&handle.path).map_err(|e| FeedError::unreadable(&handle.path, e))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| FeedError::unreadable(&handle.path, "workbook has no sheets"))?
            .map_err(|e| FeedError::unreadable(&handle.path, e))?;

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(header_row) => {
                let cells: Vec<String> = header_row.iter().map(cell_to_string).collect();
                normalize_headers(cells.iter().map(String::as_str))
            }
            None => return Ok(Box::new(std::iter::empty())),
        };

        let records: Vec<Result<RawRecord, FeedError>> = rows
            .map(|row| {
                let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                Ok(RawRecord::from_row(
                    &headers,
                    cells.iter().map(String::as_str),
                ))
            })
            .collect();

        Ok(Box::new(records.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn write_fixture(path: &std::path::Path) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "SKU").unwrap();
        sheet.write_string(0, 1, "Product Title").unwrap();
        sheet.write_string(0, 2, "Package Weight").unwrap();
        sheet.write_string(1, 0, "A-100").unwrap();
        sheet.write_string(1, 1, "Widget").unwrap();
        sheet.write_number(1, 2, 2.5).unwrap();
        sheet.write_string(2, 1, "Row without a SKU").unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_reads_first_sheet_rows() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pim.xlsx");
        write_fixture(&path);

        let reader = PimReader::new(&path);
        let handle = reader.locate().unwrap().unwrap();
        let rows: Vec<_> = reader.read(&handle).unwrap().collect();

        assert_eq!(rows.len(), 2);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.get("sku"), Some("A-100"));
        assert_eq!(first.get("product title"), Some("Widget"));
        assert_eq!(first.get("package weight"), Some("2.5"));

        // Keyless rows still stream; the mapper counts and drops them
        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.get_non_empty("sku"), None);
    }

    #[test]
    fn test_corrupt_workbook_is_a_systemic_failure() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pim.xlsx");
        std::fs::write(&path, b"this is not a workbook").unwrap();

        let reader = PimReader::new(&path);
        let handle = reader.locate().unwrap().unwrap();
        assert!(matches!(
            reader.read(&handle),
            Err(FeedError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_missing_workbook_signals_absent() {
        let temp = tempfile::tempdir().unwrap();
        let reader = PimReader::new(temp.path().join("pim.xlsx"));
        assert!(reader.locate().unwrap().is_none());
    }
}
