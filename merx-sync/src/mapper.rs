//! Field mapping from raw feed columns to the canonical item schema
//!
//! One pure function per source. Each source has a static column table;
//! values are normalized before they ever reach the reconciler:
//! - empty strings become absent, so a feed can never blank out a field
//!   another run populated
//! - the display name coalesces first-non-empty from the name column,
//!   then the legal-name column
//! - numeric fields that fail to parse become absent, never zero
//! - stage flags are derived: presence in a feed, a truthy status column,
//!   or a sentinel status value

use merx_common::db::items::ItemPatch;

use crate::feeds::{RawRecord, SourceTag};

/// One feed record translated to canonical form
#[derive(Debug, Clone, PartialEq)]
pub struct MappedItem {
    pub sku: String,
    pub patch: ItemPatch,
}

/// Translate a raw record for the given source
///
/// Returns `None` when the record lacks the natural key.
pub fn map_record(source: SourceTag, record: &RawRecord) -> Option<MappedItem> {
    match source {
        SourceTag::Qpi => map_qpi(record),
        SourceTag::Status => map_status(record),
        SourceTag::Pim => map_pim(record),
    }
}

/// QPI validation extract: descriptive fields plus the "order received"
/// milestone implied by the item appearing in the extract at all
fn map_qpi(record: &RawRecord) -> Option<MappedItem> {
    let sku = record.get_non_empty("vendor sku")?.to_string();

    let legal_name = owned(record.get_non_empty("legal name"));
    let patch = ItemPatch {
        name: owned(record.get_non_empty("item name")).or_else(|| legal_name.clone()),
        legal_name,
        brand: owned(record.get_non_empty("brand")),
        upc: owned(record.get_non_empty("upc")),
        length_in: parse_number(record.get_non_empty("length")),
        width_in: parse_number(record.get_non_empty("width")),
        height_in: parse_number(record.get_non_empty("height")),
        weight_lb: parse_number(record.get_non_empty("weight")),
        ordered: true,
        ..Default::default()
    };

    Some(MappedItem { sku, patch })
}

/// Marketplace status snapshot: listing identity and lifecycle flags only
fn map_status(record: &RawRecord) -> Option<MappedItem> {
    let sku = record.get_non_empty("sku")?.to_string();

    let patch = ItemPatch {
        marketplace_id: owned(record.get_non_empty("listing_id")),
        listed: record.get_non_empty("listed").map_or(false, is_truthy),
        finalized: record
            .get_non_empty("status")
            .map_or(false, |s| s.eq_ignore_ascii_case("finalized")),
        ..Default::default()
    };

    Some(MappedItem { sku, patch })
}

/// PIM extract: descriptive fields plus the "vendor setup complete"
/// milestone implied by presence in the extract
fn map_pim(record: &RawRecord) -> Option<MappedItem> {
    let sku = record.get_non_empty("sku")?.to_string();

    let legal_name = owned(record.get_non_empty("legal name"));
    let patch = ItemPatch {
        name: owned(record.get_non_empty("product title")).or_else(|| legal_name.clone()),
        legal_name,
        brand: owned(record.get_non_empty("brand name")),
        upc: owned(record.get_non_empty("upc")),
        length_in: parse_number(record.get_non_empty("package length")),
        width_in: parse_number(record.get_non_empty("package width")),
        height_in: parse_number(record.get_non_empty("package height")),
        weight_lb: parse_number(record.get_non_empty("package weight")),
        vendor_setup: true,
        ..Default::default()
    };

    Some(MappedItem { sku, patch })
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// Parse a numeric cell; anything unparseable is absent, never zero
fn parse_number(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Marketplace exports flag columns in several spellings
fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "y" | "yes" | "true" | "x"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::normalize_headers;

    fn record(headers: &[&str], cells: &[&str]) -> RawRecord {
        let headers = normalize_headers(headers.iter().copied());
        RawRecord::from_row(&headers, cells.iter().copied())
    }

    #[test]
    fn test_qpi_maps_fields_and_implies_ordered() {
        let rec = record(
            &["Vendor SKU", "Item Name", "Legal Name", "Brand", "UPC", "Length", "Weight"],
            &["A-100", "Widget", "Widget Co. Widget", "Acme", "012345678905", "12", "2.5"],
        );

        let mapped = map_record(SourceTag::Qpi, &rec).unwrap();
        assert_eq!(mapped.sku, "A-100");
        assert_eq!(mapped.patch.name.as_deref(), Some("Widget"));
        assert_eq!(mapped.patch.legal_name.as_deref(), Some("Widget Co. Widget"));
        assert_eq!(mapped.patch.length_in, Some(12.0));
        assert_eq!(mapped.patch.weight_lb, Some(2.5));
        assert!(mapped.patch.ordered);
        assert!(!mapped.patch.vendor_setup);
    }

    #[test]
    fn test_display_name_coalesces_from_legal_name() {
        let rec = record(
            &["Vendor SKU", "Item Name", "Legal Name"],
            &["A-100", "", "Widget Co. Widget"],
        );

        let mapped = map_record(SourceTag::Qpi, &rec).unwrap();
        assert_eq!(mapped.patch.name.as_deref(), Some("Widget Co. Widget"));
    }

    #[test]
    fn test_missing_key_maps_to_none() {
        let rec = record(&["Vendor SKU", "Item Name"], &["", "Widget"]);
        assert!(map_record(SourceTag::Qpi, &rec).is_none());

        let rec = record(&["sku", "listed"], &["  ", "1"]);
        assert!(map_record(SourceTag::Status, &rec).is_none());
    }

    #[test]
    fn test_unparseable_number_is_absent_not_zero() {
        let rec = record(
            &["Vendor SKU", "Length", "Width", "Height"],
            &["A-100", "n/a", "", "7.25"],
        );

        let mapped = map_record(SourceTag::Qpi, &rec).unwrap();
        assert_eq!(mapped.patch.length_in, None);
        assert_eq!(mapped.patch.width_in, None);
        assert_eq!(mapped.patch.height_in, Some(7.25));
    }

    #[test]
    fn test_empty_strings_never_map_to_values() {
        let rec = record(
            &["Vendor SKU", "Item Name", "Brand", "UPC"],
            &["A-100", "", "", ""],
        );

        let mapped = map_record(SourceTag::Qpi, &rec).unwrap();
        assert_eq!(mapped.patch.name, None);
        assert_eq!(mapped.patch.brand, None);
        assert_eq!(mapped.patch.upc, None);
    }

    #[test]
    fn test_status_truthy_listed_column() {
        for truthy in ["1", "y", "Yes", "TRUE", "x"] {
            let rec = record(&["sku", "listed"], &["A-100", truthy]);
            let mapped = map_record(SourceTag::Status, &rec).unwrap();
            assert!(mapped.patch.listed, "expected {truthy:?} to be truthy");
        }

        for falsy in ["0", "n", "no", "false", ""] {
            let rec = record(&["sku", "listed"], &["A-100", falsy]);
            let mapped = map_record(SourceTag::Status, &rec).unwrap();
            assert!(!mapped.patch.listed, "expected {falsy:?} to be falsy");
        }
    }

    #[test]
    fn test_status_finalized_sentinel_is_case_insensitive() {
        let rec = record(&["sku", "status"], &["A-100", "FINALIZED"]);
        let mapped = map_record(SourceTag::Status, &rec).unwrap();
        assert!(mapped.patch.finalized);

        let rec = record(&["sku", "status"], &["A-100", "pending"]);
        let mapped = map_record(SourceTag::Status, &rec).unwrap();
        assert!(!mapped.patch.finalized);
    }

    #[test]
    fn test_status_supplies_marketplace_id_only() {
        let rec = record(
            &["sku", "listing_id", "listed", "status"],
            &["A-100", "MKT-001", "1", "live"],
        );

        let mapped = map_record(SourceTag::Status, &rec).unwrap();
        assert_eq!(mapped.patch.marketplace_id.as_deref(), Some("MKT-001"));
        assert_eq!(mapped.patch.name, None);
        assert!(mapped.patch.listed);
        assert!(!mapped.patch.finalized);
    }

    #[test]
    fn test_pim_maps_package_fields_and_implies_vendor_setup() {
        let rec = record(
            &["SKU", "Product Title", "Brand Name", "Package Length", "Package Weight"],
            &["A-100", "Widget", "Acme", "12.5", "oops"],
        );

        let mapped = map_record(SourceTag::Pim, &rec).unwrap();
        assert_eq!(mapped.patch.brand.as_deref(), Some("Acme"));
        assert_eq!(mapped.patch.length_in, Some(12.5));
        assert_eq!(mapped.patch.weight_lb, None);
        assert!(mapped.patch.vendor_setup);
        assert!(!mapped.patch.ordered);
    }
}
