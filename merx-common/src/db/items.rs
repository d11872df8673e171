//! Item store operations
//!
//! The canonical item record is keyed by SKU (natural key). Sync sources
//! and the CRUD API both write here, so every merge is expressed as a
//! single SQL statement: supplied attribute fields overwrite, the
//! marketplace identifier is first-writer-wins, and stage flags advance by
//! OR. A concurrent writer on the same SKU can therefore never regress a
//! flag or resurrect an empty field.

use crate::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{Row, SqlitePool};

/// Canonical item record
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub sku: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub legal_name: Option<String>,
    pub upc: Option<String>,
    pub length_in: Option<f64>,
    pub width_in: Option<f64>,
    pub height_in: Option<f64>,
    pub weight_lb: Option<f64>,
    /// Secondary external identifier, filled opportunistically
    pub marketplace_id: Option<String>,
    pub ordered: bool,
    pub vendor_setup: bool,
    pub listed: bool,
    pub finalized: bool,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for one item record
///
/// `None` means "not supplied by this source" and leaves the stored value
/// untouched. Flags are derived facts: `true` advances the flag, `false`
/// leaves it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub legal_name: Option<String>,
    pub upc: Option<String>,
    pub length_in: Option<f64>,
    pub width_in: Option<f64>,
    pub height_in: Option<f64>,
    pub weight_lb: Option<f64>,
    pub marketplace_id: Option<String>,
    pub ordered: bool,
    pub vendor_setup: bool,
    pub listed: bool,
    pub finalized: bool,
}

impl ItemPatch {
    /// Would applying this patch change the stored record?
    ///
    /// Mirrors the SQL merge rules: attribute fields change only when
    /// supplied and different, the marketplace identifier only when the
    /// stored one is empty, flags only when advancing.
    pub fn would_change(&self, existing: &ItemRecord) -> bool {
        fn differs<T: PartialEq>(new: &Option<T>, old: &Option<T>) -> bool {
            matches!(new, Some(v) if old.as_ref() != Some(v))
        }

        differs(&self.name, &existing.name)
            || differs(&self.brand, &existing.brand)
            || differs(&self.legal_name, &existing.legal_name)
            || differs(&self.upc, &existing.upc)
            || differs(&self.length_in, &existing.length_in)
            || differs(&self.width_in, &existing.width_in)
            || differs(&self.height_in, &existing.height_in)
            || differs(&self.weight_lb, &existing.weight_lb)
            || (self.marketplace_id.is_some() && existing.marketplace_id.is_none())
            || (self.ordered && !existing.ordered)
            || (self.vendor_setup && !existing.vendor_setup)
            || (self.listed && !existing.listed)
            || (self.finalized && !existing.finalized)
    }
}

/// Look up an item by natural key
pub async fn find_by_sku(pool: &SqlitePool, sku: &str) -> Result<Option<ItemRecord>> {
    let row = sqlx::query(
        r#"
        SELECT sku, name, brand, legal_name, upc,
               length_in, width_in, height_in, weight_lb,
               marketplace_id, ordered, vendor_setup, listed, finalized,
               updated_at
        FROM items
        WHERE sku = ?
        "#,
    )
    .bind(sku)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let updated_at_str: String = row.get("updated_at");

            Ok(Some(ItemRecord {
                sku: row.get("sku"),
                name: row.get("name"),
                brand: row.get("brand"),
                legal_name: row.get("legal_name"),
                upc: row.get("upc"),
                length_in: row.get("length_in"),
                width_in: row.get("width_in"),
                height_in: row.get("height_in"),
                weight_lb: row.get("weight_lb"),
                marketplace_id: row.get("marketplace_id"),
                ordered: row.get("ordered"),
                vendor_setup: row.get("vendor_setup"),
                listed: row.get("listed"),
                finalized: row.get("finalized"),
                updated_at: parse_timestamp(&updated_at_str),
            }))
        }
        None => Ok(None),
    }
}

/// Insert a new item with the supplied fields
///
/// Races with a concurrent creator of the same SKU converge through the
/// same merge expressions the update path uses.
pub async fn insert_new(pool: &SqlitePool, sku: &str, patch: &ItemPatch) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO items (sku, name, brand, legal_name, upc,
                           length_in, width_in, height_in, weight_lb,
                           marketplace_id, ordered, vendor_setup, listed, finalized,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(sku) DO UPDATE SET
            name = COALESCE(excluded.name, name),
            brand = COALESCE(excluded.brand, brand),
            legal_name = COALESCE(excluded.legal_name, legal_name),
            upc = COALESCE(excluded.upc, upc),
            length_in = COALESCE(excluded.length_in, length_in),
            width_in = COALESCE(excluded.width_in, width_in),
            height_in = COALESCE(excluded.height_in, height_in),
            weight_lb = COALESCE(excluded.weight_lb, weight_lb),
            marketplace_id = COALESCE(marketplace_id, excluded.marketplace_id),
            ordered = ordered OR excluded.ordered,
            vendor_setup = vendor_setup OR excluded.vendor_setup,
            listed = listed OR excluded.listed,
            finalized = finalized OR excluded.finalized,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(sku)
    .bind(&patch.name)
    .bind(&patch.brand)
    .bind(&patch.legal_name)
    .bind(&patch.upc)
    .bind(patch.length_in)
    .bind(patch.width_in)
    .bind(patch.height_in)
    .bind(patch.weight_lb)
    .bind(&patch.marketplace_id)
    .bind(patch.ordered)
    .bind(patch.vendor_setup)
    .bind(patch.listed)
    .bind(patch.finalized)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Merge a partial update into an existing item
///
/// Returns the number of rows affected (0 when the SKU does not exist).
/// The caller decides whether to issue this at all; an identical patch
/// should be skipped upstream so `updated_at` stays meaningful.
pub async fn merge_update(pool: &SqlitePool, sku: &str, patch: &ItemPatch) -> Result<u64> {
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE items SET
            name = COALESCE(?, name),
            brand = COALESCE(?, brand),
            legal_name = COALESCE(?, legal_name),
            upc = COALESCE(?, upc),
            length_in = COALESCE(?, length_in),
            width_in = COALESCE(?, width_in),
            height_in = COALESCE(?, height_in),
            weight_lb = COALESCE(?, weight_lb),
            marketplace_id = COALESCE(marketplace_id, ?),
            ordered = ordered OR ?,
            vendor_setup = vendor_setup OR ?,
            listed = listed OR ?,
            finalized = finalized OR ?,
            updated_at = ?
        WHERE sku = ?
        "#,
    )
    .bind(&patch.name)
    .bind(&patch.brand)
    .bind(&patch.legal_name)
    .bind(&patch.upc)
    .bind(patch.length_in)
    .bind(patch.width_in)
    .bind(patch.height_in)
    .bind(patch.weight_lb)
    .bind(&patch.marketplace_id)
    .bind(patch.ordered)
    .bind(patch.vendor_setup)
    .bind(patch.listed)
    .bind(patch.finalized)
    .bind(&now)
    .bind(sku)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Count items in the store
pub async fn count_items(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Parse a stored timestamp, tolerating both RFC 3339 (our writes) and
/// SQLite's CURRENT_TIMESTAMP format (other writers)
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        crate::db::init::create_items_table(&pool).await.unwrap();
        pool
    }

    fn named_patch(name: &str) -> ItemPatch {
        ItemPatch {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let pool = setup_pool().await;

        let patch = ItemPatch {
            name: Some("Widget".to_string()),
            brand: Some("Acme".to_string()),
            ordered: true,
            ..Default::default()
        };
        insert_new(&pool, "X1", &patch).await.unwrap();

        let item = find_by_sku(&pool, "X1").await.unwrap().unwrap();
        assert_eq!(item.sku, "X1");
        assert_eq!(item.name.as_deref(), Some("Widget"));
        assert_eq!(item.brand.as_deref(), Some("Acme"));
        assert!(item.ordered);
        assert!(!item.listed);

        assert!(find_by_sku(&pool, "X2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_preserves_fields_the_patch_lacks() {
        let pool = setup_pool().await;
        insert_new(&pool, "X1", &named_patch("Widget")).await.unwrap();

        let patch = ItemPatch {
            brand: Some("Acme".to_string()),
            ..Default::default()
        };
        let affected = merge_update(&pool, "X1", &patch).await.unwrap();
        assert_eq!(affected, 1);

        let item = find_by_sku(&pool, "X1").await.unwrap().unwrap();
        assert_eq!(item.name.as_deref(), Some("Widget"));
        assert_eq!(item.brand.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_marketplace_id_first_writer_wins() {
        let pool = setup_pool().await;
        insert_new(&pool, "X1", &named_patch("Widget")).await.unwrap();

        let first = ItemPatch {
            marketplace_id: Some("MKT-001".to_string()),
            ..Default::default()
        };
        merge_update(&pool, "X1", &first).await.unwrap();

        let second = ItemPatch {
            marketplace_id: Some("MKT-999".to_string()),
            ..Default::default()
        };
        merge_update(&pool, "X1", &second).await.unwrap();

        let item = find_by_sku(&pool, "X1").await.unwrap().unwrap();
        assert_eq!(item.marketplace_id.as_deref(), Some("MKT-001"));
    }

    #[tokio::test]
    async fn test_flags_never_regress() {
        let pool = setup_pool().await;
        insert_new(&pool, "X1", &named_patch("Widget")).await.unwrap();

        let advance = ItemPatch {
            listed: true,
            ..Default::default()
        };
        merge_update(&pool, "X1", &advance).await.unwrap();

        // A later patch without the flag must not clear it
        merge_update(&pool, "X1", &named_patch("Widget v2")).await.unwrap();

        let item = find_by_sku(&pool, "X1").await.unwrap().unwrap();
        assert!(item.listed);
        assert_eq!(item.name.as_deref(), Some("Widget v2"));
    }

    #[tokio::test]
    async fn test_insert_conflict_converges() {
        let pool = setup_pool().await;
        insert_new(&pool, "X1", &named_patch("Widget")).await.unwrap();

        // Second insert of the same SKU merges instead of duplicating
        let patch = ItemPatch {
            listed: true,
            ..Default::default()
        };
        insert_new(&pool, "X1", &patch).await.unwrap();

        assert_eq!(count_items(&pool).await.unwrap(), 1);
        let item = find_by_sku(&pool, "X1").await.unwrap().unwrap();
        assert_eq!(item.name.as_deref(), Some("Widget"));
        assert!(item.listed);
    }

    #[tokio::test]
    async fn test_would_change_detection() {
        let pool = setup_pool().await;
        let patch = ItemPatch {
            name: Some("Widget".to_string()),
            listed: true,
            ..Default::default()
        };
        insert_new(&pool, "X1", &patch).await.unwrap();
        let item = find_by_sku(&pool, "X1").await.unwrap().unwrap();

        // Identical patch changes nothing
        assert!(!patch.would_change(&item));

        // New attribute value changes
        assert!(named_patch("Widget v2").would_change(&item));

        // Marketplace id only counts while unset
        let with_id = ItemPatch {
            marketplace_id: Some("MKT-001".to_string()),
            ..Default::default()
        };
        assert!(with_id.would_change(&item));

        // A flag already set does not count as a change
        let listed_again = ItemPatch {
            listed: true,
            ..Default::default()
        };
        assert!(!listed_again.would_change(&item));
    }
}
