//! Reconciliation of mapped feed records into the item store
//!
//! Each record is an independent upsert keyed by SKU. The reconciler
//! decides *whether* to write (create permission, change detection); the
//! merge rules themselves live in the store's single-statement SQL so
//! concurrent writers on the same key stay row-atomic.

use merx_common::db::items::{self, ItemPatch};
use merx_common::Result;
use sqlx::SqlitePool;

use crate::feeds::SourceTag;

/// Outcome of one upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed; one was created
    Created,
    /// Record existed and at least one field advanced
    Updated,
    /// Record existed and the patch was already reflected
    Unchanged,
    /// No record existed and this source may not create one
    Unmatched,
}

impl UpsertOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, UpsertOutcome::Created | UpsertOutcome::Updated)
    }
}

/// May this source create item records, or only annotate existing ones?
///
/// The marketplace snapshot reports on listings we already track; a SKU
/// it mentions that the catalog has never seen is noise, not a new item.
fn may_create(source: SourceTag) -> bool {
    match source {
        SourceTag::Qpi | SourceTag::Pim => true,
        SourceTag::Status => false,
    }
}

/// Upsert engine over the shared item store
#[derive(Clone)]
pub struct Reconciler {
    db: SqlitePool,
}

impl Reconciler {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Apply one mapped record
    ///
    /// Algorithm:
    /// 1. Look up the existing record by SKU.
    /// 2. Absent: insert (sources with create permission) or report
    ///    `Unmatched`.
    /// 3. Present: skip the write entirely when the patch would change
    ///    nothing, so `updated_at` only moves on real changes; otherwise
    ///    issue the atomic merge statement.
    pub async fn upsert(
        &self,
        sku: &str,
        patch: &ItemPatch,
        source: SourceTag,
    ) -> Result<UpsertOutcome> {
        match items::find_by_sku(&self.db, sku).await? {
            Some(existing) => {
                if !patch.would_change(&existing) {
                    return Ok(UpsertOutcome::Unchanged);
                }
                let affected = items::merge_update(&self.db, sku, patch).await?;
                if affected > 0 {
                    Ok(UpsertOutcome::Updated)
                } else {
                    // Row vanished between lookup and merge (shared store);
                    // fall back to the absent-record path
                    self.insert_if_permitted(sku, patch, source).await
                }
            }
            None => self.insert_if_permitted(sku, patch, source).await,
        }
    }

    async fn insert_if_permitted(
        &self,
        sku: &str,
        patch: &ItemPatch,
        source: SourceTag,
    ) -> Result<UpsertOutcome> {
        if !may_create(source) {
            return Ok(UpsertOutcome::Unmatched);
        }
        items::insert_new(&self.db, sku, patch).await?;
        Ok(UpsertOutcome::Created)
    }
}
