//! Plan item storage operations.
//!
//! Items are the shared records merged across a linked pair. Every query here
//! filters on an owner-id set that callers obtain from
//! `linking::resolve_visible_accounts`; nothing in this module decides
//! visibility on its own.

use redb::ReadableTable;
use uuid::Uuid;

use crate::db::{self, tables, Db};
use crate::error::{AppError, Result};
use crate::models::PlanItemRecord;

/// Fields for a new plan item
#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: String,
    pub category: String,
    pub due_at: Option<i64>,
    pub remind_enabled: bool,
}

/// Partial update for an existing plan item; None leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub due_at: Option<i64>,
    pub remind_enabled: Option<bool>,
}

/// Result of the cheap pre-check query: just enough to build a fingerprint
/// without materializing rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySummary {
    pub max_updated_at: Option<i64>,
    pub count: u64,
}

/// Create a plan item owned by `owner_id` and index it for owner-set queries.
pub fn create_item(db: &Db, owner_id: &str, new: NewItem, now: i64) -> Result<(String, PlanItemRecord)> {
    let item_id = Uuid::new_v4().to_string();
    let record = PlanItemRecord::new(
        owner_id.to_string(),
        new.title,
        new.category,
        new.due_at,
        new.remind_enabled,
        now,
    );

    let write_txn = db.begin_write()?;
    {
        let mut items = write_txn.open_table(tables::ITEMS)?;
        items.insert(item_id.as_str(), db::encode(&record)?.as_slice())?;
        drop(items);

        let mut owner_items = write_txn.open_table(tables::OWNER_ITEMS)?;
        let mut ids: Vec<String> = owner_items
            .get(owner_id)?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?
            .unwrap_or_default();
        ids.push(item_id.clone());
        owner_items.insert(owner_id, db::encode(&ids)?.as_slice())?;
    }
    write_txn.commit()?;

    tracing::info!("Item {} created for account {}", item_id, owner_id);
    Ok((item_id, record))
}

/// Apply a partial update to an item.
///
/// `visible_owners` is the editor's visible-account set; an item owned outside
/// that set is reported as not found rather than forbidden. Reminder sent
/// markers are never touched here.
pub fn update_item(
    db: &Db,
    item_id: &str,
    visible_owners: &[String],
    patch: ItemPatch,
    now: i64,
) -> Result<PlanItemRecord> {
    let write_txn = db.begin_write()?;
    let record = {
        let mut items = write_txn.open_table(tables::ITEMS)?;
        let mut record: PlanItemRecord = items
            .get(item_id)?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?
            .ok_or(AppError::ItemNotFound)?;

        if !visible_owners.contains(&record.owner_id) {
            return Err(AppError::ItemNotFound);
        }

        if let Some(title) = patch.title {
            record.title = title;
        }
        if let Some(category) = patch.category {
            record.category = category;
        }
        if let Some(due_at) = patch.due_at {
            record.due_at = Some(due_at);
        }
        if let Some(remind_enabled) = patch.remind_enabled {
            record.remind_enabled = remind_enabled;
        }
        record.updated_at = now;

        items.insert(item_id, db::encode(&record)?.as_slice())?;
        record
    };
    write_txn.commit()?;

    tracing::info!("Item {} updated", item_id);
    Ok(record)
}

/// Cheap pre-check for the conditional read protocol: maximum `updated_at`
/// and row count over the filtered owner set, no row materialization.
///
/// Ties on `updated_at` keep the already-seen maximum (strict ordering, no
/// regression).
pub fn scan_summary(db: &Db, owners: &[String], category: Option<&str>) -> Result<QuerySummary> {
    let read_txn = db.begin_read()?;
    let items = read_txn.open_table(tables::ITEMS)?;
    let owner_items = read_txn.open_table(tables::OWNER_ITEMS)?;

    let mut max_updated_at: Option<i64> = None;
    let mut count = 0u64;

    for owner in owners {
        let ids: Vec<String> = owner_items
            .get(owner.as_str())?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?
            .unwrap_or_default();

        for id in ids {
            let record: PlanItemRecord = match items.get(id.as_str())? {
                Some(bytes) => db::decode(bytes.value())?,
                None => continue,
            };
            if let Some(category) = category {
                if record.category != category {
                    continue;
                }
            }
            count += 1;
            if max_updated_at.map_or(true, |max| record.updated_at > max) {
                max_updated_at = Some(record.updated_at);
            }
        }
    }

    Ok(QuerySummary {
        max_updated_at,
        count,
    })
}

/// Full filtered query over the owner set, ordered deterministically.
pub fn list_items(
    db: &Db,
    owners: &[String],
    category: Option<&str>,
) -> Result<Vec<(String, PlanItemRecord)>> {
    let read_txn = db.begin_read()?;
    let items = read_txn.open_table(tables::ITEMS)?;
    let owner_items = read_txn.open_table(tables::OWNER_ITEMS)?;

    let mut rows = Vec::new();
    for owner in owners {
        let ids: Vec<String> = owner_items
            .get(owner.as_str())?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?
            .unwrap_or_default();

        for id in ids {
            let record: PlanItemRecord = match items.get(id.as_str())? {
                Some(bytes) => db::decode(bytes.value())?,
                None => continue,
            };
            if let Some(category) = category {
                if record.category != category {
                    continue;
                }
            }
            rows.push((id, record));
        }
    }

    rows.sort_by(|(id_a, a), (id_b, b)| {
        (a.created_at, id_a.as_str()).cmp(&(b.created_at, id_b.as_str()))
    });
    Ok(rows)
}

/// Summarize already-materialized rows.
///
/// The conditional read protocol recomputes the validator from the rows
/// actually returned, so a write landing between the cheap pre-check and the
/// full query can never stamp stale data as fresh.
pub fn summarize_rows(rows: &[(String, PlanItemRecord)]) -> QuerySummary {
    let mut max_updated_at: Option<i64> = None;
    for (_, record) in rows {
        if max_updated_at.map_or(true, |max| record.updated_at > max) {
            max_updated_at = Some(record.updated_at);
        }
    }
    QuerySummary {
        max_updated_at,
        count: rows.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NOW: i64 = 1_733_788_800;

    fn test_db() -> (TempDir, Db) {
        let temp_dir = TempDir::new().unwrap();
        let db = crate::db::open_database(temp_dir.path().join("test.db")).unwrap();
        (temp_dir, db)
    }

    fn new_item(title: &str, category: &str) -> NewItem {
        NewItem {
            title: title.to_string(),
            category: category.to_string(),
            due_at: None,
            remind_enabled: false,
        }
    }

    #[test]
    fn test_create_and_list_across_owner_set() {
        let (_dir, db) = test_db();
        create_item(&db, "aaa", new_item("venue", "wedding"), NOW).unwrap();
        create_item(&db, "bbb", new_item("apartment", "estate"), NOW + 1).unwrap();
        create_item(&db, "ccc", new_item("invisible", "wedding"), NOW + 2).unwrap();

        let owners = vec!["aaa".to_string(), "bbb".to_string()];
        let rows = list_items(&db, &owners, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.title, "venue");
        assert_eq!(rows[1].1.title, "apartment");
    }

    #[test]
    fn test_category_filter() {
        let (_dir, db) = test_db();
        create_item(&db, "aaa", new_item("venue", "wedding"), NOW).unwrap();
        create_item(&db, "aaa", new_item("apartment", "estate"), NOW + 1).unwrap();

        let owners = vec!["aaa".to_string()];
        let rows = list_items(&db, &owners, Some("wedding")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.title, "venue");
    }

    #[test]
    fn test_scan_summary_tracks_max_and_count() {
        let (_dir, db) = test_db();
        create_item(&db, "aaa", new_item("one", "wedding"), NOW).unwrap();
        create_item(&db, "aaa", new_item("two", "wedding"), NOW + 5).unwrap();
        create_item(&db, "aaa", new_item("other", "estate"), NOW + 99).unwrap();

        let owners = vec!["aaa".to_string()];
        let summary = scan_summary(&db, &owners, Some("wedding")).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.max_updated_at, Some(NOW + 5));

        let empty = scan_summary(&db, &owners, Some("travel")).unwrap();
        assert_eq!(empty.count, 0);
        assert_eq!(empty.max_updated_at, None);
    }

    #[test]
    fn test_summary_matches_materialized_rows() {
        let (_dir, db) = test_db();
        create_item(&db, "aaa", new_item("one", "wedding"), NOW).unwrap();
        create_item(&db, "aaa", new_item("two", "wedding"), NOW + 5).unwrap();

        let owners = vec!["aaa".to_string()];
        let summary = scan_summary(&db, &owners, None).unwrap();
        let rows = list_items(&db, &owners, None).unwrap();
        assert_eq!(summarize_rows(&rows), summary);
    }

    #[test]
    fn test_update_moves_updated_at() {
        let (_dir, db) = test_db();
        let (id, _) = create_item(&db, "aaa", new_item("venue", "wedding"), NOW).unwrap();

        let owners = vec!["aaa".to_string()];
        let patch = ItemPatch {
            title: Some("venue (booked)".to_string()),
            ..Default::default()
        };
        let record = update_item(&db, &id, &owners, patch, NOW + 100).unwrap();
        assert_eq!(record.title, "venue (booked)");
        assert_eq!(record.updated_at, NOW + 100);
        assert_eq!(record.created_at, NOW);
    }

    #[test]
    fn test_update_outside_visible_set_is_not_found() {
        let (_dir, db) = test_db();
        let (id, _) = create_item(&db, "aaa", new_item("venue", "wedding"), NOW).unwrap();

        let strangers = vec!["bbb".to_string()];
        let result = update_item(&db, &id, &strangers, ItemPatch::default(), NOW);
        assert!(matches!(result, Err(AppError::ItemNotFound)));
    }
}
