//! Persistent work item cache backed by SQLite.
//!
//! A single-table keyed store: every record is wholly replaced on upsert
//! (no field-level merge), and batched writes run inside one transaction so
//! a batch lands atomically or not at all.

pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::devops::types::WorkItem;

/// SQLite-backed store for cached work items.
pub struct WorkItemStore {
  conn: Mutex<Connection>,
}

impl WorkItemStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open or create the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an in-memory store. Used by tests and throwaway runs.
  #[allow(dead_code)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("witsync").join("work_items.db"))
  }

  /// Run database migrations.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;

    Ok(())
  }

  /// List all cached work items, ordered by id.
  pub fn list(&self) -> Result<Vec<WorkItem>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT Id, WorkItemType, Title, AssignedTo, State, Tags, StartDate, TargetDate
         FROM work_items ORDER BY Id",
      )
      .map_err(|e| eyre!("Failed to prepare listing query: {}", e))?;

    let items = stmt
      .query_map([], row_to_item)
      .map_err(|e| eyre!("Failed to query work items: {}", e))?
      .collect::<rusqlite::Result<Vec<WorkItem>>>()
      .map_err(|e| eyre!("Failed to read work item row: {}", e))?;

    Ok(items)
  }

  /// The set of cached work item ids.
  pub fn ids(&self) -> Result<HashSet<i64>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT Id FROM work_items")
      .map_err(|e| eyre!("Failed to prepare id query: {}", e))?;

    let ids = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query ids: {}", e))?
      .collect::<rusqlite::Result<HashSet<i64>>>()
      .map_err(|e| eyre!("Failed to read id row: {}", e))?;

    Ok(ids)
  }

  /// Whether the cache holds no records at all.
  pub fn is_empty(&self) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM work_items", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count work items: {}", e))?;

    Ok(count == 0)
  }

  /// Delete a batch of ids. The whole batch is one transaction.
  pub fn delete(&self, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }

    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let mut deleted = 0;
    for id in ids {
      deleted += tx
        .execute("DELETE FROM work_items WHERE Id = ?", params![id])
        .map_err(|e| eyre!("Failed to delete work item {}: {}", id, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit deletes: {}", e))?;

    Ok(deleted)
  }

  /// Insert or replace a batch of records, keyed by id.
  /// The whole batch is one transaction.
  pub fn upsert(&self, items: &[WorkItem]) -> Result<()> {
    if items.is_empty() {
      return Ok(());
    }

    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for item in items {
      tx.execute(
        "INSERT OR REPLACE INTO work_items
           (Id, WorkItemType, Title, AssignedTo, State, Tags, StartDate, TargetDate)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
          item.id,
          item.work_item_type,
          item.title,
          item.assigned_to,
          item.state,
          item.tags,
          item.start_date,
          item.target_date,
        ],
      )
      .map_err(|e| eyre!("Failed to store work item {}: {}", item.id, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit upserts: {}", e))?;

    Ok(())
  }
}

fn row_to_item(row: &Row) -> rusqlite::Result<WorkItem> {
  Ok(WorkItem {
    id: row.get(0)?,
    work_item_type: row.get(1)?,
    title: row.get(2)?,
    assigned_to: row.get(3)?,
    state: row.get(4)?,
    tags: row.get(5)?,
    start_date: row.get(6)?,
    target_date: row.get(7)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_store() {
    let store = WorkItemStore::open_in_memory().unwrap();
    assert!(store.is_empty().unwrap());
    assert!(store.list().unwrap().is_empty());
    assert!(store.ids().unwrap().is_empty());
  }

  #[test]
  fn test_upsert_and_list_ordered() {
    let store = WorkItemStore::open_in_memory().unwrap();
    store
      .upsert(&[WorkItem::stub(3, "three"), WorkItem::stub(1, "one")])
      .unwrap();

    let items = store.list().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, 1);
    assert_eq!(items[1].id, 3);
    assert!(!store.is_empty().unwrap());
  }

  #[test]
  fn test_upsert_replaces_whole_record() {
    let store = WorkItemStore::open_in_memory().unwrap();

    let mut item = WorkItem::stub(5, "old title");
    item.state = Some("Committed".to_string());
    store.upsert(&[item]).unwrap();

    // Re-sync with a changed title and no state: the record is replaced,
    // not merged field by field.
    store.upsert(&[WorkItem::stub(5, "new title")]).unwrap();

    let items = store.list().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title.as_deref(), Some("new title"));
    assert!(items[0].state.is_none());
  }

  #[test]
  fn test_delete_batch() {
    let store = WorkItemStore::open_in_memory().unwrap();
    store
      .upsert(&[
        WorkItem::stub(1, "a"),
        WorkItem::stub(2, "b"),
        WorkItem::stub(3, "c"),
      ])
      .unwrap();

    let deleted = store.delete(&[1, 3, 99]).unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(store.ids().unwrap(), HashSet::from([2]));
  }

  #[test]
  fn test_delete_empty_batch_is_noop() {
    let store = WorkItemStore::open_in_memory().unwrap();
    store.upsert(&[WorkItem::stub(1, "a")]).unwrap();
    assert_eq!(store.delete(&[]).unwrap(), 0);
    assert_eq!(store.ids().unwrap(), HashSet::from([1]));
  }

  #[test]
  fn test_nullable_fields_round_trip() {
    let store = WorkItemStore::open_in_memory().unwrap();
    let item = WorkItem {
      id: 7,
      work_item_type: None,
      title: None,
      assigned_to: Some("Jamie Doe".to_string()),
      state: None,
      tags: None,
      start_date: Some("2025-06-01T00:00:00Z".to_string()),
      target_date: None,
    };
    store.upsert(&[item.clone()]).unwrap();

    assert_eq!(store.list().unwrap(), vec![item]);
  }

  #[test]
  fn test_open_at_creates_parent_dirs_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("work_items.db");

    {
      let store = WorkItemStore::open_at(&path).unwrap();
      store.upsert(&[WorkItem::stub(1, "persisted")]).unwrap();
    }

    // Reopen: data survives the process that wrote it
    let store = WorkItemStore::open_at(&path).unwrap();
    assert_eq!(store.ids().unwrap(), HashSet::from([1]));
  }
}
