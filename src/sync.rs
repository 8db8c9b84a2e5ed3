//! Reconciliation between the remote work item listing and the local cache.
//!
//! One pass aligns the cached id set with the remote id set: stale records
//! are deleted, missing ones are fetched and merged. Records already cached
//! are never re-fetched; they only change by leaving and re-entering the
//! remote listing.

use async_trait::async_trait;
use color_eyre::Result;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::devops::types::WorkItem;
use crate::store::WorkItemStore;

/// The remote side of a sync: list matching ids, fetch one record.
#[async_trait]
pub trait RemoteSource: Send + Sync {
  async fn query_ids(&self) -> Result<Vec<i64>>;
  async fn fetch_item(&self, id: i64) -> Result<WorkItem>;
}

/// What a sync pass will do, computed before any record is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
  /// Cached ids no longer present remotely
  pub to_delete: Vec<i64>,
  /// Remote ids not yet cached, in remote listing order
  pub to_fetch: Vec<i64>,
}

impl SyncPlan {
  /// Diff the remote id listing against the locally cached id set.
  pub fn compute(remote: &[i64], local: &HashSet<i64>) -> Self {
    let remote_set: HashSet<i64> = remote.iter().copied().collect();

    let mut to_delete: Vec<i64> = local.difference(&remote_set).copied().collect();
    to_delete.sort_unstable();

    let mut seen = HashSet::new();
    let to_fetch = remote
      .iter()
      .copied()
      .filter(|id| !local.contains(id) && seen.insert(*id))
      .collect();

    Self {
      to_delete,
      to_fetch,
    }
  }
}

/// Summary of one reconciliation pass.
#[derive(Debug)]
pub struct SyncOutcome {
  /// Records removed because they left the remote listing
  pub deleted: usize,
  /// Records fetched and merged into the cache
  pub fetched: usize,
  /// Ids whose detail fetch failed; they stay absent until the next pass
  pub failed: Vec<i64>,
  /// The full cache contents after the pass
  pub items: Vec<WorkItem>,
}

impl SyncOutcome {
  /// True when the pass changed nothing.
  pub fn nothing_new(&self) -> bool {
    self.deleted == 0 && self.fetched == 0 && self.failed.is_empty()
  }
}

/// Aligns the local cache with the remote work item listing.
pub struct Reconciler<'a, R: RemoteSource> {
  remote: &'a R,
  store: &'a WorkItemStore,
}

impl<'a, R: RemoteSource> Reconciler<'a, R> {
  pub fn new(remote: &'a R, store: &'a WorkItemStore) -> Self {
    Self { remote, store }
  }

  /// Run one reconciliation pass.
  ///
  /// A failed remote listing aborts before the cache is touched. An empty
  /// listing is treated as "nothing to sync" rather than "delete
  /// everything" - it is indistinguishable from a remote outage. Individual
  /// detail-fetch failures are logged and skipped; the affected ids remain
  /// uncached and are picked up again on the next pass.
  pub async fn run(&self) -> Result<SyncOutcome> {
    let remote_ids = self.remote.query_ids().await?;

    if remote_ids.is_empty() {
      warn!("remote listing returned no work items, leaving cache untouched");
      return Ok(SyncOutcome {
        deleted: 0,
        fetched: 0,
        failed: Vec::new(),
        items: self.store.list()?,
      });
    }

    let local_ids = self.store.ids()?;
    let plan = SyncPlan::compute(&remote_ids, &local_ids);

    let deleted = self.store.delete(&plan.to_delete)?;
    if deleted > 0 {
      info!(deleted, "removed work items no longer present remotely");
    }

    if plan.to_fetch.is_empty() {
      info!("no new work items to download");
      return Ok(SyncOutcome {
        deleted,
        fetched: 0,
        failed: Vec::new(),
        items: self.store.list()?,
      });
    }

    info!(count = plan.to_fetch.len(), "downloading new work items");

    let mut fetched = Vec::with_capacity(plan.to_fetch.len());
    let mut failed = Vec::new();
    for &id in &plan.to_fetch {
      match self.remote.fetch_item(id).await {
        Ok(item) => fetched.push(item),
        Err(e) => {
          warn!(id, error = %e, "failed to fetch work item, skipping");
          failed.push(id);
        }
      }
    }

    self.store.upsert(&fetched)?;

    Ok(SyncOutcome {
      deleted,
      fetched: fetched.len(),
      failed,
      items: self.store.list()?,
    })
  }
}
