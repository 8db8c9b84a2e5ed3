/// A work item as cached and displayed locally.
///
/// The id is the only required field; everything else is whatever the
/// remote service had filled in at fetch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
  pub id: i64,
  pub work_item_type: Option<String>,
  pub title: Option<String>,
  pub assigned_to: Option<String>,
  pub state: Option<String>,
  pub tags: Option<String>,
  pub start_date: Option<String>,
  pub target_date: Option<String>,
}

#[cfg(test)]
impl WorkItem {
  /// Minimal item for tests: id plus a title.
  pub fn stub(id: i64, title: &str) -> Self {
    Self {
      id,
      work_item_type: Some("Product Backlog Item".to_string()),
      title: Some(title.to_string()),
      assigned_to: None,
      state: None,
      tags: None,
      start_date: None,
      target_date: None,
    }
  }
}
