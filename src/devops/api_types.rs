//! Serde-deserializable types matching Azure DevOps API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;

use super::types::WorkItem;

// ============================================================================
// WIQL query endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiWiqlResponse {
  #[serde(rename = "workItems", default)]
  pub work_items: Vec<ApiWorkItemRef>,
}

/// Id-plus-url reference as returned by the WIQL endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiWorkItemRef {
  pub id: i64,
}

// ============================================================================
// Work item detail endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiWorkItem {
  pub id: i64,
  #[serde(default)]
  pub fields: ApiWorkItemFields,
}

/// The subset of the work item field bag this tool cares about.
///
/// Azure DevOps returns fields under their fully qualified reference names.
/// Dates arrive as ISO 8601 strings and are stored verbatim.
#[derive(Debug, Deserialize, Default)]
pub struct ApiWorkItemFields {
  #[serde(rename = "System.WorkItemType")]
  pub work_item_type: Option<String>,
  #[serde(rename = "System.Title")]
  pub title: Option<String>,
  #[serde(rename = "System.AssignedTo")]
  pub assigned_to: Option<ApiIdentity>,
  #[serde(rename = "System.State")]
  pub state: Option<String>,
  #[serde(rename = "System.Tags")]
  pub tags: Option<String>,
  #[serde(rename = "Microsoft.VSTS.Scheduling.StartDate")]
  pub start_date: Option<String>,
  #[serde(rename = "Microsoft.VSTS.Scheduling.TargetDate")]
  pub target_date: Option<String>,
}

/// Identity fields are either a full identity object or, on older
/// on-premise servers, a plain "Display Name <email>" string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiIdentity {
  Identity {
    #[serde(rename = "displayName")]
    display_name: String,
  },
  Raw(String),
}

impl ApiIdentity {
  pub fn into_display_name(self) -> String {
    match self {
      ApiIdentity::Identity { display_name } => display_name,
      ApiIdentity::Raw(s) => s,
    }
  }
}

impl ApiWorkItem {
  /// Flatten the field bag into the domain record.
  pub fn into_work_item(self) -> WorkItem {
    WorkItem {
      id: self.id,
      work_item_type: self.fields.work_item_type,
      title: self.fields.title,
      assigned_to: self.fields.assigned_to.map(ApiIdentity::into_display_name),
      state: self.fields.state,
      tags: self.fields.tags,
      start_date: self.fields.start_date,
      target_date: self.fields.target_date,
    }
  }
}
