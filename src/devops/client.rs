use async_trait::async_trait;
use base64::Engine;
use color_eyre::{eyre::eyre, Result};
use tracing::debug;
use url::Url;

use crate::config::DevOpsConfig;
use crate::devops::api_types::{ApiWiqlResponse, ApiWorkItem};
use crate::devops::types::WorkItem;
use crate::sync::RemoteSource;

const API_VERSION: &str = "6.0";

/// Azure DevOps API client wrapper
#[derive(Clone)]
pub struct DevOpsClient {
  http: reqwest::Client,
  base: Url,
  project: String,
  auth_header: String,
  work_item_types: Vec<String>,
  assigned_to: Option<String>,
}

impl DevOpsClient {
  pub fn new(config: &DevOpsConfig, pat: &str) -> Result<Self> {
    let base = Url::parse(&config.organization_url)
      .map_err(|e| eyre!("Invalid organization URL {}: {}", config.organization_url, e))?;

    // PATs go over basic auth with an empty user name
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{}", pat));

    Ok(Self {
      http: reqwest::Client::new(),
      base,
      project: config.project.clone(),
      auth_header: format!("Basic {}", encoded),
      work_item_types: config.work_item_types.clone(),
      assigned_to: config.assigned_to.clone(),
    })
  }

  /// Query the ids of all work items matching the configured filters
  pub async fn query_work_item_ids(&self) -> Result<Vec<i64>> {
    let url = self.api_url(&["wit", "wiql"], &[("api-version", API_VERSION)])?;
    let wiql = build_wiql(&self.project, &self.work_item_types, self.assigned_to.as_deref());
    debug!(%url, %wiql, "querying work item ids");

    let body = serde_json::json!({ "query": wiql });

    let response = self
      .http
      .post(url)
      .header("Authorization", &self.auth_header)
      .header("Accept", "application/json")
      .json(&body)
      .send()
      .await
      .map_err(|e| eyre!("Failed to query work item ids: {}", e))?
      .error_for_status()
      .map_err(|e| eyre!("Work item id query rejected: {}", e))?;

    let parsed: ApiWiqlResponse = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse WIQL response: {}", e))?;

    Ok(parsed.work_items.into_iter().map(|r| r.id).collect())
  }

  /// Fetch the full field bag for a single work item
  pub async fn get_work_item(&self, id: i64) -> Result<WorkItem> {
    let url = self.api_url(
      &["wit", "workitems", &id.to_string()],
      &[("$expand", "all"), ("api-version", API_VERSION)],
    )?;
    debug!(%url, id, "fetching work item");

    let response = self
      .http
      .get(url)
      .header("Authorization", &self.auth_header)
      .header("Accept", "application/json")
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch work item {}: {}", id, e))?
      .error_for_status()
      .map_err(|e| eyre!("Work item {} fetch rejected: {}", id, e))?;

    let parsed: ApiWorkItem = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse work item {}: {}", id, e))?;

    Ok(parsed.into_work_item())
  }

  /// Build a project-scoped API URL. Path segments are percent-encoded, so
  /// project names with spaces are handled.
  fn api_url(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Url> {
    let mut url = self.base.clone();
    {
      let mut path = url
        .path_segments_mut()
        .map_err(|_| eyre!("Organization URL cannot be a base: {}", self.base))?;
      path.pop_if_empty();
      path.push(&self.project);
      path.push("_apis");
      for segment in segments {
        path.push(segment);
      }
    }
    for (key, value) in params {
      url.query_pairs_mut().append_pair(key, value);
    }
    Ok(url)
  }
}

#[async_trait]
impl RemoteSource for DevOpsClient {
  async fn query_ids(&self) -> Result<Vec<i64>> {
    self.query_work_item_ids().await
  }

  async fn fetch_item(&self, id: i64) -> Result<WorkItem> {
    self.get_work_item(id).await
  }
}

/// Build the WIQL id query from the configured filters.
fn build_wiql(project: &str, work_item_types: &[String], assigned_to: Option<&str>) -> String {
  let mut wiql = format!(
    "SELECT [System.Id] FROM WorkItems WHERE [System.TeamProject] = '{}'",
    escape_wiql(project)
  );

  if !work_item_types.is_empty() {
    let types = work_item_types
      .iter()
      .map(|t| format!("'{}'", escape_wiql(t)))
      .collect::<Vec<_>>()
      .join(", ");
    wiql.push_str(&format!(" AND [System.WorkItemType] IN ({})", types));
  }

  if let Some(name) = assigned_to {
    wiql.push_str(&format!(" AND [System.AssignedTo] = '{}'", escape_wiql(name)));
  }

  wiql
}

/// WIQL string literals escape single quotes by doubling them.
fn escape_wiql(value: &str) -> String {
  value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn test_config() -> DevOpsConfig {
    DevOpsConfig {
      organization_url: "https://dev.azure.com/acme".to_string(),
      project: "Parts and Services Global".to_string(),
      work_item_types: vec!["Product Backlog Item".to_string()],
      assigned_to: None,
    }
  }

  #[test]
  fn test_wiql_project_and_types() {
    let wiql = build_wiql(
      "Platform",
      &["Product Backlog Item".to_string(), "Bug".to_string()],
      None,
    );
    assert_eq!(
      wiql,
      "SELECT [System.Id] FROM WorkItems \
       WHERE [System.TeamProject] = 'Platform' \
       AND [System.WorkItemType] IN ('Product Backlog Item', 'Bug')"
    );
  }

  #[test]
  fn test_wiql_with_assignee() {
    let wiql = build_wiql("Platform", &[], Some("Jamie Doe"));
    assert!(wiql.ends_with("AND [System.AssignedTo] = 'Jamie Doe'"));
    assert!(!wiql.contains("WorkItemType"));
  }

  #[test]
  fn test_wiql_escapes_single_quotes() {
    let wiql = build_wiql("O'Brien's Project", &[], Some("D'Arcy"));
    assert!(wiql.contains("'O''Brien''s Project'"));
    assert!(wiql.contains("'D''Arcy'"));
  }

  #[test]
  fn test_api_url_encodes_project() {
    let client = DevOpsClient::new(&test_config(), "secret").unwrap();
    let url = client
      .api_url(&["wit", "wiql"], &[("api-version", API_VERSION)])
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://dev.azure.com/acme/Parts%20and%20Services%20Global/_apis/wit/wiql?api-version=6.0"
    );
  }

  #[test]
  fn test_api_url_detail_endpoint() {
    let mut config = test_config();
    config.project = "Platform".to_string();
    let client = DevOpsClient::new(&config, "secret").unwrap();
    let url = client
      .api_url(
        &["wit", "workitems", "42"],
        &[("$expand", "all"), ("api-version", API_VERSION)],
      )
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://dev.azure.com/acme/Platform/_apis/wit/workitems/42?%24expand=all&api-version=6.0"
    );
  }

  #[test]
  fn test_auth_header_is_basic_with_empty_user() {
    let client = DevOpsClient::new(&test_config(), "secret").unwrap();
    // base64(":secret")
    assert_eq!(client.auth_header, "Basic OnNlY3JldA==");
  }
}
