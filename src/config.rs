use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub devops: DevOpsConfig,
  /// Override for the cache database location (defaults to the user data dir)
  pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevOpsConfig {
  /// Organization URL, e.g. "https://dev.azure.com/my-org"
  pub organization_url: String,
  /// Team project name (may contain spaces)
  pub project: String,
  /// Work item types to sync
  #[serde(default = "default_work_item_types")]
  pub work_item_types: Vec<String>,
  /// Restrict the sync to items assigned to this display name
  pub assigned_to: Option<String>,
}

fn default_work_item_types() -> Vec<String> {
  vec!["Product Backlog Item".to_string()]
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./witsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/witsync/config.yaml
  /// 4. ~/.config/witsync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/witsync/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("witsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("witsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the personal access token from environment variables.
  ///
  /// Checks WITSYNC_DEVOPS_PAT first, then AZURE_DEVOPS_EXT_PAT (the name
  /// the Azure CLI uses) as fallback. The token is never read from the
  /// config file.
  pub fn get_pat() -> Result<String> {
    std::env::var("WITSYNC_DEVOPS_PAT")
      .or_else(|_| std::env::var("AZURE_DEVOPS_EXT_PAT"))
      .map_err(|_| {
        eyre!(
          "Personal access token not found. Set WITSYNC_DEVOPS_PAT or AZURE_DEVOPS_EXT_PAT environment variable."
        )
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_full_config() {
    let yaml = r#"
devops:
  organization_url: https://dev.azure.com/acme
  project: Parts and Services Global
  work_item_types:
    - Product Backlog Item
    - Bug
  assigned_to: Jamie Doe
database: /tmp/witsync-test.db
"#;

    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.devops.organization_url, "https://dev.azure.com/acme");
    assert_eq!(config.devops.project, "Parts and Services Global");
    assert_eq!(
      config.devops.work_item_types,
      vec!["Product Backlog Item", "Bug"]
    );
    assert_eq!(config.devops.assigned_to.as_deref(), Some("Jamie Doe"));
    assert_eq!(
      config.database.as_deref(),
      Some(Path::new("/tmp/witsync-test.db"))
    );
  }

  #[test]
  fn test_parse_minimal_config_defaults() {
    let yaml = r#"
devops:
  organization_url: https://dev.azure.com/acme
  project: Platform
"#;

    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.devops.work_item_types, vec!["Product Backlog Item"]);
    assert!(config.devops.assigned_to.is_none());
    assert!(config.database.is_none());
  }

  #[test]
  fn test_parse_rejects_missing_project() {
    let yaml = r#"
devops:
  organization_url: https://dev.azure.com/acme
"#;

    assert!(Config::parse(yaml).is_err());
  }

  #[test]
  fn test_load_missing_explicit_path_errors() {
    let err = Config::load(Some(Path::new("/nonexistent/witsync.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
