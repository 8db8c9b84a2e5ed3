mod config;
mod devops;
mod store;
mod sync;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::devops::client::DevOpsClient;
use crate::devops::types::WorkItem;
use crate::store::WorkItemStore;
use crate::sync::{Reconciler, SyncOutcome};

#[derive(Parser, Debug)]
#[command(name = "witsync")]
#[command(about = "Sync Azure DevOps work items into a local SQLite cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/witsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Reconcile the cache against the remote listing, then print it
  Sync,
  /// Print cached work items, syncing first only when the cache is empty
  List,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  init_tracing();

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;

  let store = match &config.database {
    Some(path) => WorkItemStore::open_at(path)?,
    None => WorkItemStore::open()?,
  };

  match args.command.unwrap_or(Command::List) {
    Command::Sync => {
      let outcome = run_sync(&config, &store).await?;
      report(&outcome);
      print_items(&outcome.items);
    }
    Command::List => {
      if store.is_empty()? {
        info!("cache is empty, running initial sync");
        let outcome = run_sync(&config, &store).await?;
        report(&outcome);
        print_items(&outcome.items);
      } else {
        print_items(&store.list()?);
      }
    }
  }

  Ok(())
}

fn init_tracing() {
  // Logs go to stderr; stdout carries the listing
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("witsync=info")),
    )
    .with_writer(std::io::stderr)
    .init();
}

async fn run_sync(config: &config::Config, store: &WorkItemStore) -> Result<SyncOutcome> {
  let pat = config::Config::get_pat()?;
  let client = DevOpsClient::new(&config.devops, &pat)?;
  Reconciler::new(&client, store).run().await
}

fn report(outcome: &SyncOutcome) {
  if outcome.nothing_new() {
    info!("cache already up to date");
  } else {
    info!(
      deleted = outcome.deleted,
      fetched = outcome.fetched,
      "sync complete"
    );
  }
  if !outcome.failed.is_empty() {
    warn!(failed = ?outcome.failed, "some work items could not be fetched this pass");
  }
}

fn print_items(items: &[WorkItem]) {
  if items.is_empty() {
    println!("No work items cached.");
    return;
  }

  println!(
    "{:>7}  {:<22}  {:<12}  {:<24}  {:<10}  {:<10}  TITLE",
    "ID", "TYPE", "STATE", "ASSIGNED TO", "START", "TARGET"
  );
  for item in items {
    println!(
      "{:>7}  {:<22}  {:<12}  {:<24}  {:<10}  {:<10}  {}",
      item.id,
      item.work_item_type.as_deref().unwrap_or("-"),
      item.state.as_deref().unwrap_or("-"),
      item.assigned_to.as_deref().unwrap_or("-"),
      short_date(item.start_date.as_deref()),
      short_date(item.target_date.as_deref()),
      item.title.as_deref().unwrap_or("-"),
    );
  }
}

/// Render an ISO 8601 timestamp as a bare date. Values that don't parse are
/// shown as-is rather than dropped.
fn short_date(raw: Option<&str>) -> String {
  match raw {
    Some(s) => chrono::DateTime::parse_from_rfc3339(s)
      .map(|dt| dt.date_naive().to_string())
      .unwrap_or_else(|_| s.to_string()),
    None => "-".to_string(),
  }
}
