/// Schema for the work item cache.
///
/// Column names mirror the remote field reference names with their
/// namespace prefix stripped.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS work_items (
    Id INTEGER PRIMARY KEY,
    WorkItemType TEXT,
    Title TEXT,
    AssignedTo TEXT,
    State TEXT,
    Tags TEXT,
    StartDate TEXT,
    TargetDate TEXT
);
"#;
