use crate::sources::{EntryQuery, LogEntrySource};
use crate::transparency::LogEntry;
use crate::{Result, SigstoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-based source for transparency-log entries saved from the log.
///
/// The file holds one `{uuid: entry}` response, a JSON array of them, or one
/// response per line (JSONL). Bare entry objects are accepted too.
pub struct FileSource {
    entries_path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            entries_path: path.as_ref().to_path_buf(),
        }
    }

    pub async fn load_entries(&self) -> Result<Vec<LogEntry>> {
        let content = fs::read_to_string(&self.entries_path).await?;
        parse_entries(&content)
    }
}

fn parse_entries(content: &str) -> Result<Vec<LogEntry>> {
    let content = content.trim();
    if content.is_empty() {
        return Ok(Vec::new());
    }

    let values = match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(values)) => values,
        Ok(value) => vec![value],
        Err(_) => {
            // JSONL
            let mut values = Vec::new();
            for line in content.lines().filter(|line| !line.trim().is_empty()) {
                log::trace!("Parsing line of length: {}", line.len());
                values.push(serde_json::from_str::<Value>(line)?);
            }
            values
        }
    };

    let mut entries = Vec::with_capacity(values.len());
    for (position, value) in values.iter().enumerate() {
        match parse_entry(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => log::warn!("Skipping unparseable log entry {}: {}", position, e),
        }
    }
    Ok(entries)
}

fn parse_entry(value: &Value) -> Result<LogEntry> {
    let entry = if value.get("body").is_some() {
        LogEntry::from_entry(value)
    } else {
        LogEntry::from_response(value)
    };
    entry.map_err(SigstoreError::from)
}

#[async_trait]
impl LogEntrySource for FileSource {
    async fn fetch_entries(&self, query: &EntryQuery) -> Result<Vec<LogEntry>> {
        let entries = self.load_entries().await?;
        log::debug!(
            "Loaded {} entries from {} for {}",
            entries.len(),
            self.entries_path.display(),
            query.artifact_digest
        );
        Ok(entries)
    }

    fn source_type(&self) -> &'static str {
        "File"
    }
}
