use crate::Result;
use crate::sources::{EntryQuery, LogEntrySource};
use crate::transparency::LogEntry;
use async_trait::async_trait;

/// Entries that were fetched or bundled ahead of time
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Vec<LogEntry>,
}

impl MemorySource {
    pub fn new(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}

#[async_trait]
impl LogEntrySource for MemorySource {
    async fn fetch_entries(&self, query: &EntryQuery) -> Result<Vec<LogEntry>> {
        log::trace!(
            "Returning {} in-memory entries for {}",
            self.entries.len(),
            query.artifact_digest
        );
        Ok(self.entries.clone())
    }

    fn source_type(&self) -> &'static str {
        "Memory"
    }
}
