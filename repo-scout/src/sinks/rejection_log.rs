use super::SinkError;
use crate::types::RejectionEntry;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Append-only, human-readable log of rejected candidates.
pub struct RejectionLog {
    path: PathBuf,
}

impl RejectionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Each entry is written with a single call so a crash never leaves half a record.
    pub async fn append(&self, entry: &RejectionEntry) -> Result<(), SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format_entry(entry).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

pub fn format_entry(entry: &RejectionEntry) -> String {
    let topics = entry.topics.join(", ");
    format!(
        "[{}] {} ({}⭐)\n  URL: {}\n  Description: {}\n  Language: {}\n  Topics: {}\n  Reason: {}\n\n",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.full_name,
        entry.stars,
        entry.url,
        or_na(&entry.description),
        or_na(&entry.language),
        or_na(&topics),
        entry.reason
    )
}
