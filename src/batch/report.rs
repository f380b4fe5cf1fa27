/// Batch run report
use crate::{blob_store::Vault, error::UploadResult, notify::format_size};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOutcome {
    Success,
    Failed,
    /// Same content already handled earlier in this run
    SkippedDuplicate,
    /// Object already in the store; links rewritten without a PUT
    AlreadyPresent,
}

impl EntryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryOutcome::Success => "Success",
            EntryOutcome::Failed => "Failed",
            EntryOutcome::SkippedDuplicate => "Skipped (duplicate)",
            EntryOutcome::AlreadyPresent => "Skipped (already present)",
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, EntryOutcome::SkippedDuplicate | EntryOutcome::AlreadyPresent)
    }
}

/// Outcome for one batch task
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub file_name: String,
    pub original_path: String,
    pub new_location: Option<String>,
    pub byte_size: usize,
    pub outcome: EntryOutcome,
    pub error_detail: Option<String>,
    pub elapsed_ms: u64,
}

/// Per-file outcomes of one batch run, in task order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRunReport {
    started_at: DateTime<Local>,
    entries: Vec<ReportEntry>,
    planned: usize,
    cancelled: bool,
}

impl UploadRunReport {
    pub(crate) fn new(planned: usize) -> Self {
        Self {
            started_at: Local::now(),
            entries: Vec::with_capacity(planned),
            planned,
            cancelled: false,
        }
    }

    pub(crate) fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Tasks handed to the run, attempted or not
    pub fn planned(&self) -> usize {
        self.planned
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn count(&self, outcome: EntryOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(EntryOutcome::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(EntryOutcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_skip()).count()
    }

    /// Human-readable markdown log
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Batch Upload Log\n");
        let _ = writeln!(out, "- Date: {}", self.started_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "- Total: {}", self.planned);
        let _ = writeln!(out, "- Success: {}", self.succeeded());
        let _ = writeln!(out, "- Failed: {}", self.failed());
        let _ = writeln!(out, "- Skipped: {}", self.skipped());
        if self.cancelled {
            let _ = writeln!(
                out,
                "- Cancelled: {} task(s) not attempted",
                self.planned - self.entries.len()
            );
        }

        out.push_str("\n| File | Original Path | New Location | Size | Status | Error | Time |\n");
        out.push_str("|------|---------------|--------------|------|--------|-------|------|\n");
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {}ms |",
                cell(&entry.file_name),
                cell(&entry.original_path),
                cell(entry.new_location.as_deref().unwrap_or("-")),
                format_size(entry.byte_size),
                entry.outcome.as_str(),
                cell(entry.error_detail.as_deref().unwrap_or("-")),
                entry.elapsed_ms
            );
        }
        out
    }

    /// Write the log to `<folder>/upload-log-<timestamp>.md` and return its vault path
    pub async fn persist(&self, vault: &Vault, folder: &str) -> UploadResult<String> {
        let file_name = format!("upload-log-{}.md", self.started_at.format("%Y-%m-%d-%H-%M-%S"));
        let folder = folder.trim().trim_matches('/');
        let path = if folder.is_empty() {
            file_name
        } else {
            format!("{}/{}", folder, file_name)
        };

        vault.write(&path, self.render_markdown().as_bytes()).await?;
        tracing::info!("Batch log written to {}", path);
        Ok(path)
    }
}

fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\n', '\r'], " ")
}
