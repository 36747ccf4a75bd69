//! Run log: one entry per asset, grouped by document when written out.
//!
//! Entries are append-only. `save` writes a human-readable text file and a
//! JSON companion with the same content.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::transcode::Stage;

const RULE_WIDTH: usize = 60;
const GROUP_RULE_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub document_id: String,
    pub url: String,
    pub local_path: Option<String>,
    pub original_size: u64,
    pub final_size: u64,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stages: Vec<Stage>,
    pub reused: bool,
}

impl LogEntry {
    pub fn success(
        document_id: impl Into<String>,
        url: impl Into<String>,
        local_path: impl Into<String>,
        original_size: u64,
        final_size: u64,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            url: url.into(),
            local_path: Some(local_path.into()),
            original_size,
            final_size,
            outcome: Outcome::Success,
            error: None,
            stages: Vec::new(),
            reused: false,
        }
    }

    pub fn failure(
        document_id: impl Into<String>,
        url: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            url: url.into(),
            local_path: None,
            original_size: 0,
            final_size: 0,
            outcome: Outcome::Failure,
            error: Some(error.into()),
            stages: Vec::new(),
            reused: false,
        }
    }

    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_reused(mut self, reused: bool) -> Self {
        self.reused = reused;
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Stored smaller than fetched.
    pub fn compressed(&self) -> bool {
        self.is_success() && self.final_size < self.original_size
    }
}

/// A document that could not be read or written at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFailure {
    pub document_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub compressed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Vec<LogEntry>,
    document_failures: Vec<DocumentFailure>,
}

#[derive(Serialize)]
struct JsonLog<'a> {
    generated_at: u64,
    entries: &'a [LogEntry],
    document_failures: &'a [DocumentFailure],
    totals: Totals,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn record_document_failure(&mut self, document_id: impl Into<String>, error: impl Into<String>) {
        self.document_failures.push(DocumentFailure {
            document_id: document_id.into(),
            error: error.into(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn document_failures(&self) -> &[DocumentFailure] {
        &self.document_failures
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.document_failures.is_empty()
    }

    pub fn totals(&self) -> Totals {
        let succeeded = self.entries.iter().filter(|e| e.is_success()).count();
        Totals {
            processed: self.entries.len(),
            succeeded,
            failed: self.entries.len() - succeeded,
            compressed: self.entries.iter().filter(|e| e.compressed()).count(),
        }
    }

    /// Plain-text report; documents appear in the order they were first logged.
    pub fn render_text(&self, generated_at: u64) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut lines: Vec<String> = vec![
            rule.clone(),
            "mdloc asset log".to_string(),
            format!("generated: {} (unix seconds)", generated_at),
            rule.clone(),
            String::new(),
        ];

        let mut order: Vec<&str> = Vec::new();
        for e in &self.entries {
            if !order.contains(&e.document_id.as_str()) {
                order.push(&e.document_id);
            }
        }
        for doc in order {
            lines.push(doc.to_string());
            lines.push("-".repeat(GROUP_RULE_WIDTH));
            for e in self.entries.iter().filter(|e| e.document_id == doc) {
                match e.outcome {
                    Outcome::Success => {
                        lines.push(format!("  success {}", e.local_path.as_deref().unwrap_or("")));
                        lines.push(format!("     source: {}", e.url));
                        let size = if e.compressed() {
                            format!(
                                "{} -> {} (compressed)",
                                format_size(e.original_size),
                                format_size(e.final_size)
                            )
                        } else {
                            format_size(e.final_size)
                        };
                        let reused = if e.reused { " [reused]" } else { "" };
                        lines.push(format!("     size: {}{}", size, reused));
                    }
                    Outcome::Failure => {
                        lines.push("  failure".to_string());
                        lines.push(format!("     source: {}", e.url));
                        lines.push(format!("     error: {}", e.error.as_deref().unwrap_or("unknown")));
                    }
                }
                lines.push(String::new());
            }
        }

        if !self.document_failures.is_empty() {
            lines.push("documents not processed".to_string());
            lines.push("-".repeat(GROUP_RULE_WIDTH));
            for f in &self.document_failures {
                lines.push(format!("  {}: {}", f.document_id, f.error));
            }
            lines.push(String::new());
        }

        let t = self.totals();
        lines.push(rule.clone());
        lines.push("totals".to_string());
        lines.push(rule);
        lines.push(format!("processed: {}", t.processed));
        lines.push(format!("succeeded: {}", t.succeeded));
        lines.push(format!("failed: {}", t.failed));
        lines.push(format!("compressed: {}", t.compressed));
        lines.join("\n")
    }

    /// Writes `asset-log-<unix>.txt` and `asset-log-<unix>.json` into `dir`.
    /// Returns the text log path, or `None` if there was nothing to log.
    pub fn save(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if self.is_empty() {
            return Ok(None);
        }
        let generated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

        let text_path = dir.join(format!("asset-log-{}.txt", generated_at));
        fs::write(&text_path, self.render_text(generated_at))
            .with_context(|| format!("write {}", text_path.display()))?;

        let json_path = dir.join(format!("asset-log-{}.json", generated_at));
        let json = serde_json::to_string_pretty(&JsonLog {
            generated_at,
            entries: &self.entries,
            document_failures: &self.document_failures,
            totals: self.totals(),
        })?;
        fs::write(&json_path, json).with_context(|| format!("write {}", json_path.display()))?;

        tracing::info!(path = %text_path.display(), "run log saved");
        Ok(Some(text_path))
    }
}

/// Human-readable size: `0 B`, `512.00 B`, `1.50 KB`, `2.00 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
