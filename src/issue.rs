//! Issue and fix-attempt data model
//!
//! An `Issue` is one detected lint/quality finding at a file/line/column.
//! Issues arrive from an external detector and move through a single
//! status lifecycle per run: queued -> in_progress -> terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl IssueStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IssueStatus::Completed | IssueStatus::Failed | IssueStatus::Skipped
        )
    }
}

/// One detected code-quality finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub file_path: PathBuf,
    pub line: u32,
    pub column: u32,
    pub error_code: String,
    pub message: String,
    pub status: IssueStatus,
    /// Worker currently holding this issue, if any
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    pub fn new(
        file_path: impl Into<PathBuf>,
        line: u32,
        column: u32,
        error_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            file_path: file_path.into(),
            line,
            column,
            error_code: error_code.into(),
            message: message.into(),
            status: IssueStatus::Queued,
            worker_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Deduplication key: one queued issue per (file, line, code).
    pub fn dedup_key(&self) -> (PathBuf, u32, String) {
        (self.file_path.clone(), self.line, self.error_code.clone())
    }
}

/// Append-only log entry for one attempted (model, provider) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttempt {
    pub issue_ids: Vec<String>,
    pub model: String,
    pub provider: String,
    pub success: bool,
    pub confidence: f64,
    /// New file content, present only on success
    pub fixed_content: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
}
