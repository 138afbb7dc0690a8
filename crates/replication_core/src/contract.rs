use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const COMPLETION_STATUS: &str = "completed";

/// Longest object key the storage service accepts, in UTF-8 bytes.
pub const MAX_OBJECT_KEY_BYTES: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectRecord {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ObjectRecord {
    pub fn new(key: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            last_modified,
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub objects: Vec<ObjectRecord>,
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CopyFailureKind {
    /// The request could not be built: bad bucket, key, or region parameters.
    Validation,
    /// The service or transport rejected the request.
    Service,
}

impl CopyFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Service => "service",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CopyFailure {
    pub kind: CopyFailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CopyResult {
    Copied,
    Planned,
    Failed(CopyFailure),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CopyOutcome {
    pub source_key: String,
    pub destination_key: String,
    #[serde(flatten)]
    pub result: CopyResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicationSummary {
    pub pages_listed: usize,
    pub objects_listed: usize,
    pub skipped_prefix: usize,
    pub skipped_window: usize,
    pub copied: usize,
    pub planned: usize,
    pub failed: usize,
}

impl ReplicationSummary {
    pub fn record_outcome(&mut self, outcome: &CopyOutcome) {
        match outcome.result {
            CopyResult::Copied => self.copied += 1,
            CopyResult::Planned => self.planned += 1,
            CopyResult::Failed(_) => self.failed += 1,
        }
    }

    pub fn dispatched(&self) -> usize {
        self.copied + self.planned + self.failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    pub status: String,
    pub summary: ReplicationSummary,
}

impl CompletionRecord {
    pub fn completed(summary: ReplicationSummary) -> Self {
        Self {
            status: COMPLETION_STATUS.to_string(),
            summary,
        }
    }
}
