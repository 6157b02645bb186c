use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::holding::HoldingsTable;

/// Lifecycle state of a holdings snapshot.
///
/// A snapshot is created as `Processing` and transitions to exactly one of
/// `Ready` or `Failed`; either outcome stays queryable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Processing,
    Ready,
    Failed,
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotStatus::Processing => write!(f, "processing"),
            SnapshotStatus::Ready => write!(f, "ready"),
            SnapshotStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The one holdings snapshot a session owns, plus its processing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Unique id assigned at upload time
    pub id: Uuid,

    /// Current lifecycle state
    pub status: SnapshotStatus,

    /// Name of the uploaded file
    pub source_file: String,

    /// When the upload was received
    pub uploaded_at: DateTime<Utc>,

    /// Parsed rows; empty until the upload reaches `Ready`
    pub holdings: HoldingsTable,

    /// Validation detail when the upload reached `Failed`
    pub error: Option<String>,
}

impl PortfolioSnapshot {
    /// A fresh snapshot in the `Processing` state.
    #[must_use]
    pub fn processing(source_file: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SnapshotStatus::Processing,
            source_file: source_file.into(),
            uploaded_at: Utc::now(),
            holdings: HoldingsTable::default(),
            error: None,
        }
    }

    pub fn mark_ready(&mut self, holdings: HoldingsTable) {
        self.holdings = holdings;
        self.status = SnapshotStatus::Ready;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SnapshotStatus::Failed;
        self.error = Some(error.into());
    }

    /// Status view of this snapshot, independent of the row data.
    #[must_use]
    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            id: self.id,
            status: self.status,
            source_file: self.source_file.clone(),
            uploaded_at: self.uploaded_at,
            row_count: self.holdings.len(),
            error: self.error.clone(),
        }
    }
}

/// Queryable status of a snapshot without the holdings themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: Uuid,
    pub status: SnapshotStatus,
    pub source_file: String,
    pub uploaded_at: DateTime<Utc>,
    pub row_count: usize,
    pub error: Option<String>,
}
