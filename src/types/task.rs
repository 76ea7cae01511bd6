//! Ingestion task types
//!
//! Status and step enums for server-side document ingestion tasks, and the
//! progress snapshot value type the subscription client hands to callers.
//! These types mirror the backend's task schema.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Task Status
// ─────────────────────────────────────────────────────────────────

/// Completion lifecycle stage of an ingestion task, independent of step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted, not yet started
    Pending,
    /// Pipeline is running
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Cancelled on request
    Cancelled,
}

impl TaskStatus {
    /// Whether this status ends the task lifecycle.
    ///
    /// Once a terminal status is observed, the subscription neither mutates
    /// its snapshot nor reconnects.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Ingestion Step
// ─────────────────────────────────────────────────────────────────

/// One phase of the ingestion pipeline
///
/// Steps have a fixed total order used for progress-bar rendering only;
/// the client tolerates out-of-order steps without complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum IngestStep {
    Uploading,
    Parsing,
    Chunking,
    Embedding,
    Indexing,
    Done,
    /// Any step value this client does not recognize. Newer servers may add
    /// steps; rendering falls back to the start of the bar.
    Unknown,
}

impl From<String> for IngestStep {
    fn from(value: String) -> Self {
        IngestStep::from_wire(&value)
    }
}

impl IngestStep {
    /// All well-known steps in pipeline order
    pub fn all() -> &'static [IngestStep] {
        &[
            IngestStep::Uploading,
            IngestStep::Parsing,
            IngestStep::Chunking,
            IngestStep::Embedding,
            IngestStep::Indexing,
            IngestStep::Done,
        ]
    }

    /// Fixed ordinal for progress-bar rendering. Unknown steps map to 0.
    pub fn ordinal(&self) -> u8 {
        match self {
            IngestStep::Uploading => 0,
            IngestStep::Parsing => 1,
            IngestStep::Chunking => 2,
            IngestStep::Embedding => 3,
            IngestStep::Indexing => 4,
            IngestStep::Done => 5,
            IngestStep::Unknown => 0,
        }
    }

    /// Parse a wire step value. Unrecognized strings yield `Unknown`.
    pub fn from_wire(value: &str) -> IngestStep {
        match value {
            "uploading" => IngestStep::Uploading,
            "parsing" => IngestStep::Parsing,
            "chunking" => IngestStep::Chunking,
            "embedding" => IngestStep::Embedding,
            "indexing" => IngestStep::Indexing,
            "done" => IngestStep::Done,
            _ => IngestStep::Unknown,
        }
    }

    /// English display label for this step
    pub fn label_en(&self) -> &'static str {
        match self {
            IngestStep::Uploading => "Uploading",
            IngestStep::Parsing => "Parsing document",
            IngestStep::Chunking => "Chunking document",
            IngestStep::Embedding => "Generating embeddings",
            IngestStep::Indexing => "Building index",
            IngestStep::Done => "Done",
            IngestStep::Unknown => "Processing",
        }
    }

    /// Traditional Chinese display label for this step
    pub fn label_zh(&self) -> &'static str {
        match self {
            IngestStep::Uploading => "上傳中...",
            IngestStep::Parsing => "解析文件中...",
            IngestStep::Chunking => "文件分塊中...",
            IngestStep::Embedding => "向量化中...",
            IngestStep::Indexing => "建立索引中...",
            IngestStep::Done => "處理完成！",
            IngestStep::Unknown => "處理中...",
        }
    }
}

impl std::fmt::Display for IngestStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestStep::Uploading => write!(f, "uploading"),
            IngestStep::Parsing => write!(f, "parsing"),
            IngestStep::Chunking => write!(f, "chunking"),
            IngestStep::Embedding => write!(f, "embedding"),
            IngestStep::Indexing => write!(f, "indexing"),
            IngestStep::Done => write!(f, "done"),
            IngestStep::Unknown => write!(f, "unknown"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Progress Snapshot
// ─────────────────────────────────────────────────────────────────

/// Latest known state of one ingestion task
///
/// Replaced wholesale on every valid progress message; never mutated in
/// place. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Completion lifecycle stage
    pub status: TaskStatus,

    /// Current pipeline step
    pub step: IngestStep,

    /// Overall progress, 0-100
    pub progress: u8,

    /// Human-readable status message from the server
    pub message: String,

    /// Number of chunks produced so far (if reported)
    #[serde(default)]
    pub chunk_count: Option<u32>,

    /// Error detail, present only when status is `failed`
    #[serde(default)]
    pub error: Option<String>,
}

impl ProgressSnapshot {
    /// Build a snapshot, clamping progress into the 0-100 range.
    pub fn new(
        status: TaskStatus,
        step: IngestStep,
        progress: u8,
        message: impl Into<String>,
        chunk_count: Option<u32>,
        error: Option<String>,
    ) -> Self {
        Self {
            status,
            step,
            progress: progress.min(100),
            message: message.into(),
            chunk_count,
            error,
        }
    }

    /// Whether this snapshot ends the subscription
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_wire_values() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Processing).unwrap(),
            "\"processing\""
        );
        let status: TaskStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(status, TaskStatus::Cancelled);
    }

    #[test]
    fn test_step_ordinals() {
        let expected = [
            (IngestStep::Uploading, 0),
            (IngestStep::Parsing, 1),
            (IngestStep::Chunking, 2),
            (IngestStep::Embedding, 3),
            (IngestStep::Indexing, 4),
            (IngestStep::Done, 5),
        ];
        for (step, ordinal) in expected {
            assert_eq!(step.ordinal(), ordinal);
        }
    }

    #[test]
    fn test_unknown_step_ordinal_is_zero() {
        assert_eq!(IngestStep::from_wire("rechunking").ordinal(), 0);
        assert_eq!(IngestStep::from_wire("").ordinal(), 0);
        assert_eq!(IngestStep::Unknown.ordinal(), 0);
    }

    #[test]
    fn test_unknown_step_deserializes() {
        // A step this client has never heard of must not fail the message
        let step: IngestStep = serde_json::from_str("\"ocr\"").unwrap();
        assert_eq!(step, IngestStep::Unknown);
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(IngestStep::Embedding.label_en(), "Generating embeddings");
        assert_eq!(IngestStep::Done.label_zh(), "處理完成！");
        assert_eq!(IngestStep::Unknown.label_zh(), "處理中...");
    }

    #[test]
    fn test_snapshot_clamps_progress() {
        let snapshot = ProgressSnapshot::new(
            TaskStatus::Processing,
            IngestStep::Embedding,
            250,
            "embedding",
            None,
            None,
        );
        assert_eq!(snapshot.progress, 100);
    }

    #[test]
    fn test_snapshot_structural_equality() {
        let a = ProgressSnapshot::new(
            TaskStatus::Processing,
            IngestStep::Parsing,
            25,
            "parsing",
            None,
            None,
        );
        let b = a.clone();
        assert_eq!(a, b);

        let c = ProgressSnapshot::new(
            TaskStatus::Processing,
            IngestStep::Parsing,
            26,
            "parsing",
            None,
            None,
        );
        assert_ne!(a, c);
    }

    #[test]
    fn test_snapshot_terminal() {
        let snapshot = ProgressSnapshot::new(
            TaskStatus::Completed,
            IngestStep::Done,
            100,
            "done",
            Some(42),
            None,
        );
        assert!(snapshot.is_terminal());
    }
}
