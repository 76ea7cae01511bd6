//! Wire message definitions
//!
//! The server pushes exactly three kinds of JSON messages on a task
//! subscription: heartbeat markers, pong replies, and progress updates.
//! Anything else is unrecognized and dropped by the caller. The client sends
//! `{"action": ...}` control messages.

use serde::{Deserialize, Serialize};

use crate::types::{IngestStep, ProgressSnapshot, TaskStatus};

// ─────────────────────────────────────────────────────────────────
// Inbound Messages (Server → Client)
// ─────────────────────────────────────────────────────────────────

/// All messages the server may push on a task subscription
///
/// Untagged: the progress shape is tried first (it has the most required
/// fields), then the heartbeat marker, then the pong reply. Input matching
/// none of them fails to parse and is discarded upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Progress update for one task
    Progress(ProgressMessage),

    /// Idle-connection heartbeat marker, no payload of interest
    Heartbeat(HeartbeatMarker),

    /// Reply to a client keepalive ping
    Pong(PongReply),
}

impl ServerMessage {
    /// Parse an inbound text frame. Returns `None` for anything that is not
    /// one of the three known message kinds; never panics.
    pub fn parse(text: &str) -> Option<ServerMessage> {
        serde_json::from_str(text).ok()
    }

    /// Get the message kind name
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Progress(_) => "progress",
            ServerMessage::Heartbeat(_) => "heartbeat",
            ServerMessage::Pong(_) => "pong",
        }
    }
}

/// Progress update pushed by the server
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressMessage {
    /// Task this update belongs to
    pub task_id: String,

    /// Completion lifecycle stage
    pub status: TaskStatus,

    /// Current pipeline step
    pub step: IngestStep,

    /// Overall progress, 0-100
    pub progress: u8,

    /// Human-readable status message
    pub message: String,

    /// Number of chunks produced so far
    #[serde(default)]
    pub chunk_count: Option<u32>,

    /// Error detail, present only on failure
    #[serde(default)]
    pub error: Option<String>,
}

impl From<ProgressMessage> for ProgressSnapshot {
    fn from(msg: ProgressMessage) -> Self {
        ProgressSnapshot::new(
            msg.status,
            msg.step,
            msg.progress,
            msg.message,
            msg.chunk_count,
            msg.error,
        )
    }
}

/// Heartbeat marker: `{"heartbeat": true}`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HeartbeatMarker {
    pub heartbeat: bool,
}

/// Pong reply: `{"action": "pong"}`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PongReply {
    #[allow(dead_code)]
    action: PongAction,
}

/// Discriminator that only ever matches the literal `"pong"`
#[derive(Debug, Clone, Copy, Deserialize)]
enum PongAction {
    #[serde(rename = "pong")]
    Pong,
}

// ─────────────────────────────────────────────────────────────────
// Outbound Messages (Client → Server)
// ─────────────────────────────────────────────────────────────────

/// Control messages the client sends on an open subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Keepalive ping, answered by a pong reply
    Ping,

    /// Cooperative cancellation request for the subscribed task
    Cancel,
}

impl ClientMessage {
    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress() {
        let text = r#"{
            "task_id": "abc123",
            "status": "processing",
            "step": "embedding",
            "progress": 70,
            "message": "向量化中...",
            "chunk_count": 12
        }"#;

        match ServerMessage::parse(text) {
            Some(ServerMessage::Progress(msg)) => {
                assert_eq!(msg.task_id, "abc123");
                assert_eq!(msg.status, TaskStatus::Processing);
                assert_eq!(msg.step, IngestStep::Embedding);
                assert_eq!(msg.progress, 70);
                assert_eq!(msg.chunk_count, Some(12));
                assert!(msg.error.is_none());
            }
            other => panic!("Expected Progress message, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_progress_with_error() {
        let text = r#"{
            "task_id": "abc123",
            "status": "failed",
            "step": "parsing",
            "progress": 10,
            "message": "處理失敗",
            "error": "parse error: page 3 corrupt"
        }"#;

        match ServerMessage::parse(text) {
            Some(ServerMessage::Progress(msg)) => {
                assert_eq!(msg.status, TaskStatus::Failed);
                assert_eq!(
                    msg.error.as_deref(),
                    Some("parse error: page 3 corrupt")
                );
            }
            other => panic!("Expected Progress message, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_progress_unknown_step() {
        // Newer server steps must not make the message unrecognized
        let text = r#"{
            "task_id": "abc123",
            "status": "processing",
            "step": "ocr",
            "progress": 5,
            "message": "..."
        }"#;

        match ServerMessage::parse(text) {
            Some(ServerMessage::Progress(msg)) => {
                assert_eq!(msg.step, IngestStep::Unknown);
                assert_eq!(msg.step.ordinal(), 0);
            }
            other => panic!("Expected Progress message, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_heartbeat() {
        match ServerMessage::parse(r#"{"heartbeat": true}"#) {
            Some(ServerMessage::Heartbeat(marker)) => assert!(marker.heartbeat),
            other => panic!("Expected Heartbeat message, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_pong() {
        match ServerMessage::parse(r#"{"action": "pong"}"#) {
            Some(ServerMessage::Pong(_)) => {}
            other => panic!("Expected Pong message, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unrecognized_shapes() {
        // Valid JSON, none of the three kinds
        assert!(ServerMessage::parse(r#"{"action": "cancel"}"#).is_none());
        assert!(ServerMessage::parse(r#"{"status": "processing"}"#).is_none());
        assert!(ServerMessage::parse(r#"{}"#).is_none());
        assert!(ServerMessage::parse(r#"[1, 2, 3]"#).is_none());
        assert!(ServerMessage::parse(r#""pong""#).is_none());
    }

    #[test]
    fn test_parse_non_json() {
        assert!(ServerMessage::parse("not json at all").is_none());
        assert!(ServerMessage::parse("").is_none());
        assert!(ServerMessage::parse("{truncated").is_none());
    }

    #[test]
    fn test_parse_unknown_status_discarded() {
        // An unknown lifecycle status would change semantics; discard it
        let text = r#"{
            "task_id": "abc123",
            "status": "paused",
            "step": "parsing",
            "progress": 10,
            "message": "..."
        }"#;
        assert!(ServerMessage::parse(text).is_none());
    }

    #[test]
    fn test_snapshot_from_progress() {
        let msg = ProgressMessage {
            task_id: "abc123".to_string(),
            status: TaskStatus::Completed,
            step: IngestStep::Done,
            progress: 100,
            message: "處理完成！".to_string(),
            chunk_count: Some(42),
            error: None,
        };

        let snapshot = ProgressSnapshot::from(msg);
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert_eq!(snapshot.chunk_count, Some(42));
        assert!(snapshot.is_terminal());
    }

    #[test]
    fn test_client_message_serialize() {
        assert_eq!(
            ClientMessage::Ping.to_json().unwrap(),
            r#"{"action":"ping"}"#
        );
        assert_eq!(
            ClientMessage::Cancel.to_json().unwrap(),
            r#"{"action":"cancel"}"#
        );
    }
}
