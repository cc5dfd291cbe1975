//! Wire-level message types
//!
//! The remote chat API understands only `system`/`user`/`assistant` roles, so
//! log-level roles are mapped at the boundary: summary turns cross the wire as
//! system messages carrying the condensed text.

use crate::context::{Turn, TurnRole};
use serde::{Deserialize, Serialize};

/// Role as accepted by the chat completions endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    System,
    User,
    Assistant,
}

/// One `{role, content}` entry of the outbound conversation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: String,
}

impl WireMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for WireMessage {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            TurnRole::System | TurnRole::Summary => WireRole::System,
            TurnRole::User => WireRole::User,
            TurnRole::Assistant => WireRole::Assistant,
        };
        Self {
            role,
            content: turn.content.clone(),
        }
    }
}

/// Map a turn sequence to the outbound payload, preserving order
pub fn conversation_payload(turns: &[Turn]) -> Vec<WireMessage> {
    turns.iter().map(WireMessage::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TokenEstimator;

    #[test]
    fn test_summary_maps_to_system_role() {
        let est = TokenEstimator::new();
        let turn = Turn::summary("earlier: rust basics", &est);
        let msg = WireMessage::from(&turn);
        assert_eq!(msg.role, WireRole::System);
        assert_eq!(msg.content, "earlier: rust basics");
    }

    #[test]
    fn test_payload_preserves_order() {
        let est = TokenEstimator::new();
        let turns = vec![
            Turn::system("be concise", &est),
            Turn::user("hi", &est),
            Turn::assistant("hello", &est),
        ];
        let payload = conversation_payload(&turns);
        assert_eq!(payload.len(), 3);
        assert_eq!(payload[0].role, WireRole::System);
        assert_eq!(payload[1].role, WireRole::User);
        assert_eq!(payload[2].role, WireRole::Assistant);
    }

    #[test]
    fn test_wire_role_serializes_lowercase() {
        let msg = WireMessage::assistant("ok");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
    }
}
