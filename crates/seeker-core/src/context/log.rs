//! Turn log data structures
//!
//! The conversation is an ordered, append-mostly sequence of immutable turns
//! with one atomic compact-prefix operation. The log is a passive container:
//! it enforces its own structural invariants but knows nothing about token
//! budgets — that is the context manager's job.

use crate::context::estimator::TokenEstimator;
use crate::error::{SeekerError, SeekerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a turn in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// System prompt, position 0 only
    System,
    /// Human input
    User,
    /// Model response
    Assistant,
    /// Synthetic turn replacing a compacted prefix of earlier turns
    Summary,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::System => write!(f, "system"),
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
            TurnRole::Summary => write!(f, "summary"),
        }
    }
}

/// One message unit in a conversation
///
/// Immutable once appended; `token_estimate` is computed at creation time and
/// never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub token_estimate: usize,
}

impl Turn {
    /// Create a turn with an explicit token estimate
    pub fn new(role: TurnRole, content: impl Into<String>, token_estimate: usize) -> Self {
        Self {
            role,
            content: content.into(),
            token_estimate,
        }
    }

    /// Create a system turn, estimating tokens at creation
    pub fn system(content: impl Into<String>, estimator: &TokenEstimator) -> Self {
        Self::with_estimator(TurnRole::System, content, estimator)
    }

    /// Create a user turn, estimating tokens at creation
    pub fn user(content: impl Into<String>, estimator: &TokenEstimator) -> Self {
        Self::with_estimator(TurnRole::User, content, estimator)
    }

    /// Create an assistant turn, estimating tokens at creation
    pub fn assistant(content: impl Into<String>, estimator: &TokenEstimator) -> Self {
        Self::with_estimator(TurnRole::Assistant, content, estimator)
    }

    /// Create a summary turn, estimating tokens at creation
    pub fn summary(content: impl Into<String>, estimator: &TokenEstimator) -> Self {
        Self::with_estimator(TurnRole::Summary, content, estimator)
    }

    fn with_estimator(
        role: TurnRole,
        content: impl Into<String>,
        estimator: &TokenEstimator,
    ) -> Self {
        let content = content.into();
        let token_estimate = estimator.estimate_turn(&content);
        Self {
            role,
            content,
            token_estimate,
        }
    }
}

/// Immutable, ownership-transferring copy of a conversation log
///
/// Used for persistence; restoring always produces a fresh log, never a view
/// into a live one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSnapshot {
    /// Snapshot identifier, doubles as the session id on disk
    pub id: String,
    /// Model the conversation was held with
    pub model: String,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
    /// Full turn sequence in chat order
    pub turns: Vec<Turn>,
}

impl LogSnapshot {
    /// First user message, truncated for display listings
    pub fn preview(&self, max_chars: usize) -> String {
        let first_user = self
            .turns
            .iter()
            .find(|t| t.role == TurnRole::User)
            .map(|t| t.content.as_str())
            .unwrap_or("");

        if first_user.chars().count() <= max_chars {
            first_user.to_string()
        } else {
            let truncated: String = first_user.chars().take(max_chars).collect();
            format!("{truncated}...")
        }
    }
}

/// Ordered sequence of exchanged turns with token accounting
///
/// Invariants, checked on every mutation:
/// - at most one `system` turn, only at position 0
/// - no two consecutive `summary` turns
/// - the maintained token total always equals the true sum over turns
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
    total_tokens: usize,
}

impl ConversationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to the end of the log
    pub fn append(&mut self, turn: Turn) -> SeekerResult<()> {
        match turn.role {
            TurnRole::System if !self.turns.is_empty() => {
                return Err(SeekerError::invariant(
                    "system turn is only allowed at position 0",
                ));
            }
            TurnRole::Summary
                if self.turns.last().is_some_and(|t| t.role == TurnRole::Summary) =>
            {
                return Err(SeekerError::invariant(
                    "two consecutive summary turns are not allowed",
                ));
            }
            _ => {}
        }

        self.total_tokens += turn.token_estimate;
        self.turns.push(turn);
        self.debug_check_total();
        Ok(())
    }

    /// Atomically replace turns `[start..=up_to]` with a single summary turn,
    /// where `start` skips a leading system turn if present
    ///
    /// Validation happens before any mutation; on error the log is untouched.
    pub fn replace_prefix(&mut self, up_to: usize, summary: Turn) -> SeekerResult<()> {
        if summary.role != TurnRole::Summary {
            return Err(SeekerError::invariant(
                "replace_prefix requires a summary turn",
            ));
        }

        let start = if self.leading_system().is_some() { 1 } else { 0 };
        if up_to < start || up_to >= self.turns.len() {
            return Err(SeekerError::invariant(format!(
                "replace_prefix range [{start}..={up_to}] out of bounds for {} turns",
                self.turns.len()
            )));
        }
        if self
            .turns
            .get(up_to + 1)
            .is_some_and(|t| t.role == TurnRole::Summary)
        {
            return Err(SeekerError::invariant(
                "replacement would create two consecutive summary turns",
            ));
        }

        self.turns.splice(start..=up_to, std::iter::once(summary));
        self.total_tokens = self.turns.iter().map(|t| t.token_estimate).sum();
        self.debug_check_total();
        Ok(())
    }

    /// Sum of token estimates over all turns
    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    /// Take an immutable deep copy for persistence
    pub fn snapshot(&self, model: impl Into<String>) -> LogSnapshot {
        LogSnapshot {
            id: Uuid::new_v4().to_string(),
            model: model.into(),
            saved_at: Utc::now(),
            turns: self.turns.clone(),
        }
    }

    /// Rebuild a log from a snapshot, revalidating invariants
    ///
    /// The token total is recomputed from the stored estimates; a snapshot
    /// whose turn sequence violates log invariants is rejected.
    pub fn restore(snapshot: LogSnapshot) -> SeekerResult<Self> {
        let mut log = Self::new();
        for turn in snapshot.turns {
            log.append(turn)?;
        }
        Ok(log)
    }

    /// Install or replace the leading system turn
    ///
    /// The only sanctioned way to touch position 0 after the fact; used when
    /// the caller changes the system prompt mid-session.
    pub fn set_leading_system(&mut self, turn: Turn) -> SeekerResult<()> {
        if turn.role != TurnRole::System {
            return Err(SeekerError::invariant(
                "set_leading_system requires a system turn",
            ));
        }

        if let Some(existing) = self.turns.first_mut().filter(|t| t.role == TurnRole::System) {
            self.total_tokens = self.total_tokens - existing.token_estimate + turn.token_estimate;
            *existing = turn;
        } else {
            self.total_tokens += turn.token_estimate;
            self.turns.insert(0, turn);
        }
        self.debug_check_total();
        Ok(())
    }

    /// Remove every turn
    pub fn clear(&mut self) {
        self.turns.clear();
        self.total_tokens = 0;
    }

    /// All turns in chat order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the log holds no turns
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The leading system turn, if present
    pub fn leading_system(&self) -> Option<&Turn> {
        self.turns.first().filter(|t| t.role == TurnRole::System)
    }

    /// Number of turns excluding a leading system turn
    pub fn non_system_len(&self) -> usize {
        self.turns.len() - usize::from(self.leading_system().is_some())
    }

    fn debug_check_total(&self) {
        debug_assert_eq!(
            self.total_tokens,
            self.turns.iter().map(|t| t.token_estimate).sum::<usize>(),
            "maintained token total drifted from true sum"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> TokenEstimator {
        TokenEstimator::new()
    }

    fn sample_log() -> ConversationLog {
        let est = estimator();
        let mut log = ConversationLog::new();
        log.append(Turn::system("be concise", &est)).unwrap();
        log.append(Turn::user("what is rust?", &est)).unwrap();
        log.append(Turn::assistant("a systems language", &est))
            .unwrap();
        log
    }

    #[test]
    fn test_append_maintains_total() {
        let log = sample_log();
        let expected: usize = log.turns().iter().map(|t| t.token_estimate).sum();
        assert_eq!(log.total_tokens(), expected);
    }

    #[test]
    fn test_non_leading_system_rejected() {
        let est = estimator();
        let mut log = sample_log();
        let err = log.append(Turn::system("late system", &est)).unwrap_err();
        assert!(matches!(err, SeekerError::InvariantViolation { .. }));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_consecutive_summaries_rejected() {
        let est = estimator();
        let mut log = ConversationLog::new();
        log.append(Turn::summary("earlier context", &est)).unwrap();
        let err = log.append(Turn::summary("more context", &est)).unwrap_err();
        assert!(matches!(err, SeekerError::InvariantViolation { .. }));
    }

    #[test]
    fn test_replace_prefix_preserves_leading_system() {
        let est = estimator();
        let mut log = sample_log();
        log.append(Turn::user("and memory safety?", &est)).unwrap();
        log.append(Turn::assistant("via ownership", &est)).unwrap();

        log.replace_prefix(2, Turn::summary("talked about rust", &est))
            .unwrap();

        assert_eq!(log.len(), 4);
        assert_eq!(log.turns()[0].role, TurnRole::System);
        assert_eq!(log.turns()[1].role, TurnRole::Summary);
        assert_eq!(log.turns()[2].role, TurnRole::User);
        let expected: usize = log.turns().iter().map(|t| t.token_estimate).sum();
        assert_eq!(log.total_tokens(), expected);
    }

    #[test]
    fn test_replace_prefix_rejects_non_summary() {
        let est = estimator();
        let mut log = sample_log();
        let before = log.turns().to_vec();

        let err = log
            .replace_prefix(1, Turn::user("not a summary", &est))
            .unwrap_err();
        assert!(matches!(err, SeekerError::InvariantViolation { .. }));
        assert_eq!(log.turns(), before.as_slice());
    }

    #[test]
    fn test_replace_prefix_rejects_out_of_bounds() {
        let est = estimator();
        let mut log = sample_log();
        assert!(log
            .replace_prefix(0, Turn::summary("s", &est))
            .is_err());
        assert!(log
            .replace_prefix(3, Turn::summary("s", &est))
            .is_err());
    }

    #[test]
    fn test_replace_prefix_rejects_adjacent_summary() {
        let est = estimator();
        let mut log = ConversationLog::new();
        log.append(Turn::user("a", &est)).unwrap();
        log.append(Turn::summary("old summary", &est)).unwrap();
        log.append(Turn::user("b", &est)).unwrap();
        let before = log.turns().to_vec();

        // Replacing only turn 0 would leave the new summary adjacent to the old one
        let err = log
            .replace_prefix(0, Turn::summary("new summary", &est))
            .unwrap_err();
        assert!(matches!(err, SeekerError::InvariantViolation { .. }));
        assert_eq!(log.turns(), before.as_slice());

        // Including the old summary in the span is fine
        log.replace_prefix(1, Turn::summary("merged summary", &est))
            .unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let log = sample_log();
        let snapshot = log.snapshot("sonar-pro");

        let restored = ConversationLog::restore(snapshot).unwrap();
        assert_eq!(restored.turns(), log.turns());
        assert_eq!(restored.total_tokens(), log.total_tokens());
    }

    #[test]
    fn test_restore_rejects_invalid_sequence() {
        let est = estimator();
        let snapshot = LogSnapshot {
            id: "bad".to_string(),
            model: "sonar".to_string(),
            saved_at: Utc::now(),
            turns: vec![
                Turn::user("hello", &est),
                Turn::system("system cannot follow", &est),
            ],
        };
        assert!(ConversationLog::restore(snapshot).is_err());
    }

    #[test]
    fn test_snapshot_preview() {
        let log = sample_log();
        let snapshot = log.snapshot("sonar-pro");
        assert_eq!(snapshot.preview(50), "what is rust?");
        assert_eq!(snapshot.preview(4), "what...");
    }

    #[test]
    fn test_set_leading_system_replaces_in_place() {
        let est = estimator();
        let mut log = sample_log();
        let old_total = log.total_tokens();
        let old_system_tokens = log.turns()[0].token_estimate;

        let replacement = Turn::system("answer in bullet points only", &est);
        let new_system_tokens = replacement.token_estimate;
        log.set_leading_system(replacement).unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(log.turns()[0].content, "answer in bullet points only");
        assert_eq!(
            log.total_tokens(),
            old_total - old_system_tokens + new_system_tokens
        );
    }

    #[test]
    fn test_set_leading_system_inserts_when_missing() {
        let est = estimator();
        let mut log = ConversationLog::new();
        log.append(Turn::user("hi", &est)).unwrap();

        log.set_leading_system(Turn::system("be brief", &est)).unwrap();
        assert_eq!(log.turns()[0].role, TurnRole::System);
        assert_eq!(log.len(), 2);

        let err = log
            .set_leading_system(Turn::user("not system", &est))
            .unwrap_err();
        assert!(matches!(err, SeekerError::InvariantViolation { .. }));
    }

    #[test]
    fn test_clear() {
        let mut log = sample_log();
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.total_tokens(), 0);
    }
}
