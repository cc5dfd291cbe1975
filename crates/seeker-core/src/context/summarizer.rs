//! Conversation summarization for context compression
//!
//! When the log outgrows the input budget, a contiguous prefix of turns is
//! condensed into a single summary turn by delegating to the remote model's
//! non-streaming completion. The operation is all-or-nothing: the summarizer
//! only proposes a replacement, and nothing touches the log until the
//! proposal passes the effectiveness check.

use crate::config::ContextBudget;
use crate::context::estimator::TokenEstimator;
use crate::context::log::{ConversationLog, Turn, TurnRole};
use crate::error::{SeekerError, SeekerResult};
use crate::llm::messages::WireMessage;
use crate::llm::transport::SearchTransport;
use tracing::{debug, warn};

/// Fixed instruction prepended to every summarization call
const SUMMARY_INSTRUCTION: &str =
    "Condense the following exchange, preserving key facts, decisions, and open questions. \
     Begin your reply with 'Summary of the earlier conversation:' and add nothing else.";

/// Most recent turns that are never summarized, so the model always sees the
/// last exchange verbatim
const PROTECTED_TAIL: usize = 2;

/// Minimum non-system turns required before summarization is attempted
const MIN_TURNS_TO_SUMMARIZE: usize = 3;

/// Result of a summarization attempt
#[derive(Debug)]
pub enum SummarizeOutcome {
    /// Replace turns up to and including `up_to` with `summary`
    Summarized {
        up_to: usize,
        summary: Turn,
        span_tokens: usize,
    },
    /// The log is too short to leave a span; the send proceeds over budget
    Skipped { reason: String },
}

/// Collapses a prefix of the log into a single compact turn
#[derive(Debug, Clone, Copy, Default)]
pub struct Summarizer {
    estimator: TokenEstimator,
}

impl Summarizer {
    /// Create a summarizer sharing the log's token estimator
    pub fn new(estimator: TokenEstimator) -> Self {
        Self { estimator }
    }

    /// Propose a summary for the oldest span of the log
    ///
    /// Fails with `SummarizationFailed` if the delegated call fails and with
    /// `SummarizationIneffective` if the produced summary is not materially
    /// smaller than the span it would replace. In both cases the log is
    /// untouched.
    pub async fn summarize(
        &self,
        log: &ConversationLog,
        budget: &ContextBudget,
        transport: &dyn SearchTransport,
    ) -> SeekerResult<SummarizeOutcome> {
        let span = match self.select_span(log, budget) {
            Some(span) => span,
            None => {
                let reason = format!(
                    "log has fewer than {MIN_TURNS_TO_SUMMARIZE} conversation turns"
                );
                warn!("summarization skipped: {reason}");
                return Ok(SummarizeOutcome::Skipped { reason });
            }
        };

        let turns = &log.turns()[span.start..=span.up_to];
        let span_tokens: usize = turns.iter().map(|t| t.token_estimate).sum();
        debug!(
            turns = turns.len(),
            span_tokens, "requesting summary of oldest span"
        );

        let request = vec![
            WireMessage::system(SUMMARY_INSTRUCTION),
            WireMessage::user(format_span(turns)),
        ];

        let summary_text = transport.complete(&request).await.map_err(|e| {
            SeekerError::summarization_failed(e.to_string())
        })?;

        let summary = Turn::summary(summary_text.trim(), &self.estimator);

        // A summary that reclaims less than half the span would loop forever
        if summary.token_estimate * 2 >= span_tokens {
            return Err(SeekerError::SummarizationIneffective {
                summary_tokens: summary.token_estimate,
                span_tokens,
            });
        }

        debug!(
            summary_tokens = summary.token_estimate,
            span_tokens, "summary accepted"
        );
        Ok(SummarizeOutcome::Summarized {
            up_to: span.up_to,
            summary,
            span_tokens,
        })
    }

    /// Pick the span to condense
    ///
    /// Starting after any leading system turn, grow turn-by-turn until adding
    /// the next turn would exceed half the input limit, or until only the
    /// most recent user/assistant pair remains. The span always contains at
    /// least the oldest turn. Returns `None` if the log is too short.
    fn select_span(&self, log: &ConversationLog, budget: &ContextBudget) -> Option<Span> {
        if log.non_system_len() < MIN_TURNS_TO_SUMMARIZE {
            return None;
        }

        let start = usize::from(log.leading_system().is_some());
        let last_allowed = log.len().checked_sub(PROTECTED_TAIL + 1)?;
        if last_allowed < start {
            return None;
        }

        let span_limit = budget.summary_span_limit();
        let mut span_tokens = 0usize;
        let mut up_to = start;

        for (idx, turn) in log.turns()[start..=last_allowed].iter().enumerate() {
            let idx = start + idx;
            if idx > start && span_tokens + turn.token_estimate > span_limit {
                break;
            }
            span_tokens += turn.token_estimate;
            up_to = idx;
        }

        Some(Span { start, up_to })
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    up_to: usize,
}

/// Render the span as `role: content` lines for the summarization prompt
fn format_span(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| {
            let role = match t.role {
                TurnRole::Summary => TurnRole::System,
                other => other,
            };
            format!("{role}: {}", t.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
