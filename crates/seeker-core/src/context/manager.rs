//! Conversation orchestration
//!
//! `ContextManager` owns the conversation log for the lifetime of a session
//! and drives each exchange end-to-end: budget check, summarize-if-needed,
//! user turn append, streamed receipt, and the final assistant commit. One
//! exchange may be in flight at a time; the increments of that exchange form
//! a finite, non-restartable pull sequence.

use crate::config::ContextBudget;
use crate::context::estimator::TokenEstimator;
use crate::context::log::{ConversationLog, LogSnapshot, Turn};
use crate::context::streaming::StreamingReceiver;
use crate::context::summarizer::{SummarizeOutcome, Summarizer};
use crate::error::{SeekerError, SeekerResult};
use crate::llm::messages::conversation_payload;
use crate::llm::transport::{SearchTransport, TextStream};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Warning-level signal attached to a send that still proceeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendWarning {
    /// The log was over budget but too short to summarize
    SummarizationSkipped { reason: String },
    /// The send went out over the input token limit (escape valve)
    OverBudget { estimated: usize, limit: usize },
}

impl std::fmt::Display for SendWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SummarizationSkipped { reason } => {
                write!(f, "summarization skipped: {reason}")
            }
            Self::OverBudget { estimated, limit } => {
                write!(
                    f,
                    "sending over budget: {estimated} tokens estimated, {limit} allowed"
                )
            }
        }
    }
}

/// One in-flight streamed exchange
struct InFlightExchange {
    receiver: StreamingReceiver,
    stream: TextStream,
    cancellation: CancellationToken,
}

/// Orchestrates turn history, budget enforcement, and streamed exchanges
///
/// The log is exclusively owned here; persistence only ever sees snapshots.
pub struct ContextManager {
    log: ConversationLog,
    budget: ContextBudget,
    estimator: TokenEstimator,
    summarizer: Summarizer,
    transport: Arc<dyn SearchTransport>,
    in_flight: Option<InFlightExchange>,
}

impl ContextManager {
    /// Create a manager for one conversation session
    pub fn new(transport: Arc<dyn SearchTransport>, budget: ContextBudget) -> Self {
        let estimator = TokenEstimator::new();
        Self {
            log: ConversationLog::new(),
            budget,
            estimator,
            summarizer: Summarizer::new(estimator),
            transport,
            in_flight: None,
        }
    }

    /// Read-only view of the committed conversation
    pub fn current_log(&self) -> &ConversationLog {
        &self.log
    }

    /// The session's budget
    pub fn budget(&self) -> ContextBudget {
        self.budget
    }

    /// Whether an exchange is currently in flight
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Token returned to callers that need to request cancellation from
    /// outside the polling loop (e.g. a signal handler)
    ///
    /// Only valid for the current exchange.
    pub fn cancellation_token(&self) -> Option<CancellationToken> {
        self.in_flight.as_ref().map(|ex| ex.cancellation.clone())
    }

    /// Install or replace the leading system prompt
    pub fn set_system_prompt(&mut self, prompt: &str) -> SeekerResult<()> {
        self.log
            .set_leading_system(Turn::system(prompt, &self.estimator))
    }

    /// Start a new conversation, discarding all committed turns
    ///
    /// Rejected while an exchange is in flight.
    pub fn clear(&mut self) -> SeekerResult<()> {
        self.ensure_idle("clear")?;
        self.log.clear();
        Ok(())
    }

    /// Deep copy of the committed log for persistence
    ///
    /// Never includes partial streamed text; during an exchange it covers the
    /// turns committed so far (which includes the in-flight user turn).
    pub fn export_snapshot(&self, model: impl Into<String>) -> LogSnapshot {
        self.log.snapshot(model)
    }

    /// Replace the conversation with a restored snapshot
    ///
    /// Rejected while an exchange is in flight; the snapshot is revalidated
    /// against log invariants.
    pub fn load_snapshot(&mut self, snapshot: LogSnapshot) -> SeekerResult<()> {
        self.ensure_idle("load a snapshot")?;
        self.log = ConversationLog::restore(snapshot)?;
        Ok(())
    }

    /// Send a user message, opening a streamed exchange
    ///
    /// Runs the budget check first, summarizing the oldest span if the new
    /// message would not fit. A failed or ineffective summarization aborts
    /// the send with the log untouched. On success the user turn is
    /// committed, the transport stream is open, and the returned warnings
    /// describe any escape-valve conditions; pull the response with
    /// [`next_increment`](Self::next_increment).
    pub async fn send(&mut self, user_message: &str) -> SeekerResult<Vec<SendWarning>> {
        if self.in_flight.is_some() {
            return Err(SeekerError::SendAlreadyInProgress);
        }

        let mut warnings = Vec::new();
        let message_estimate = self.estimator.estimate_turn(user_message);
        let mut projected = self.log.total_tokens() + message_estimate;

        if projected > self.budget.input_token_limit {
            info!(
                projected,
                limit = self.budget.input_token_limit,
                "context over budget, summarizing"
            );
            match self
                .summarizer
                .summarize(&self.log, &self.budget, self.transport.as_ref())
                .await?
            {
                SummarizeOutcome::Summarized {
                    up_to,
                    summary,
                    span_tokens,
                } => {
                    debug!(
                        span_tokens,
                        summary_tokens = summary.token_estimate,
                        "applying summary"
                    );
                    self.log.replace_prefix(up_to, summary)?;
                    projected = self.log.total_tokens() + message_estimate;
                }
                SummarizeOutcome::Skipped { reason } => {
                    warnings.push(SendWarning::SummarizationSkipped { reason });
                }
            }

            if projected > self.budget.input_token_limit {
                warn!(
                    projected,
                    limit = self.budget.input_token_limit,
                    "proceeding over budget"
                );
                warnings.push(SendWarning::OverBudget {
                    estimated: projected,
                    limit: self.budget.input_token_limit,
                });
            }
        }

        // The user's message is genuinely sent from here on: it stays in the
        // log even if the stream later fails or is cancelled.
        self.log
            .append(Turn::user(user_message, &self.estimator))?;

        let mut receiver = StreamingReceiver::new();
        receiver.begin_send()?;

        let payload = conversation_payload(self.log.turns());
        let stream = match self.transport.stream(&payload).await {
            Ok(stream) => stream,
            Err(e) => {
                receiver.fail();
                return Err(SeekerError::stream_failed(e.to_string(), ""));
            }
        };

        self.in_flight = Some(InFlightExchange {
            receiver,
            stream,
            cancellation: CancellationToken::new(),
        });
        Ok(warnings)
    }

    /// Pull the next increment of the in-flight exchange
    ///
    /// Returns `Ok(Some(text))` for each increment in transport delivery
    /// order and `Ok(None)` exactly once, after the assistant turn has been
    /// committed. Transport errors surface as `StreamFailed` carrying the
    /// partial text; the user turn stays committed either way.
    pub async fn next_increment(&mut self) -> SeekerResult<Option<String>> {
        let exchange = self
            .in_flight
            .as_mut()
            .ok_or_else(|| SeekerError::invariant("no exchange in flight"))?;

        // Cancellation is checked between increments; the borrow of the
        // exchange must end before the cancellation path touches `self`.
        let pulled = tokio::select! {
            biased;
            _ = exchange.cancellation.cancelled() => None,
            item = exchange.stream.next() => Some(item),
        };

        let item = match pulled {
            None => return self.finish_cancelled(),
            Some(item) => item,
        };

        match item {
            Some(Ok(chunk)) => {
                let exchange = self.in_flight.as_mut().expect("exchange checked above");
                exchange.receiver.record_increment(&chunk)?;
                Ok(Some(chunk))
            }
            Some(Err(e)) => {
                let mut exchange = self.in_flight.take().expect("exchange checked above");
                let partial = exchange.receiver.partial_text().to_string();
                exchange.receiver.fail();
                warn!(partial_chars = partial.len(), "stream failed: {e}");
                Err(SeekerError::stream_failed(e.to_string(), partial))
            }
            None => {
                let mut exchange = self.in_flight.take().expect("exchange checked above");
                let text = exchange.receiver.complete()?;
                self.log
                    .append(Turn::assistant(text, &self.estimator))?;
                debug!(
                    turns = self.log.len(),
                    total_tokens = self.log.total_tokens(),
                    "assistant turn committed"
                );
                Ok(None)
            }
        }
    }

    /// Cancel the in-flight exchange
    ///
    /// The partial text is discarded, the transport connection released, and
    /// the user turn left in place. Fails if nothing is in flight.
    pub fn cancel(&mut self) -> SeekerResult<()> {
        match self.in_flight.take() {
            Some(exchange) => {
                self.finish_exchange_cancelled(exchange);
                Ok(())
            }
            None => Err(SeekerError::invariant("no exchange in flight to cancel")),
        }
    }

    fn finish_cancelled(&mut self) -> SeekerResult<Option<String>> {
        let exchange = self.in_flight.take().expect("exchange checked above");
        self.finish_exchange_cancelled(exchange);
        Err(SeekerError::Cancelled)
    }

    fn finish_exchange_cancelled(&mut self, mut exchange: InFlightExchange) {
        exchange.cancellation.cancel();
        exchange.receiver.cancel();
        // Dropping the stream releases the transport connection
        drop(exchange.stream);
        info!("exchange cancelled, user turn retained");
    }

    fn ensure_idle(&self, operation: &str) -> SeekerResult<()> {
        if self.in_flight.is_some() {
            return Err(SeekerError::invariant(format!(
                "cannot {operation} while an exchange is in flight"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::log::TurnRole;
    use crate::llm::messages::WireMessage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// What one scripted call to the transport should produce
    enum Script {
        /// Stream these fragments, then end normally
        Stream(Vec<&'static str>),
        /// Stream these fragments, then fail
        StreamThenError(Vec<&'static str>, &'static str),
        /// Refuse to open the stream
        ConnectError(&'static str),
        /// Answer a `complete` call
        Complete(&'static str),
        /// Fail a `complete` call
        CompleteError(&'static str),
    }

    /// Transport driven by a queue of scripted outcomes
    struct ScriptedTransport {
        script: Mutex<VecDeque<Script>>,
        streamed_payloads: Mutex<Vec<Vec<WireMessage>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                streamed_payloads: Mutex::new(Vec::new()),
            })
        }

        fn next_script(&self) -> Script {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more times than scripted")
        }
    }

    #[async_trait]
    impl SearchTransport for ScriptedTransport {
        async fn stream(&self, conversation: &[WireMessage]) -> SeekerResult<TextStream> {
            self.streamed_payloads
                .lock()
                .unwrap()
                .push(conversation.to_vec());
            match self.next_script() {
                Script::Stream(fragments) => Ok(Box::pin(futures::stream::iter(
                    fragments.into_iter().map(|f| Ok(f.to_string())).collect::<Vec<_>>(),
                ))),
                Script::StreamThenError(fragments, message) => {
                    let mut items: Vec<SeekerResult<String>> =
                        fragments.into_iter().map(|f| Ok(f.to_string())).collect();
                    items.push(Err(SeekerError::transport(message)));
                    Ok(Box::pin(futures::stream::iter(items)))
                }
                Script::ConnectError(message) => Err(SeekerError::transport(message)),
                _ => panic!("scripted a completion outcome for a stream call"),
            }
        }

        async fn complete(&self, _conversation: &[WireMessage]) -> SeekerResult<String> {
            match self.next_script() {
                Script::Complete(reply) => Ok(reply.to_string()),
                Script::CompleteError(message) => Err(SeekerError::transport(message)),
                _ => panic!("scripted a stream outcome for a complete call"),
            }
        }
    }

    fn manager(transport: Arc<ScriptedTransport>, input_limit: usize) -> ContextManager {
        ContextManager::new(transport, ContextBudget::new(input_limit, 100).unwrap())
    }

    async fn drain(manager: &mut ContextManager) -> SeekerResult<Vec<String>> {
        let mut increments = Vec::new();
        while let Some(chunk) = manager.next_increment().await? {
            increments.push(chunk);
        }
        Ok(increments)
    }

    #[tokio::test]
    async fn test_simple_exchange_commits_both_turns() {
        let transport =
            ScriptedTransport::new(vec![Script::Stream(vec!["Quant", "um comput", "ing is..."])]);
        let mut mgr = manager(transport.clone(), 50);
        mgr.set_system_prompt("be concise").unwrap();

        let warnings = mgr.send("what is quantum computing").await.unwrap();
        assert!(warnings.is_empty());
        assert!(mgr.is_in_flight());

        let increments = drain(&mut mgr).await.unwrap();
        assert_eq!(increments, vec!["Quant", "um comput", "ing is..."]);
        assert!(!mgr.is_in_flight());

        let turns = mgr.current_log().turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, TurnRole::System);
        assert_eq!(turns[1].role, TurnRole::User);
        assert_eq!(turns[2].role, TurnRole::Assistant);
        assert_eq!(turns[2].content, "Quantum computing is...");
    }

    #[tokio::test]
    async fn test_payload_includes_full_log() {
        let transport = ScriptedTransport::new(vec![Script::Stream(vec!["hi"])]);
        let mut mgr = manager(transport.clone(), 500);
        mgr.set_system_prompt("be concise").unwrap();

        mgr.send("hello").await.unwrap();
        drain(&mut mgr).await.unwrap();

        let payloads = transport.streamed_payloads.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].len(), 2);
        assert_eq!(payloads[0][0].content, "be concise");
        assert_eq!(payloads[0][1].content, "hello");
    }

    #[tokio::test]
    async fn test_reentrant_send_fails_fast() {
        let transport = ScriptedTransport::new(vec![Script::Stream(vec!["a"])]);
        let mut mgr = manager(transport, 50);

        mgr.send("first").await.unwrap();
        let err = mgr.send("second").await.unwrap_err();
        assert!(matches!(err, SeekerError::SendAlreadyInProgress));

        // The first exchange still completes normally
        drain(&mut mgr).await.unwrap();
        assert_eq!(mgr.current_log().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_user_turn_only() {
        let transport = ScriptedTransport::new(vec![Script::StreamThenError(
            vec!["partial ans"],
            "connection reset",
        )]);
        let mut mgr = manager(transport, 50);

        mgr.send("question").await.unwrap();
        assert_eq!(mgr.next_increment().await.unwrap(), Some("partial ans".to_string()));

        let err = mgr.next_increment().await.unwrap_err();
        match &err {
            SeekerError::StreamFailed { partial, .. } => assert_eq!(partial, "partial ans"),
            other => panic!("expected StreamFailed, got {other:?}"),
        }

        let turns = mgr.current_log().turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, TurnRole::User);
        assert!(!mgr.is_in_flight());
    }

    #[tokio::test]
    async fn test_connect_failure_keeps_user_turn() {
        let transport = ScriptedTransport::new(vec![Script::ConnectError("refused")]);
        let mut mgr = manager(transport, 50);

        let err = mgr.send("question").await.unwrap_err();
        assert!(matches!(err, SeekerError::StreamFailed { .. }));
        assert_eq!(mgr.current_log().len(), 1);
        assert!(!mgr.is_in_flight());
    }

    #[tokio::test]
    async fn test_cancellation_discards_partial_and_allows_next_send() {
        let transport = ScriptedTransport::new(vec![
            Script::Stream(vec!["will be", " cancelled"]),
            Script::Stream(vec!["second answer"]),
        ]);
        let mut mgr = manager(transport, 200);

        mgr.send("first").await.unwrap();
        mgr.next_increment().await.unwrap();
        mgr.cancel().unwrap();

        let turns = mgr.current_log().turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, TurnRole::User);

        // A subsequent send succeeds normally
        mgr.send("second").await.unwrap();
        let increments = drain(&mut mgr).await.unwrap();
        assert_eq!(increments, vec!["second answer"]);
        assert_eq!(mgr.current_log().len(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_token_cancels_pending_pull() {
        let transport = ScriptedTransport::new(vec![Script::Stream(vec!["a", "b"])]);
        let mut mgr = manager(transport, 50);

        mgr.send("question").await.unwrap();
        let token = mgr.cancellation_token().unwrap();
        token.cancel();

        let err = mgr.next_increment().await.unwrap_err();
        assert!(matches!(err, SeekerError::Cancelled));
        assert!(!mgr.is_in_flight());
        assert_eq!(mgr.current_log().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_an_error() {
        let transport = ScriptedTransport::new(vec![]);
        let mut mgr = manager(transport, 50);
        assert!(mgr.cancel().is_err());
    }

    #[tokio::test]
    async fn test_summarization_triggered_when_over_budget() {
        let transport = ScriptedTransport::new(vec![
            Script::Complete("earlier turns condensed"),
            Script::Stream(vec!["fresh answer"]),
        ]);
        let mut mgr = manager(transport.clone(), 200);

        // Seed a backlog that exceeds the 200-token limit
        let est = TokenEstimator::new();
        let pad = "pad ".repeat(20);
        let mut seed = ConversationLog::new();
        seed.append(Turn::system("be concise", &est)).unwrap();
        for i in 0..4 {
            seed.append(Turn::user(format!("question number {i} {pad}"), &est))
                .unwrap();
            seed.append(Turn::assistant(format!("answer number {i} {pad}"), &est))
                .unwrap();
        }
        mgr.load_snapshot(seed.snapshot("sonar-pro")).unwrap();
        assert!(mgr.current_log().total_tokens() > 200);

        let warnings = mgr.send("one more question").await.unwrap();

        // The summary replaced the oldest span and the budget now holds
        let turns = mgr.current_log().turns();
        assert_eq!(turns[0].role, TurnRole::System);
        assert_eq!(turns[1].role, TurnRole::Summary);
        assert!(turns[1].content.contains("earlier turns condensed"));
        assert!(warnings.is_empty());
        assert!(mgr.current_log().total_tokens() <= 200);

        drain(&mut mgr).await.unwrap();
        assert_eq!(
            mgr.current_log().turns().last().unwrap().content,
            "fresh answer"
        );
    }

    #[tokio::test]
    async fn test_summarization_failure_aborts_send_with_log_unchanged() {
        let transport = ScriptedTransport::new(vec![Script::CompleteError("remote down")]);
        let mut mgr = manager(transport, 60);

        let est = TokenEstimator::new();
        let mut seed = ConversationLog::new();
        for i in 0..4 {
            seed.append(Turn::user(format!("question {i} padded for size"), &est))
                .unwrap();
            seed.append(Turn::assistant(format!("answer {i} padded for size"), &est))
                .unwrap();
        }
        mgr.load_snapshot(seed.snapshot("sonar-pro")).unwrap();
        let before = mgr.current_log().turns().to_vec();
        let before_tokens = mgr.current_log().total_tokens();

        let err = mgr.send("over the top").await.unwrap_err();
        assert!(matches!(err, SeekerError::SummarizationFailed { .. }));
        assert_eq!(mgr.current_log().turns(), before.as_slice());
        assert_eq!(mgr.current_log().total_tokens(), before_tokens);
        assert!(!mgr.is_in_flight());
    }

    #[tokio::test]
    async fn test_short_log_over_budget_proceeds_with_warnings() {
        let transport = ScriptedTransport::new(vec![Script::Stream(vec!["squeezed answer"])]);
        // Limit of 10 tokens: even a short exchange is over budget
        let mut mgr = manager(transport, 10);
        mgr.set_system_prompt("be concise").unwrap();

        let warnings = mgr.send("a question that cannot possibly fit").await.unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, SendWarning::SummarizationSkipped { .. })));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, SendWarning::OverBudget { .. })));

        drain(&mut mgr).await.unwrap();
        assert_eq!(mgr.current_log().len(), 3);
    }

    #[tokio::test]
    async fn test_under_budget_send_has_no_warnings() {
        let transport = ScriptedTransport::new(vec![Script::Stream(vec!["ok"])]);
        let mut mgr = manager(transport, 5000);

        let warnings = mgr.send("small message").await.unwrap();
        assert!(warnings.is_empty());
        drain(&mut mgr).await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_rejected_mid_flight() {
        let transport = ScriptedTransport::new(vec![Script::Stream(vec!["a"])]);
        let mut mgr = manager(transport, 50);

        mgr.send("question").await.unwrap();
        let snapshot = mgr.export_snapshot("sonar-pro");
        assert!(mgr.load_snapshot(snapshot).is_err());
        assert!(mgr.clear().is_err());

        drain(&mut mgr).await.unwrap();
    }

    #[tokio::test]
    async fn test_next_increment_without_send_is_an_error() {
        let transport = ScriptedTransport::new(vec![]);
        let mut mgr = manager(transport, 50);
        assert!(mgr.next_increment().await.is_err());
    }
}
