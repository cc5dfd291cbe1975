//! Streaming response receipt
//!
//! An explicit finite-state machine tracks one streamed exchange:
//!
//! ```text
//! Idle -> Sending -> Receiving -> {Completed, Cancelled, Failed}
//! ```
//!
//! Increments accumulate in arrival order; the caller sees them in exactly
//! the order the transport delivered them. Cancellation discards the partial
//! text; failure keeps it available for inspection without ever committing it
//! to the log.

use crate::error::{SeekerError, SeekerResult};
use tracing::debug;

/// Position of one streamed exchange in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No exchange started
    Idle,
    /// Request issued, no increment received yet
    Sending,
    /// At least one increment received
    Receiving,
    /// End-of-stream reached; accumulated text was taken
    Completed,
    /// Caller cancelled; partial text discarded
    Cancelled,
    /// Transport failed; partial text retained for inspection
    Failed,
}

impl StreamState {
    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Accumulates a streamed response and enforces lifecycle transitions
///
/// Illegal transitions are API misuse and surface as `InvariantViolation`.
#[derive(Debug)]
pub struct StreamingReceiver {
    state: StreamState,
    accumulated: String,
}

impl Default for StreamingReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingReceiver {
    /// Create a receiver in the `Idle` state
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            accumulated: String::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Text accumulated so far
    pub fn partial_text(&self) -> &str {
        &self.accumulated
    }

    /// Mark the request as issued: `Idle -> Sending`
    pub fn begin_send(&mut self) -> SeekerResult<()> {
        match self.state {
            StreamState::Idle => {
                self.state = StreamState::Sending;
                Ok(())
            }
            state => Err(SeekerError::invariant(format!(
                "begin_send from {state:?}, expected Idle"
            ))),
        }
    }

    /// Record one increment in arrival order: `Sending|Receiving -> Receiving`
    pub fn record_increment(&mut self, chunk: &str) -> SeekerResult<()> {
        match self.state {
            StreamState::Sending | StreamState::Receiving => {
                self.state = StreamState::Receiving;
                self.accumulated.push_str(chunk);
                Ok(())
            }
            state => Err(SeekerError::invariant(format!(
                "increment received in {state:?} state"
            ))),
        }
    }

    /// End-of-stream: `Receiving -> Completed`, returning the full text
    ///
    /// A stream that ends before its first increment completes directly from
    /// `Sending` with empty text.
    pub fn complete(&mut self) -> SeekerResult<String> {
        match self.state {
            StreamState::Sending | StreamState::Receiving => {
                self.state = StreamState::Completed;
                debug!(chars = self.accumulated.len(), "stream completed");
                Ok(std::mem::take(&mut self.accumulated))
            }
            state => Err(SeekerError::invariant(format!(
                "complete from {state:?}, expected Sending or Receiving"
            ))),
        }
    }

    /// Cooperative cancellation: any non-terminal state -> `Cancelled`
    ///
    /// The partial text is discarded.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            debug!(
                discarded_chars = self.accumulated.len(),
                "stream cancelled"
            );
            self.state = StreamState::Cancelled;
            self.accumulated.clear();
        }
    }

    /// Transport failure: any state -> `Failed`
    ///
    /// The partial text stays readable via [`partial_text`](Self::partial_text).
    pub fn fail(&mut self) {
        self.state = StreamState::Failed;
    }
}
