//! Transport abstraction for the remote search service
//!
//! The core depends only on this capability: send an ordered conversation,
//! receive a sequence of text increments (streaming) or a single completed
//! text (summarization calls). Timeout policy belongs to implementations;
//! a timeout surfaces as an error item on the stream.

use crate::error::SeekerResult;
use crate::llm::messages::WireMessage;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Lazy sequence of text increments, terminated by end-of-stream or an error
pub type TextStream = Pin<Box<dyn Stream<Item = SeekerResult<String>> + Send>>;

/// Capability to exchange a conversation with the remote model
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Send the conversation and stream the response token-by-token
    ///
    /// Dropping the returned stream releases the underlying connection, which
    /// is how mid-stream cancellation is realized.
    async fn stream(&self, conversation: &[WireMessage]) -> SeekerResult<TextStream>;

    /// Send the conversation and block until the full response is available
    ///
    /// Used for summarization calls only.
    async fn complete(&self, conversation: &[WireMessage]) -> SeekerResult<String>;
}
