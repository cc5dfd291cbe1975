//! Conversation context management
//!
//! This module tracks turn history, enforces the token budget across a
//! growing conversation by summarizing the oldest span before the budget is
//! exceeded, and manages the lifecycle of each streamed response.
//!
//! # Overview
//!
//! - [`TokenEstimator`] estimates the cost of outbound text
//! - [`ConversationLog`] holds the ordered turn history
//! - [`Summarizer`] condenses the oldest span into a single compact turn
//! - [`StreamingReceiver`] assembles a streamed response in arrival order
//! - [`ContextManager`] orchestrates all of the above per exchange

pub mod estimator;
pub mod log;
pub mod manager;
pub mod streaming;
pub mod summarizer;

pub use estimator::TokenEstimator;
pub use log::{ConversationLog, LogSnapshot, Turn, TurnRole};
pub use manager::{ContextManager, SendWarning};
pub use streaming::{StreamState, StreamingReceiver};
pub use summarizer::{SummarizeOutcome, Summarizer};
