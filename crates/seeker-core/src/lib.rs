//! Core library for Seeker
//!
//! Seeker is an interactive terminal client for conversational search.
//! This crate holds everything below the terminal: the conversation context
//! manager (turn log, token budget, summarization, streaming receipt), the
//! Sonar transport client, session persistence, and configuration.
//!
//! The one component with real failure semantics is the context manager —
//! see [`context`] for the lifecycle of an exchange.

pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod session;

pub use config::{ContextBudget, SeekerConfig};
pub use context::{ContextManager, ConversationLog, LogSnapshot, SendWarning, Turn, TurnRole};
pub use error::{SeekerError, SeekerResult};
