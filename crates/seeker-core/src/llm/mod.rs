//! Remote model transport
//!
//! Wire message types, the transport capability trait, SSE decoding, and the
//! Sonar API client.

pub mod messages;
pub mod sonar;
pub mod sse;
pub mod transport;

pub use messages::{WireMessage, WireRole, conversation_payload};
pub use sonar::{API_URL, AVAILABLE_MODELS, DEFAULT_MODEL, SonarClient, is_available_model};
pub use sse::SseDecoder;
pub use transport::{SearchTransport, TextStream};
