//! Session persistence
//!
//! Durable save/load of conversation snapshots. The core only requires the
//! snapshot/restore round trip to be faithful; the on-disk representation
//! lives entirely behind [`SessionStore`].

pub mod storage;

pub use storage::{LocalSessionStore, SessionStore, SessionSummary};
