//! Retrieval-augmented question answering over the Crystallure product
//! catalog.
//!
//! A question flows through product extraction, vector retrieval with
//! query expansion, then either deterministic pattern extraction or a
//! language-model completion, with per-session conversation state
//! resolving follow-up references.

pub mod answer;
pub mod catalog;
pub mod core;
pub mod pipeline;
pub mod providers;
pub mod query;
pub mod search;
pub mod server;
pub mod session;
pub mod state;
