//! # Infrastructure Adapters
//!
//! In-memory implementations of the message sink and row store, used by tests
//! and by the `memory` backend for local runs.

pub mod memory;

pub use memory::{InMemoryMessageSink, InMemoryRowStore, PublishedMessage, StoredRow};
