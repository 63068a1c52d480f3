//! SQLite backend for the Quill triage store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Operations the engine needs to be
//! atomic (submission, answer recording, candidate approval, reassignment
//! review) run inside a single SQLite transaction on that thread.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
