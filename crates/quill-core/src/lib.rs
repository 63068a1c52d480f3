//! Core types and trait definitions for the Quill triage engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod answer;
pub mod automation;
pub mod document;
pub mod error;
pub mod identity;
pub mod model;
pub mod page;
pub mod question;
pub mod routing;
pub mod store;
pub mod wisdom;

pub use error::{Error, ErrorKind, Result};
