//! Internal error type for `quill-store-sqlite`.
//!
//! Encoding/decoding helpers report through this enum; at the trait boundary
//! everything collapses into [`quill_core::Error`] — semantic refusals
//! (version conflicts, terminal-status guards) are raised as their specific
//! core variants inside the store, and anything else becomes `Storage`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {field} value: {value:?}")]
  UnknownDiscriminant { field: &'static str, value: String },
}

impl From<Error> for quill_core::Error {
  fn from(e: Error) -> Self {
    quill_core::Error::Storage(e.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
