//! Request-scoped identity extraction.
//!
//! The fronting proxy authenticates the caller and injects
//! `x-quill-actor` / `x-quill-role`; this extractor turns them into the
//! [`Identity`] every engine call takes. No session state is held anywhere.

use axum::{extract::FromRequestParts, http::request::Parts};
use quill_core::identity::{Identity, Role};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_HEADER: &str = "x-quill-actor";
pub const ROLE_HEADER: &str = "x-quill-role";

/// Extractor wrapper around [`Identity`].
pub struct Claims(pub Identity);

impl<S> FromRequestParts<S> for Claims
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let actor = parts
      .headers
      .get(ACTOR_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| {
        ApiError::BadRequest(format!("missing {ACTOR_HEADER} header"))
      })?;
    let actor = Uuid::parse_str(actor).map_err(|_| {
      ApiError::BadRequest(format!("{ACTOR_HEADER} is not a UUID"))
    })?;

    let role = parts
      .headers
      .get(ROLE_HEADER)
      .and_then(|v| v.to_str().ok())
      .unwrap_or("requester");
    let role = match role {
      "requester" => Role::Requester,
      "expert" => Role::Expert,
      "admin" => Role::Admin,
      other => {
        return Err(ApiError::BadRequest(format!(
          "unknown {ROLE_HEADER}: {other:?}"
        )));
      }
    };

    Ok(Claims(Identity { actor, role }))
  }
}
