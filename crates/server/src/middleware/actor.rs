//! Verified-actor extractor.
//!
//! Authentication happens upstream (gateway / reverse proxy); requests
//! arrive with the already-verified identity in the `x-actor-id` header.
//! This extractor makes that identity available to handlers and rejects
//! requests where it is missing or malformed.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use chemstock_core::ActorId;

use crate::error::AppError;

/// Header carrying the verified actor identity.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Extractor that requires a verified actor identity.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(
///     VerifiedActor(actor): VerifiedActor,
/// ) -> impl IntoResponse {
///     format!("request by {actor}")
/// }
/// ```
pub struct VerifiedActor(pub ActorId);

impl<S> FromRequestParts<S> for VerifiedActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("missing {ACTOR_HEADER} header"))
            })?;

        let id = raw.parse::<Uuid>().map_err(|_| {
            AppError::Unauthorized(format!("malformed {ACTOR_HEADER} header"))
        })?;

        Ok(Self(ActorId::new(id)))
    }
}
