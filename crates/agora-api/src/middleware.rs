use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use tracing::warn;

use agora_types::api::TokenType;

use crate::error::ApiError;
use crate::state::AppState;

/// Validates the bearer access token and stores its `Claims` as a request
/// extension. Runs before any handler, so a missing or bad token is always
/// a 401 regardless of what the handler would decide.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| ApiError::Unauthenticated)?;

    let claims = state
        .tokens
        .verify(bearer.token(), TokenType::Access)
        .ok_or_else(|| {
            warn!("Rejected bearer token on {}", req.uri().path());
            ApiError::Unauthenticated
        })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
