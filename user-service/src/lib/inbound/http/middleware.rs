use axum::extract::Request;
use axum::extract::State;
use axum::middleware::Next;
use axum::response::Response;
use http::HeaderName;

use super::handlers::ApiError;
use crate::domain::user::models::Principal;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::router::AppState;

/// Request header carrying the bearer token.
pub const TOKEN_HEADER: HeaderName = HeaderName::from_static("token");

/// Middleware that verifies the `Token` header and stores the resulting
/// [`Principal`] in request extensions.
///
/// Every failure, from a missing header to an expired token, is 403.
pub async fn authenticate<S: UserServicePort>(
    State(state): State<AppState<S>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token_from_header(&req)?;

    let claims = state.authenticator.validate_token(token).map_err(|e| {
        tracing::warn!(error = %e, "Token validation failed");
        ApiError::Forbidden("Invalid or expired token".to_string())
    })?;

    let principal = Principal::try_from(claims).map_err(|e| {
        tracing::warn!(error = %e, "Token claims do not describe a principal");
        ApiError::Forbidden("Invalid token claims".to_string())
    })?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

fn extract_token_from_header(req: &Request) -> Result<&str, ApiError> {
    let header = req
        .headers()
        .get(TOKEN_HEADER)
        .ok_or_else(|| ApiError::Forbidden("not authorized".to_string()))?;

    let token = header
        .to_str()
        .map_err(|_| ApiError::Forbidden("Invalid Token header".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(ApiError::Forbidden("not authorized".to_string()));
    }

    Ok(token)
}
