use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use serde::Deserialize;
use thiserror::Error;

use super::JsonBody;
use super::UserData;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Principal;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::UserId;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::handlers::ApiSuccess;
use crate::inbound::http::router::AppState;
use crate::user::errors::EmailError;
use crate::user::errors::UserError;
use crate::user::ports::UserServicePort;

/// HTTP request body for updating a user (raw JSON)
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    /// Accepted for compatibility, never applied
    pub role: Option<String>,
}

#[derive(Debug, Clone, Error)]
enum ParseUpdateUserRequestError {
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("Password must not be empty")]
    EmptyPassword,
}

impl UpdateUserRequest {
    fn try_into_command(self) -> Result<UpdateUserCommand, ParseUpdateUserRequestError> {
        if let Some(role) = &self.role {
            tracing::debug!(requested_role = %role, "Ignoring role in update request");
        }

        let email = self.email.map(EmailAddress::new).transpose()?;
        if self.password.as_deref() == Some("") {
            return Err(ParseUpdateUserRequestError::EmptyPassword);
        }

        Ok(UpdateUserCommand {
            email,
            password: self.password,
        })
    }
}

impl From<ParseUpdateUserRequestError> for ApiError {
    fn from(err: ParseUpdateUserRequestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

pub async fn update_user<S: UserServicePort>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<ApiSuccess<UserData>, ApiError> {
    // Parse user ID and request at HTTP boundary - errors automatically converted
    let user_id = UserId::from_string(&id).map_err(UserError::from)?;
    let command = req.try_into_command()?;

    state
        .user_service
        .update_user(&principal, &user_id, command)
        .await
        .map_err(ApiError::from)
        .map(|ref user| ApiSuccess::new(StatusCode::OK, user.into()))
}
