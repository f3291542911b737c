use crate::domain::user::models::Principal;
use crate::domain::user::models::Role;
use crate::domain::user::models::UserId;
use crate::user::errors::UserError;

/// Whether `principal` may update or delete the user `target`.
///
/// Admins may modify anyone; everyone else only themselves.
pub fn can_modify(principal: &Principal, target: &UserId) -> bool {
    principal.role == Role::Admin || principal.user_id == *target
}

/// [`can_modify`] as a `Result`, for use with `?`.
pub fn ensure_can_modify(principal: &Principal, target: &UserId) -> Result<(), UserError> {
    if can_modify(principal, target) {
        Ok(())
    } else {
        tracing::warn!(
            subject = %principal.user_id,
            role = %principal.role,
            target = %target,
            "Modification denied"
        );
        Err(UserError::Forbidden(target.to_string()))
    }
}

/// Listing the whole collection is reserved to admins.
pub fn can_list(principal: &Principal) -> bool {
    principal.role == Role::Admin
}
