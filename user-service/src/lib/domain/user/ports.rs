use std::time::Duration;

use async_trait::async_trait;

use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Principal;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::UpsertOutcome;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::CacheError;
use crate::user::errors::UserError;

/// Port for user domain service operations.
#[async_trait]
pub trait UserServicePort: Send + Sync + 'static {
    /// Register a new user.
    ///
    /// # Arguments
    /// * `command` - Validated command containing email and plaintext password
    ///
    /// # Returns
    /// Created user entity, always with the standard role
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `Timeout` / `BackendUnavailable` / `DatabaseError` - Store failure
    async fn create_user(&self, command: CreateUserCommand) -> Result<User, UserError>;

    /// Verify credentials and issue an access token.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or wrong password
    /// * `Timeout` / `BackendUnavailable` / `DatabaseError` - Store failure
    async fn login(&self, email: &EmailAddress, password: &str) -> Result<String, UserError>;

    /// Retrieve user by identifier, served from cache when possible.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    async fn get_user(&self, id: &UserId) -> Result<User, UserError>;

    /// Retrieve every user. Admin only.
    ///
    /// # Errors
    /// * `Forbidden` - Principal is not an admin
    async fn list_users(&self, principal: &Principal) -> Result<Vec<User>, UserError>;

    /// Update a user, creating it under `id` when absent.
    ///
    /// # Arguments
    /// * `principal` - Verified caller identity
    /// * `id` - Target user ID
    /// * `command` - Fields to change
    ///
    /// # Errors
    /// * `Forbidden` - Principal may not modify the target
    /// * `MissingField` - Target does not exist and the command cannot create it
    /// * `EmailAlreadyExists` - New email is already registered
    async fn update_user(
        &self,
        principal: &Principal,
        id: &UserId,
        command: UpdateUserCommand,
    ) -> Result<User, UserError>;

    /// Delete a user and drop its cache entry.
    ///
    /// # Errors
    /// * `Forbidden` - Principal may not modify the target
    /// * `NotFound` - User does not exist
    async fn delete_user(&self, principal: &Principal, id: &UserId) -> Result<(), UserError>;
}

/// Persistence operations for the user collection, keyed by [`UserId`].
///
/// Implementations that perform I/O bound every call with a deadline and
/// report an elapsed deadline as `Timeout`, never as a missing record.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Retrieve user by identifier.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Retrieve user by email address.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError>;

    /// Retrieve all users from storage.
    async fn list_all(&self) -> Result<Vec<User>, UserError>;

    /// Persist a new user. Identifier and creation time are already set.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    async fn insert(&self, user: User) -> Result<User, UserError>;

    /// Replace the user stored under `id`, or create it if absent.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email belongs to another user
    async fn upsert(&self, id: &UserId, user: User) -> Result<UpsertOutcome, UserError>;

    /// Remove user from storage.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    async fn delete(&self, id: &UserId) -> Result<(), UserError>;
}

/// Key/value cache holding serialized user snapshots.
#[async_trait]
pub trait UserCache: Send + Sync + 'static {
    /// Fetch a live entry. Expired or absent entries are `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store an entry that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove an entry. Removing an absent entry is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
