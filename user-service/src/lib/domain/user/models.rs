use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::SubsecRound;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::user::errors::ClaimsError;
use crate::user::errors::EmailError;
use crate::user::errors::RoleError;
use crate::user::errors::UserError;
use crate::user::errors::UserIdError;

/// User aggregate entity.
///
/// Represents a registered user. `id` is assigned by the service before the
/// record reaches the store and is never reassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creation timestamp at the precision the store keeps (microseconds).
    ///
    /// Assigning anything finer would make the cached snapshot differ from
    /// the row read back later.
    pub fn creation_timestamp() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// Opaque user identifier.
///
/// Distinct from whatever row identifier the store keeps internally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    const MAX_LENGTH: usize = 128;

    /// Generate a new random user ID.
    ///
    /// # Returns
    /// UserId holding the string form of a random UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a user ID from string.
    ///
    /// Any non-empty token without whitespace or `/` is accepted; the
    /// identifier is opaque to the service.
    ///
    /// # Errors
    /// * `Empty` - String is empty
    /// * `TooLong` - String exceeds 128 bytes
    /// * `InvalidCharacters` - String contains whitespace or `/`
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        if s.is_empty() {
            return Err(UserIdError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(UserIdError::TooLong {
                max: Self::MAX_LENGTH,
                actual: s.len(),
            });
        }
        if s.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(UserIdError::InvalidCharacters);
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates email format using RFC 5322 compliant parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    /// Get email as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Membership level of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Role::Standard),
            "admin" => Ok(Role::Admin),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity established by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl TryFrom<auth::Claims> for Principal {
    type Error = ClaimsError;

    fn try_from(claims: auth::Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::from_string(&claims.id)?,
            role: claims.role.parse()?,
        })
    }
}

/// Cached snapshot of a [`User`].
///
/// Field order is fixed so the same record always serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for CachedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.as_str().to_string(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

impl TryFrom<CachedUser> for User {
    type Error = UserError;

    fn try_from(cached: CachedUser) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::from_string(&cached.id)?,
            email: EmailAddress::new(cached.email)?,
            password_hash: cached.password_hash,
            role: cached.role,
            created_at: cached.created_at,
        })
    }
}

/// Command to create a new user with domain types
#[derive(Debug)]
pub struct CreateUserCommand {
    pub email: EmailAddress,
    pub password: String,
}

impl CreateUserCommand {
    /// Construct a new create user command.
    ///
    /// # Arguments
    /// * `email` - Validated email address
    /// * `password` - Plain text password (will be hashed by service)
    pub fn new(email: EmailAddress, password: String) -> Self {
        Self { email, password }
    }
}

/// Command to update a user with optional validated fields.
///
/// Only provided fields are changed on an existing record. A caller-supplied
/// role is never part of the command.
#[derive(Debug, Default)]
pub struct UpdateUserCommand {
    pub email: Option<EmailAddress>,
    pub password: Option<String>,
}

/// Whether an upsert replaced an existing record or created a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Matched,
    Inserted,
}
