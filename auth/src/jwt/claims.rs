use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Absolute lifetime of an issued token. There is no refresh.
pub const TOKEN_LIFETIME_MINUTES: i64 = 30;

/// Identity claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Always true for tokens issued by this service
    pub authorized: bool,

    /// Subject (opaque user identifier)
    pub id: String,

    /// Role of the subject at issuance time
    pub role: String,

    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
}

impl Claims {
    /// Build the claim set for a subject issued at `issued_at`.
    ///
    /// # Arguments
    /// * `id` - Subject identifier
    /// * `role` - Subject role
    /// * `issued_at` - Issuance instant, expiry is derived from it
    ///
    /// # Returns
    /// Claims with `authorized` set and `exp` at issuance plus the token lifetime
    pub fn for_subject(id: impl ToString, role: impl ToString, issued_at: DateTime<Utc>) -> Self {
        let expiration = issued_at + Duration::minutes(TOKEN_LIFETIME_MINUTES);

        Self {
            authorized: true,
            id: id.to_string(),
            role: role.to_string(),
            exp: expiration.timestamp(),
        }
    }

    /// Check if token is expired at `current_timestamp`.
    ///
    /// The expiry instant itself is already outside the validity window.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        current_timestamp >= self.exp
    }
}
