use std::sync::Arc;

use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;

use super::claims::Claims;
use super::errors::JwtError;
use crate::clock::Clock;
use crate::clock::SystemClock;

/// HMAC algorithms accepted on verification.
const HMAC_FAMILY: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Symmetric key used to sign and verify tokens.
pub struct SigningKey {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Build a signing key from a shared secret.
    ///
    /// # Security Notes
    /// - The secret should be at least 256 bits (32 bytes) for HS256
    /// - Store secrets in environment variables or secure vaults, never in code
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

/// JWT token handler for issuing and verifying access tokens.
///
/// Signs with HS256 and only accepts tokens whose header names an HMAC
/// algorithm. Expiry is evaluated against the injected [`Clock`].
pub struct JwtHandler {
    key: SigningKey,
    algorithm: Algorithm,
    clock: Arc<dyn Clock>,
}

impl JwtHandler {
    /// Create a new JWT handler with a secret key and the system clock.
    ///
    /// # Arguments
    /// * `secret` - Secret key for signing tokens
    ///
    /// # Returns
    /// JwtHandler instance configured with HS256 algorithm
    pub fn new(secret: &[u8]) -> Self {
        Self::with_key(SigningKey::from_secret(secret), Arc::new(SystemClock))
    }

    /// Create a handler from an explicit key and clock.
    pub fn with_key(key: SigningKey, clock: Arc<dyn Clock>) -> Self {
        Self {
            key,
            algorithm: Algorithm::HS256,
            clock,
        }
    }

    /// Issue a token for a subject, valid for the fixed token lifetime.
    ///
    /// # Arguments
    /// * `subject` - Subject identifier
    /// * `role` - Subject role
    ///
    /// # Returns
    /// Signed JWT token string
    ///
    /// # Errors
    /// * `EncodingFailed` - Token signing failed
    pub fn issue(&self, subject: &str, role: &str) -> Result<String, JwtError> {
        let claims = Claims::for_subject(subject, role, self.clock.now());
        self.encode(&claims)
    }

    /// Encode claims into a JWT token.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token encoding failed
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm);

        encode(&header, claims, &self.key.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Decode and verify a JWT token.
    ///
    /// The signature is checked before expiry, so a forged token never
    /// reports `Expired`.
    ///
    /// # Arguments
    /// * `token` - JWT token string to verify
    ///
    /// # Returns
    /// Verified claims
    ///
    /// # Errors
    /// * `Malformed` - Token cannot be decoded or carries an unusable claim set
    /// * `BadSignature` - Signature does not verify, or a non-HMAC algorithm was used
    /// * `Expired` - Current time is at or past the `exp` claim
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.algorithms = HMAC_FAMILY.to_vec();
        // Expiry is checked below against our own clock, without leeway
        validation.validate_exp = false;

        let token_data =
            decode::<Claims>(token, &self.key.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        JwtError::BadSignature
                    }
                    _ => JwtError::Malformed(e.to_string()),
                }
            })?;

        let claims = token_data.claims;

        if !claims.authorized {
            return Err(JwtError::Malformed("token is not authorized".to_string()));
        }

        if claims.is_expired(self.clock.now().timestamp()) {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use chrono::Duration;

    use super::*;
    use crate::clock::FixedClock;

    const SECRET: &[u8] = b"my_secret_key_at_least_32_bytes_long!";

    // {"alg":"RS256","typ":"JWT"}
    const RS256_HEADER: &str = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9";
    // {"alg":"none","typ":"JWT"}
    const NONE_HEADER: &str = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";

    fn handler_at(timestamp: i64) -> (JwtHandler, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::at(
            DateTime::from_timestamp(timestamp, 0).unwrap(),
        ));
        let handler = JwtHandler::with_key(SigningKey::from_secret(SECRET), clock.clone());
        (handler, clock)
    }

    fn replace_header(token: &str, header: &str) -> String {
        let (_, rest) = token.split_once('.').unwrap();
        format!("{}.{}", header, rest)
    }

    #[test]
    fn test_issue_and_verify() {
        let (handler, _) = handler_at(1_700_000_000);

        let token = handler.issue("user123", "admin").expect("Failed to issue token");
        assert!(!token.is_empty());

        let claims = handler.verify(&token).expect("Failed to verify token");
        assert_eq!(claims.id, "user123");
        assert_eq!(claims.role, "admin");
        assert!(claims.authorized);
    }

    #[test]
    fn test_verify_expiry_boundary() {
        let (handler, clock) = handler_at(1_700_000_000);
        let token = handler.issue("user123", "standard").unwrap();

        clock.advance(Duration::minutes(30) - Duration::seconds(1));
        assert!(handler.verify(&token).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(handler.verify(&token), Err(JwtError::Expired));
    }

    #[test]
    fn test_verify_tampered_signature() {
        let (handler, _) = handler_at(1_700_000_000);
        let token = handler.issue("user123", "standard").unwrap();

        let signature_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.into_bytes();
        bytes[signature_start] = if bytes[signature_start] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert_eq!(handler.verify(&tampered), Err(JwtError::BadSignature));
    }

    #[test]
    fn test_verify_with_wrong_secret() {
        let (handler, clock) = handler_at(1_700_000_000);
        let other = JwtHandler::with_key(
            SigningKey::from_secret(b"secret2_at_least_32_bytes_long_key!"),
            clock,
        );

        let token = other.issue("user123", "admin").unwrap();
        assert_eq!(handler.verify(&token), Err(JwtError::BadSignature));
    }

    #[test]
    fn test_verify_rejects_foreign_algorithm() {
        let (handler, _) = handler_at(1_700_000_000);
        let token = handler.issue("user123", "admin").unwrap();

        let forged = replace_header(&token, RS256_HEADER);
        assert_eq!(handler.verify(&forged), Err(JwtError::BadSignature));
    }

    #[test]
    fn test_verify_rejects_none_algorithm() {
        let (handler, _) = handler_at(1_700_000_000);
        let token = handler.issue("user123", "admin").unwrap();

        let forged = replace_header(&token, NONE_HEADER);
        assert!(matches!(handler.verify(&forged), Err(JwtError::Malformed(_))));
    }

    #[test]
    fn test_verify_garbage() {
        let (handler, _) = handler_at(1_700_000_000);

        assert!(matches!(
            handler.verify("invalid.token.here"),
            Err(JwtError::Malformed(_))
        ));
        assert!(matches!(handler.verify(""), Err(JwtError::Malformed(_))));
    }

    #[test]
    fn test_verify_unauthorized_flag() {
        let (handler, _) = handler_at(1_700_000_000);
        let claims = Claims {
            authorized: false,
            id: "user123".to_string(),
            role: "standard".to_string(),
            exp: 1_700_001_800,
        };

        let token = handler.encode(&claims).unwrap();
        assert!(matches!(handler.verify(&token), Err(JwtError::Malformed(_))));
    }

    #[test]
    fn test_signature_checked_before_expiry() {
        let (handler, clock) = handler_at(1_700_000_000);
        let other = JwtHandler::with_key(
            SigningKey::from_secret(b"secret2_at_least_32_bytes_long_key!"),
            clock.clone(),
        );
        let token = other.issue("user123", "standard").unwrap();

        clock.advance(Duration::hours(1));
        assert_eq!(handler.verify(&token), Err(JwtError::BadSignature));
    }
}
