//! Session token issuing and validation.
//!
//! Sessions are HS256 JWTs signed with the service `SECRET_KEY`.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS256 is accepted
//! - Expiration and issued-at claims are validated with clock skew tolerance
//! - Generic error messages prevent information leakage

use common::jwt::{extract_alg, validate_iat, MemberClaims};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "nomnom_session";

/// Default session lifetime (12 hours).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("The session is invalid or expired")]
    Invalid,

    #[error("Failed to issue session: {0}")]
    Signing(String),
}

/// Issues session tokens once a member has logged in.
pub struct SessionSigner {
    key: EncodingKey,
    ttl: Duration,
}

impl SessionSigner {
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.expose_secret().as_bytes()),
            ttl,
        }
    }

    /// Sign a session for `member_id`, issued now.
    pub fn issue(&self, member_id: i64) -> Result<String, SessionError> {
        self.issue_at(member_id, chrono::Utc::now().timestamp())
    }

    /// Sign a session with an explicit issue time.
    pub fn issue_at(&self, member_id: i64, iat: i64) -> Result<String, SessionError> {
        let claims = MemberClaims::new(member_id, iat, self.ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }
}

/// Validates session tokens presented by members.
pub struct SessionValidator {
    key: DecodingKey,
    clock_skew: Duration,
}

impl SessionValidator {
    /// # Arguments
    ///
    /// * `secret` - The HS256 signing key
    /// * `clock_skew_seconds` - Clock skew tolerance for iat validation
    pub fn new(secret: &SecretString, clock_skew_seconds: i64) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            clock_skew: Duration::from_secs(clock_skew_seconds.unsigned_abs()),
        }
    }

    /// Validate a session token and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and header parse (via `common::jwt`)
    /// 2. Algorithm must be HS256
    /// 3. HMAC signature and `exp`
    /// 4. `iat` with clock skew tolerance
    /// 5. `sub` must name a member id
    #[instrument(skip_all, name = "nomnom.auth.session")]
    pub fn validate(&self, token: &str) -> Result<MemberClaims, SessionError> {
        let alg = extract_alg(token).map_err(|e| {
            tracing::debug!(target: "nomnom.auth.session", error = ?e, "Session header rejected");
            SessionError::Invalid
        })?;

        if alg != "HS256" {
            tracing::debug!(target: "nomnom.auth.session", alg = %alg, "Unexpected session algorithm");
            return Err(SessionError::Invalid);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let claims = decode::<MemberClaims>(token, &self.key, &validation)
            .map_err(|e| {
                tracing::debug!(target: "nomnom.auth.session", error = %e, "Session verification failed");
                SessionError::Invalid
            })?
            .claims;

        if let Err(e) = validate_iat(claims.iat, self.clock_skew) {
            tracing::debug!(target: "nomnom.auth.session", error = ?e, "Session iat validation failed");
            return Err(SessionError::Invalid);
        }

        if claims.member_id().is_none() {
            tracing::debug!(target: "nomnom.auth.session", "Session subject is not a member id");
            return Err(SessionError::Invalid);
        }

        Ok(claims)
    }
}
