//! Session token utilities shared across NomNom components.
//!
//! Members reach the service with a session token minted once the OAuth
//! login pipeline has resolved them to a member profile. This module holds
//! the pieces of token handling that do not depend on the signing key:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Algorithm extraction from the token header
//! - iat validation logic
//! - The member claims structure
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Generic error messages prevent information leakage
//! - The `sub` field in `MemberClaims` is redacted in Debug output

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed session token size in bytes (8KB).
///
/// Tokens larger than this are rejected before any base64 decoding or
/// signature work. A member session token is well under 300 bytes.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance for the `iat` claim (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum configurable clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during session token validation.
///
/// All variants share one generic message; details go to debug logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The session token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The session token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The session token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Claims Types
// =============================================================================

/// Claims carried by a member session token.
///
/// `sub` is the member profile id. It is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct MemberClaims {
    /// Subject (member profile id) - redacted in Debug output.
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,
}

impl fmt::Debug for MemberClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberClaims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}

impl MemberClaims {
    /// Build claims for a member, issued at `iat` and valid for `ttl`.
    #[must_use]
    pub fn new(member_id: i64, iat: i64, ttl: Duration) -> Self {
        // ttl comes from configuration in seconds and stays far below i64::MAX
        #[allow(clippy::cast_possible_wrap)]
        let ttl_secs = ttl.as_secs() as i64;
        Self {
            sub: member_id.to_string(),
            exp: iat.saturating_add(ttl_secs),
            iat,
        }
    }

    /// The member profile id, if `sub` holds one.
    #[must_use]
    pub fn member_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the `alg` header value without verifying the signature.
///
/// Lets the validator refuse tokens signed with an unexpected algorithm
/// before doing any cryptographic work.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON or no `alg`
pub fn extract_alg(token: &str) -> Result<String, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    header
        .get("alg")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MalformedToken)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat` is more than
/// `clock_skew` ahead of the current time.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // clock_skew is bounded to MAX_CLOCK_SKEW
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_is_5_minutes() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
    }

    // -------------------------------------------------------------------------
    // extract_alg Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_alg_valid_token() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let token = format!("{header_b64}.payload.signature");

        assert_eq!(extract_alg(&token).unwrap(), "HS256");
    }

    #[test]
    fn test_extract_alg_missing_alg() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"typ":"JWT"}"#);
        let token = format!("{header_b64}.payload.signature");

        assert!(matches!(
            extract_alg(&token),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_extract_alg_wrong_part_count() {
        assert!(matches!(
            extract_alg("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            extract_alg("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            extract_alg(""),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_extract_alg_invalid_base64() {
        assert!(matches!(
            extract_alg("!!!invalid!!!.payload.signature"),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_extract_alg_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert!(matches!(
            extract_alg(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        ));
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_time() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        assert!(matches!(
            validate_iat(far_future, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::IatTooFarInFuture)
        ));
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert!(matches!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        ));
    }

    // -------------------------------------------------------------------------
    // MemberClaims Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_member_claims_debug_redacts_sub() {
        let claims = MemberClaims::new(4242, 1_700_000_000, Duration::from_secs(60));
        let debug_str = format!("{claims:?}");

        assert!(!debug_str.contains("4242"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_member_claims_new_sets_expiry() {
        let claims = MemberClaims::new(7, 1_700_000_000, Duration::from_secs(3600));

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_003_600);
    }

    #[test]
    fn test_member_id_parses_numeric_sub() {
        let claims = MemberClaims::new(99, 0, Duration::from_secs(1));
        assert_eq!(claims.member_id(), Some(99));

        let claims = MemberClaims {
            sub: "not-a-member".to_string(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(claims.member_id(), None);
    }
}
