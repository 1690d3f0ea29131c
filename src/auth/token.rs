//! Session token and its expiry metadata.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Registered claims read from a session JWT.
///
/// Only the timing claims matter to the client; the signature is the
/// server's business and is not verified here.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TokenClaims {
    pub sub: Option<String>, // User ID (Subject)
    pub iat: Option<i64>,    // Issued at (UNIX timestamp)
    pub exp: Option<i64>,    // Expiration time (UNIX timestamp)
}

impl TokenClaims {
    /// Read the claims of a JWT without verifying its signature.
    ///
    /// Returns `None` when the token is not a JWT.
    #[must_use]
    pub fn inspect(token: &str) -> Option<Self> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims)
    }
}

/// The credential held in the process-wide token slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    /// Opaque bearer token as issued by the server.
    pub token: String,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    /// Wrap a freshly received token.
    ///
    /// JWT `iat`/`exp` claims are used when present. Otherwise the token is
    /// treated as issued at `now` and valid for `fallback_lifetime`.
    #[must_use]
    pub fn issue(token: impl Into<String>, now: DateTime<Utc>, fallback_lifetime: Duration) -> Self {
        let token = token.into();
        let claims = TokenClaims::inspect(&token).unwrap_or_default();

        let issued_at = claims
            .iat
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or(now);
        let expires_at = claims
            .exp
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| {
                issued_at
                    .checked_add_signed(to_delta(fallback_lifetime))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            });

        Self {
            token,
            issued_at,
            expires_at,
        }
    }

    /// Whether the token expires within `window` of `now`.
    #[must_use]
    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= to_delta(window)
    }

    /// Whether the token has already expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn jwt(iat: i64, exp: i64) -> String {
        let claims = TokenClaims {
            sub: Some("admin@example.com".to_string()),
            iat: Some(iat),
            exp: Some(exp),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_reads_jwt_claims() {
        let now = Utc::now();
        let token = jwt(1_700_000_000, 1_700_003_600);

        let stored = StoredToken::issue(token.clone(), now, Duration::from_secs(60));

        assert_eq!(stored.token, token);
        assert_eq!(stored.issued_at.timestamp(), 1_700_000_000);
        assert_eq!(stored.expires_at.timestamp(), 1_700_003_600);
    }

    #[test]
    fn test_issue_opaque_token_uses_fallback_lifetime() {
        let now = Utc::now();
        let stored = StoredToken::issue("not-a-jwt", now, Duration::from_secs(3600));

        assert_eq!(stored.issued_at, now);
        assert_eq!(stored.expires_at, now + TimeDelta::seconds(3600));
    }

    #[test]
    fn test_issue_with_huge_lifetime_saturates() {
        let now = Utc::now();
        let stored = StoredToken::issue("opaque", now, Duration::from_secs(10_000_000_000_000));

        assert_eq!(stored.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!stored.expires_within(Duration::from_secs(600), now));
        assert!(!stored.is_expired(now));
    }

    #[test]
    fn test_expires_within_window() {
        let now = Utc::now();
        let stored = StoredToken::issue("opaque", now, Duration::from_secs(300));

        assert!(stored.expires_within(Duration::from_secs(600), now));
        assert!(stored.expires_within(Duration::from_secs(300), now));
        assert!(!stored.expires_within(Duration::from_secs(120), now));
        assert!(!stored.is_expired(now));
        assert!(stored.is_expired(now + TimeDelta::seconds(301)));
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        assert!(TokenClaims::inspect("abc.def").is_none());
        assert!(TokenClaims::inspect("").is_none());
    }
}
