//! Token pair issuing and verification.
//!
//! Double-token strategy: a short-lived access token (sent in the response
//! body, held by the client) and a long-lived refresh token (transported
//! only via an httpOnly cookie). Each kind is signed with its own secret,
//! so one never verifies as the other.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    /// User email
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Claims carried by a refresh token. Deliberately minimal: the user id
/// is all a refresh needs, and the cookie never reaches client script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signing/verification keys plus configured lifetimes.
#[derive(Clone)]
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Signature valid but the token is past its expiry.
    Expired,
    /// Bad signature, malformed token, or wrong token kind.
    Invalid,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Expired => write!(f, "token expired"),
            TokenError::Invalid => write!(f, "invalid token"),
        }
    }
}

impl std::error::Error for TokenError {}

impl TokenKeys {
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl_secs: u64,
        refresh_ttl_secs: u64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    /// Mint a new access/refresh pair for a user. Called on register,
    /// login, and every successful refresh (rotation).
    pub fn issue_pair(&self, user_id: &str, email: &str) -> Result<TokenPair, TokenError> {
        let now = unix_now()?;

        let access_claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.access_ttl_secs,
        };
        let refresh_claims = RefreshClaims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.refresh_ttl_secs,
        };

        let access_token =
            jsonwebtoken::encode(&Header::default(), &access_claims, &self.access_encoding)
                .map_err(|_| TokenError::Invalid)?;
        let refresh_token =
            jsonwebtoken::encode(&Header::default(), &refresh_claims, &self.refresh_encoding)
                .map_err(|_| TokenError::Invalid)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<AccessClaims>(token, &self.access_decoding, &validation)
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<RefreshClaims>(token, &self.refresh_decoding, &validation)
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    }
}

fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> TokenKeys {
        TokenKeys::new(
            b"access-secret-for-testing-only-0000",
            b"refresh-secret-for-testing-only-00",
            15 * 60,
            7 * 24 * 60 * 60,
        )
    }

    #[test]
    fn issue_and_verify_pair() {
        let keys = test_keys();
        let pair = keys.issue_pair("user-1", "a@x.com").unwrap();

        let access = keys.verify_access(&pair.access_token).unwrap();
        assert_eq!(access.sub, "user-1");
        assert_eq!(access.email, "a@x.com");
        assert!(access.exp > access.iat);

        let refresh = keys.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(refresh.sub, "user-1");
    }

    #[test]
    fn cross_kind_verification_rejected() {
        let keys = test_keys();
        let pair = keys.issue_pair("user-1", "a@x.com").unwrap();

        // Distinct secrets: an access token never verifies as a refresh
        // token and vice versa.
        assert_eq!(
            keys.verify_refresh(&pair.access_token),
            Err(TokenError::Invalid)
        );
        assert_eq!(
            keys.verify_access(&pair.refresh_token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn wrong_secret_rejected() {
        let keys = test_keys();
        let other = TokenKeys::new(
            b"completely-different-access-secret",
            b"completely-different-refresh-secre",
            15 * 60,
            7 * 24 * 60 * 60,
        );

        let pair = keys.issue_pair("user-1", "a@x.com").unwrap();
        assert_eq!(
            other.verify_access(&pair.access_token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn expired_token_reported_as_expired() {
        let secret = b"access-secret-for-testing-only-0000";
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = AccessClaims {
            sub: "user-1".to_string(),
            email: "a@x.com".to_string(),
            iat: now - 100,
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let keys = TokenKeys::new(secret, b"refresh-secret-for-testing-only-00", 900, 900);
        assert_eq!(keys.verify_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_token_rejected() {
        let keys = test_keys();
        assert_eq!(
            keys.verify_access("not-a-token"),
            Err(TokenError::Invalid)
        );
    }
}
