//! Bearer token issuing and verification.
//!
//! Tokens are HS256 JWTs carrying the user id in `sub` and the role in
//! `role`. Identity management lives elsewhere; this service only answers
//! "who is calling" for a presented token.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cartwheel_core::{Role, UserId};

use crate::config::AuthConfig;
use crate::models::CurrentUser;

/// Claims stored in a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

/// Authentication and authorization failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    ExpiredToken,

    #[error("admin role required")]
    Forbidden,

    #[error("token generation failed: {0}")]
    Generation(String),
}

/// Issues and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in: Duration,
    issuer: String,
}

impl TokenService {
    /// Build the service from auth configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expires_in: Duration::minutes(config.expires_in_minutes),
            issuer: config.issuer.clone(),
        }
    }

    /// Issue a token for `user` with the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Generation` if signing fails.
    pub fn issue(&self, user: CurrentUser) -> Result<String, AuthError> {
        self.issue_with_lifetime(user, self.expires_in)
    }

    /// Issue a token for `user` that expires `lifetime` from now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Generation` if signing fails.
    pub fn issue_with_lifetime(
        &self,
        user: CurrentUser,
        lifetime: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Generation(e.to_string()))
    }

    /// Verify `token` and return the caller it identifies.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ExpiredToken` for expired tokens and
    /// `AuthError::InvalidToken` for anything else that fails validation.
    pub fn verify(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let id = data
            .claims
            .sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| AuthError::InvalidToken("subject is not a user id".to_string()))?;

        Ok(CurrentUser {
            id,
            role: data.claims.role,
        })
    }

    /// Extract the token from an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedHeader` unless the value is `Bearer <token>`.
    pub fn token_from_header(header: &str) -> Result<&str, AuthError> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MalformedHeader)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::from(secret),
            expires_in_minutes: 60,
            issuer: "cartwheel".to_string(),
        }
    }

    fn service() -> TokenService {
        TokenService::new(&config("kT9#vQ2!mZ7@pL4$wX8^rB1&nC6*yH3%"))
    }

    #[test]
    fn test_issue_then_verify() {
        let service = service();
        let user = CurrentUser {
            id: UserId::new(42),
            role: Role::Admin,
        };
        let token = service.issue(user).unwrap();
        assert_eq!(service.verify(&token).unwrap(), user);
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = service();
        let user = CurrentUser {
            id: UserId::new(1),
            role: Role::Customer,
        };
        let token = service
            .issue_with_lifetime(user, Duration::minutes(-10))
            .unwrap();
        assert!(matches!(service.verify(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let other = TokenService::new(&config("Zq8!Lm3@Vx6#Tn1$Rb5%Hk9^Wc2&Jd7*"));
        let token = other
            .issue(CurrentUser {
                id: UserId::new(1),
                role: Role::Admin,
            })
            .unwrap();
        assert!(matches!(
            service().verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            service().verify("not-a-jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_token_from_header() {
        assert_eq!(TokenService::token_from_header("Bearer abc").unwrap(), "abc");
        assert!(matches!(
            TokenService::token_from_header("Basic abc"),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            TokenService::token_from_header("Bearer "),
            Err(AuthError::MalformedHeader)
        ));
    }
}
