// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token issuance and verification.
//!
//! Tokens are self-issued HS256 JWTs signed with the configured secret.
//! Verification checks signature and expiry only; there is no issuer or
//! audience, and revocation is out of scope (tokens simply expire).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::claims::{AuthenticatedUser, Claims};
use super::error::AuthError;
use super::roles::Role;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Issues and verifies the API's access tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &str, lifetime_hours: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        // Self-issued tokens carry no audience
        validation.validate_aud = false;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime: Duration::hours(lifetime_hours),
        }
    }

    /// Issue a token for `user_id`, expiring after the configured lifetime.
    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, AuthError> {
        let claims = Claims::new(user_id, role, Utc::now(), self.lifetime);
        encode(&Header::default(), &claims, &self.encoding).map_err(|_| AuthError::TokenCreation)
    }

    /// Verify signature and expiry, then resolve the caller identity.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;
        AuthenticatedUser::from_claims(&data.claims).ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", 1)
    }

    #[test]
    fn issued_token_verifies_round_trip() {
        let tokens = service();
        let user_id = Uuid::new_v4();

        let token = tokens.issue(user_id, Role::User).unwrap();
        let user = tokens.verify(&token).unwrap();

        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let token = service().issue(Uuid::new_v4(), Role::User).unwrap();
        let other = TokenService::new("other-secret", 1);

        assert!(matches!(
            other.verify(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(matches!(
            service().verify("not.a.jwt"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn verify_rejects_expired_token() {
        let tokens = service();
        // Issued well past the leeway window
        let claims = Claims::new(
            Uuid::new_v4(),
            Role::User,
            Utc::now() - Duration::hours(2),
            Duration::hours(1),
        );
        let token = encode(&Header::default(), &claims, &tokens.encoding).unwrap();

        assert!(matches!(
            tokens.verify(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn verify_rejects_non_uuid_subject() {
        let tokens = service();
        let claims = Claims {
            sub: "user_123".to_string(),
            role: Role::User,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &tokens.encoding).unwrap();

        assert!(matches!(
            tokens.verify(&token),
            Err(AuthError::InvalidToken)
        ));
    }
}
