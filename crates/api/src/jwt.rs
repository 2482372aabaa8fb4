//! HS256 token issuing and verification on top of `jsonwebtoken`.
//!
//! The auth crate owns the claims model and the time-window checks; this
//! module only does the signing-key work and the serde bridge to the
//! compact JWT wire shape (unix-second `iat`/`exp`).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use merchstore_auth::{JwtClaims, JwtValidator, PrincipalId, Role, TokenValidationError};

/// Lifetime of an issued admin token.
pub const TOKEN_TTL_HOURS: i64 = 12;

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    username: String,
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

/// Build claims for a fresh login.
pub fn claims_for(
    principal_id: PrincipalId,
    username: impl Into<String>,
    roles: Vec<Role>,
    now: DateTime<Utc>,
) -> JwtClaims {
    JwtClaims {
        sub: principal_id,
        username: username.into(),
        roles,
        issued_at: now,
        expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
    }
}

/// Sign claims into a compact HS256 token.
pub fn issue_token(secret: &[u8], claims: &JwtClaims) -> Result<String, jsonwebtoken::errors::Error> {
    let wire = WireClaims {
        sub: claims.sub.to_string(),
        username: claims.username.clone(),
        roles: claims.roles.iter().map(|r| r.as_str().to_string()).collect(),
        iat: claims.issued_at.timestamp(),
        exp: claims.expires_at.timestamp(),
    };
    jsonwebtoken::encode(&Header::default(), &wire, &EncodingKey::from_secret(secret))
}

/// HS256 verifier over a shared secret.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks run against the caller-supplied `now` in
        // `validate_claims`, not against the library clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<WireClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    TokenValidationError::BadSignature
                }
                _ => TokenValidationError::Malformed,
            })?;

        let wire = data.claims;
        let sub: PrincipalId = wire.sub.parse().map_err(|_| TokenValidationError::Malformed)?;
        let issued_at =
            DateTime::from_timestamp(wire.iat, 0).ok_or(TokenValidationError::Malformed)?;
        let expires_at =
            DateTime::from_timestamp(wire.exp, 0).ok_or(TokenValidationError::Malformed)?;

        let claims = JwtClaims {
            sub,
            username: wire.username,
            roles: wire.roles.into_iter().map(Role::new).collect(),
            issued_at,
            expires_at,
        };
        merchstore_auth::validate_claims(&claims, now)?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn fresh_claims(now: DateTime<Utc>) -> JwtClaims {
        claims_for(PrincipalId::new(), "admin", vec![Role::ADMIN], now)
    }

    #[test]
    fn issued_token_round_trips() {
        let now = Utc::now();
        let claims = fresh_claims(now);
        let token = issue_token(SECRET, &claims).unwrap();

        let validator = Hs256JwtValidator::new(SECRET);
        let decoded = validator.validate(&token, now).unwrap();

        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.username, "admin");
        assert_eq!(decoded.roles, vec![Role::ADMIN]);
    }

    #[test]
    fn wrong_secret_fails_signature_check() {
        let now = Utc::now();
        let token = issue_token(SECRET, &fresh_claims(now)).unwrap();

        let validator = Hs256JwtValidator::new("other-secret");
        assert_eq!(
            validator.validate(&token, now),
            Err(TokenValidationError::BadSignature)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - Duration::hours(TOKEN_TTL_HOURS + 1);
        let token = issue_token(SECRET, &fresh_claims(issued)).unwrap();

        let validator = Hs256JwtValidator::new(SECRET);
        assert_eq!(
            validator.validate(&token, Utc::now()),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let validator = Hs256JwtValidator::new(SECRET);
        assert_eq!(
            validator.validate("not-a-token", Utc::now()),
            Err(TokenValidationError::Malformed)
        );
    }
}
