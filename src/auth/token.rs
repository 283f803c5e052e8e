//! Session tokens
//!
//! Stateless JWTs signed with a symmetric secret. Nothing is stored
//! server-side; a token is valid until its `exp` claim passes.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::AuthConfig;
use crate::data::Role;
use crate::error::AppError;

/// Wire format of the token payload
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Decoded identity carried by a valid session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub role: Role,
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl TokenService {
    /// # Errors
    /// Returns a config error for non-HMAC algorithms or a non-positive TTL
    pub fn new(secret: &str, algorithm: &str, ttl: Duration) -> Result<Self, AppError> {
        let algorithm = Algorithm::from_str(algorithm)
            .map_err(|_| AppError::Config(format!("unknown JWT algorithm: {algorithm}")))?;
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AppError::Config(
                "session tokens require an HMAC algorithm".to_string(),
            ));
        }
        if ttl <= Duration::zero() {
            return Err(AppError::Config(
                "session token lifetime must be positive".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            ttl,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        Self::new(
            &config.secret_key,
            &config.algorithm,
            Duration::minutes(config.access_token_expire_minutes),
        )
    }

    /// Issue a token for an account, expiring one TTL from now
    pub fn issue(&self, account_id: &str, role: Role) -> Result<String, AppError> {
        self.issue_at(account_id, role, Utc::now())
    }

    fn issue_at(
        &self,
        account_id: &str,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = TokenClaims {
            sub: account_id.to_string(),
            role: role.as_str().to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign session token: {e}")))
    }

    /// Verify signature, algorithm, required claims and expiry
    ///
    /// Every failure is `None`; callers cannot tell bad from expired.
    pub fn validate(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).ok()?;
        let role = data.claims.role.parse::<Role>().ok()?;
        if data.claims.sub.is_empty() {
            return None;
        }

        Some(Claims {
            sub: data.claims.sub,
            role,
        })
    }
}
