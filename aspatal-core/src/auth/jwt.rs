//! Stateless session tokens: HS256 JWTs carrying subject email, role and expiry

use crate::auth::Role;
use crate::error::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Issuer claim stamped on and required from every token.
pub const TOKEN_ISSUER: &str = "aspatal";

/// Minimum HMAC key length accepted at startup.
pub const MIN_SECRET_LEN: usize = 32;

/// Issues and validates session tokens.
///
/// The signing key is fixed for the lifetime of the codec; validation never
/// consults persistent state, so there is no server-side revocation.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    algorithm: Algorithm,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject (account email)
    sub: String,
    /// Account role
    role: String,
    /// Issued at (timestamp)
    iat: i64,
    /// Expiration time (timestamp)
    exp: i64,
    /// Issuer
    iss: String,
}

/// Identity asserted by a valid token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Freshly minted token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenCodec {
    /// Create a codec with an HS256 secret and a fixed token lifetime.
    pub fn new(secret: &[u8], ttl: Duration) -> AuthResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::InvalidInput(format!(
                "token signing secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if ttl <= Duration::zero() {
            return Err(AuthError::InvalidInput(
                "token lifetime must be positive".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
            algorithm: Algorithm::HS256,
        })
    }

    /// Issue a token for `email` with `role`, valid for the codec TTL.
    pub fn issue(&self, email: &str, role: Role) -> AuthResult<IssuedToken> {
        self.issue_at(email, role, Utc::now())
    }

    pub fn issue_at(&self, email: &str, role: Role, now: DateTime<Utc>) -> AuthResult<IssuedToken> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: email.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {}", e)))?;

        tracing::debug!(email, role = %role, %expires_at, "issued session token");
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, structure and expiry.
    pub fn validate(&self, token: &str) -> AuthResult<SessionClaims> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<SessionClaims> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked below against `now`, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);
        validation.set_issuer(&[TOKEN_ISSUER]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::invalid_token(format!("{:?}", e.kind())))?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::invalid_token("expired"));
        }

        let role: Role = claims
            .role
            .parse()
            .map_err(|_| AuthError::invalid_token("unknown role claim"))?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0)
            .ok_or_else(|| AuthError::invalid_token("invalid iat"))?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::invalid_token("invalid exp"))?;

        Ok(SessionClaims {
            email: claims.sub,
            role,
            issued_at,
            expires_at,
        })
    }
}
