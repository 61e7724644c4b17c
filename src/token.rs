use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, models::Identity};

/// Lifetime of every issued access token.
pub const TOKEN_TTL_SECONDS: i64 = 60 * 60;

/// Claims
///
/// Payload carried inside an access token: the caller's identity plus the
/// standard issued-at and expiry timestamps.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The email the bearer is authenticated as.
    pub email: String,
    /// Expiration Time (exp): tokens are rejected once this has passed.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// TokenCodec
///
/// Signs and verifies HS256 access tokens with the process-wide secret.
/// There is no revocation list; expiry is the only way a token stops working.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(TOKEN_TTL_SECONDS),
        }
    }

    /// Overrides the token lifetime. A negative value issues already-expired tokens.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// issue
    ///
    /// Produces a signed token for `identity` expiring one TTL from now.
    pub fn issue(&self, identity: &Identity) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            email: identity.email.clone(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp().max(0) as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    /// verify
    ///
    /// Returns the identity embedded in `token`. Bad signatures, malformed
    /// input and elapsed expiry all collapse to `ApiError::Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(Identity {
                email: data.claims.email,
            }),
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                    kind => tracing::debug!(?kind, "rejected invalid token"),
                }
                Err(ApiError::Unauthorized)
            }
        }
    }
}
