use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult, AppState};

pub const TOKEN_HEADER: &str = "x-auth-token";

/// A verified (id, username) pair. The chat core never creates these
/// itself; they only come out of [`Verifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    user: Identity,
    iat: i64,
    exp: i64,
}

/// Stateless HS256 token verifier. Malformed and expired tokens are
/// rejected uniformly as `Unauthenticated`; the caller learns nothing
/// about which check failed.
#[derive(Clone)]
pub struct Verifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Verifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn verify(&self, token: &str) -> AppResult<Identity> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AppError::Unauthenticated)?;
        Ok(data.claims.user)
    }

    /// Mints a token for `identity`. Credential issuance lives outside the
    /// chat core; this exists for that layer and for tests.
    pub fn issue(&self, identity: &Identity, ttl: time::Duration) -> AppResult<String> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            user: identity.clone(),
            iat: now,
            exp: now + ttl.whole_seconds(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;
        state.verifier.verify(token)
    }
}
