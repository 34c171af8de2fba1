use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ulid::Ulid;

use super::response::ApiError;
use super::AppState;
use crate::guard::Caller;
use crate::model::Role;

/// Claims of the bearer token minted by the external auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Ulid,
    pub role: Role,
    /// Company id.
    pub company: Ulid,
    pub exp: i64,
}

/// HS256 verifier for bearer tokens.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Caller, jsonwebtoken::errors::Error> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)?.claims;
        Ok(Caller {
            user_id: claims.sub,
            role: claims.role,
            company_id: claims.company,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized("missing bearer token"))?;
        state.verifier.verify(token).map_err(|e| {
            debug!("token rejected: {e}");
            metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
            ApiError::Unauthorized("invalid token")
        })
    }
}
