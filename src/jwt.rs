use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, Validation};

use crate::app::AppState;
use crate::errors::AppError;
use crate::models::user::Identity;

/// Verifies identity claims issued elsewhere. Tokens are never minted here.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.trim().is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
        })
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub hierarchy: String,
    pub exp: usize,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity::new(claims.sub, claims.name, claims.hierarchy)
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let claims = state.jwt.decode(token)?;
        if claims.sub.trim().is_empty() {
            return Err(AppError::unauthorized("identity claim has no subject"));
        }

        Ok(AuthUser {
            identity: claims.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    fn config() -> JwtConfig {
        JwtConfig {
            secret: Arc::new(b"unit-secret".to_vec()),
        }
    }

    fn token(secret: &[u8], exp: usize) -> String {
        let claims = Claims {
            sub: "u1".to_string(),
            name: "Ada".to_string(),
            hierarchy: "org/a".to_string(),
            exp,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn decodes_identity_claims() {
        let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        let identity: Identity = config().decode(&token(b"unit-secret", exp)).unwrap().into();
        assert_eq!(identity, Identity::new("u1", "Ada", "org/a"));
    }

    #[test]
    fn rejects_foreign_signature_and_expired_tokens() {
        let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        assert!(matches!(config().decode(&token(b"other", exp)), Err(AppError::Token(_))));

        let expired = (chrono::Utc::now().timestamp() - 3600) as usize;
        assert!(matches!(config().decode(&token(b"unit-secret", expired)), Err(AppError::Token(_))));
    }
}
