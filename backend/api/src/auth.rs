//! Session tokens for admins and the bearer-auth middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::AppState;
use crate::errors::{AppError, Result};

/// Tokens are valid for 24 hours after issuance.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Identity carried inside a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    identity: AdminIdentity,
    iat: i64,
    exp: i64,
}

/// Signs and verifies HS256 session tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, identity: &AdminIdentity) -> Result<String> {
        let iat = Utc::now();
        let exp = iat + Duration::hours(TOKEN_TTL_HOURS);
        self.sign(identity, iat.timestamp(), exp.timestamp())
    }

    fn sign(&self, identity: &AdminIdentity, iat: i64, exp: i64) -> Result<String> {
        let claims = Claims {
            identity: identity.clone(),
            iat,
            exp,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Decode `token`, failing with [`AppError::Unauthorized`] for anything
    /// malformed, expired or signed with another secret.
    pub fn verify(&self, token: &str) -> Result<AdminIdentity> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.identity)
            .map_err(|e| {
                debug!("Rejected session token: {e}");
                AppError::Unauthorized("Token is not valid".to_string())
            })
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Route layer for admin endpoints. Verified identities are attached to the
/// request extensions as [`AdminIdentity`].
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(token) = bearer_token(header) else {
        return AppError::Unauthorized("No token, authorization denied".to_string())
            .into_response();
    };

    match state.tokens.verify(token) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> AdminIdentity {
        AdminIdentity {
            id: "a1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn issued_token_round_trips_identity() {
        let issuer = TokenIssuer::new("secret");
        let token = issuer.issue(&identity()).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), identity());
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = TokenIssuer::new("secret").issue(&identity()).unwrap();
        let err = TokenIssuer::new("other").verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let issuer = TokenIssuer::new("secret");
        let now = Utc::now().timestamp();
        let token = issuer
            .sign(&identity(), now - 2 * 86_400, now - 86_400)
            .unwrap();
        assert!(matches!(
            issuer.verify(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn garbage_token_is_unauthorized() {
        let issuer = TokenIssuer::new("secret");
        assert!(matches!(
            issuer.verify("not.a.jwt"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(None), None);
    }
}
