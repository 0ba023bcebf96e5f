//! # Session Authentication
//!
//! Resolves the signed-in user from the session service's bearer credential,
//! presented either as `Authorization: Bearer <jwt>` or in the session cookie.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{
        HeaderMap,
        header::AUTHORIZATION,
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ApiError, unauthorized};

/// The user a request was authenticated as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Why a session credential was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no session credential presented")]
    Missing,
    #[error("session credential is invalid")]
    Invalid,
    #[error("session credential has expired")]
    Expired,
}

/// Validates the session service's bearer credential
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// Claims issued by the session service
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// HS256 session-token verification
pub struct JwtSessionValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtSessionValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl std::fmt::Debug for JwtSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionValidator")
            .field("algorithm", &"HS256")
            .finish()
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation).map_err(|err| {
            match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            }
        })?;

        let user_id = data.claims.sub.trim();
        if user_id.is_empty() {
            return Err(AuthError::Invalid);
        }
        Ok(AuthenticatedUser {
            user_id: user_id.to_string(),
        })
    }
}

/// Session validator plus the cookie name it reads from
#[derive(Clone)]
pub struct SessionAuth {
    pub validator: Arc<dyn SessionValidator>,
    pub cookie_name: String,
}

impl SessionAuth {
    pub fn new(validator: Arc<dyn SessionValidator>, cookie_name: impl Into<String>) -> Self {
        Self {
            validator,
            cookie_name: cookie_name.into(),
        }
    }

    /// Authenticate from request headers
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AuthError> {
        let token = session_token(headers, &self.cookie_name).ok_or(AuthError::Missing)?;
        self.validator.validate(&token).await
    }
}

impl std::fmt::Debug for SessionAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuth")
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

/// Bearer header wins over the cookie when both are present
fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(header) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = header.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value_trimmed().to_string())
        .filter(|value| !value.is_empty())
}

/// Middleware that rejects unauthenticated requests and stores the user in extensions
pub async fn session_auth_middleware(
    State(auth): State<SessionAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match auth.authenticate(request.headers()).await {
        Ok(user) => {
            tracing::debug!(user_id = %user.user_id, "Authenticated session");
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(err) => {
            tracing::info!(reason = %err, "Rejected unauthenticated request");
            Err(unauthorized(Some("Authentication required")))
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    SessionAuth: FromRef<S>,
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        let auth = SessionAuth::from_ref(state);
        auth.authenticate(&parts.headers)
            .await
            .map_err(|_| unauthorized(Some("Authentication required")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, http::header::COOKIE, routing::get};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;

    const SECRET: &str = "test-session-secret-with-32-bytes!!";

    fn mint(sub: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        encode(
            &Header::new(Algorithm::HS256),
            &SessionClaims {
                sub: sub.to_string(),
                exp: now + exp_offset,
                iat: Some(now),
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn auth() -> SessionAuth {
        SessionAuth::new(Arc::new(JwtSessionValidator::new(SECRET)), "session")
    }

    #[tokio::test]
    async fn validates_signed_token() {
        let user = JwtSessionValidator::new(SECRET)
            .validate(&mint("user-1", 300))
            .await
            .unwrap();
        assert_eq!(user.user_id, "user-1");
    }

    #[tokio::test]
    async fn rejects_expired_and_foreign_tokens() {
        let validator = JwtSessionValidator::new(SECRET);
        assert_eq!(
            validator.validate(&mint("user-1", -60)).await,
            Err(AuthError::Expired)
        );

        let other = JwtSessionValidator::new("another-secret-that-is-long-enough!!");
        assert_eq!(
            other.validate(&mint("user-1", 300)).await,
            Err(AuthError::Invalid)
        );
        assert_eq!(validator.validate("garbage").await, Err(AuthError::Invalid));
    }

    #[test]
    fn reads_bearer_before_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "theme=dark; session=from-cookie".parse().unwrap());
        assert_eq!(
            session_token(&headers, "session").as_deref(),
            Some("from-cookie")
        );

        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(
            session_token(&headers, "session").as_deref(),
            Some("from-header")
        );
        assert_eq!(session_token(&HeaderMap::new(), "session"), None);
    }

    #[test]
    fn cookie_values_are_decoded_and_unquoted() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "session=abc%3Ddef; theme=dark".parse().unwrap());
        assert_eq!(session_token(&headers, "session").as_deref(), Some("abc=def"));

        headers.insert(COOKIE, "theme=dark; session=\"quoted-token\"".parse().unwrap());
        assert_eq!(
            session_token(&headers, "session").as_deref(),
            Some("quoted-token")
        );

        headers.insert(COOKIE, "sessionx=other; session=".parse().unwrap());
        assert_eq!(session_token(&headers, "session"), None);
    }

    #[tokio::test]
    async fn middleware_rejects_missing_session() {
        let app = Router::new()
            .route(
                "/me",
                get(|user: AuthenticatedUser| async move { user.user_id }),
            )
            .layer(axum::middleware::from_fn_with_state(
                auth(),
                session_auth_middleware,
            ))
            .with_state(auth());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header(COOKIE, format!("session={}", mint("user-9", 300)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"user-9");
    }
}
