use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use tracing::warn;

use super::tokens::AuthTokens;

/// Extracts and validates the bearer session token, rejecting anonymous
/// requests with 401.
#[derive(Debug)]
pub struct AuthUser(pub i64);

/// Like [`AuthUser`] but never rejects: anonymous requests extract as
/// `MaybeAuthUser(None)`. Used where being logged out is not an error,
/// e.g. the idempotent logout endpoint.
pub struct MaybeAuthUser(pub Option<i64>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthTokens: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = AuthTokens::from_ref(state);
        let token = bearer_token(parts).ok_or((
            StatusCode::UNAUTHORIZED,
            "Missing Authorization header".to_string(),
        ))?;

        match tokens.verify_session(token) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(_) => {
                warn!("invalid or expired session token");
                Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired session".to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    AuthTokens: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = AuthTokens::from_ref(state);
        let user_id = bearer_token(parts)
            .and_then(|t| tokens.verify_session(t).ok())
            .map(|claims| claims.sub);
        Ok(MaybeAuthUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        let (parts, ()) = builder.body(()).expect("request").into_parts();
        parts
    }

    #[tokio::test]
    async fn auth_user_accepts_valid_session() {
        let state = AppState::fake();
        let tokens = AuthTokens::from_ref(&state);
        let token = tokens.sign_session(11, false).expect("sign");

        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("extract");
        assert_eq!(id, 11);
    }

    #[tokio::test]
    async fn auth_user_rejects_missing_and_garbage() {
        let state = AppState::fake();

        let mut parts = parts_with_auth(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);

        let mut parts = parts_with_auth(Some("Bearer garbage"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn maybe_auth_user_is_none_for_anonymous() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(None);
        let MaybeAuthUser(id) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("never rejects");
        assert_eq!(id, None);
    }
}
