use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};

use crate::state::AppState;

use super::dto::{
    LoginRequest, MessageResponse, PublicUser, RegisterRequest, ResetPasswordRequest,
    ResetRequest, SessionResponse,
};
use super::extractors::{AuthUser, MaybeAuthUser};
use super::password::{hash_password, verify_password};
use super::repo::User;
use super::tokens::AuthTokens;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/reset-request", post(reset_request))
        .route("/auth/reset-password/:token", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn public_user(user: User) -> PublicUser {
    PublicUser {
        id: user.id,
        username: user.username,
        email: user.email,
        picture: user.picture,
    }
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    if payload.username.len() < 2 || payload.username.len() > 32 {
        warn!("invalid username length");
        return Err((
            StatusCode::BAD_REQUEST,
            "Username must be 2-32 characters".into(),
        ));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    // Field-level uniqueness checks before insert
    if User::find_by_username(&state.db, &payload.username)
        .await
        .map_err(internal)?
        .is_some()
    {
        warn!(username = %payload.username, "username already taken");
        return Err((StatusCode::CONFLICT, "Username already taken".into()));
    }
    if User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(internal)?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err((StatusCode::CONFLICT, "Email already registered".into()));
    }

    let hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "hash_password failed");
            return Err(internal(e));
        }
    };

    let user = match User::create(&state.db, &payload.username, &payload.email, &hash).await {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(internal(e));
        }
    };

    let tokens = AuthTokens::from_ref(&state);
    let token = tokens.sign_session(user.id, false).map_err(internal)?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(Json(SessionResponse {
        token,
        user: public_user(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown account and wrong password collapse to the same answer so
    // the endpoint cannot be used to enumerate accounts.
    let user = match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(internal(e));
        }
    };

    let ok = match verify_password(&payload.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "verify_password failed");
            return Err(internal(e));
        }
    };

    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    let tokens = AuthTokens::from_ref(&state);
    let token = tokens
        .sign_session(user.id, payload.remember)
        .map_err(internal)?;

    info!(user_id = %user.id, remember = payload.remember, "user logged in");
    Ok(Json(SessionResponse {
        token,
        user: public_user(user),
    }))
}

/// Idempotent: sessions are stateless bearer tokens, so tearing one down
/// is the client discarding it. Calling this anonymously is a no-op, not
/// an error.
#[instrument(skip_all)]
pub async fn logout(MaybeAuthUser(user_id): MaybeAuthUser) -> StatusCode {
    if let Some(id) = user_id {
        debug!(user_id = %id, "user logged out");
    }
    StatusCode::NO_CONTENT
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            error!(user_id = %user_id, "session user not found");
            (StatusCode::UNAUTHORIZED, "User not found".to_string())
        })?;
    Ok(Json(public_user(user)))
}

#[instrument(skip(state, payload))]
pub async fn reset_request(
    State(state): State<AppState>,
    Json(mut payload): Json<ResetRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            "No account with that email".to_string(),
        ))?;

    let tokens = AuthTokens::from_ref(&state);
    let token = tokens.issue_reset(user.id).map_err(internal)?;
    let reset_url = format!("{}/reset-password/{}", state.config.public_base_url, token);

    state
        .mailer
        .send_password_reset(&user.email, &user.username, &reset_url)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "reset mail send failed");
            internal(e)
        })?;

    info!(user_id = %user.id, "reset token issued");
    Ok(Json(MessageResponse {
        message: "Check your mail for the reset link".into(),
    }))
}

#[instrument(skip(state, payload, token))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let tokens = AuthTokens::from_ref(&state);

    // One generic outcome for bad signature, malformed input and expiry.
    let Some(user_id) = tokens.verify_reset(&token) else {
        warn!("reset redemption with invalid or expired token");
        return Err((StatusCode::UNAUTHORIZED, "Invalid or expired token".into()));
    };

    if payload.password.len() < 8 {
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    let hash = hash_password(&payload.password).map_err(internal)?;
    User::set_password(&state.db, user_id, &hash)
        .await
        .map_err(internal)?;

    info!(user_id = %user_id, "password reset completed");
    Ok(Json(MessageResponse {
        message: "Your password has been changed".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn register_propagates_database_errors() {
        // Fake state has no reachable database: the uniqueness lookup must
        // surface as a 500, not fall through toward the insert.
        let state = AppState::fake();
        let payload = RegisterRequest {
            username: "ada".into(),
            email: "ada@example.com".into(),
            password: "long-enough-pass".into(),
        };
        let (status, _) = register(State(state), Json(payload)).await.unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn public_user_serialization_omits_hash() {
        let user = User {
            id: 1,
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: "secret-hash".into(),
            picture: None,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&public_user(user)).unwrap();
        assert!(json.contains("ada@example.com"));
        assert!(!json.contains("secret-hash"));
    }
}
