use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::auth::extractors::AuthUser;
use crate::auth::handlers::is_valid_email;
use crate::auth::repo::User;
use crate::state::AppState;
use crate::storage;

use super::dto::{PictureResponse, UpdateAccountRequest};
use super::services::replace_picture;

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/account", put(update_account))
        .route("/account/picture", post(upload_picture))
        .route("/account/picture", get(get_picture))
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024)) // 5MB
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[instrument(skip(state, payload))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(mut payload): Json<UpdateAccountRequest>,
) -> Result<Json<User>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if !is_valid_email(&payload.email) {
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if payload.username.len() < 2 || payload.username.len() > 32 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username must be 2-32 characters".into(),
        ));
    }

    let current = User::find_by_id(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    // Uniqueness checks skip the caller's own current values
    if payload.username != current.username
        && User::find_by_username(&state.db, &payload.username)
            .await
            .map_err(internal)?
            .is_some()
    {
        warn!(username = %payload.username, "username already taken");
        return Err((StatusCode::CONFLICT, "Username already taken".into()));
    }
    if payload.email != current.email
        && User::find_by_email(&state.db, &payload.email)
            .await
            .map_err(internal)?
            .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err((StatusCode::CONFLICT, "Email already registered".into()));
    }

    let user = User::update_profile(&state.db, user_id, &payload.username, &payload.email)
        .await
        .map_err(internal)?;

    info!(user_id = %user.id, "account updated");
    Ok(Json(user))
}

/// POST /account/picture (multipart, field `picture`)
#[instrument(skip(state, mp))]
pub async fn upload_picture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<PictureResponse>, (StatusCode, String)> {
    let mut upload = None;
    loop {
        match mp.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("picture") {
                    let content_type = field
                        .content_type()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "application/octet-stream".into());
                    let data = field.bytes().await.map_err(|e| {
                        (StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}"))
                    })?;
                    upload = Some((data, content_type));
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    format!("invalid multipart body: {e}"),
                ))
            }
        }
    }
    let Some((data, content_type)) = upload else {
        return Err((StatusCode::BAD_REQUEST, "picture field is required".into()));
    };

    if storage::ext_from_mime(&content_type).is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("unsupported image type {content_type}"),
        ));
    }

    let old_key = User::find_by_id(&state.db, user_id)
        .await
        .map_err(internal)?
        .and_then(|u| u.picture);

    let key = replace_picture(
        &state.db,
        state.storage.as_ref(),
        user_id,
        old_key.as_deref(),
        data,
        &content_type,
    )
    .await
    .map_err(internal)?;

    info!(user_id = %user_id, key = %key, "profile picture updated");
    Ok(Json(PictureResponse { picture: key }))
}

/// 302 to a presigned URL for the caller's profile picture.
#[instrument(skip(state))]
pub async fn get_picture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> impl IntoResponse {
    let user = match User::find_by_id(&state.db, user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "User not found").into_response(),
        Err(e) => {
            error!(error = %e, "find_by_id failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let Some(key) = user.picture else {
        return (StatusCode::NOT_FOUND, "No profile picture").into_response();
    };

    let Ok(url) = state.storage.presign(&key).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "presign failed").into_response();
    };

    Redirect::temporary(&url).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    async fn multipart_from(body: &'static str) -> Multipart {
        let req = Request::builder()
            .header(
                axum::http::header::CONTENT_TYPE,
                "multipart/form-data; boundary=XBOUNDARY",
            )
            .body(Body::from(body))
            .expect("request");
        Multipart::from_request(req, &()).await.expect("multipart")
    }

    #[tokio::test]
    async fn upload_rejects_missing_picture_field() {
        let state = AppState::fake();
        let body = "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\ndata\r\n--XBOUNDARY--\r\n";
        let mp = multipart_from(body).await;

        let (status, msg) = upload_picture(State(state), AuthUser(1), mp)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(msg.contains("picture field is required"));
    }

    #[tokio::test]
    async fn upload_surfaces_multipart_decode_errors() {
        let state = AppState::fake();
        // Opening boundary and headers, then the stream just stops.
        let body = "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"picture\"\r\n\r\npartial";
        let mp = multipart_from(body).await;

        let (status, msg) = upload_picture(State(state), AuthUser(1), mp)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(msg.contains("invalid multipart body"));
    }

    #[tokio::test]
    async fn upload_rejects_unsupported_content_type() {
        let state = AppState::fake();
        let body = "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"picture\"\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XBOUNDARY--\r\n";
        let mp = multipart_from(body).await;

        let (status, msg) = upload_picture(State(state), AuthUser(1), mp)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(msg.contains("unsupported image type"));
    }
}
