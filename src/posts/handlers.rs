use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::auth::extractors::AuthUser;
use crate::auth::repo::User;
use crate::state::AppState;

use super::dto::{CreatePostRequest, Pagination, UpdatePostRequest};
use super::repo::Post;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/:id", get(get_post))
        .route("/users/:username/posts", get(list_user_posts))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/:id", put(update_post))
        .route("/posts/:id", delete(delete_post))
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn validate(title: &str, body: &str) -> Result<(), (StatusCode, String)> {
    if title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Title is required".into()));
    }
    if body.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Body is required".into()));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Post>>, (StatusCode, String)> {
    let posts = Post::list(&state.db, p.limit, p.offset)
        .await
        .map_err(internal)?;
    Ok(Json(posts))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, (StatusCode, String)> {
    let post = Post::get(&state.db, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Post not found".to_string()))?;
    Ok(Json(post))
}

#[instrument(skip(state))]
pub async fn list_user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Post>>, (StatusCode, String)> {
    let user = User::find_by_username(&state.db, &username)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;

    let posts = Post::list_by_user(&state.db, user.id, p.limit, p.offset)
        .await
        .map_err(internal)?;
    Ok(Json(posts))
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), (StatusCode, String)> {
    validate(&payload.title, &payload.body)?;

    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    let post = Post::create(&state.db, user.id, &user.username, &payload.title, &payload.body)
        .await
        .map_err(|e| {
            error!(error = %e, "create post failed");
            internal(e)
        })?;

    info!(post_id = %post.id, user_id = %user_id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, (StatusCode, String)> {
    validate(&payload.title, &payload.body)?;

    let post = Post::get(&state.db, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Post not found".to_string()))?;

    if post.user_id != user_id {
        warn!(post_id = %id, user_id = %user_id, "update by non-author");
        return Err((StatusCode::FORBIDDEN, "Not the author".into()));
    }

    let post = Post::update(&state.db, id, &payload.title, &payload.body)
        .await
        .map_err(internal)?;

    info!(post_id = %id, "post updated");
    Ok(Json(post))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    let post = Post::get(&state.db, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Post not found".to_string()))?;

    if post.user_id != user_id {
        warn!(post_id = %id, user_id = %user_id, "delete by non-author");
        return Err((StatusCode::FORBIDDEN, "Not the author".into()));
    }

    Post::delete(&state.db, id).await.map_err(internal)?;
    info!(post_id = %id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_blank_fields() {
        assert!(validate("title", "body").is_ok());
        assert!(validate("", "body").is_err());
        assert!(validate("   ", "body").is_err());
        assert!(validate("title", "").is_err());
    }

    #[test]
    fn post_serialization() {
        let post = Post {
            id: 1,
            user_id: 2,
            author: "ada".into(),
            title: "First".into(),
            body: "Hello".into(),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&post).unwrap();
        assert!(json.contains("\"author\":\"ada\""));
        assert!(json.contains("\"title\":\"First\""));
    }
}
