//! Caller-scoped post management. Every operation is bound to the
//! authenticated author; ownership checks are folded into the store's
//! conditional writes so a non-owner sees the same not-found response as a
//! missing post.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use plaza_db::models::PostUpdate;
use plaza_types::api::{AuthorStatsResponse, CreatePostRequest, PostResponse, UpdatePostRequest};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::posts::{build_post, liked_by_map, post_response};

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(author_posts(&state, &user)?))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = build_post(&user, req.title, req.content, req.image, req.tags)?;
    state.db.insert_post(&row)?;

    Ok((StatusCode::CREATED, Json(post_response(row, vec![]))))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Reuse the creation validation, then keep only the mutable fields.
    let validated = build_post(&user, req.title, req.content, req.image, req.tags)?;
    let update = PostUpdate {
        title: validated.title,
        content: validated.content,
        image: validated.image,
        tags: validated.tags,
    };

    let post_id = id.to_string();
    let row = state
        .db
        .update_post_owned(
            &post_id,
            &user.id.to_string(),
            &update,
            &Utc::now().to_rfc3339(),
        )?
        .ok_or(ApiError::NotFound(
            "Post not found or you are not authorized to edit this post",
        ))?;

    let liked_by = liked_by_map(state.db.likers_for_posts(std::slice::from_ref(&post_id))?)
        .remove(&post_id)
        .unwrap_or_default();

    Ok(Json(post_response(row, liked_by)))
}

pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .delete_post_owned(&id.to_string(), &user.id.to_string())?;
    if !deleted {
        return Err(ApiError::NotFound(
            "Post not found or you are not authorized to delete this post",
        ));
    }

    // The original contract returns the author's remaining posts.
    Ok(Json(author_posts(&state, &user)?))
}

pub async fn stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.db.author_stats(&user.id.to_string())?;

    Ok(Json(AuthorStatsResponse {
        total_posts: stats.total_posts,
        published_posts: stats.published_posts,
        total_likes: stats.total_likes,
        total_comments: stats.total_comments,
    }))
}

fn author_posts(state: &AppState, user: &CurrentUser) -> Result<Vec<PostResponse>, ApiError> {
    let rows = state.db.posts_by_author(&user.id.to_string())?;
    let post_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut liked_by = liked_by_map(state.db.likers_for_posts(&post_ids)?);

    Ok(rows
        .into_iter()
        .map(|row| {
            let likers = liked_by.remove(&row.id).unwrap_or_default();
            post_response(row, likers)
        })
        .collect())
}
