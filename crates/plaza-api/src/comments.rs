use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use plaza_db::models::CommentRow;
use plaza_types::api::{CommentResponse, CreateCommentRequest, MessageResponse};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::posts::{parse_timestamp, parse_uuid};

pub const MAX_COMMENT_LEN: usize = 500;

pub async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation(
            "Comment content is required".to_string(),
        ));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::Validation(
            "Comment must be 500 characters or fewer".to_string(),
        ));
    }

    let post_id = post_id.to_string();
    if state.db.get_post(&post_id)?.is_none() {
        return Err(ApiError::NotFound("Post not found"));
    }

    let comment = CommentRow {
        id: Uuid::new_v4().to_string(),
        post_id: post_id.clone(),
        author_id: user.id.to_string(),
        author: user.full_name(),
        author_username: user.username.clone(),
        content,
        created_at: Utc::now().to_rfc3339(),
    };

    // Insert then bump the denormalized counter; the second write is not
    // atomic with the first (a crash between them leaves an undercount).
    state.db.insert_comment(&comment)?;
    state.db.bump_comment_count(&post_id, 1)?;

    Ok((StatusCode::CREATED, Json(comment_response(comment))))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let comments: Vec<CommentResponse> = state
        .db
        .comments_for_post(&post_id.to_string())?
        .into_iter()
        .map(comment_response)
        .collect();

    Ok(Json(comments))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .db
        .get_comment(&comment_id.to_string())?
        .ok_or(ApiError::NotFound("Comment not found"))?;

    if comment.author_id != user.id.to_string() {
        return Err(ApiError::Forbidden(
            "You can only delete your own comments",
        ));
    }

    state.db.bump_comment_count(&comment.post_id, -1)?;
    state.db.delete_comment(&comment.id)?;

    Ok(Json(MessageResponse {
        message: "Comment deleted successfully".to_string(),
    }))
}

pub(crate) fn comment_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: parse_uuid(&row.id, "comment id"),
        post_id: parse_uuid(&row.post_id, "post id"),
        content: row.content,
        author: row.author,
        author_id: parse_uuid(&row.author_id, "author id"),
        author_username: row.author_username,
        created_at: parse_timestamp(&row.created_at, "created_at", &row.id),
    }
}
