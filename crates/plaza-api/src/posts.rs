use std::collections::HashMap;

use anyhow::anyhow;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use plaza_db::models::{Feed, PostQuery, PostRow};
use plaza_types::api::{
    CreatePostRequest, LikeStatusResponse, PostDetailResponse, PostResponse, ToggleLikeResponse,
    TrendingTag,
};

use crate::AppState;
use crate::comments::comment_response;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CONTENT_LEN: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub filter: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_limit() -> u32 {
    50
}

fn default_page() -> u32 {
    1
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let feed = match query.filter.as_deref() {
        Some("recent") => Feed::Recent,
        Some("popular") => Feed::Popular,
        _ => Feed::All,
    };
    let db_query = PostQuery {
        feed,
        search: query.search.filter(|s| !s.trim().is_empty()),
        limit: query.limit.min(200),
        page: query.page,
    };

    // Run blocking DB queries off the async runtime
    let db = state.clone();
    let (rows, likers) = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_posts(&db_query)?;
        let post_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let likers = db.db.likers_for_posts(&post_ids)?;
        anyhow::Ok((rows, likers))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow!("join error: {}", e))
    })??;

    let mut liked_by = liked_by_map(likers);
    let posts: Vec<PostResponse> = rows
        .into_iter()
        .map(|row| {
            let likers = liked_by.remove(&row.id).unwrap_or_default();
            post_response(row, likers)
        })
        .collect();

    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let post_id = id.to_string();
    let (row, comments, likers) = tokio::task::spawn_blocking(move || {
        let row = db.db.get_post(&post_id)?;
        let comments = db.db.comments_for_post(&post_id)?;
        let likers = db.db.likers_for_posts(std::slice::from_ref(&post_id))?;
        anyhow::Ok((row, comments, likers))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow!("join error: {}", e))
    })??;

    let row = row.ok_or(ApiError::NotFound("Post not found"))?;
    let liked_by = liked_by_map(likers).remove(&row.id).unwrap_or_default();

    Ok(Json(PostDetailResponse {
        post: post_response(row, liked_by),
        comments_data: comments.into_iter().map(comment_response).collect(),
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = build_post(&user, req.title, req.content, req.image, req.tags)?;
    state.db.insert_post(&row)?;

    Ok((StatusCode::CREATED, Json(post_response(row, vec![]))))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (is_liked, likes) = state
        .db
        .toggle_like(&id.to_string(), &user.id.to_string())?
        .ok_or(ApiError::NotFound("Post not found"))?;

    Ok(Json(ToggleLikeResponse {
        message: if is_liked {
            "Post liked!".to_string()
        } else {
            "Post unliked!".to_string()
        },
        likes,
        is_liked,
    }))
}

pub async fn like_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (is_liked, likes) = state
        .db
        .like_status(&id.to_string(), &user.id.to_string())?
        .ok_or(ApiError::NotFound("Post not found"))?;

    Ok(Json(LikeStatusResponse { is_liked, likes }))
}

pub async fn trending_tags(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tags: Vec<TrendingTag> = state
        .db
        .trending_tags(10)?
        .into_iter()
        .map(|(tag, count)| TrendingTag { tag, count })
        .collect();

    Ok(Json(tags))
}

/// Validates client-supplied fields and stamps authorship from the
/// authenticated identity — author fields never come from the payload.
pub(crate) fn build_post(
    user: &CurrentUser,
    title: String,
    content: String,
    image: Option<String>,
    tags: Vec<String>,
) -> Result<PostRow, ApiError> {
    let title = title.trim().to_string();
    if title.is_empty() || content.trim().is_empty() {
        return Err(ApiError::Validation(
            "Title and content are required".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::Validation(
            "Title must be 200 characters or fewer".to_string(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(ApiError::Validation(
            "Content must be 2000 characters or fewer".to_string(),
        ));
    }

    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let now = Utc::now().to_rfc3339();
    Ok(PostRow {
        id: Uuid::new_v4().to_string(),
        title,
        content,
        author: user.full_name(),
        author_id: user.id.to_string(),
        author_username: user.username.clone(),
        image,
        likes: 0,
        comments: 0,
        tags: serde_json::to_string(&tags).map_err(|e| ApiError::Internal(e.into()))?,
        is_published: true,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub(crate) fn post_response(row: PostRow, liked_by: Vec<Uuid>) -> PostResponse {
    let tags: Vec<String> = serde_json::from_str(&row.tags).unwrap_or_else(|e| {
        warn!("Corrupt tags '{}' on post '{}': {}", row.tags, row.id, e);
        vec![]
    });

    PostResponse {
        id: parse_uuid(&row.id, "post id"),
        title: row.title,
        content: row.content,
        author: row.author,
        author_id: parse_uuid(&row.author_id, "author id"),
        author_username: row.author_username,
        image: row.image,
        likes: row.likes,
        liked_by,
        comments: row.comments,
        tags,
        is_published: row.is_published,
        created_at: parse_timestamp(&row.created_at, "created_at", &row.id),
        updated_at: parse_timestamp(&row.updated_at, "updated_at", &row.id),
    }
}

pub(crate) fn liked_by_map(pairs: Vec<(String, String)>) -> HashMap<String, Vec<Uuid>> {
    let mut map: HashMap<String, Vec<Uuid>> = HashMap::new();
    for (post_id, user_id) in pairs {
        if let Ok(uid) = user_id.parse::<Uuid>() {
            map.entry(post_id).or_default().push(uid);
        }
    }
    map
}

pub(crate) fn parse_uuid(value: &str, what: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, value, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(value: &str, what: &str, id: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite default timestamps lack a timezone; parse as naive UTC.
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}' on '{}': {}", what, value, id, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Archer".to_string(),
        }
    }

    #[test]
    fn authorship_comes_from_identity() {
        let user = test_user();
        let row = build_post(
            &user,
            "Hello".to_string(),
            "World".to_string(),
            None,
            vec![],
        )
        .unwrap();

        assert_eq!(row.author, "Alice Archer");
        assert_eq!(row.author_id, user.id.to_string());
        assert_eq!(row.author_username, "alice");
        assert_eq!(row.likes, 0);
        assert_eq!(row.comments, 0);
        assert!(row.is_published);
    }

    #[test]
    fn title_and_content_are_required() {
        let user = test_user();
        assert!(build_post(&user, "  ".to_string(), "body".to_string(), None, vec![]).is_err());
        assert!(build_post(&user, "title".to_string(), "".to_string(), None, vec![]).is_err());
    }

    #[test]
    fn length_limits_enforced() {
        let user = test_user();
        let long_title = "x".repeat(MAX_TITLE_LEN + 1);
        let long_content = "x".repeat(MAX_CONTENT_LEN + 1);
        assert!(build_post(&user, long_title, "body".to_string(), None, vec![]).is_err());
        assert!(build_post(&user, "title".to_string(), long_content, None, vec![]).is_err());
    }

    #[test]
    fn tags_are_trimmed_and_emptied_out() {
        let user = test_user();
        let row = build_post(
            &user,
            "Hello".to_string(),
            "World".to_string(),
            None,
            vec![" rust ".to_string(), "".to_string(), "web".to_string()],
        )
        .unwrap();
        assert_eq!(row.tags, r#"["rust","web"]"#);
    }

    #[test]
    fn timestamps_parse_both_stored_formats() {
        let rfc = parse_timestamp("2026-08-28T10:00:00+00:00", "created_at", "p");
        let naive = parse_timestamp("2026-08-28 10:00:00", "created_at", "p");
        assert_eq!(rfc, naive);
        assert_ne!(rfc, DateTime::<Utc>::default());
    }
}
