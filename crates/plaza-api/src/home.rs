//! API index and app-wide statistics.

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use plaza_types::api::AppStatsResponse;

use crate::AppState;
use crate::error::ApiError;

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to the Plaza API!",
        "version": "1.0.0",
        "endpoints": {
            "auth": "/api/auth",
            "posts": "/api/posts",
            "myPosts": "/api/my-posts",
            "health": "/health",
        },
        "features": [
            "User registration and login",
            "Password reset via email",
            "Create, read, update and delete posts",
            "Like posts and leave comments",
        ],
    }))
}

pub async fn app_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.db.app_stats()?;

    Ok(Json(AppStatsResponse {
        total_posts: stats.total_posts,
        total_users: stats.total_users,
        total_likes: stats.total_likes,
        total_interactions: stats.total_likes,
        app_status: "Active".to_string(),
    }))
}
