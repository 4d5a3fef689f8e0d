pub mod auth;
pub mod comments;
pub mod error;
pub mod home;
pub mod mailer;
pub mod middleware;
pub mod my_posts;
pub mod posts;
pub mod tokens;

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{delete, get, post, put},
};
use chrono::Utc;

use plaza_db::Database;
use plaza_types::api::HealthResponse;

use crate::mailer::Mailer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub mailer: Mailer,
    pub jwt_secret: String,
}

/// Full HTTP surface. Bearer-protected handlers take the `CurrentUser`
/// extractor; everything else is public.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        // Index
        .route("/", get(home::index))
        .route("/stats", get(home::app_stats))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password/{token}", post(auth::reset_password))
        .route(
            "/auth/verify-reset-token/{token}",
            get(auth::verify_reset_token),
        )
        .route("/auth/profile", get(auth::profile))
        // Posts
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/trending/tags", get(posts::trending_tags))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/toggle-like", post(posts::toggle_like))
        .route("/posts/{id}/like-status", get(posts::like_status))
        // Comments
        .route(
            "/posts/{id}/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route("/posts/comments/{comment_id}", delete(comments::delete_comment))
        // Caller-scoped posts
        .route("/my-posts", get(my_posts::list).post(my_posts::create))
        .route("/my-posts/stats", get(my_posts::stats))
        .route("/my-posts/{id}", put(my_posts::update).delete(my_posts::remove));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Server is running!".to_string(),
        timestamp: Utc::now(),
    })
}
