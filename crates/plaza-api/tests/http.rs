//! End-to-end tests driving the router directly, no network. The mail
//! transport is left unconfigured, so reset-email dispatch fails — which is
//! itself part of the contract under test.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use plaza_api::mailer::Mailer;
use plaza_api::{AppStateInner, app};

fn test_app() -> Router {
    let db = plaza_db::Database::open_in_memory().unwrap();
    app(Arc::new(AppStateInner {
        db,
        mailer: Mailer::new(None),
        jwt_secret: "test-secret".to_string(),
    }))
}

async fn request(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Registers a user and returns (token, user id).
async fn register(app: &Router, username: &str, email: &str) -> (String, String) {
    let (status, body) = request(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": email,
            "password": "pw123456",
            "firstName": "Test",
            "lastName": "User",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_post(app: &Router, token: &str, title: &str, content: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/api/posts",
        Some(token),
        Some(json!({ "title": title, "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create post failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_post_like_round_trip() {
    let app = test_app();

    let (alice_token, _) = register(&app, "alice", "alice@x.com").await;

    let (status, login) = request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@x.com", "password": "pw123456" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["username"], "alice");
    let alice_token = login["token"].as_str().unwrap_or(&alice_token).to_string();

    let post_id = create_post(&app, &alice_token, "Hello", "World").await;

    // A separate user sees exactly one post with zeroed counters
    let (bob_token, _) = register(&app, "bob", "bob@x.com").await;
    let (status, posts) = request(&app, "GET", "/api/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Hello");
    assert_eq!(posts[0]["likes"], 0);
    assert_eq!(posts[0]["comments"], 0);

    // Toggle on
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/posts/{}/toggle-like", post_id),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], 1);
    assert_eq!(body["isLiked"], true);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/posts/{}/like-status", post_id),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLiked"], true);
    assert_eq!(body["likes"], 1);

    // Toggle off returns to the pre-toggle state
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/posts/{}/toggle-like", post_id),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], 0);
    assert_eq!(body["isLiked"], false);
}

#[tokio::test]
async fn registration_token_resolves_to_same_identity() {
    let app = test_app();
    let (token, user_id) = register(&app, "alice", "alice@x.com").await;

    let (status, body) = request(&app, "GET", "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["fullName"], "Test User");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;

    let (wrong_pw_status, wrong_pw) = request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@x.com", "password": "not-it" })),
    )
    .await;
    let (unknown_status, unknown) = request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@x.com", "password": "pw123456" })),
    )
    .await;

    assert_eq!(wrong_pw_status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown_status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_pw["error"], unknown["error"]);
}

#[tokio::test]
async fn duplicate_registration_reports_colliding_field() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": "other",
            "email": "alice@x.com",
            "password": "pw123456",
            "firstName": "A",
            "lastName": "B",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already registered");

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "fresh@x.com",
            "password": "pw123456",
            "firstName": "A",
            "lastName": "B",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username already taken");
}

#[tokio::test]
async fn missing_fields_rejected() {
    let app = test_app();
    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "alice", "email": "alice@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "All fields are required");
}

#[tokio::test]
async fn bearer_token_state_machine() {
    let app = test_app();
    let (_, _) = register(&app, "alice", "alice@x.com").await;

    // No token short-circuits to 401
    let (status, _) = request(&app, "GET", "/api/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Present-but-invalid token is 403
    let (status, _) = request(&app, "GET", "/api/auth/profile", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn comment_lifecycle_and_ownership() {
    let app = test_app();
    let (alice_token, _) = register(&app, "alice", "alice@x.com").await;
    let (bob_token, _) = register(&app, "bob", "bob@x.com").await;
    let post_id = create_post(&app, &alice_token, "Hello", "World").await;

    // Empty comment rejected
    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/posts/{}/comments", post_id),
        Some(&bob_token),
        Some(json!({ "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, comment) = request(
        &app,
        "POST",
        &format!("/api/posts/{}/comments", post_id),
        Some(&bob_token),
        Some(json!({ "content": "  First!  " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["content"], "First!");
    let comment_id = comment["id"].as_str().unwrap().to_string();

    // Counter incremented on the parent
    let (_, detail) = request(&app, "GET", &format!("/api/posts/{}", post_id), None, None).await;
    assert_eq!(detail["comments"], 1);
    assert_eq!(detail["commentsData"].as_array().unwrap().len(), 1);

    // Only the comment author may delete
    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/posts/comments/{}", comment_id),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/posts/comments/{}", comment_id),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = request(&app, "GET", &format!("/api/posts/{}", post_id), None, None).await;
    assert_eq!(detail["comments"], 0);

    // Gone now
    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/posts/comments/{}", comment_id),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forgot_password_is_enumeration_safe_but_dispatch_failures_surface() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;

    // Unknown email: generic acknowledgment
    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "nobody@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("If an account"));

    // Known email with a dead mail transport: the one asymmetry
    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "alice@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("reset email"));
}

#[tokio::test]
async fn reset_password_validation_order() {
    let app = test_app();

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/reset-password/sometoken",
        None,
        Some(json!({ "password": "abc123", "confirmPassword": "different" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Passwords do not match");

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/reset-password/sometoken",
        None,
        Some(json!({ "password": "abc", "confirmPassword": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters long");

    // Valid payload, unknown token
    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/reset-password/sometoken",
        None,
        Some(json!({ "password": "abc123", "confirmPassword": "abc123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password reset token is invalid or has expired");

    let (status, _) = request(
        &app,
        "GET",
        "/api/auth/verify-reset-token/sometoken",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn my_posts_scoped_to_caller() {
    let app = test_app();
    let (alice_token, _) = register(&app, "alice", "alice@x.com").await;
    let (bob_token, _) = register(&app, "bob", "bob@x.com").await;

    let first = create_post(&app, &alice_token, "First", "one").await;
    create_post(&app, &alice_token, "Second", "two").await;
    create_post(&app, &bob_token, "Not alice's", "three").await;

    let (status, mine) = request(&app, "GET", "/api/my-posts", Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 2);

    // Non-owner edit is indistinguishable from a missing post
    let edit = json!({ "title": "Hijacked", "content": "x" });
    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/my-posts/{}", first),
        Some(&bob_token),
        Some(edit.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (missing_status, missing_body) = request(
        &app,
        "PUT",
        &format!("/api/my-posts/{}", uuid::Uuid::new_v4()),
        Some(&bob_token),
        Some(edit),
    )
    .await;
    assert_eq!(missing_status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], missing_body["error"]);

    // Owner edit works
    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/my-posts/{}", first),
        Some(&alice_token),
        Some(json!({ "title": "Edited", "content": "new" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Edited");

    // Delete returns the remaining posts
    let (status, remaining) = request(
        &app,
        "DELETE",
        &format!("/api/my-posts/{}", first),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let remaining = remaining.as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["title"], "Second");

    // Non-owner delete: same not-found shape
    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/my-posts/{}", first),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn author_stats_aggregate() {
    let app = test_app();
    let (alice_token, _) = register(&app, "alice", "alice@x.com").await;
    let (bob_token, _) = register(&app, "bob", "bob@x.com").await;

    let post_id = create_post(&app, &alice_token, "Hello", "World").await;
    request(
        &app,
        "POST",
        &format!("/api/posts/{}/toggle-like", post_id),
        Some(&bob_token),
        None,
    )
    .await;
    request(
        &app,
        "POST",
        &format!("/api/posts/{}/comments", post_id),
        Some(&bob_token),
        Some(json!({ "content": "Nice" })),
    )
    .await;

    let (status, stats) =
        request(&app, "GET", "/api/my-posts/stats", Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalPosts"], 1);
    assert_eq!(stats["publishedPosts"], 1);
    assert_eq!(stats["totalLikes"], 1);
    assert_eq!(stats["totalComments"], 1);
}

#[tokio::test]
async fn trending_tags_endpoint() {
    let app = test_app();
    let (token, _) = register(&app, "alice", "alice@x.com").await;

    for (title, tags) in [
        ("One", json!(["rust", "web"])),
        ("Two", json!(["rust"])),
        ("Three", json!(["sqlite"])),
    ] {
        let (status, _) = request(
            &app,
            "POST",
            "/api/posts",
            Some(&token),
            Some(json!({ "title": title, "content": "body", "tags": tags })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, tags) = request(&app, "GET", "/api/posts/trending/tags", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let tags = tags.as_array().unwrap();
    assert_eq!(tags[0]["tag"], "rust");
    assert_eq!(tags[0]["count"], 2);
    assert_eq!(tags.len(), 3);
}

#[tokio::test]
async fn post_validation_and_missing_post() {
    let app = test_app();
    let (token, _) = register(&app, "alice", "alice@x.com").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/posts",
        Some(&token),
        Some(json!({ "title": "", "content": "body" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title and content are required");

    let (status, _) = request(
        &app,
        "GET",
        &format!("/api/posts/{}", uuid::Uuid::new_v4()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/posts/{}/toggle-like", uuid::Uuid::new_v4()),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_index_and_app_stats() {
    let app = test_app();

    let (status, body) = request(&app, "GET", "/api", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to the Plaza API!");
    assert_eq!(body["endpoints"]["posts"], "/api/posts");
    assert!(body["features"].as_array().is_some_and(|f| !f.is_empty()));

    // Empty store reports zeroed aggregates
    let (status, stats) = request(&app, "GET", "/api/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalPosts"], 0);
    assert_eq!(stats["totalUsers"], 0);
    assert_eq!(stats["appStatus"], "Active");

    let (alice_token, _) = register(&app, "alice", "alice@x.com").await;
    let (bob_token, _) = register(&app, "bob", "bob@x.com").await;
    let post_id = create_post(&app, &alice_token, "Hello", "World").await;
    create_post(&app, &bob_token, "Second", "Post").await;

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/posts/{}/toggle-like", post_id),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, stats) = request(&app, "GET", "/api/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalPosts"], 2);
    assert_eq!(stats["totalUsers"], 2);
    assert_eq!(stats["totalLikes"], 1);
    assert_eq!(stats["totalInteractions"], 1);
    assert_eq!(stats["appStatus"], "Active");
}

#[tokio::test]
async fn health_endpoint() {
    let app = test_app();
    let (status, body) = request(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Server is running!");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn search_and_filter_listing() {
    let app = test_app();
    let (token, _) = register(&app, "alice", "alice@x.com").await;
    create_post(&app, &token, "Rust tips", "borrow checker").await;
    create_post(&app, &token, "Dinner plans", "pasta").await;

    let (status, posts) = request(&app, "GET", "/api/posts?search=rust", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Rust tips");

    // Nothing has 10 likes yet
    let (status, posts) = request(&app, "GET", "/api/posts?filter=popular", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(posts.as_array().unwrap().is_empty());
}
