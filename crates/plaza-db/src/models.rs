/// Database row types — these map directly to SQLite rows.
/// Distinct from the plaza-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub last_login: Option<String>,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub author_id: String,
    pub author_username: String,
    pub image: Option<String>,
    pub likes: i64,
    pub comments: i64,
    /// JSON array of tag strings, as stored.
    pub tags: String,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author: String,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}

/// Mutable post fields for the owner-scoped update.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub tags: String,
}

/// Feed filter for the public post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feed {
    #[default]
    All,
    /// Created within the last 7 days.
    Recent,
    /// At least 10 likes.
    Popular,
}

#[derive(Debug, Clone)]
pub struct PostQuery {
    pub feed: Feed,
    pub search: Option<String>,
    pub limit: u32,
    pub page: u32,
}

/// App-wide aggregates over the posts table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppStats {
    pub total_posts: i64,
    pub total_users: i64,
    pub total_likes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorStats {
    pub total_posts: i64,
    pub published_posts: i64,
    pub total_likes: i64,
    pub total_comments: i64,
}
