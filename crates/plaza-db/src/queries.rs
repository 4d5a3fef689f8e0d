use crate::Database;
use crate::models::{
    AppStats, AuthorStats, CommentRow, Feed, PostQuery, PostRow, PostUpdate, UserRow,
};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use std::collections::HashMap;

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, first_name, last_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.email,
                    user.password,
                    user.first_name,
                    user.last_name,
                    user.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT * FROM users WHERE email = ?1", [email])
        })
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "SELECT * FROM users WHERE id = ?1", [id]))
    }

    /// Single existence probe covering both unique fields. Returns the stored
    /// (email, username) pair of the colliding row so callers can tell which
    /// field collided.
    pub fn find_existing_identity(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<(String, String)>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT email, username FROM users WHERE email = ?1 OR username = ?2 LIMIT 1",
                [email, username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
    }

    pub fn touch_last_login(&self, id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_login = ?1 WHERE id = ?2",
                [now, id],
            )?;
            Ok(())
        })
    }

    /// Stores the reset-token hash and expiry, overwriting any previous token
    /// so only one is ever active per user.
    pub fn set_reset_token(&self, user_id: &str, hash: &str, expires: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET reset_token_hash = ?1, reset_token_expires = ?2 WHERE id = ?3",
                [hash, expires, user_id],
            )?;
            Ok(())
        })
    }

    /// Unknown hash and expired hash are indistinguishable: both yield None.
    pub fn find_user_by_reset_token(&self, hash: &str, now: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(
                conn,
                "SELECT * FROM users WHERE reset_token_hash = ?1 AND reset_token_expires > ?2",
                [hash, now],
            )
        })
    }

    /// Password change and reset-token clearing happen in one UPDATE.
    pub fn update_password_clearing_reset(&self, user_id: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET password = ?1, reset_token_hash = NULL, reset_token_expires = NULL
                 WHERE id = ?2",
                [password_hash, user_id],
            )?;
            Ok(())
        })
    }

    // -- Posts --

    pub fn insert_post(&self, post: &PostRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, title, content, author, author_id, author_username,
                                    image, likes, comments, tags, is_published, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    post.id,
                    post.title,
                    post.content,
                    post.author,
                    post.author_id,
                    post.author_username,
                    post.image,
                    post.likes,
                    post.comments,
                    post.tags,
                    post.is_published,
                    post.created_at,
                    post.updated_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Public listing: published posts only, newest first, conjunctive feed
    /// filter and free-text search, offset pagination (page is 1-indexed).
    pub fn list_posts(&self, query: &PostQuery) -> Result<Vec<PostRow>> {
        let pattern = query.search.as_ref().map(|s| format!("%{}%", s));
        let cutoff = (Utc::now() - chrono::Duration::days(7)).to_rfc3339();
        let limit = query.limit as i64;
        let offset = (query.page.max(1) as i64 - 1) * limit;

        let mut sql = String::from(
            "SELECT id, title, content, author, author_id, author_username, image,
                    likes, comments, tags, is_published, created_at, updated_at
             FROM posts WHERE is_published = 1",
        );
        let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::new();

        if let Some(pattern) = &pattern {
            sql.push_str(" AND (title LIKE ? OR content LIKE ? OR author LIKE ?)");
            params.push(pattern);
            params.push(pattern);
            params.push(pattern);
        }

        match query.feed {
            Feed::All => {}
            Feed::Recent => {
                sql.push_str(" AND created_at >= ?");
                params.push(&cutoff);
            }
            Feed::Popular => {
                sql.push_str(" AND likes >= 10");
            }
        }

        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
        params.push(&limit);
        params.push(&offset);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn posts_by_author(&self, author_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, content, author, author_id, author_username, image,
                        likes, comments, tags, is_published, created_at, updated_at
                 FROM posts WHERE author_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([author_id], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Ownership check folded into the UPDATE: a non-owner gets the same None
    /// as a missing post.
    pub fn update_post_owned(
        &self,
        post_id: &str,
        author_id: &str,
        update: &PostUpdate,
        now: &str,
    ) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET title = ?1, content = ?2, image = ?3, tags = ?4, updated_at = ?5
                 WHERE id = ?6 AND author_id = ?7",
                rusqlite::params![
                    update.title,
                    update.content,
                    update.image,
                    update.tags,
                    now,
                    post_id,
                    author_id
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_post(conn, post_id)
        })
    }

    /// Same combined existence/ownership semantics as `update_post_owned`.
    pub fn delete_post_owned(&self, post_id: &str, author_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM posts WHERE id = ?1 AND author_id = ?2",
                [post_id, author_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// App-wide aggregates: published post count, distinct posting users,
    /// and the total like count across all posts.
    pub fn app_stats(&self) -> Result<AppStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT COALESCE(SUM(is_published), 0),
                        COUNT(DISTINCT author_id),
                        COALESCE(SUM(likes), 0)
                 FROM posts",
                [],
                |row| {
                    Ok(AppStats {
                        total_posts: row.get(0)?,
                        total_users: row.get(1)?,
                        total_likes: row.get(2)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    pub fn author_stats(&self, author_id: &str) -> Result<AuthorStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(is_published), 0),
                        COALESCE(SUM(likes), 0),
                        COALESCE(SUM(comments), 0)
                 FROM posts WHERE author_id = ?1",
                [author_id],
                |row| {
                    Ok(AuthorStats {
                        total_posts: row.get(0)?,
                        published_posts: row.get(1)?,
                        total_likes: row.get(2)?,
                        total_comments: row.get(3)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    // -- Likes --

    /// Toggle a like: removes the membership row and decrements the counter if
    /// the user already liked the post, otherwise inserts and increments. Both
    /// writes happen under the one connection lock, so within a process the
    /// counter cannot drift from the set size.
    /// Returns None when the post does not exist, otherwise (is_liked, likes).
    pub fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<Option<(bool, i64)>> {
        self.with_conn(|conn| {
            if query_post(conn, post_id)?.is_none() {
                return Ok(None);
            }

            let liked: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                    [post_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            let is_liked = if liked.is_some() {
                conn.execute(
                    "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                    [post_id, user_id],
                )?;
                conn.execute(
                    "UPDATE posts SET likes = MAX(likes - 1, 0) WHERE id = ?1",
                    [post_id],
                )?;
                false
            } else {
                conn.execute(
                    "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![post_id, user_id, Utc::now().to_rfc3339()],
                )?;
                conn.execute("UPDATE posts SET likes = likes + 1 WHERE id = ?1", [post_id])?;
                true
            };

            let likes: i64 =
                conn.query_row("SELECT likes FROM posts WHERE id = ?1", [post_id], |row| {
                    row.get(0)
                })?;
            Ok(Some((is_liked, likes)))
        })
    }

    /// Returns None when the post does not exist, otherwise (is_liked, likes).
    pub fn like_status(&self, post_id: &str, user_id: &str) -> Result<Option<(bool, i64)>> {
        self.with_conn(|conn| {
            let likes: Option<i64> = conn
                .query_row("SELECT likes FROM posts WHERE id = ?1", [post_id], |row| {
                    row.get(0)
                })
                .optional()?;
            let Some(likes) = likes else {
                return Ok(None);
            };

            let liked: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                    [post_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(Some((liked.is_some(), likes)))
        })
    }

    /// Batch-fetch the liked-by sets for a page of posts.
    /// Returns (post_id, user_id) pairs.
    pub fn likers_for_posts(&self, post_ids: &[String]) -> Result<Vec<(String, String)>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT post_id, user_id FROM post_likes WHERE post_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = post_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Top tags across all posts, by occurrence count descending. Ordering
    /// among equal counts is arbitrary.
    pub fn trending_tags(&self, top: usize) -> Result<Vec<(String, i64)>> {
        let tag_columns: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT tags FROM posts")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })?;

        let mut counts: HashMap<String, i64> = HashMap::new();
        for column in &tag_columns {
            let tags: Vec<String> = serde_json::from_str(column).unwrap_or_default();
            for tag in tags {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }

        let mut trending: Vec<(String, i64)> = counts.into_iter().collect();
        trending.sort_by(|a, b| b.1.cmp(&a.1));
        trending.truncate(top);
        Ok(trending)
    }

    // -- Comments --

    pub fn insert_comment(&self, comment: &CommentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, author_id, author, author_username, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    comment.id,
                    comment.post_id,
                    comment.author_id,
                    comment.author,
                    comment.author_username,
                    comment.content,
                    comment.created_at
                ],
            )?;
            Ok(())
        })
    }

    /// Adjusts the denormalized comment counter, floored at 0.
    pub fn bump_comment_count(&self, post_id: &str, delta: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE posts SET comments = MAX(comments + ?1, 0) WHERE id = ?2",
                rusqlite::params![delta, post_id],
            )?;
            Ok(())
        })
    }

    pub fn comments_for_post(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, author_id, author, author_username, content, created_at
                 FROM comments WHERE post_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([post_id], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, author_id, author, author_username, content, created_at
                 FROM comments WHERE id = ?1",
            )?;
            stmt.query_row([id], map_comment).optional()
        })
    }

    pub fn delete_comment(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}

fn query_user<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    stmt.query_row(params, |row| {
        Ok(UserRow {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            password: row.get("password")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            last_login: row.get("last_login")?,
            reset_token_hash: row.get("reset_token_hash")?,
            reset_token_expires: row.get("reset_token_expires")?,
            created_at: row.get("created_at")?,
        })
    })
    .optional()
}

fn query_post(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, content, author, author_id, author_username, image,
                likes, comments, tags, is_published, created_at, updated_at
         FROM posts WHERE id = ?1",
    )?;
    stmt.query_row([id], map_post).optional()
}

fn map_post(row: &rusqlite::Row) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        author_id: row.get(4)?,
        author_username: row.get(5)?,
        image: row.get(6)?,
        likes: row.get(7)?,
        comments: row.get(8)?,
        tags: row.get(9)?,
        is_published: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn map_comment(row: &rusqlite::Row) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author: row.get(3)?,
        author_username: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
