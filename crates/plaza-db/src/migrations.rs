use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                   TEXT PRIMARY KEY,
            username             TEXT NOT NULL UNIQUE,
            email                TEXT NOT NULL UNIQUE,
            password             TEXT NOT NULL,
            first_name           TEXT NOT NULL,
            last_name            TEXT NOT NULL,
            last_login           TEXT,
            reset_token_hash     TEXT,
            reset_token_expires  TEXT,
            created_at           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posts (
            id               TEXT PRIMARY KEY,
            title            TEXT NOT NULL,
            content          TEXT NOT NULL,
            author           TEXT NOT NULL,
            author_id        TEXT NOT NULL REFERENCES users(id),
            author_username  TEXT NOT NULL,
            image            TEXT,
            likes            INTEGER NOT NULL DEFAULT 0,
            comments         INTEGER NOT NULL DEFAULT 0,
            tags             TEXT NOT NULL DEFAULT '[]',
            is_published     INTEGER NOT NULL DEFAULT 1,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);

        CREATE INDEX IF NOT EXISTS idx_posts_author
            ON posts(author_id, created_at);

        -- Liked-by set; posts.likes mirrors the row count per post
        CREATE TABLE IF NOT EXISTS post_likes (
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            UNIQUE(post_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_post_likes_post
            ON post_likes(post_id);

        CREATE TABLE IF NOT EXISTS comments (
            id               TEXT PRIMARY KEY,
            post_id          TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            author_id        TEXT NOT NULL REFERENCES users(id),
            author           TEXT NOT NULL,
            author_username  TEXT NOT NULL,
            content          TEXT NOT NULL,
            created_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
