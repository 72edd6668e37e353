use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                photo_url   TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE communities (
                id                  TEXT PRIMARY KEY,
                creator_id          INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                privacy_type        TEXT NOT NULL DEFAULT 'public'
                                    CHECK (privacy_type IN ('public', 'restricted', 'private')),
                number_of_members   INTEGER NOT NULL DEFAULT 1,
                image_url           TEXT,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE community_members (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                community_id    TEXT NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                is_moderator    INTEGER NOT NULL DEFAULT 0,
                joined_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                UNIQUE(user_id, community_id)
            );

            CREATE INDEX idx_members_community ON community_members(community_id);

            CREATE TABLE posts (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                community_id        TEXT NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                creator_id          INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title               TEXT NOT NULL,
                body                TEXT NOT NULL DEFAULT '',
                image_url           TEXT,
                number_of_comments  INTEGER NOT NULL DEFAULT 0,
                vote_status         INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                edited_at           TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_posts_community ON posts(community_id, created_at);

            CREATE TABLE post_votes (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                post_id         INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                community_id    TEXT NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                vote_value      INTEGER NOT NULL CHECK (vote_value IN (1, -1)),
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                UNIQUE(user_id, post_id)
            );

            CREATE INDEX idx_votes_user_community ON post_votes(user_id, community_id);

            CREATE TABLE comments (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id             INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                community_id        TEXT NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                creator_id          INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text                TEXT NOT NULL,
                creator_photo_url   TEXT,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
