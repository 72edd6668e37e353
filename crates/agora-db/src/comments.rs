use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::models::CommentRow;
use crate::permissions::authorize;
use crate::{Database, StoreError, StoreResult};

impl Database {
    /// Inserts the comment and bumps the post's comment count in one
    /// transaction. The creator's current photo is copied onto the comment.
    pub fn add_comment(&self, creator_id: i64, post_id: i64, text: &str) -> StoreResult<CommentRow> {
        if text.trim().is_empty() {
            return Err(StoreError::Validation("text: This field may not be blank.".into()));
        }

        self.transaction(|tx| {
            let community_id: String = tx
                .query_row("SELECT community_id FROM posts WHERE id = ?1", [post_id], |r| r.get(0))
                .optional()?
                .ok_or_else(|| StoreError::Validation("post: Invalid post ID.".into()))?;
            let photo_url: Option<String> = tx
                .query_row("SELECT photo_url FROM users WHERE id = ?1", [creator_id], |r| r.get(0))
                .optional()?
                .ok_or(StoreError::NotFound("user"))?;

            tx.execute(
                "INSERT INTO comments (post_id, community_id, creator_id, text, creator_photo_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![post_id, community_id, creator_id, text, photo_url],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "UPDATE posts SET number_of_comments = number_of_comments + 1 WHERE id = ?1",
                [post_id],
            )?;

            info!("User {} commented on post {}", creator_id, post_id);
            query_comment(tx, id)?.ok_or(StoreError::NotFound("comment"))
        })
    }

    /// Newest first; every comment when `post_id` is `None`.
    pub fn list_comments(&self, post_id: Option<i64>) -> StoreResult<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR cm.post_id = ?1) ORDER BY cm.created_at DESC, cm.id DESC",
                CommentRow::SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([post_id], CommentRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_comment(&self, id: i64) -> StoreResult<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    /// Deletes the comment and decrements its post's comment count. Only
    /// the creator may.
    pub fn remove_comment(&self, id: i64, actor_id: i64) -> StoreResult<()> {
        self.transaction(|tx| {
            let (creator_id, post_id): (i64, i64) = tx
                .query_row(
                    "SELECT creator_id, post_id FROM comments WHERE id = ?1",
                    [id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?
                .ok_or(StoreError::NotFound("comment"))?;
            authorize(actor_id, creator_id, &[]).ensure()?;

            tx.execute(
                "UPDATE posts SET number_of_comments = number_of_comments - 1 WHERE id = ?1",
                [post_id],
            )?;
            tx.execute("DELETE FROM comments WHERE id = ?1", [id])?;

            info!("User {} deleted comment {} on post {}", actor_id, id, post_id);
            Ok(())
        })
    }
}

fn query_comment(conn: &Connection, id: i64) -> StoreResult<Option<CommentRow>> {
    let sql = format!("{} WHERE cm.id = ?1", CommentRow::SELECT);
    Ok(conn.query_row(&sql, [id], CommentRow::from_row).optional()?)
}
