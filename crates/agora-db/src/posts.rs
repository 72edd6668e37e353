use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::communities::query_community;
use crate::models::PostRow;
use crate::permissions::authorize;
use crate::{Database, StoreError, StoreResult};

const MAX_TITLE_LEN: usize = 300;

impl Database {
    pub fn create_post(
        &self,
        creator_id: i64,
        community_id: &str,
        title: &str,
        body: &str,
        image_url: Option<&str>,
    ) -> StoreResult<PostRow> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("title: This field may not be blank.".into()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(StoreError::Validation(format!(
                "title: Ensure this field has no more than {MAX_TITLE_LEN} characters."
            )));
        }

        self.transaction(|tx| {
            if query_community(tx, community_id)?.is_none() {
                return Err(StoreError::Validation("community_id: Invalid community.".into()));
            }
            tx.execute(
                "INSERT INTO posts (community_id, creator_id, title, body, image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![community_id, creator_id, title, body, image_url],
            )?;
            let id = tx.last_insert_rowid();

            info!("User {} created post {} in r/{}", creator_id, id, community_id);
            query_post(tx, id)?.ok_or(StoreError::NotFound("post"))
        })
    }

    /// Newest first, optionally scoped to one community. `limit: None`
    /// returns everything.
    pub fn list_posts(&self, community_id: Option<&str>, limit: Option<u32>) -> StoreResult<Vec<PostRow>> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR p.community_id = ?1)
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?2",
                PostRow::SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![community_id, limit], PostRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_post(&self, id: i64) -> StoreResult<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Deletes the post with its comments and votes. Only the creator may.
    pub fn delete_post(&self, id: i64, actor_id: i64) -> StoreResult<()> {
        self.transaction(|tx| {
            let creator_id: i64 = tx
                .query_row("SELECT creator_id FROM posts WHERE id = ?1", [id], |r| r.get(0))
                .optional()?
                .ok_or(StoreError::NotFound("post"))?;
            authorize(actor_id, creator_id, &[]).ensure()?;

            tx.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            info!("User {} deleted post {}", actor_id, id);
            Ok(())
        })
    }
}

pub(crate) fn query_post(conn: &Connection, id: i64) -> StoreResult<Option<PostRow>> {
    let sql = format!("{} WHERE p.id = ?1", PostRow::SELECT);
    Ok(conn.query_row(&sql, [id], PostRow::from_row).optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use agora_types::models::VoteValue;

    #[test]
    fn create_requires_known_community_and_title() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        testutil::community(&db, "rustaceans", &alice);

        let missing = db.create_post(alice.id, "ghost", "Hello", "", None);
        assert!(matches!(missing, Err(StoreError::Validation(_))));

        let blank = db.create_post(alice.id, "rustaceans", "   ", "", None);
        assert!(matches!(blank, Err(StoreError::Validation(_))));

        let long = "x".repeat(MAX_TITLE_LEN + 1);
        let too_long = db.create_post(alice.id, "rustaceans", &long, "", None);
        assert!(matches!(too_long, Err(StoreError::Validation(_))));

        let post = db
            .create_post(alice.id, "rustaceans", "Hello", "world", Some("https://img/x.png"))
            .unwrap();
        assert_eq!(post.creator_display_name, "alice");
        assert_eq!(post.number_of_comments, 0);
        assert_eq!(post.vote_status, 0);
    }

    #[test]
    fn list_filters_and_limits() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let a = testutil::community(&db, "first", &alice);
        let b = testutil::community(&db, "second", &alice);
        let p1 = testutil::post(&db, &a, &alice);
        let p2 = testutil::post(&db, &a, &alice);
        let p3 = testutil::post(&db, &b, &alice);

        let all: Vec<i64> = db.list_posts(None, None).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(all, vec![p3.id, p2.id, p1.id]);

        let in_a: Vec<i64> = db.list_posts(Some("first"), None).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(in_a, vec![p2.id, p1.id]);

        assert_eq!(db.list_posts(None, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn non_creator_cannot_delete() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let bob = testutil::user(&db, "bob");
        let community = testutil::community(&db, "rustaceans", &alice);
        let post = testutil::post(&db, &community, &alice);
        db.add_comment(alice.id, post.id, "first!").unwrap();
        db.submit_vote(bob.id, post.id, VoteValue::Up).unwrap();

        assert!(matches!(db.delete_post(post.id, bob.id), Err(StoreError::Forbidden)));

        let kept = db.get_post(post.id).unwrap().unwrap();
        assert_eq!(kept.number_of_comments, 1);
        assert_eq!(kept.vote_status, 1);
        assert_eq!(db.list_comments(Some(post.id)).unwrap().len(), 1);
        assert_eq!(db.user_votes(bob.id, "rustaceans").unwrap().len(), 1);
    }

    #[test]
    fn delete_cascades_to_comments_and_votes() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let community = testutil::community(&db, "rustaceans", &alice);
        let post = testutil::post(&db, &community, &alice);
        db.add_comment(alice.id, post.id, "first!").unwrap();
        db.submit_vote(alice.id, post.id, VoteValue::Up).unwrap();

        db.delete_post(post.id, alice.id).unwrap();

        assert!(db.get_post(post.id).unwrap().is_none());
        assert!(db.list_comments(Some(post.id)).unwrap().is_empty());
        assert!(db.user_votes(alice.id, "rustaceans").unwrap().is_empty());
        assert!(matches!(db.delete_post(post.id, alice.id), Err(StoreError::NotFound(_))));
    }
}
