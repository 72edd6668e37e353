use agora_types::models::{VoteTransition, VoteValue};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::models::VoteRow;
use crate::{Database, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub transition: VoteTransition,
    /// The post's vote sum after the transition.
    pub vote_status: i64,
    /// The user's vote after the transition, `None` once withdrawn.
    pub vote: Option<VoteRow>,
}

impl Database {
    /// Applies one step of the vote state machine and moves the post's
    /// vote sum by the matching delta, atomically.
    pub fn submit_vote(&self, user_id: i64, post_id: i64, value: VoteValue) -> StoreResult<VoteOutcome> {
        self.transaction(|tx| {
            let community_id: String = tx
                .query_row("SELECT community_id FROM posts WHERE id = ?1", [post_id], |r| r.get(0))
                .optional()?
                .ok_or(StoreError::NotFound("post"))?;

            let existing = query_vote(tx, user_id, post_id)?;
            let transition = VoteValue::transition(existing.map(|v| v.vote_value), value);

            match transition {
                VoteTransition::Added(v) => {
                    tx.execute(
                        "INSERT INTO post_votes (user_id, post_id, community_id, vote_value)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![user_id, post_id, community_id, v.as_i64()],
                    )?;
                }
                VoteTransition::Removed(_) => {
                    tx.execute(
                        "DELETE FROM post_votes WHERE user_id = ?1 AND post_id = ?2",
                        params![user_id, post_id],
                    )?;
                }
                VoteTransition::Changed { to, .. } => {
                    tx.execute(
                        "UPDATE post_votes
                         SET vote_value = ?1, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                         WHERE user_id = ?2 AND post_id = ?3",
                        params![to.as_i64(), user_id, post_id],
                    )?;
                }
            }

            let vote_status: i64 = tx.query_row(
                "UPDATE posts SET vote_status = vote_status + ?1 WHERE id = ?2 RETURNING vote_status",
                params![transition.delta(), post_id],
                |r| r.get(0),
            )?;

            debug!(
                "User {} on post {}: {:?} (vote_status now {})",
                user_id, post_id, transition, vote_status
            );

            Ok(VoteOutcome {
                transition,
                vote_status,
                vote: query_vote(tx, user_id, post_id)?,
            })
        })
    }

    /// The user's votes on posts in one community.
    pub fn user_votes(&self, user_id: i64, community_id: &str) -> StoreResult<Vec<VoteRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM post_votes WHERE user_id = ?1 AND community_id = ?2 ORDER BY created_at DESC, id DESC",
                VoteRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id, community_id], VoteRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_vote(conn: &Connection, user_id: i64, post_id: i64) -> StoreResult<Option<VoteRow>> {
    let sql = format!(
        "SELECT {} FROM post_votes WHERE user_id = ?1 AND post_id = ?2",
        VoteRow::COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![user_id, post_id], VoteRow::from_row)
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn vote_status(db: &Database, post_id: i64) -> i64 {
        db.get_post(post_id).unwrap().unwrap().vote_status
    }

    #[test]
    fn upvote_then_same_again_toggles_off() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let community = testutil::community(&db, "rustaceans", &alice);
        let post = testutil::post(&db, &community, &alice);

        let first = db.submit_vote(alice.id, post.id, VoteValue::Up).unwrap();
        assert_eq!(first.transition, VoteTransition::Added(VoteValue::Up));
        assert_eq!(first.vote_status, 1);
        assert_eq!(first.vote.unwrap().vote_value, VoteValue::Up);

        let second = db.submit_vote(alice.id, post.id, VoteValue::Up).unwrap();
        assert_eq!(second.transition, VoteTransition::Removed(VoteValue::Up));
        assert_eq!(second.vote_status, 0);
        assert!(second.vote.is_none());
        assert_eq!(vote_status(&db, post.id), 0);
        assert!(db.user_votes(alice.id, "rustaceans").unwrap().is_empty());
    }

    #[test]
    fn flipping_moves_sum_by_two() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let bob = testutil::user(&db, "bob");
        let community = testutil::community(&db, "rustaceans", &alice);
        let post = testutil::post(&db, &community, &alice);

        db.submit_vote(bob.id, post.id, VoteValue::Up).unwrap();
        db.submit_vote(alice.id, post.id, VoteValue::Up).unwrap();
        let before = vote_status(&db, post.id);
        assert_eq!(before, 2);

        let flipped = db.submit_vote(alice.id, post.id, VoteValue::Down).unwrap();
        assert_eq!(flipped.vote_status, before - 2);
        assert_eq!(flipped.vote.unwrap().vote_value, VoteValue::Down);

        let votes = db.user_votes(alice.id, "rustaceans").unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].vote_value, VoteValue::Down);
    }

    #[test]
    fn vote_sum_matches_rows_after_mixed_sequence() {
        let db = testutil::db();
        let users: Vec<_> = ["a1", "b2", "c3", "d4"]
            .iter()
            .map(|n| testutil::user(&db, n))
            .collect();
        let community = testutil::community(&db, "rustaceans", &users[0]);
        let post = testutil::post(&db, &community, &users[0]);

        let script = [
            (0, VoteValue::Up),
            (1, VoteValue::Down),
            (2, VoteValue::Up),
            (0, VoteValue::Down),
            (1, VoteValue::Down),
            (3, VoteValue::Up),
            (2, VoteValue::Up),
        ];
        for (who, value) in script {
            db.submit_vote(users[who].id, post.id, value).unwrap();
        }

        let sum: i64 = db
            .with_conn(|c| {
                Ok(c.query_row(
                    "SELECT COALESCE(SUM(vote_value), 0) FROM post_votes WHERE post_id = ?1",
                    [post.id],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(vote_status(&db, post.id), sum);
        assert_eq!(sum, 0); // a: -1, b: none, c: none, d: +1
    }

    #[test]
    fn vote_on_missing_post_is_not_found() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        assert!(matches!(
            db.submit_vote(alice.id, 404, VoteValue::Up),
            Err(StoreError::NotFound(_))
        ));
    }
}
