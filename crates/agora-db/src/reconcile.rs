use tracing::{info, warn};

use crate::{Database, StoreResult};

/// Rows whose cached counter disagreed with the dependent rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub member_counts: usize,
    pub comment_counts: usize,
    pub vote_sums: usize,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.member_counts + self.comment_counts + self.vote_sums
    }
}

const MEMBER_COUNT: &str =
    "(SELECT COUNT(*) FROM community_members m WHERE m.community_id = communities.id)";
const COMMENT_COUNT: &str = "(SELECT COUNT(*) FROM comments c WHERE c.post_id = posts.id)";
const VOTE_SUM: &str =
    "(SELECT COALESCE(SUM(v.vote_value), 0) FROM post_votes v WHERE v.post_id = posts.id)";

impl Database {
    /// Recomputes every cached counter from its dependent rows. Request
    /// paths never call this; it repairs drift left by out-of-band writes.
    pub fn reconcile_counters(&self) -> StoreResult<ReconcileReport> {
        let report = self.transaction(|tx| {
            let member_counts = tx.execute(
                &format!(
                    "UPDATE communities SET number_of_members = {MEMBER_COUNT}
                     WHERE number_of_members <> {MEMBER_COUNT}"
                ),
                [],
            )?;
            let comment_counts = tx.execute(
                &format!(
                    "UPDATE posts SET number_of_comments = {COMMENT_COUNT}
                     WHERE number_of_comments <> {COMMENT_COUNT}"
                ),
                [],
            )?;
            let vote_sums = tx.execute(
                &format!("UPDATE posts SET vote_status = {VOTE_SUM} WHERE vote_status <> {VOTE_SUM}"),
                [],
            )?;
            Ok(ReconcileReport {
                member_counts,
                comment_counts,
                vote_sums,
            })
        })?;

        if report.total() > 0 {
            warn!("Reconciled drifted counters: {:?}", report);
        } else {
            info!("All cached counters consistent");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use agora_types::models::VoteValue;

    #[test]
    fn consistent_store_is_untouched() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let bob = testutil::user(&db, "bob");
        let community = testutil::community(&db, "rustaceans", &alice);
        let post = testutil::post(&db, &community, &alice);
        db.join_community(bob.id, "rustaceans").unwrap();
        db.add_comment(bob.id, post.id, "hi").unwrap();
        db.submit_vote(bob.id, post.id, VoteValue::Down).unwrap();

        assert_eq!(db.reconcile_counters().unwrap(), ReconcileReport::default());
    }

    #[test]
    fn drifted_counters_are_repaired() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let community = testutil::community(&db, "rustaceans", &alice);
        let post = testutil::post(&db, &community, &alice);
        db.add_comment(alice.id, post.id, "hi").unwrap();
        db.submit_vote(alice.id, post.id, VoteValue::Up).unwrap();

        db.with_conn(|c| {
            c.execute_batch(
                "UPDATE communities SET number_of_members = 7;
                 UPDATE posts SET number_of_comments = 0, vote_status = -3;",
            )?;
            Ok(())
        })
        .unwrap();

        let report = db.reconcile_counters().unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                member_counts: 1,
                comment_counts: 1,
                vote_sums: 1,
            }
        );

        let post = db.get_post(post.id).unwrap().unwrap();
        assert_eq!(post.number_of_comments, 1);
        assert_eq!(post.vote_status, 1);
        assert_eq!(db.get_community("rustaceans").unwrap().unwrap().number_of_members, 1);
    }
}
