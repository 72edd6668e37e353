use agora_types::models::PrivacyType;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::models::{CommunityRow, SnippetRow};
use crate::permissions::{Role, authorize};
use crate::{Database, StoreError, StoreResult};

const MIN_ID_LEN: usize = 3;
const MAX_ID_LEN: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember { is_moderator: bool },
}

/// `image_url: Some(None)` clears the image.
#[derive(Debug, Default)]
pub struct CommunityUpdate {
    pub privacy_type: Option<PrivacyType>,
    pub image_url: Option<Option<String>>,
}

impl Database {
    /// Creates the community with its creator enrolled as the first member
    /// and moderator.
    pub fn create_community(
        &self,
        id: &str,
        creator_id: i64,
        privacy_type: PrivacyType,
        image_url: Option<&str>,
    ) -> StoreResult<CommunityRow> {
        validate_community_id(id)?;

        self.transaction(|tx| {
            if query_community(tx, id)?.is_some() {
                return Err(StoreError::Validation(format!(
                    "Sorry, r/{id} is taken. Try another."
                )));
            }

            tx.execute(
                "INSERT INTO communities (id, creator_id, privacy_type, number_of_members, image_url)
                 VALUES (?1, ?2, ?3, 1, ?4)",
                params![id, creator_id, privacy_type.as_str(), image_url],
            )?;
            tx.execute(
                "INSERT INTO community_members (user_id, community_id, is_moderator) VALUES (?1, ?2, 1)",
                params![creator_id, id],
            )?;

            info!("User {} created community r/{}", creator_id, id);
            query_community(tx, id)?.ok_or(StoreError::NotFound("community"))
        })
    }

    /// All communities, largest first.
    pub fn list_communities(&self) -> StoreResult<Vec<CommunityRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM communities ORDER BY number_of_members DESC, created_at DESC",
                CommunityRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], CommunityRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_community(&self, id: &str) -> StoreResult<Option<CommunityRow>> {
        self.with_conn(|conn| query_community(conn, id))
    }

    /// Updates settings on behalf of `actor_id`, who must be the creator or
    /// a moderator.
    pub fn update_community(
        &self,
        id: &str,
        actor_id: i64,
        update: &CommunityUpdate,
    ) -> StoreResult<CommunityRow> {
        self.transaction(|tx| {
            let community = query_community(tx, id)?.ok_or(StoreError::NotFound("community"))?;
            let roles = member_roles(tx, actor_id, id)?;
            authorize(actor_id, community.creator_id, &roles).ensure()?;

            if let Some(privacy_type) = update.privacy_type {
                tx.execute(
                    "UPDATE communities SET privacy_type = ?1 WHERE id = ?2",
                    params![privacy_type.as_str(), id],
                )?;
            }
            if let Some(image_url) = &update.image_url {
                tx.execute(
                    "UPDATE communities SET image_url = ?1 WHERE id = ?2",
                    params![image_url, id],
                )?;
            }
            tx.execute(
                "UPDATE communities SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = ?1",
                [id],
            )?;

            query_community(tx, id)?.ok_or(StoreError::NotFound("community"))
        })
    }

    /// Idempotent: joining twice leaves the roster and the member count as
    /// they were after the first join.
    pub fn join_community(&self, user_id: i64, community_id: &str) -> StoreResult<JoinOutcome> {
        self.transaction(|tx| {
            if query_community(tx, community_id)?.is_none() {
                return Err(StoreError::NotFound("community"));
            }
            if let Some(is_moderator) = query_membership(tx, user_id, community_id)? {
                return Ok(JoinOutcome::AlreadyMember { is_moderator });
            }

            tx.execute(
                "INSERT INTO community_members (user_id, community_id, is_moderator) VALUES (?1, ?2, 0)",
                params![user_id, community_id],
            )?;
            tx.execute(
                "UPDATE communities SET number_of_members = number_of_members + 1 WHERE id = ?1",
                [community_id],
            )?;

            info!("User {} joined r/{}", user_id, community_id);
            Ok(JoinOutcome::Joined)
        })
    }

    pub fn leave_community(&self, user_id: i64, community_id: &str) -> StoreResult<()> {
        self.transaction(|tx| {
            if query_community(tx, community_id)?.is_none() {
                return Err(StoreError::NotFound("community"));
            }

            let removed = tx.execute(
                "DELETE FROM community_members WHERE user_id = ?1 AND community_id = ?2",
                params![user_id, community_id],
            )?;
            if removed == 0 {
                return Err(StoreError::NotMember);
            }
            tx.execute(
                "UPDATE communities SET number_of_members = number_of_members - 1 WHERE id = ?1",
                [community_id],
            )?;

            info!("User {} left r/{}", user_id, community_id);
            Ok(())
        })
    }

    /// The user's memberships, most recently joined first.
    pub fn user_snippets(&self, user_id: i64) -> StoreResult<Vec<SnippetRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.community_id, c.image_url, m.is_moderator
                 FROM community_members m
                 JOIN communities c ON c.id = m.community_id
                 WHERE m.user_id = ?1
                 ORDER BY m.joined_at DESC, m.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(SnippetRow {
                        community_id: row.get(0)?,
                        image_url: row.get(1)?,
                        is_moderator: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Community ids double as URL slugs: 3-21 letters, digits or underscores.
pub fn validate_community_id(id: &str) -> StoreResult<()> {
    let len = id.chars().count();
    if !(MIN_ID_LEN..=MAX_ID_LEN).contains(&len) {
        return Err(StoreError::Validation(format!(
            "Community names must be between {MIN_ID_LEN}-{MAX_ID_LEN} characters"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::Validation(
            "Community names can only contain letters, numbers, or underscores".into(),
        ));
    }
    Ok(())
}

pub(crate) fn query_community(conn: &Connection, id: &str) -> StoreResult<Option<CommunityRow>> {
    let sql = format!("SELECT {} FROM communities WHERE id = ?1", CommunityRow::COLUMNS);
    Ok(conn.query_row(&sql, [id], CommunityRow::from_row).optional()?)
}

/// `Some(is_moderator)` when the user is a member.
fn query_membership(conn: &Connection, user_id: i64, community_id: &str) -> StoreResult<Option<bool>> {
    Ok(conn
        .query_row(
            "SELECT is_moderator FROM community_members WHERE user_id = ?1 AND community_id = ?2",
            params![user_id, community_id],
            |r| r.get(0),
        )
        .optional()?)
}

fn member_roles(conn: &Connection, user_id: i64, community_id: &str) -> StoreResult<Vec<Role>> {
    Ok(match query_membership(conn, user_id, community_id)? {
        Some(true) => vec![Role::Moderator],
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn member_count(db: &Database, id: &str) -> i64 {
        db.get_community(id).unwrap().unwrap().number_of_members
    }

    #[test]
    fn creator_is_enrolled_as_moderator() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let community = testutil::community(&db, "rustaceans", &alice);
        assert_eq!(community.number_of_members, 1);
        assert_eq!(community.privacy_type, PrivacyType::Public);

        let snippets = db.user_snippets(alice.id).unwrap();
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].is_moderator);
    }

    #[test]
    fn duplicate_and_malformed_ids_are_rejected() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        testutil::community(&db, "rustaceans", &alice);

        let dup = db.create_community("rustaceans", alice.id, PrivacyType::Public, None);
        assert!(matches!(dup, Err(StoreError::Validation(_))));
        assert!(matches!(validate_community_id("ab"), Err(StoreError::Validation(_))));
        assert!(matches!(validate_community_id("has space"), Err(StoreError::Validation(_))));
        assert!(matches!(
            validate_community_id("a_name_far_too_long_for_it"),
            Err(StoreError::Validation(_))
        ));
        assert!(validate_community_id("ok_name_42").is_ok());
    }

    #[test]
    fn joining_twice_counts_once() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let bob = testutil::user(&db, "bob");
        testutil::community(&db, "rustaceans", &alice);

        assert_eq!(db.join_community(bob.id, "rustaceans").unwrap(), JoinOutcome::Joined);
        assert_eq!(
            db.join_community(bob.id, "rustaceans").unwrap(),
            JoinOutcome::AlreadyMember { is_moderator: false }
        );
        assert_eq!(member_count(&db, "rustaceans"), 2);
    }

    #[test]
    fn creator_join_reports_moderator() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        testutil::community(&db, "rustaceans", &alice);
        assert_eq!(
            db.join_community(alice.id, "rustaceans").unwrap(),
            JoinOutcome::AlreadyMember { is_moderator: true }
        );
        assert_eq!(member_count(&db, "rustaceans"), 1);
    }

    #[test]
    fn leaving_without_membership_fails_and_keeps_count() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let bob = testutil::user(&db, "bob");
        testutil::community(&db, "rustaceans", &alice);

        assert!(matches!(db.leave_community(bob.id, "rustaceans"), Err(StoreError::NotMember)));
        assert_eq!(member_count(&db, "rustaceans"), 1);
    }

    #[test]
    fn join_then_leave_restores_count() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let bob = testutil::user(&db, "bob");
        testutil::community(&db, "rustaceans", &alice);

        db.join_community(bob.id, "rustaceans").unwrap();
        db.leave_community(bob.id, "rustaceans").unwrap();
        assert_eq!(member_count(&db, "rustaceans"), 1);
        assert!(db.user_snippets(bob.id).unwrap().is_empty());
    }

    #[test]
    fn unknown_community_is_not_found() {
        let db = testutil::db();
        let bob = testutil::user(&db, "bob");
        assert!(matches!(db.join_community(bob.id, "ghost"), Err(StoreError::NotFound(_))));
        assert!(matches!(db.leave_community(bob.id, "ghost"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn only_creator_or_moderator_updates() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let bob = testutil::user(&db, "bob");
        let carol = testutil::user(&db, "carol");
        testutil::community(&db, "rustaceans", &alice);
        db.join_community(bob.id, "rustaceans").unwrap();

        let update = CommunityUpdate {
            privacy_type: Some(PrivacyType::Private),
            ..Default::default()
        };
        assert!(matches!(
            db.update_community("rustaceans", bob.id, &update),
            Err(StoreError::Forbidden)
        ));
        assert!(matches!(
            db.update_community("rustaceans", carol.id, &update),
            Err(StoreError::Forbidden)
        ));

        // Promote bob and retry.
        db.with_conn(|c| {
            c.execute(
                "UPDATE community_members SET is_moderator = 1 WHERE user_id = ?1",
                [bob.id],
            )?;
            Ok(())
        })
        .unwrap();
        let updated = db.update_community("rustaceans", bob.id, &update).unwrap();
        assert_eq!(updated.privacy_type, PrivacyType::Private);

        let image = CommunityUpdate {
            image_url: Some(Some("https://img.example.com/r.png".into())),
            ..Default::default()
        };
        let updated = db.update_community("rustaceans", alice.id, &image).unwrap();
        assert_eq!(updated.image_url.as_deref(), Some("https://img.example.com/r.png"));
        assert_eq!(updated.privacy_type, PrivacyType::Private);
    }

    #[test]
    fn list_orders_by_member_count() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let bob = testutil::user(&db, "bob");
        testutil::community(&db, "small", &alice);
        testutil::community(&db, "large", &alice);
        db.join_community(bob.id, "large").unwrap();

        let ids: Vec<String> = db.list_communities().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["large", "small"]);
    }
}
