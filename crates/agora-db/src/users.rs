use rusqlite::{Connection, OptionalExtension, params};

use crate::models::UserRow;
use crate::{Database, StoreError, StoreResult};

/// Fields a user may change on their own profile. `photo_url: Some(None)`
/// clears the photo.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<Option<String>>,
}

impl Database {
    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> StoreResult<UserRow> {
        self.transaction(|tx| {
            ensure_identity_free(tx, Some(username), Some(email), None)?;
            tx.execute(
                "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )?;
            query_user_by_id(tx, tx.last_insert_rowid())?.ok_or(StoreError::NotFound("user"))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE email = ?1", UserRow::COLUMNS);
            Ok(conn.query_row(&sql, [email], UserRow::from_row).optional()?)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn update_profile(&self, id: i64, update: &ProfileUpdate) -> StoreResult<UserRow> {
        self.transaction(|tx| {
            if query_user_by_id(tx, id)?.is_none() {
                return Err(StoreError::NotFound("user"));
            }
            ensure_identity_free(tx, update.username.as_deref(), update.email.as_deref(), Some(id))?;

            if let Some(username) = &update.username {
                tx.execute("UPDATE users SET username = ?1 WHERE id = ?2", params![username, id])?;
            }
            if let Some(email) = &update.email {
                tx.execute("UPDATE users SET email = ?1 WHERE id = ?2", params![email, id])?;
            }
            if let Some(photo_url) = &update.photo_url {
                tx.execute("UPDATE users SET photo_url = ?1 WHERE id = ?2", params![photo_url, id])?;
            }
            tx.execute(
                "UPDATE users SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = ?1",
                [id],
            )?;

            query_user_by_id(tx, id)?.ok_or(StoreError::NotFound("user"))
        })
    }
}

pub(crate) fn query_user_by_id(conn: &Connection, id: i64) -> StoreResult<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", UserRow::COLUMNS);
    Ok(conn.query_row(&sql, [id], UserRow::from_row).optional()?)
}

/// Rejects a username or email already held by a user other than `owner`.
fn ensure_identity_free(
    conn: &Connection,
    username: Option<&str>,
    email: Option<&str>,
    owner: Option<i64>,
) -> StoreResult<()> {
    if let Some(email) = email {
        let taken: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1 AND (?2 IS NULL OR id <> ?2)",
                params![email, owner],
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(StoreError::Validation("A user with this email already exists.".into()));
        }
    }

    if let Some(username) = username {
        let taken: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1 AND (?2 IS NULL OR id <> ?2)",
                params![username, owner],
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(StoreError::Validation("A user with that username already exists.".into()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn duplicate_email_is_rejected_and_not_created() {
        let db = testutil::db();
        db.create_user("alice", "alice@example.com", "h").unwrap();

        let err = db.create_user("alice2", "ALICE@example.com", "h").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let count: i64 = db
            .with_conn(|c| Ok(c.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = testutil::db();
        db.create_user("alice", "a@example.com", "h").unwrap();
        let err = db.create_user("alice", "b@example.com", "h").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn lookup_by_email() {
        let db = testutil::db();
        let created = testutil::user(&db, "carol");
        let found = db.get_user_by_email("carol@example.com").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn profile_update_keeps_uniqueness() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        testutil::user(&db, "bob");

        let clash = ProfileUpdate {
            username: Some("bob".into()),
            ..Default::default()
        };
        assert!(matches!(db.update_profile(alice.id, &clash), Err(StoreError::Validation(_))));

        // Re-submitting your own email is not a clash.
        let same = ProfileUpdate {
            email: Some("alice@example.com".into()),
            photo_url: Some(Some("https://img.example.com/a.png".into())),
            ..Default::default()
        };
        let updated = db.update_profile(alice.id, &same).unwrap();
        assert_eq!(updated.photo_url.as_deref(), Some("https://img.example.com/a.png"));

        let cleared = db
            .update_profile(alice.id, &ProfileUpdate { photo_url: Some(None), ..Default::default() })
            .unwrap();
        assert!(cleared.photo_url.is_none());
    }
}
