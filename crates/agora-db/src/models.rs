//! Row types mapped straight from SQLite, and their conversions into the
//! API response bodies.

use agora_types::api::{
    CommentResponse, CommunityResponse, CommunitySnippet, PostResponse, PostVoteResponse,
    UserResponse,
};
use agora_types::models::{PrivacyType, VoteValue, display_name};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub photo_url: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub(crate) const COLUMNS: &'static str =
        "id, username, email, password, photo_url, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            photo_url: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    pub fn display_name(&self) -> String {
        display_name(&self.username, &self.email)
    }
}

#[derive(Debug, Clone)]
pub struct CommunityRow {
    pub id: String,
    pub creator_id: i64,
    pub privacy_type: PrivacyType,
    pub number_of_members: i64,
    pub image_url: Option<String>,
    pub created_at: String,
}

impl CommunityRow {
    pub(crate) const COLUMNS: &'static str =
        "id, creator_id, privacy_type, number_of_members, image_url, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let privacy: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            creator_id: row.get(1)?,
            privacy_type: privacy
                .parse()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
            number_of_members: row.get(3)?,
            image_url: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SnippetRow {
    pub community_id: String,
    pub image_url: Option<String>,
    pub is_moderator: bool,
}

/// Post joined with its community image and creator identity.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: i64,
    pub community_id: String,
    pub community_image_url: Option<String>,
    pub creator_id: i64,
    pub creator_display_name: String,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub number_of_comments: i64,
    pub vote_status: i64,
    pub created_at: String,
    pub edited_at: String,
}

impl PostRow {
    pub(crate) const SELECT: &'static str = "
        SELECT p.id, p.community_id, c.image_url, p.creator_id, u.username, u.email,
               p.title, p.body, p.image_url, p.number_of_comments, p.vote_status,
               p.created_at, p.edited_at
        FROM posts p
        JOIN communities c ON c.id = p.community_id
        JOIN users u ON u.id = p.creator_id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let username: String = row.get(4)?;
        let email: String = row.get(5)?;
        Ok(Self {
            id: row.get(0)?,
            community_id: row.get(1)?,
            community_image_url: row.get(2)?,
            creator_id: row.get(3)?,
            creator_display_name: display_name(&username, &email),
            title: row.get(6)?,
            body: row.get(7)?,
            image_url: row.get(8)?,
            number_of_comments: row.get(9)?,
            vote_status: row.get(10)?,
            created_at: row.get(11)?,
            edited_at: row.get(12)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRow {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub community_id: String,
    pub vote_value: VoteValue,
}

impl VoteRow {
    pub(crate) const COLUMNS: &'static str = "id, user_id, post_id, community_id, vote_value";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let value: i64 = row.get(4)?;
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            post_id: row.get(2)?,
            community_id: row.get(3)?,
            vote_value: VoteValue::try_from(value).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Integer, Box::new(e))
            })?,
        })
    }
}

/// Comment joined with its post title and creator identity. The creator's
/// current photo wins over the one copied at creation time.
#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub post_title: String,
    pub community_id: String,
    pub creator_id: i64,
    pub creator_display_name: String,
    pub creator_photo_url: Option<String>,
    pub text: String,
    pub created_at: String,
}

impl CommentRow {
    pub(crate) const SELECT: &'static str = "
        SELECT cm.id, cm.post_id, p.title, cm.community_id, cm.creator_id,
               u.username, u.email, COALESCE(u.photo_url, cm.creator_photo_url),
               cm.text, cm.created_at
        FROM comments cm
        JOIN posts p ON p.id = cm.post_id
        JOIN users u ON u.id = cm.creator_id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let username: String = row.get(5)?;
        let email: String = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            post_title: row.get(2)?,
            community_id: row.get(3)?,
            creator_id: row.get(4)?,
            creator_display_name: display_name(&username, &email),
            creator_photo_url: row.get(7)?,
            text: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS.SSS" without a zone;
/// they are always UTC.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

// -- Conversions into API bodies --

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            display_name: row.display_name(),
            created_at: parse_timestamp(&row.created_at),
            id: row.id,
            username: row.username,
            email: row.email,
            photo_url: row.photo_url,
        }
    }
}

impl From<CommunityRow> for CommunityResponse {
    fn from(row: CommunityRow) -> Self {
        Self {
            community_id: row.id.clone(),
            created_at: parse_timestamp(&row.created_at),
            id: row.id,
            creator_id: row.creator_id,
            privacy_type: row.privacy_type,
            number_of_members: row.number_of_members,
            image_url: row.image_url,
        }
    }
}

impl From<SnippetRow> for CommunitySnippet {
    fn from(row: SnippetRow) -> Self {
        Self {
            id: row.community_id.clone(),
            community_id: row.community_id,
            image_url: row.image_url,
            is_moderator: row.is_moderator,
        }
    }
}

impl From<PostRow> for PostResponse {
    fn from(row: PostRow) -> Self {
        Self {
            created_at: parse_timestamp(&row.created_at),
            edited_at: parse_timestamp(&row.edited_at),
            id: row.id,
            community_id: row.community_id,
            community_image_url: row.community_image_url,
            creator_id: row.creator_id,
            creator_display_text: row.creator_display_name,
            title: row.title,
            body: row.body,
            image_url: row.image_url,
            number_of_comments: row.number_of_comments,
            vote_status: row.vote_status,
        }
    }
}

impl From<VoteRow> for PostVoteResponse {
    fn from(row: VoteRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            community_id: row.community_id,
            vote_value: row.vote_value,
        }
    }
}

impl From<CommentRow> for CommentResponse {
    fn from(row: CommentRow) -> Self {
        Self {
            created_at: parse_timestamp(&row.created_at),
            id: row.id,
            post_id: row.post_id,
            post_title: row.post_title,
            community_id: row.community_id,
            creator_id: row.creator_id,
            creator_display_text: row.creator_display_name,
            creator_photo_url: row.creator_photo_url,
            text: row.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_sqlite_timestamps() {
        let ts = parse_timestamp("2024-03-05 12:34:56.789");
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.second(), 56);
        assert_eq!(ts.timestamp_subsec_millis(), 789);

        let ts = parse_timestamp("2024-03-05 12:34:56");
        assert_eq!(ts.minute(), 34);
    }

    #[test]
    fn corrupt_timestamp_falls_back_to_epoch() {
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }
}
