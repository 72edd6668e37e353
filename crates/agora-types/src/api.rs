//! Request and response bodies for the REST API.
//!
//! Response fields use the camelCase names clients already depend on; each
//! rename is spelled out per field so the wire name of every storage column
//! is visible here. Request bodies keep their historical snake_case names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{PrivacyType, VoteValue};

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims for both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub token_type: TokenType,
    pub jti: Uuid,
    pub exp: usize,
}

// -- Users --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Partial profile update. An empty `photoURL` clears the photo.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "photoURL", alias = "photo_url")]
    pub photo_url: Option<String>,
}

// -- Communities --

#[derive(Debug, Deserialize)]
pub struct CreateCommunityRequest {
    pub id: String,
    #[serde(rename = "privacyType", alias = "privacy_type")]
    pub privacy_type: Option<String>,
    #[serde(rename = "imageURL", alias = "image_url")]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCommunityRequest {
    #[serde(rename = "privacyType", alias = "privacy_type")]
    pub privacy_type: Option<String>,
    #[serde(rename = "imageURL", alias = "image_url")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunityResponse {
    pub id: String,
    #[serde(rename = "communityId")]
    pub community_id: String,
    #[serde(rename = "creatorId")]
    pub creator_id: i64,
    #[serde(rename = "privacyType")]
    pub privacy_type: PrivacyType,
    #[serde(rename = "numberOfMembers")]
    pub number_of_members: i64,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// One of the caller's memberships.
#[derive(Debug, Clone, Serialize)]
pub struct CommunitySnippet {
    pub id: String,
    #[serde(rename = "communityId")]
    pub community_id: String,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    #[serde(rename = "isModerator")]
    pub is_moderator: bool,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub message: String,
    #[serde(rename = "isModerator", skip_serializing_if = "Option::is_none")]
    pub is_moderator: Option<bool>,
}

// -- Posts --

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub community_id: Option<String>,
    #[serde(alias = "imageURL")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostResponse {
    pub id: i64,
    #[serde(rename = "communityId")]
    pub community_id: String,
    #[serde(rename = "communityImageURL")]
    pub community_image_url: Option<String>,
    #[serde(rename = "creatorId")]
    pub creator_id: i64,
    #[serde(rename = "creatorDisplayText")]
    pub creator_display_text: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    #[serde(rename = "numberOfComments")]
    pub number_of_comments: i64,
    #[serde(rename = "voteStatus")]
    pub vote_status: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "editedAt")]
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote_value: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostVoteResponse {
    pub id: i64,
    #[serde(rename = "postId")]
    pub post_id: i64,
    #[serde(rename = "communityId")]
    pub community_id: String,
    #[serde(rename = "voteValue")]
    pub vote_value: VoteValue,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub message: String,
    pub vote_status: i64,
    pub removed: bool,
    #[serde(flatten)]
    pub vote: Option<PostVoteResponse>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub text: String,
    pub post: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    #[serde(rename = "postId")]
    pub post_id: i64,
    #[serde(rename = "postTitle")]
    pub post_title: String,
    #[serde(rename = "communityId")]
    pub community_id: String,
    #[serde(rename = "creatorId")]
    pub creator_id: i64,
    #[serde(rename = "creatorDisplayText")]
    pub creator_display_text: String,
    #[serde(rename = "creatorPhotoURL")]
    pub creator_photo_url: Option<String>,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_response_inlines_the_vote() {
        let resp = VoteResponse {
            message: "Vote added".into(),
            vote_status: 1,
            removed: false,
            vote: Some(PostVoteResponse {
                id: 7,
                post_id: 3,
                community_id: "rust".into(),
                vote_value: VoteValue::Up,
            }),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["vote_status"], 1);
        assert_eq!(json["postId"], 3);
        assert_eq!(json["voteValue"], 1);

        let removed = VoteResponse {
            message: "Vote removed".into(),
            vote_status: 0,
            removed: true,
            vote: None,
        };
        let json = serde_json::to_value(&removed).unwrap();
        assert!(json.get("voteValue").is_none());
    }

    #[test]
    fn community_request_accepts_both_spellings() {
        let a: CreateCommunityRequest =
            serde_json::from_str(r#"{"id":"rust","privacyType":"private"}"#).unwrap();
        let b: CreateCommunityRequest =
            serde_json::from_str(r#"{"id":"rust","privacy_type":"private"}"#).unwrap();
        assert_eq!(a.privacy_type.as_deref(), Some("private"));
        assert_eq!(b.privacy_type.as_deref(), Some("private"));
    }
}
