use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::info;

use agora_types::api::{
    Claims, CreatePostRequest, PostResponse, PostVoteResponse, VoteRequest, VoteResponse,
};
use agora_types::models::{VoteTransition, VoteValue};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    pub community_id: Option<String>,
    /// Unparseable limits are ignored rather than rejected.
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VotesQuery {
    pub community_id: Option<String>,
}

pub async fn list_posts(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<PostQuery>, ApiError>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let limit = query.limit.as_deref().and_then(|l| l.trim().parse::<u32>().ok());
    let community_id = query.community_id.filter(|c| !c.is_empty());

    let rows = run_db(&state, move |db| db.list_posts(community_id.as_deref(), limit)).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// POST /posts/create
pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreatePostRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let community_id = req
        .community_id
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("community_id: This field is required.".into()))?;
    let image_url = req.image_url.filter(|u| !u.trim().is_empty());

    let post = run_db(&state, move |db| {
        db.create_post(claims.sub, &community_id, &req.title, &req.body, image_url.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

pub async fn get_post(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = run_db(&state, move |db| db.get_post(post_id))
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    Ok(Json(post.into()))
}

/// DELETE /posts/{id}. Creator only; comments and votes go with it.
pub async fn delete_post(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    run_db(&state, move |db| db.delete_post(post_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /posts/{id}/vote: `vote_value` of 1 or -1. Repeating the current
/// vote withdraws it.
pub async fn vote_post(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<VoteRequest>, ApiError>,
) -> Result<Json<VoteResponse>, ApiError> {
    let value = req
        .vote_value
        .and_then(|v| VoteValue::try_from(v).ok())
        .ok_or_else(|| ApiError::Validation("Invalid vote value".into()))?;

    let user_id = claims.sub;
    let outcome = run_db(&state, move |db| db.submit_vote(user_id, post_id, value)).await?;
    info!(
        "{} by {} on post {} (vote_status {})",
        outcome.transition.message(),
        claims.username,
        post_id,
        outcome.vote_status
    );

    Ok(Json(VoteResponse {
        message: outcome.transition.message().to_string(),
        vote_status: outcome.vote_status,
        removed: matches!(outcome.transition, VoteTransition::Removed(_)),
        vote: outcome.vote.map(PostVoteResponse::from),
    }))
}

/// GET /posts/votes?community_id=: the caller's votes in one community.
pub async fn user_votes(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<VotesQuery>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<PostVoteResponse>>, ApiError> {
    let Some(community_id) = query.community_id.filter(|c| !c.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    let rows = run_db(&state, move |db| db.user_votes(claims.sub, &community_id)).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
