use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use agora_db::communities::{CommunityUpdate, JoinOutcome};
use agora_types::api::{
    Claims, CommunityResponse, CommunitySnippet, CreateCommunityRequest, MembershipResponse,
    UpdateCommunityRequest,
};
use agora_types::models::PrivacyType;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

pub async fn list_communities(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommunityResponse>>, ApiError> {
    let rows = run_db(&state, |db| db.list_communities()).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn create_community(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateCommunityRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let privacy_type = parse_privacy(req.privacy_type.as_deref())?.unwrap_or_default();
    let image_url = non_empty(req.image_url);
    let id = req.id.trim().to_string();

    let community = run_db(&state, move |db| {
        db.create_community(&id, claims.sub, privacy_type, image_url.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(CommunityResponse::from(community))))
}

pub async fn get_community(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<String>, ApiError>,
) -> Result<Json<CommunityResponse>, ApiError> {
    let community = run_db(&state, move |db| db.get_community(&id))
        .await?
        .ok_or(ApiError::NotFound("community"))?;
    Ok(Json(community.into()))
}

/// PATCH /communities/{id}. Creator or moderators only.
pub async fn update_community(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<String>, ApiError>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateCommunityRequest>, ApiError>,
) -> Result<Json<CommunityResponse>, ApiError> {
    let update = CommunityUpdate {
        privacy_type: parse_privacy(req.privacy_type.as_deref())?,
        image_url: req.image_url.map(|url| non_empty(Some(url))),
    };

    let community = run_db(&state, move |db| db.update_community(&id, claims.sub, &update)).await?;
    Ok(Json(community.into()))
}

pub async fn join_community(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<String>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let outcome = run_db(&state, move |db| db.join_community(claims.sub, &id)).await?;

    Ok(Json(match outcome {
        JoinOutcome::Joined => MembershipResponse {
            message: "Successfully joined community".into(),
            is_moderator: None,
        },
        JoinOutcome::AlreadyMember { is_moderator } => MembershipResponse {
            message: "Already a member".into(),
            is_moderator: Some(is_moderator),
        },
    }))
}

pub async fn leave_community(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<String>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MembershipResponse>, ApiError> {
    run_db(&state, move |db| db.leave_community(claims.sub, &id)).await?;

    Ok(Json(MembershipResponse {
        message: "Successfully left community".into(),
        is_moderator: None,
    }))
}

/// GET /communities/user/snippets: the caller's memberships.
pub async fn user_snippets(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<CommunitySnippet>>, ApiError> {
    let rows = run_db(&state, move |db| db.user_snippets(claims.sub)).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

fn parse_privacy(raw: Option<&str>) -> Result<Option<PrivacyType>, ApiError> {
    raw.map(|s| s.parse::<PrivacyType>())
        .transpose()
        .map_err(|e| ApiError::Validation(format!("privacyType: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
