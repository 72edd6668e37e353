use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use agora_types::api::{Claims, CommentResponse, CreateCommentRequest};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    pub post: Option<i64>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<CommentQuery>, ApiError>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let rows = run_db(&state, move |db| db.list_comments(query.post)).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// POST /comments/create
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateCommentRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = req
        .post
        .ok_or_else(|| ApiError::Validation("post: This field is required.".into()))?;

    let comment = run_db(&state, move |db| db.add_comment(claims.sub, post_id, &req.text)).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

/// DELETE /comments/{id}/delete. Creator only.
pub async fn delete_comment(
    State(state): State<AppState>,
    WithRejection(Path(comment_id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    run_db(&state, move |db| db.remove_comment(comment_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
