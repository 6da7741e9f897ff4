use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use super::{StatusFilter, markers::approved_marker, moderation_target};
use crate::{
    AppState,
    error::ApiError,
    extract::{AppJson, AppPath, AppQuery},
    models::{Comment, CommentQuery, CreateCommentRequest, ModerationStatus, StatusUpdateRequest},
};

/// get_marker_comments
///
/// [Public Route] Approved comments of an approved marker, oldest first.
#[utoipa::path(
    get,
    path = "/markers/{id}/comments",
    params(("id" = Uuid, Path, description = "Marker ID")),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 404, description = "Marker not found or not approved")
    )
)]
pub async fn get_marker_comments(
    State(state): State<AppState>,
    AppPath(marker_id): AppPath<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    approved_marker(&state.repo, marker_id).await?;

    let query = CommentQuery {
        marker_id: Some(marker_id),
        status: Some(ModerationStatus::Approved),
    };
    Ok(Json(state.repo.list_comments(&query).await?))
}

/// create_comment
///
/// [Public Route, rate limited] Posts a comment, held as `pending` until moderated.
#[utoipa::path(
    post,
    path = "/markers/{id}/comments",
    params(("id" = Uuid, Path, description = "Marker ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Submitted for review", body = Comment),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Marker not found or not approved"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn create_comment(
    State(state): State<AppState>,
    AppPath(marker_id): AppPath<Uuid>,
    AppJson(mut payload): AppJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    payload.author_name = payload.author_name.trim().to_string();
    payload.content = payload.content.trim().to_string();
    payload.validate()?;

    approved_marker(&state.repo, marker_id).await?;

    let comment = state.repo.create_comment(marker_id, payload).await?;
    tracing::info!(comment_id = %comment.id, %marker_id, "comment submitted");

    Ok((StatusCode::CREATED, Json(comment)))
}

/// get_admin_comments
///
/// [Admin Route] Moderation queue across all markers, newest first.
#[utoipa::path(
    get,
    path = "/admin/comments",
    params(StatusFilter),
    responses((status = 200, description = "All comments", body = [Comment]))
)]
pub async fn get_admin_comments(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<StatusFilter>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let query = CommentQuery {
        marker_id: None,
        status: filter.status,
    };
    Ok(Json(state.repo.list_comments(&query).await?))
}

/// update_comment_status
///
/// [Admin Route] Approve or reject a comment.
#[utoipa::path(
    put,
    path = "/admin/comments/{id}/status",
    params(("id" = Uuid, Path, description = "Comment ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Moderated", body = Comment),
        (status = 400, description = "Status is not a decision"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_comment_status(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<StatusUpdateRequest>,
) -> Result<Json<Comment>, ApiError> {
    let status = moderation_target(payload.status)?;

    let comment = state
        .repo
        .set_comment_status(id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("comment"))?;

    tracing::info!(comment_id = %id, %status, "comment moderated");
    Ok(Json(comment))
}

/// delete_comment
#[utoipa::path(
    delete,
    path = "/admin/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_comment(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("comment"))
    }
}
