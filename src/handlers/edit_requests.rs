use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use super::{
    StatusFilter,
    markers::{approved_marker, ensure_category},
    non_blank,
};
use crate::{
    AppState,
    auth::AuthAdmin,
    error::ApiError,
    extract::{AppJson, AppPath, AppQuery},
    models::{CreateEditRequest, EditRequest, ReviewRequest},
};

/// create_edit_request
///
/// [Public Route, rate limited] Proposes changes to an approved marker. Nothing is
/// applied until an admin approves the request.
#[utoipa::path(
    post,
    path = "/markers/{id}/edit-requests",
    params(("id" = Uuid, Path, description = "Marker ID")),
    request_body = CreateEditRequest,
    responses(
        (status = 201, description = "Submitted for review", body = EditRequest),
        (status = 400, description = "Invalid, empty changes or unknown category"),
        (status = 404, description = "Marker not found or not approved"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn create_edit_request(
    State(state): State<AppState>,
    AppPath(marker_id): AppPath<Uuid>,
    AppJson(mut payload): AppJson<CreateEditRequest>,
) -> Result<(StatusCode, Json<EditRequest>), ApiError> {
    // A blank name would pass the length check untrimmed.
    payload.changes.name = payload.changes.name.map(|name| name.trim().to_string());
    payload.validate()?;
    if payload.changes.is_empty() {
        return Err(ApiError::Validation("no changes proposed".to_string()));
    }

    approved_marker(&state.repo, marker_id).await?;
    if let Some(category_id) = payload.changes.category_id {
        ensure_category(&state.repo, category_id).await?;
    }

    payload.reason = non_blank(payload.reason);
    payload.requester_name = non_blank(payload.requester_name);

    let request = state.repo.create_edit_request(marker_id, payload).await?;
    tracing::info!(edit_request_id = %request.id, %marker_id, "edit request submitted");

    Ok((StatusCode::CREATED, Json(request)))
}

/// get_admin_edit_requests
///
/// [Admin Route] Edit requests, newest first.
#[utoipa::path(
    get,
    path = "/admin/edit-requests",
    params(StatusFilter),
    responses((status = 200, description = "Edit requests", body = [EditRequest]))
)]
pub async fn get_admin_edit_requests(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<StatusFilter>,
) -> Result<Json<Vec<EditRequest>>, ApiError> {
    Ok(Json(state.repo.list_edit_requests(filter.status).await?))
}

/// approve_edit_request
///
/// [Admin Route] Applies the proposed changes to the marker and closes the request in
/// a single transaction. A request that was already reviewed answers 409.
#[utoipa::path(
    post,
    path = "/admin/edit-requests/{id}/approve",
    params(("id" = Uuid, Path, description = "Edit request ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Approved and applied", body = EditRequest),
        (status = 404, description = "Edit request or marker not found"),
        (status = 409, description = "Already reviewed")
    )
)]
pub async fn approve_edit_request(
    admin: AuthAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ReviewRequest>,
) -> Result<Json<EditRequest>, ApiError> {
    payload.validate()?;

    let approved = state
        .repo
        .approve_edit_request(id, admin.id, non_blank(payload.note))
        .await?;

    tracing::info!(edit_request_id = %id, marker_id = %approved.marker_id, admin_id = %admin.id, "edit request approved");
    Ok(Json(approved))
}

/// reject_edit_request
///
/// [Admin Route] Closes the request without touching the marker.
#[utoipa::path(
    post,
    path = "/admin/edit-requests/{id}/reject",
    params(("id" = Uuid, Path, description = "Edit request ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Rejected", body = EditRequest),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already reviewed")
    )
)]
pub async fn reject_edit_request(
    admin: AuthAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ReviewRequest>,
) -> Result<Json<EditRequest>, ApiError> {
    payload.validate()?;

    let rejected = state
        .repo
        .reject_edit_request(id, admin.id, non_blank(payload.note))
        .await?;

    tracing::info!(edit_request_id = %id, admin_id = %admin.id, "edit request rejected");
    Ok(Json(rejected))
}
