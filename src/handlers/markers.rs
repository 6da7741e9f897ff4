use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use super::{StatusFilter, moderation_target, non_blank};
use crate::{
    AppState,
    error::ApiError,
    extract::{AppJson, AppPath, AppQuery},
    models::{
        BoundingBox, CreateMarkerRequest, Marker, MarkerChanges, MarkerCollection, MarkerFeature,
        MarkerQuery, ModerationStatus, StatusUpdateRequest,
    },
    repository::RepositoryState,
};

/// MarkerFilter
///
/// Query parameters of the public map listing (GET /markers).
#[derive(Debug, Deserialize, IntoParams, Default)]
pub struct MarkerFilter {
    /// Only markers of this category.
    pub category: Option<Uuid>,
    /// Case-insensitive match on name, description or address.
    pub search: Option<String>,
    /// Viewport as `minLon,minLat,maxLon,maxLat`.
    #[param(example = "2.25,48.81,2.42,48.90")]
    pub bbox: Option<String>,
}

/// Visitors only ever see approved markers; anything else is reported as missing.
pub(crate) async fn approved_marker(repo: &RepositoryState, id: Uuid) -> Result<Marker, ApiError> {
    repo.get_marker(id)
        .await?
        .filter(|marker| marker.status == ModerationStatus::Approved)
        .ok_or_else(|| ApiError::not_found("marker"))
}

/// Rejects references to categories that do not exist with a 400 rather than letting
/// the foreign key surface as a conflict.
pub(crate) async fn ensure_category(repo: &RepositoryState, id: Uuid) -> Result<(), ApiError> {
    match repo.get_category(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::Validation(format!("unknown category {id}"))),
    }
}

/// get_markers
///
/// [Public Route] Approved markers as a GeoJSON FeatureCollection.
#[utoipa::path(
    get,
    path = "/markers",
    params(MarkerFilter),
    responses(
        (status = 200, description = "Approved markers", body = MarkerCollection),
        (status = 400, description = "Malformed bbox")
    )
)]
pub async fn get_markers(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<MarkerFilter>,
) -> Result<Json<MarkerCollection>, ApiError> {
    let bbox = filter
        .bbox
        .as_deref()
        .map(str::parse::<BoundingBox>)
        .transpose()?;

    let query = MarkerQuery {
        status: Some(ModerationStatus::Approved),
        category_id: filter.category,
        search: non_blank(filter.search),
        bbox,
    };

    let markers = state.repo.list_markers(&query).await?;
    Ok(Json(MarkerCollection::from_markers(markers, false)))
}

/// get_marker
///
/// [Public Route] A single approved marker.
#[utoipa::path(
    get,
    path = "/markers/{id}",
    params(("id" = Uuid, Path, description = "Marker ID")),
    responses(
        (status = 200, description = "Found", body = MarkerFeature),
        (status = 404, description = "Not found or not approved")
    )
)]
pub async fn get_marker(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<MarkerFeature>, ApiError> {
    let marker = approved_marker(&state.repo, id).await?;
    Ok(Json(marker.into_feature(false)))
}

/// create_marker
///
/// [Public Route, rate limited] Visitor submission. The marker is stored as `pending`
/// and stays off the public map until approved.
#[utoipa::path(
    post,
    path = "/markers",
    request_body = CreateMarkerRequest,
    responses(
        (status = 201, description = "Submitted for review", body = MarkerFeature),
        (status = 400, description = "Invalid payload or unknown category"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn create_marker(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<CreateMarkerRequest>,
) -> Result<(StatusCode, Json<MarkerFeature>), ApiError> {
    payload.name = payload.name.trim().to_string();
    payload.submitter_email = non_blank(payload.submitter_email).map(|e| e.to_lowercase());
    payload.submitter_name = non_blank(payload.submitter_name);
    payload.validate()?;
    ensure_category(&state.repo, payload.category_id).await?;

    let marker = state.repo.create_marker(payload).await?;
    tracing::info!(marker_id = %marker.id, "marker submitted");

    Ok((StatusCode::CREATED, Json(marker.into_feature(false))))
}

/// get_admin_markers
///
/// [Admin Route] Every marker, newest first, including submitter details.
#[utoipa::path(
    get,
    path = "/admin/markers",
    params(StatusFilter),
    responses((status = 200, description = "All markers", body = MarkerCollection))
)]
pub async fn get_admin_markers(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<StatusFilter>,
) -> Result<Json<MarkerCollection>, ApiError> {
    let query = MarkerQuery {
        status: filter.status,
        ..MarkerQuery::default()
    };
    let markers = state.repo.list_markers(&query).await?;
    Ok(Json(MarkerCollection::from_markers(markers, true)))
}

/// update_marker
///
/// [Admin Route] Direct partial edit. Absent fields are kept.
#[utoipa::path(
    put,
    path = "/admin/markers/{id}",
    params(("id" = Uuid, Path, description = "Marker ID")),
    request_body = MarkerChanges,
    responses(
        (status = 200, description = "Updated", body = MarkerFeature),
        (status = 400, description = "Invalid or empty changes"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_marker(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(mut changes): AppJson<MarkerChanges>,
) -> Result<Json<MarkerFeature>, ApiError> {
    changes.name = changes.name.map(|name| name.trim().to_string());
    changes.validate()?;
    if changes.is_empty() {
        return Err(ApiError::Validation("no changes provided".to_string()));
    }
    if let Some(category_id) = changes.category_id {
        ensure_category(&state.repo, category_id).await?;
    }

    let marker = state
        .repo
        .update_marker(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("marker"))?;

    Ok(Json(marker.into_feature(true)))
}

/// update_marker_status
///
/// [Admin Route] Approve or reject a marker.
#[utoipa::path(
    put,
    path = "/admin/markers/{id}/status",
    params(("id" = Uuid, Path, description = "Marker ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Moderated", body = MarkerFeature),
        (status = 400, description = "Status is not a decision"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_marker_status(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<StatusUpdateRequest>,
) -> Result<Json<MarkerFeature>, ApiError> {
    let status = moderation_target(payload.status)?;

    let marker = state
        .repo
        .set_marker_status(id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("marker"))?;

    tracing::info!(marker_id = %id, %status, "marker moderated");
    Ok(Json(marker.into_feature(true)))
}

/// delete_marker
///
/// [Admin Route] Removes a marker along with its comments and edit requests.
#[utoipa::path(
    delete,
    path = "/admin/markers/{id}",
    params(("id" = Uuid, Path, description = "Marker ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_marker(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_marker(id).await? {
        tracing::info!(marker_id = %id, "marker deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("marker"))
    }
}
