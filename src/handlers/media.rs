use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    AppState,
    error::ApiError,
    extract::AppJson,
    models::{UploadSignatureRequest, UploadSignatureResponse},
};

/// create_upload_signature
///
/// [Public Route, rate limited] Signs a direct browser upload to the media host. The
/// file never transits through this server and the host secret never leaves it.
#[utoipa::path(
    post,
    path = "/uploads/signature",
    request_body = UploadSignatureRequest,
    responses(
        (status = 200, description = "Signed upload parameters", body = UploadSignatureResponse),
        (status = 400, description = "Invalid folder"),
        (status = 429, description = "Rate limited"),
        (status = 502, description = "Media host unavailable")
    )
)]
pub async fn create_upload_signature(
    State(state): State<AppState>,
    AppJson(payload): AppJson<UploadSignatureRequest>,
) -> Result<Json<UploadSignatureResponse>, ApiError> {
    let signed = state
        .media
        .sign_upload(payload.folder.as_deref(), Utc::now().timestamp())?;

    tracing::debug!(folder = %signed.folder, "upload signed");
    Ok(Json(signed))
}
