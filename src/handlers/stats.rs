use axum::{Json, extract::State};

use crate::{AppState, error::ApiError, models::AdminDashboardStats};

/// get_admin_stats
///
/// [Admin Route] Counters for the moderation dashboard.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Stats", body = AdminDashboardStats))
)]
pub async fn get_admin_stats(
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, ApiError> {
    Ok(Json(state.repo.get_stats().await?))
}
