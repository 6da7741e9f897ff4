use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Moderation back office, nested under `/admin`. Every account is a moderator, so the
/// authentication layer applied in `create_router` is the whole access check.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Queue sizes for the dashboard.
        .route("/stats", get(handlers::stats::get_admin_stats))
        // --- Markers ---
        .route("/markers", get(handlers::markers::get_admin_markers))
        .route(
            "/markers/{id}",
            put(handlers::markers::update_marker).delete(handlers::markers::delete_marker),
        )
        .route(
            "/markers/{id}/status",
            put(handlers::markers::update_marker_status),
        )
        // --- Comments ---
        .route("/comments", get(handlers::comments::get_admin_comments))
        .route(
            "/comments/{id}",
            axum::routing::delete(handlers::comments::delete_comment),
        )
        .route(
            "/comments/{id}/status",
            put(handlers::comments::update_comment_status),
        )
        // --- Categories ---
        .route("/categories", post(handlers::categories::create_category))
        // PUT /admin/categories/reorder
        // Static segment, matched before `{id}`.
        .route(
            "/categories/reorder",
            put(handlers::categories::reorder_categories),
        )
        .route(
            "/categories/{id}",
            put(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        // --- Edit Requests ---
        .route(
            "/edit-requests",
            get(handlers::edit_requests::get_admin_edit_requests),
        )
        .route(
            "/edit-requests/{id}/approve",
            post(handlers::edit_requests::approve_edit_request),
        )
        .route(
            "/edit-requests/{id}/reject",
            post(handlers::edit_requests::reject_edit_request),
        )
        // --- Accounts ---
        .route("/admins", post(handlers::auth::create_admin))
}
