use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Read handlers only ever expose approved
/// records; the moderation state of everything else stays server-side.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /categories
        // Legend of the map, in display order.
        .route("/categories", get(handlers::categories::get_categories))
        // GET /markers?category=&search=&bbox=
        // Approved markers as a GeoJSON FeatureCollection.
        .route("/markers", get(handlers::markers::get_markers))
        .route("/markers/{id}", get(handlers::markers::get_marker))
        .route(
            "/markers/{id}/comments",
            get(handlers::comments::get_marker_comments),
        )
        // GET /geocode?q= and /geocode/reverse?lat=&lon=
        // Thin proxy to the geocoder so the browser never calls it directly.
        .route("/geocode", get(handlers::geocoding::geocode))
        .route("/geocode/reverse", get(handlers::geocoding::reverse_geocode))
}

/// Submission Router Module
///
/// Anonymous write endpoints. `create_router` wraps this router in the per-IP rate
/// limiter. Paths overlap with `public_routes` on purpose: axum merges the methods of
/// a shared path.
pub fn submission_routes() -> Router<AppState> {
    Router::new()
        // POST /markers
        // New markers start `pending`.
        .route("/markers", post(handlers::markers::create_marker))
        .route(
            "/markers/{id}/comments",
            post(handlers::comments::create_comment),
        )
        .route(
            "/markers/{id}/edit-requests",
            post(handlers::edit_requests::create_edit_request),
        )
        // POST /uploads/signature
        // Signed parameters for a direct browser-to-media-host upload.
        .route(
            "/uploads/signature",
            post(handlers::media::create_upload_signature),
        )
        // POST /auth/login
        // Limited as well to slow down password guessing.
        .route("/auth/login", post(handlers::auth::login))
}
