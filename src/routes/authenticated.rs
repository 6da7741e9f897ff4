use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Session endpoints for any logged-in admin. The `AuthAdmin` layer applied in
/// `create_router` rejects requests without a valid token before they get here.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::auth::get_me))
        // POST /auth/refresh
        // Re-issues a token with a fresh expiry.
        .route("/auth/refresh", post(handlers::auth::refresh_token))
}
