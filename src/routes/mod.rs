/// Router Module Index
///
/// Routes are split by access level so each group gets its middleware applied once,
/// at the router level, in `create_router`.

/// Anonymous routes: read-only map data, plus the rate-limited submission routes.
pub mod public;

/// Routes requiring an admin session (`/auth/me`, `/auth/refresh`).
pub mod authenticated;

/// Moderation routes nested under `/admin`.
pub mod admin;
