use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod geocoding;
pub mod handlers;
pub mod media;
pub mod models;
pub mod rate_limit;
pub mod repository;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthAdmin;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use geocoding::{GeocoderState, MockGeocoder, NominatimGeocoder};
pub use media::{CloudinarySigner, MockUploadSigner, UploadSignerState};
pub use rate_limit::RateLimiter;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and `ToSchema`
/// models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::categories::get_categories, handlers::categories::create_category,
        handlers::categories::update_category, handlers::categories::delete_category,
        handlers::categories::reorder_categories,
        handlers::markers::get_markers, handlers::markers::get_marker,
        handlers::markers::create_marker, handlers::markers::get_admin_markers,
        handlers::markers::update_marker, handlers::markers::update_marker_status,
        handlers::markers::delete_marker,
        handlers::comments::get_marker_comments, handlers::comments::create_comment,
        handlers::comments::get_admin_comments, handlers::comments::update_comment_status,
        handlers::comments::delete_comment,
        handlers::edit_requests::create_edit_request,
        handlers::edit_requests::get_admin_edit_requests,
        handlers::edit_requests::approve_edit_request,
        handlers::edit_requests::reject_edit_request,
        handlers::auth::login, handlers::auth::get_me, handlers::auth::refresh_token,
        handlers::auth::create_admin,
        handlers::media::create_upload_signature,
        handlers::geocoding::geocode, handlers::geocoding::reverse_geocode,
        handlers::stats::get_admin_stats,
    ),
    components(
        schemas(
            models::ModerationStatus, models::Category, models::CreateCategoryRequest,
            models::UpdateCategoryRequest, models::CategoryOrder,
            models::PointGeometry, models::MarkerProperties, models::MarkerFeature,
            models::MarkerCollection, models::CreateMarkerRequest, models::MarkerChanges,
            models::StatusUpdateRequest, models::Comment, models::CreateCommentRequest,
            models::EditRequest, models::CreateEditRequest, models::ReviewRequest,
            models::AdminProfile, models::LoginRequest, models::LoginResponse,
            models::CreateAdminRequest, models::UploadSignatureRequest,
            models::UploadSignatureResponse, models::GeocodeResult,
            models::AdminDashboardStats,
        )
    ),
    tags(
        (name = "ludov", description = "Ludov crowdsourced map directory API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single state container shared by every request. Each service sits behind a
/// trait object so tests can swap in doubles.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres in production).
    pub repo: RepositoryState,
    /// Signs direct uploads to the media host.
    pub media: UploadSignerState,
    /// Address lookups.
    pub geocoder: GeocoderState,
    /// Per-IP budget of the anonymous write endpoints.
    pub rate_limiter: Arc<RateLimiter>,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets extractors such as `AuthAdmin` pull only the pieces they need.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for UploadSignerState {
    fn from_ref(app_state: &AppState) -> UploadSignerState {
        app_state.media.clone()
    }
}

impl FromRef<AppState> for GeocoderState {
    fn from_ref(app_state: &AppState) -> GeocoderState {
        app_state.geocoder.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for the authenticated and admin routers. Extracting `AuthAdmin` runs token
/// validation and the admin lookup; a failed extraction answers 401 before the handler
/// is reached.
async fn auth_middleware(_admin: AuthAdmin, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, scoped middleware and observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public reads: no middleware.
        .merge(public::public_routes())
        // Anonymous writes: per-IP rate limit.
        .merge(
            public::submission_routes().route_layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit::rate_limit,
            )),
        )
        // Session routes: admin token required.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Moderation routes: same gate, nested under '/admin'.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. A UUID per incoming request (kept if the client sent one).
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. One span per request, tagged with the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, uri and the `x-request-id` set by the layer
/// above, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
