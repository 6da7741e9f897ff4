use axum::{Json, extract::State, http::StatusCode};
use chrono::Duration;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthAdmin, hash_password, issue_token, verify_password},
    error::ApiError,
    extract::AppJson,
    models::{AdminProfile, CreateAdminRequest, LoginRequest, LoginResponse},
};

fn session_for(admin: AdminProfile, state: &AppState) -> Result<LoginResponse, ApiError> {
    let ttl = Duration::try_hours(state.config.jwt_ttl_hours).ok_or_else(|| {
        ApiError::Internal(format!("invalid JWT_TTL_HOURS: {}", state.config.jwt_ttl_hours))
    })?;
    let (token, expires_at) = issue_token(admin.id, &state.config.jwt_secret, ttl)?;

    Ok(LoginResponse {
        token,
        expires_at,
        admin,
    })
}

/// login
///
/// [Public Route, rate limited] Exchanges admin credentials for a session token.
/// Unknown email and wrong password are indistinguishable (401).
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = LoginResponse),
        (status = 401, description = "Bad credentials"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    let Some(admin) = state.repo.get_admin_by_email(&email).await? else {
        tracing::warn!("login attempt for unknown account");
        return Err(ApiError::Unauthorized);
    };

    if !verify_password(payload.password, admin.password_hash.clone()).await? {
        tracing::warn!(admin_id = %admin.id, "login attempt with wrong password");
        return Err(ApiError::Unauthorized);
    }

    tracing::info!(admin_id = %admin.id, "admin logged in");
    Ok(Json(session_for(admin.into(), &state)?))
}

/// get_me
///
/// [Authenticated Route] Profile of the admin owning the session.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Profile", body = AdminProfile),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_me(admin: AuthAdmin) -> Json<AdminProfile> {
    Json(admin.into())
}

/// refresh_token
///
/// [Authenticated Route] Issues a fresh token so an active session does not expire
/// mid-moderation.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New session token", body = LoginResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn refresh_token(
    admin: AuthAdmin,
    State(state): State<AppState>,
) -> Result<Json<LoginResponse>, ApiError> {
    Ok(Json(session_for(admin.into(), &state)?))
}

/// create_admin
///
/// [Admin Route] Adds another moderator account.
#[utoipa::path(
    post,
    path = "/admin/admins",
    request_body = CreateAdminRequest,
    responses(
        (status = 201, description = "Created", body = AdminProfile),
        (status = 400, description = "Invalid email or password too short"),
        (status = 409, description = "Email already used")
    )
)]
pub async fn create_admin(
    AuthAdmin { id: creator, .. }: AuthAdmin,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateAdminRequest>,
) -> Result<(StatusCode, Json<AdminProfile>), ApiError> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    let hash = hash_password(payload.password).await?;
    let admin = state.repo.create_admin(&email, &hash).await?;
    tracing::info!(admin_id = %admin.id, created_by = %creator, "admin account created");

    Ok((StatusCode::CREATED, Json(admin.into())))
}
