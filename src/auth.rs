use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{Admin, AdminProfile},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of an admin session token, signed with the server's HS256 secret and
/// validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the admin's id.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// issue_token
///
/// Signs a session token for `admin_id` valid for `ttl`. Returns the token and its
/// expiry instant.
pub fn issue_token(
    admin_id: Uuid,
    secret: &str,
    ttl: Duration,
) -> Result<(String, DateTime<Utc>), ApiError> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| ApiError::Internal(format!("token lifetime out of range: {ttl}")))?;
    let claims = Claims {
        sub: admin_id,
        iat: epoch_seconds(now)?,
        exp: epoch_seconds(expires_at)?,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;

    Ok((token, expires_at))
}

fn epoch_seconds(instant: DateTime<Utc>) -> Result<usize, ApiError> {
    usize::try_from(instant.timestamp())
        .map_err(|_| ApiError::Internal(format!("timestamp before the epoch: {instant}")))
}

/// verify_token
///
/// Decodes and validates signature and expiry. Every failure collapses to
/// `Unauthorized`.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            ApiError::Unauthorized
        })
}

/// hash_password
///
/// bcrypt is deliberately slow, so it runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// verify_password
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// bootstrap_admin
///
/// Creates the configured first admin (`ADMIN_EMAIL` / `ADMIN_PASSWORD`) when it does
/// not exist yet. Returns true when an account was created.
pub async fn bootstrap_admin(repo: &RepositoryState, config: &AppConfig) -> Result<bool, ApiError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(false);
    };

    if repo.get_admin_by_email(email).await?.is_some() {
        return Ok(false);
    }

    let hash = hash_password(password.clone()).await?;
    let admin = repo.create_admin(email, &hash).await?;
    tracing::info!(admin_id = %admin.id, "bootstrap admin created");
    Ok(true)
}

/// AuthAdmin
///
/// The resolved identity of an authenticated request. Every account is a moderator,
/// so a successful extraction is also the authorization check for `/admin` routes.
#[derive(Debug, Clone)]
pub struct AuthAdmin {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Admin> for AuthAdmin {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id,
            email: admin.email,
            created_at: admin.created_at,
        }
    }
}

// Session endpoints answer from the extracted identity without another lookup.
impl From<AuthAdmin> for AdminProfile {
    fn from(admin: AuthAdmin) -> Self {
        Self {
            id: admin.id,
            email: admin.email,
            created_at: admin.created_at,
        }
    }
}

/// AuthAdmin Extractor Implementation
///
/// 1. Local Bypass: in `Env::Local`, an `x-admin-id` header naming an existing admin
///    is accepted without a token.
/// 2. Token Validation: `Authorization: Bearer <jwt>`, signature and expiry checked.
/// 3. DB Lookup: the admin must still exist, so deleting an account revokes its
///    outstanding tokens.
///
/// Rejection: `ApiError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthAdmin
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-admin-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());

            if let Some(admin_id) = bypass_id {
                if let Some(admin) = repo.get_admin(admin_id).await? {
                    return Ok(admin.into());
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = verify_token(token, &config.jwt_secret)?;

        let admin = repo
            .get_admin(claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(admin.into())
    }
}
