use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// AppJson
///
/// `axum::Json` whose rejection (bad syntax, wrong content type, missing fields)
/// renders through `ApiError`, so every 4xx carries the `{ "error" }` envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// AppPath
///
/// `axum::extract::Path` with `ApiError` rejections (e.g. a malformed UUID).
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// AppQuery
///
/// `axum::extract::Query` with `ApiError` rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);
