use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::UploadSignatureResponse;

#[derive(Debug, Error, PartialEq)]
pub enum MediaError {
    #[error("invalid upload folder: {0}")]
    InvalidFolder(String),

    #[error("upload signing unavailable: {0}")]
    Unavailable(String),
}

// 1. UploadSigner Contract
/// UploadSigner
///
/// Produces the parameter set a browser needs to upload a file straight to the media
/// host. Implementations must never return the host's secret.
pub trait UploadSigner: Send + Sync {
    /// Signs an upload into `subfolder` (relative to the configured base folder) at
    /// `timestamp` (seconds since the epoch; the host rejects stale signatures).
    fn sign_upload(
        &self,
        subfolder: Option<&str>,
        timestamp: i64,
    ) -> Result<UploadSignatureResponse, MediaError>;
}

/// sanitize_folder
///
/// Removes empty, `.` and `..` segments so a client cannot escape the base folder, and
/// rejects characters outside `[A-Za-z0-9_-]`.
pub fn sanitize_folder(folder: &str) -> Result<String, MediaError> {
    let segments: Vec<&str> = folder
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect();

    let valid = |s: &str| {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    };
    if let Some(bad) = segments.iter().find(|s| !valid(**s)) {
        return Err(MediaError::InvalidFolder((*bad).to_string()));
    }

    Ok(segments.join("/"))
}

/// sign_params
///
/// Cloudinary request signature: parameters sorted by key, joined as `k=v&k=v`, the API
/// secret appended, SHA-256, hex.
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

// 2. The Real Implementation (Cloudinary)
/// CloudinarySigner
///
/// Signs direct uploads for the Cloudinary upload API. Signing is local; no network
/// call is made.
#[derive(Clone)]
pub struct CloudinarySigner {
    cloud_name: String,
    api_key: String,
    api_secret: String,
    base_folder: String,
}

impl CloudinarySigner {
    pub fn new(cloud_name: &str, api_key: &str, api_secret: &str, base_folder: &str) -> Self {
        Self {
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            base_folder: base_folder.trim_matches('/').to_string(),
        }
    }

    fn resolve_folder(&self, subfolder: Option<&str>) -> Result<String, MediaError> {
        let sub = match subfolder {
            Some(raw) => sanitize_folder(raw)?,
            None => String::new(),
        };
        Ok(match (self.base_folder.is_empty(), sub.is_empty()) {
            (_, true) => self.base_folder.clone(),
            (true, false) => sub,
            (false, false) => format!("{}/{}", self.base_folder, sub),
        })
    }
}

impl UploadSigner for CloudinarySigner {
    fn sign_upload(
        &self,
        subfolder: Option<&str>,
        timestamp: i64,
    ) -> Result<UploadSignatureResponse, MediaError> {
        let folder = self.resolve_folder(subfolder)?;

        let mut params = BTreeMap::new();
        params.insert("folder", folder.clone());
        params.insert("timestamp", timestamp.to_string());

        Ok(UploadSignatureResponse {
            cloud_name: self.cloud_name.clone(),
            api_key: self.api_key.clone(),
            timestamp,
            folder,
            signature: sign_params(&params, &self.api_secret),
            signature_algorithm: "sha256".to_string(),
            upload_url: format!(
                "https://api.cloudinary.com/v1_1/{}/image/upload",
                self.cloud_name
            ),
        })
    }
}

// 3. The Mock Implementation (For Tests)
/// MockUploadSigner
///
/// Deterministic signer for handler tests; can simulate an unavailable media host.
#[derive(Clone, Default)]
pub struct MockUploadSigner {
    pub should_fail: bool,
}

impl MockUploadSigner {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

impl UploadSigner for MockUploadSigner {
    fn sign_upload(
        &self,
        subfolder: Option<&str>,
        timestamp: i64,
    ) -> Result<UploadSignatureResponse, MediaError> {
        if self.should_fail {
            return Err(MediaError::Unavailable(
                "Mock Media Error: Simulation requested".to_string(),
            ));
        }

        let folder = match subfolder {
            Some(raw) => format!("mock/{}", sanitize_folder(raw)?),
            None => "mock".to_string(),
        };

        Ok(UploadSignatureResponse {
            cloud_name: "mock-cloud".to_string(),
            api_key: "mock-key".to_string(),
            timestamp,
            folder,
            signature: "fake-signature".to_string(),
            signature_algorithm: "sha256".to_string(),
            upload_url: "http://localhost:9000/mock-cloud/image/upload".to_string(),
        })
    }
}

/// UploadSignerState
///
/// Shared handle to the upload signer across the application state.
pub type UploadSignerState = Arc<dyn UploadSigner>;
