use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// --- Moderation ---

/// ModerationStatus
///
/// The review state shared by markers, comments and edit requests. Every visitor
/// submission starts as `Pending` and is moved to `Approved` or `Rejected` by an admin.
/// Stored as the Postgres enum `moderation_status`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "moderation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ModerationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// Admin
///
/// A moderator account from the `admins` table. The bcrypt hash never leaves the
/// server; use `AdminProfile` for anything sent to a client.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Admin {
    pub id: Uuid,
    // Always stored lowercase.
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// AdminProfile
///
/// Public view of an admin account (GET /auth/me, login response).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminProfile {
    pub id: Uuid,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<Admin> for AdminProfile {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id,
            email: admin.email,
            created_at: admin.created_at,
        }
    }
}

/// Category
///
/// A taxonomy entry used to classify markers on the map. `display_order` drives the
/// legend order in the front end.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    /// Hex color, `#RRGGBB`.
    #[schema(example = "#2e7d32")]
    pub color: String,
    pub icon: String,
    pub display_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Marker
///
/// Raw row of the `markers` table. Never serialized directly: clients receive the
/// GeoJSON form built by `Marker::into_feature`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Marker {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub website: Option<String>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    pub status: ModerationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Marker {
    /// Builds the GeoJSON Feature for this marker. Submitter details are only
    /// included for moderation views.
    pub fn into_feature(self, include_submitter: bool) -> MarkerFeature {
        let (submitter_name, submitter_email) = if include_submitter {
            (self.submitter_name, self.submitter_email)
        } else {
            (None, None)
        };

        MarkerFeature {
            kind: "Feature".to_string(),
            id: self.id,
            geometry: PointGeometry::new(self.longitude, self.latitude),
            properties: MarkerProperties {
                name: self.name,
                description: self.description,
                category_id: self.category_id,
                address: self.address,
                image_url: self.image_url,
                website: self.website,
                status: self.status,
                submitter_name,
                submitter_email,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        }
    }
}

/// --- GeoJSON (Output Schemas) ---

/// PointGeometry
///
/// GeoJSON Point. Coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[schema(example = json!([2.3522, 48.8566]))]
    pub coordinates: Vec<f64>,
}

impl PointGeometry {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: vec![longitude, latitude],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MarkerProperties {
    pub name: String,
    pub description: String,
    pub category_id: Uuid,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub website: Option<String>,
    pub status: ModerationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_email: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// MarkerFeature
///
/// A marker as a GeoJSON Feature, the shape consumed directly by the map layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MarkerFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Uuid,
    pub geometry: PointGeometry,
    pub properties: MarkerProperties,
}

/// MarkerCollection
///
/// GeoJSON FeatureCollection returned by every marker listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MarkerCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<MarkerFeature>,
}

impl MarkerCollection {
    pub fn from_markers(markers: Vec<Marker>, include_submitter: bool) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features: markers
                .into_iter()
                .map(|m| m.into_feature(include_submitter))
                .collect(),
        }
    }
}

/// Comment
///
/// A visitor comment attached to a marker, from the `comments` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub marker_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub status: ModerationStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// MarkerChanges
///
/// A set of proposed marker property changes. Used both as the payload of a visitor
/// edit request (stored as JSONB) and for direct admin edits. Absent fields are left
/// untouched when applied.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default, PartialEq)]
#[ts(export)]
pub struct MarkerChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub website: Option<String>,
}

impl MarkerChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.address.is_none()
            && self.image_url.is_none()
            && self.website.is_none()
    }
}

/// EditRequest
///
/// A visitor's proposed change to an approved marker, from the `edit_requests` table.
/// Applied to the marker only when an admin approves it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EditRequest {
    pub id: Uuid,
    pub marker_id: Uuid,
    #[sqlx(json)]
    pub changes: MarkerChanges,
    pub reason: Option<String>,
    pub requester_name: Option<String>,
    pub status: ModerationStatus,
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    #[ts(type = "string | null")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// --- Request Payloads (Input Schemas) ---

fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    let bytes = value.as_bytes();
    if bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(u8::is_ascii_hexdigit) {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color"))
    }
}

/// CreateMarkerRequest
///
/// Visitor submission of a new marker (POST /markers). The image, if any, has already
/// been uploaded to the media host using a signed upload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateMarkerRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub category_id: Uuid,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub website: Option<String>,
    #[serde(default)]
    #[validate(length(max = 80))]
    pub submitter_name: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub submitter_email: Option<String>,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 80))]
    pub author_name: String,
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
}

/// CreateEditRequest
///
/// Visitor proposal of changes to an approved marker (POST /markers/{id}/edit-requests).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateEditRequest {
    #[validate(nested)]
    pub changes: MarkerChanges,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[serde(default)]
    #[validate(length(max = 80))]
    pub requester_name: Option<String>,
}

/// ReviewRequest
///
/// Body of the edit request approve/reject endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct ReviewRequest {
    #[serde(default)]
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// StatusUpdateRequest
///
/// Moderation decision for a marker or comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StatusUpdateRequest {
    pub status: ModerationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,
    #[validate(length(min = 1, max = 60))]
    pub icon: String,
}

/// UpdateCategoryRequest
///
/// Partial update payload; only provided fields are changed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 60))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_hex_color"))]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 60))]
    pub icon: Option<String>,
}

/// CategoryOrder
///
/// One index assignment of a category reorder batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct CategoryOrder {
    pub id: Uuid,
    pub display_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
    pub admin: AdminProfile,
}

/// CreateAdminRequest
///
/// bcrypt only considers the first 72 bytes of a password, hence the upper bound.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateAdminRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 72))]
    pub password: String,
}

/// UploadSignatureRequest
///
/// Optional sub-folder (relative to the configured base folder) for the upload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UploadSignatureRequest {
    #[serde(default)]
    #[schema(example = "markers")]
    pub folder: Option<String>,
}

/// UploadSignatureResponse
///
/// Everything the browser needs to POST a file straight to the media host. The API
/// secret is never part of it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UploadSignatureResponse {
    pub cloud_name: String,
    pub api_key: String,
    pub timestamp: i64,
    pub folder: String,
    pub signature: String,
    pub signature_algorithm: String,
    pub upload_url: String,
}

/// GeocodeResult
///
/// A single place returned by the geocoder.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Default)]
#[ts(export)]
pub struct GeocodeResult {
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// --- Dashboard Schemas (Output) ---

/// AdminDashboardStats
///
/// Output schema for the moderation dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub markers_total: i64,
    pub markers_pending: i64,
    pub markers_approved: i64,
    pub markers_rejected: i64,
    pub comments_pending: i64,
    pub edit_requests_pending: i64,
    pub categories_total: i64,
}

/// --- Query Models ---

/// BoundingBox
///
/// Map viewport filter, parsed from `minLon,minLat,maxLon,maxLat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.min_lon..=self.max_lon).contains(&longitude)
            && (self.min_lat..=self.max_lat).contains(&latitude)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("bbox must be minLon,minLat,maxLon,maxLat within valid coordinate ranges")]
pub struct InvalidBoundingBox;

impl FromStr for BoundingBox {
    type Err = InvalidBoundingBox;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| InvalidBoundingBox)?;

        let [min_lon, min_lat, max_lon, max_lat] = values[..] else {
            return Err(InvalidBoundingBox);
        };

        let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        if !(lon_ok(min_lon) && lon_ok(max_lon) && lat_ok(min_lat) && lat_ok(max_lat)) {
            return Err(InvalidBoundingBox);
        }
        if min_lon > max_lon || min_lat > max_lat {
            return Err(InvalidBoundingBox);
        }

        Ok(BoundingBox {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}

/// MarkerQuery
///
/// Repository-level marker filter. Public handlers always pin `status` to `Approved`.
#[derive(Debug, Clone, Default)]
pub struct MarkerQuery {
    pub status: Option<ModerationStatus>,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    pub bbox: Option<BoundingBox>,
}

/// CommentQuery
///
/// Scoped to one marker for public listings (oldest first), unscoped for moderation
/// (newest first).
#[derive(Debug, Clone, Default)]
pub struct CommentQuery {
    pub marker_id: Option<Uuid>,
    pub status: Option<ModerationStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_parses_valid_viewport() {
        let bbox: BoundingBox = "2.2, 48.8,2.5,48.9".parse().unwrap();
        assert_eq!(bbox.min_lon, 2.2);
        assert_eq!(bbox.max_lat, 48.9);
        assert!(bbox.contains(2.35, 48.85));
        assert!(!bbox.contains(3.0, 48.85));
    }

    #[test]
    fn bbox_rejects_malformed_input() {
        assert!("1,2,3".parse::<BoundingBox>().is_err());
        assert!("a,b,c,d".parse::<BoundingBox>().is_err());
        assert!("1,2,3,4,5".parse::<BoundingBox>().is_err());
        // inverted
        assert!("5,5,1,1".parse::<BoundingBox>().is_err());
        // out of range
        assert!("-200,0,0,10".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn hex_color_validation() {
        assert!(validate_hex_color("#A1b2C3").is_ok());
        assert!(validate_hex_color("A1B2C3").is_err());
        assert!(validate_hex_color("#12345").is_err());
        assert!(validate_hex_color("#12345G").is_err());
    }

    #[test]
    fn feature_hides_submitter_unless_requested() {
        let marker = Marker {
            name: "Bibliothèque".to_string(),
            latitude: 48.85,
            longitude: 2.35,
            submitter_email: Some("visitor@example.com".to_string()),
            ..Marker::default()
        };

        let public = marker.clone().into_feature(false);
        assert_eq!(public.geometry.coordinates, vec![2.35, 48.85]);
        assert!(public.properties.submitter_email.is_none());

        let admin = marker.into_feature(true);
        assert_eq!(
            admin.properties.submitter_email.as_deref(),
            Some("visitor@example.com")
        );
    }

    #[test]
    fn marker_changes_emptiness() {
        assert!(MarkerChanges::default().is_empty());
        let changes = MarkerChanges {
            website: Some("https://example.org".to_string()),
            ..MarkerChanges::default()
        };
        assert!(!changes.is_empty());
    }
}
