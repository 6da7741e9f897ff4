#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Response};
use chrono::Utc;
use http_body_util::BodyExt;
use ludov_api::{
    AppState, MockGeocoder, MockUploadSigner, RateLimiter,
    config::AppConfig,
    error::RepositoryError,
    models::{
        Admin, AdminDashboardStats, Category, CategoryOrder, Comment, CommentQuery,
        CreateCategoryRequest, CreateCommentRequest, CreateEditRequest, CreateMarkerRequest,
        EditRequest, GeocodeResult, Marker, MarkerChanges, MarkerQuery, ModerationStatus,
        UpdateCategoryRequest,
    },
    repository::{RepoResult, Repository},
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// --- In-Memory Repository ---

#[derive(Default)]
struct Store {
    categories: Vec<Category>,
    markers: Vec<Marker>,
    comments: Vec<Comment>,
    edit_requests: Vec<EditRequest>,
    admins: Vec<Admin>,
}

/// Mirrors the Postgres repository's observable behaviour (constraints, ordering,
/// cascades, transactional reorder and approval) without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

fn apply_changes(marker: &mut Marker, changes: &MarkerChanges) {
    if let Some(name) = &changes.name {
        marker.name = name.clone();
    }
    if let Some(description) = &changes.description {
        marker.description = description.clone();
    }
    if let Some(category_id) = changes.category_id {
        marker.category_id = category_id;
    }
    if let Some(latitude) = changes.latitude {
        marker.latitude = latitude;
    }
    if let Some(longitude) = changes.longitude {
        marker.longitude = longitude;
    }
    if changes.address.is_some() {
        marker.address = changes.address.clone();
    }
    if changes.image_url.is_some() {
        marker.image_url = changes.image_url.clone();
    }
    if changes.website.is_some() {
        marker.website = changes.website.clone();
    }
    marker.updated_at = Utc::now();
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_category(&self, name: &str, display_order: i32) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: "#336699".to_string(),
            icon: "pin".to_string(),
            display_order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store.lock().unwrap().categories.push(category.clone());
        category
    }

    pub fn seed_marker(&self, name: &str, category_id: Uuid, status: ModerationStatus) -> Marker {
        let marker = Marker {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} description"),
            category_id,
            latitude: 48.8566,
            longitude: 2.3522,
            submitter_email: Some("visitor@example.com".to_string()),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Marker::default()
        };
        self.store.lock().unwrap().markers.push(marker.clone());
        marker
    }

    pub fn seed_comment(&self, marker_id: Uuid, content: &str, status: ModerationStatus) -> Comment {
        let comment = Comment {
            id: Uuid::new_v4(),
            marker_id,
            author_name: "Camille".to_string(),
            content: content.to_string(),
            status,
            created_at: Utc::now(),
        };
        self.store.lock().unwrap().comments.push(comment.clone());
        comment
    }

    pub fn seed_edit_request(&self, marker_id: Uuid, changes: MarkerChanges) -> EditRequest {
        let request = EditRequest {
            id: Uuid::new_v4(),
            marker_id,
            changes,
            created_at: Utc::now(),
            ..EditRequest::default()
        };
        self.store
            .lock()
            .unwrap()
            .edit_requests
            .push(request.clone());
        request
    }

    pub fn seed_admin(&self, email: &str, password_hash: &str) -> Admin {
        let admin = Admin {
            id: Uuid::new_v4(),
            email: email.to_lowercase(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        self.store.lock().unwrap().admins.push(admin.clone());
        admin
    }

    pub fn marker(&self, id: Uuid) -> Option<Marker> {
        let store = self.store.lock().unwrap();
        store.markers.iter().find(|m| m.id == id).cloned()
    }

    pub fn comment_count(&self) -> usize {
        self.store.lock().unwrap().comments.len()
    }

    pub fn edit_request_count(&self) -> usize {
        self.store.lock().unwrap().edit_requests.len()
    }

    pub fn admin_count(&self) -> usize {
        self.store.lock().unwrap().admins.len()
    }

    fn sorted_categories(store: &Store) -> Vec<Category> {
        let mut categories = store.categories.clone();
        categories.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        categories
    }

    fn review(
        &self,
        id: Uuid,
        reviewer: Uuid,
        note: Option<String>,
        decision: ModerationStatus,
    ) -> RepoResult<EditRequest> {
        let mut store = self.store.lock().unwrap();
        let index = store
            .edit_requests
            .iter()
            .position(|r| r.id == id)
            .ok_or(RepositoryError::NotFound("edit request"))?;

        let current = store.edit_requests[index].status;
        if current != ModerationStatus::Pending {
            return Err(RepositoryError::AlreadyReviewed(current));
        }

        if decision == ModerationStatus::Approved {
            let marker_id = store.edit_requests[index].marker_id;
            let changes = store.edit_requests[index].changes.clone();
            let marker = store
                .markers
                .iter_mut()
                .find(|m| m.id == marker_id)
                .ok_or(RepositoryError::NotFound("marker"))?;
            apply_changes(marker, &changes);
        }

        let request = &mut store.edit_requests[index];
        request.status = decision;
        request.review_note = note;
        request.reviewed_by = Some(reviewer);
        request.reviewed_at = Some(Utc::now());
        Ok(request.clone())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        Ok(Self::sorted_categories(&self.store.lock().unwrap()))
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let store = self.store.lock().unwrap();
        Ok(store.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category> {
        let mut store = self.store.lock().unwrap();
        if store.categories.iter().any(|c| c.name == req.name) {
            return Err(RepositoryError::Conflict("categories_name_key".to_string()));
        }
        let display_order = store
            .categories
            .iter()
            .map(|c| c.display_order + 1)
            .max()
            .unwrap_or(0);
        let category = Category {
            id: Uuid::new_v4(),
            name: req.name,
            color: req.color,
            icon: req.icon,
            display_order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> RepoResult<Option<Category>> {
        let mut store = self.store.lock().unwrap();
        if let Some(name) = &req.name {
            if store.categories.iter().any(|c| &c.name == name && c.id != id) {
                return Err(RepositoryError::Conflict("categories_name_key".to_string()));
            }
        }
        let Some(category) = store.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            category.name = name;
        }
        if let Some(color) = req.color {
            category.color = color;
        }
        if let Some(icon) = req.icon {
            category.icon = icon;
        }
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        if store.markers.iter().any(|m| m.category_id == id) {
            return Err(RepositoryError::ForeignKey(
                "markers_category_id_fkey".to_string(),
            ));
        }
        let before = store.categories.len();
        store.categories.retain(|c| c.id != id);
        Ok(store.categories.len() != before)
    }

    async fn reorder_categories(&self, order: &[CategoryOrder]) -> RepoResult<Vec<Category>> {
        let mut store = self.store.lock().unwrap();
        // All or nothing: check every id before touching anything.
        if order
            .iter()
            .any(|entry| !store.categories.iter().any(|c| c.id == entry.id))
        {
            return Err(RepositoryError::NotFound("category"));
        }
        for entry in order {
            if let Some(category) = store.categories.iter_mut().find(|c| c.id == entry.id) {
                category.display_order = entry.display_order;
                category.updated_at = Utc::now();
            }
        }
        Ok(Self::sorted_categories(&store))
    }

    async fn list_markers(&self, query: &MarkerQuery) -> RepoResult<Vec<Marker>> {
        let store = self.store.lock().unwrap();
        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let mut markers: Vec<Marker> = store
            .markers
            .iter()
            .filter(|m| query.status.is_none_or(|s| m.status == s))
            .filter(|m| query.category_id.is_none_or(|c| m.category_id == c))
            .filter(|m| query.bbox.is_none_or(|b| b.contains(m.longitude, m.latitude)))
            .filter(|m| {
                needle.as_ref().is_none_or(|n| {
                    m.name.to_lowercase().contains(n)
                        || m.description.to_lowercase().contains(n)
                        || m
                            .address
                            .as_ref()
                            .is_some_and(|a| a.to_lowercase().contains(n))
                })
            })
            .cloned()
            .collect();
        markers.reverse();
        Ok(markers)
    }

    async fn get_marker(&self, id: Uuid) -> RepoResult<Option<Marker>> {
        Ok(self.marker(id))
    }

    async fn create_marker(&self, req: CreateMarkerRequest) -> RepoResult<Marker> {
        let marker = Marker {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description.unwrap_or_default(),
            category_id: req.category_id,
            latitude: req.latitude,
            longitude: req.longitude,
            address: req.address,
            image_url: req.image_url,
            website: req.website,
            submitter_name: req.submitter_name,
            submitter_email: req.submitter_email,
            status: ModerationStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store.lock().unwrap().markers.push(marker.clone());
        Ok(marker)
    }

    async fn update_marker(&self, id: Uuid, changes: MarkerChanges) -> RepoResult<Option<Marker>> {
        let mut store = self.store.lock().unwrap();
        Ok(store.markers.iter_mut().find(|m| m.id == id).map(|marker| {
            apply_changes(marker, &changes);
            marker.clone()
        }))
    }

    async fn set_marker_status(
        &self,
        id: Uuid,
        status: ModerationStatus,
    ) -> RepoResult<Option<Marker>> {
        let mut store = self.store.lock().unwrap();
        Ok(store.markers.iter_mut().find(|m| m.id == id).map(|marker| {
            marker.status = status;
            marker.clone()
        }))
    }

    async fn delete_marker(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.markers.len();
        store.markers.retain(|m| m.id != id);
        store.comments.retain(|c| c.marker_id != id);
        store.edit_requests.retain(|r| r.marker_id != id);
        Ok(store.markers.len() != before)
    }

    async fn list_comments(&self, query: &CommentQuery) -> RepoResult<Vec<Comment>> {
        let store = self.store.lock().unwrap();
        let mut comments: Vec<Comment> = store
            .comments
            .iter()
            .filter(|c| query.marker_id.is_none_or(|id| c.marker_id == id))
            .filter(|c| query.status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        if query.marker_id.is_none() {
            comments.reverse();
        }
        Ok(comments)
    }

    async fn create_comment(
        &self,
        marker_id: Uuid,
        req: CreateCommentRequest,
    ) -> RepoResult<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            marker_id,
            author_name: req.author_name,
            content: req.content,
            status: ModerationStatus::Pending,
            created_at: Utc::now(),
        };
        self.store.lock().unwrap().comments.push(comment.clone());
        Ok(comment)
    }

    async fn set_comment_status(
        &self,
        id: Uuid,
        status: ModerationStatus,
    ) -> RepoResult<Option<Comment>> {
        let mut store = self.store.lock().unwrap();
        Ok(store.comments.iter_mut().find(|c| c.id == id).map(|comment| {
            comment.status = status;
            comment.clone()
        }))
    }

    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.comments.len();
        store.comments.retain(|c| c.id != id);
        Ok(store.comments.len() != before)
    }

    async fn list_edit_requests(
        &self,
        status: Option<ModerationStatus>,
    ) -> RepoResult<Vec<EditRequest>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .edit_requests
            .iter()
            .rev()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    async fn get_edit_request(&self, id: Uuid) -> RepoResult<Option<EditRequest>> {
        let store = self.store.lock().unwrap();
        Ok(store.edit_requests.iter().find(|r| r.id == id).cloned())
    }

    async fn create_edit_request(
        &self,
        marker_id: Uuid,
        req: CreateEditRequest,
    ) -> RepoResult<EditRequest> {
        let request = EditRequest {
            id: Uuid::new_v4(),
            marker_id,
            changes: req.changes,
            reason: req.reason,
            requester_name: req.requester_name,
            status: ModerationStatus::Pending,
            created_at: Utc::now(),
            ..EditRequest::default()
        };
        self.store
            .lock()
            .unwrap()
            .edit_requests
            .push(request.clone());
        Ok(request)
    }

    async fn approve_edit_request(
        &self,
        id: Uuid,
        reviewer: Uuid,
        note: Option<String>,
    ) -> RepoResult<EditRequest> {
        self.review(id, reviewer, note, ModerationStatus::Approved)
    }

    async fn reject_edit_request(
        &self,
        id: Uuid,
        reviewer: Uuid,
        note: Option<String>,
    ) -> RepoResult<EditRequest> {
        self.review(id, reviewer, note, ModerationStatus::Rejected)
    }

    async fn get_admin(&self, id: Uuid) -> RepoResult<Option<Admin>> {
        let store = self.store.lock().unwrap();
        Ok(store.admins.iter().find(|a| a.id == id).cloned())
    }

    async fn get_admin_by_email(&self, email: &str) -> RepoResult<Option<Admin>> {
        let email = email.trim().to_lowercase();
        let store = self.store.lock().unwrap();
        Ok(store.admins.iter().find(|a| a.email == email).cloned())
    }

    async fn create_admin(&self, email: &str, password_hash: &str) -> RepoResult<Admin> {
        let email = email.trim().to_lowercase();
        let mut store = self.store.lock().unwrap();
        if store.admins.iter().any(|a| a.email == email) {
            return Err(RepositoryError::Conflict("admins_email_key".to_string()));
        }
        let admin = Admin {
            id: Uuid::new_v4(),
            email,
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        store.admins.push(admin.clone());
        Ok(admin)
    }

    async fn get_stats(&self) -> RepoResult<AdminDashboardStats> {
        let store = self.store.lock().unwrap();
        let markers_with = |status| store.markers.iter().filter(|m| m.status == status).count() as i64;
        Ok(AdminDashboardStats {
            markers_total: store.markers.len() as i64,
            markers_pending: markers_with(ModerationStatus::Pending),
            markers_approved: markers_with(ModerationStatus::Approved),
            markers_rejected: markers_with(ModerationStatus::Rejected),
            comments_pending: store
                .comments
                .iter()
                .filter(|c| c.status == ModerationStatus::Pending)
                .count() as i64,
            edit_requests_pending: store
                .edit_requests
                .iter()
                .filter(|r| r.status == ModerationStatus::Pending)
                .count() as i64,
            categories_total: store.categories.len() as i64,
        })
    }
}

// --- State Scaffolding ---

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

pub fn sample_places() -> Vec<GeocodeResult> {
    vec![
        GeocodeResult {
            display_name: "Place de la Bastille, Paris, France".to_string(),
            latitude: 48.8532,
            longitude: 2.3691,
        },
        GeocodeResult {
            display_name: "Vieux-Port, Marseille, France".to_string(),
            latitude: 43.2951,
            longitude: 5.3744,
        },
    ]
}

/// AppState over `repo` with mock media/geocoder and a generous rate limit.
pub fn test_state(repo: Arc<InMemoryRepository>) -> AppState {
    test_state_with_limit(repo, 1_000)
}

pub fn test_state_with_limit(repo: Arc<InMemoryRepository>, max_requests: u32) -> AppState {
    AppState {
        repo,
        media: Arc::new(MockUploadSigner::new()),
        geocoder: Arc::new(MockGeocoder::new(sample_places())),
        rate_limiter: Arc::new(RateLimiter::new(max_requests, Duration::from_secs(60))),
        config: test_config(),
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
