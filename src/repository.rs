use crate::error::RepositoryError;
use crate::models::{
    Admin, AdminDashboardStats, Category, CategoryOrder, Comment, CommentQuery,
    CreateCategoryRequest, CreateCommentRequest, CreateEditRequest, CreateMarkerRequest,
    EditRequest, Marker, MarkerChanges, MarkerQuery, ModerationStatus, UpdateCategoryRequest,
};
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, query_builder::QueryBuilder, types::Json};
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Abstract contract for all persistence operations, letting handlers work against
/// Postgres in production and in-memory doubles in tests.
///
/// **Send + Sync + async_trait** are required to share the trait object
/// (`Arc<dyn Repository>`) across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Categories ---
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>>;
    // Appends the category after the current last one.
    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category>;
    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> RepoResult<Option<Category>>;
    // Fails with `ForeignKey` while markers still use the category.
    async fn delete_category(&self, id: Uuid) -> RepoResult<bool>;
    /// Applies every index assignment or none of them. An unknown id aborts the whole
    /// batch with `NotFound`. Returns the full, newly ordered list.
    async fn reorder_categories(&self, order: &[CategoryOrder]) -> RepoResult<Vec<Category>>;

    // --- Markers ---
    async fn list_markers(&self, query: &MarkerQuery) -> RepoResult<Vec<Marker>>;
    async fn get_marker(&self, id: Uuid) -> RepoResult<Option<Marker>>;
    // New markers always start in `pending`.
    async fn create_marker(&self, req: CreateMarkerRequest) -> RepoResult<Marker>;
    async fn update_marker(&self, id: Uuid, changes: MarkerChanges) -> RepoResult<Option<Marker>>;
    async fn set_marker_status(
        &self,
        id: Uuid,
        status: ModerationStatus,
    ) -> RepoResult<Option<Marker>>;
    // Comments and edit requests are removed with the marker.
    async fn delete_marker(&self, id: Uuid) -> RepoResult<bool>;

    // --- Comments ---
    async fn list_comments(&self, query: &CommentQuery) -> RepoResult<Vec<Comment>>;
    async fn create_comment(
        &self,
        marker_id: Uuid,
        req: CreateCommentRequest,
    ) -> RepoResult<Comment>;
    async fn set_comment_status(
        &self,
        id: Uuid,
        status: ModerationStatus,
    ) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool>;

    // --- Edit Requests ---
    async fn list_edit_requests(
        &self,
        status: Option<ModerationStatus>,
    ) -> RepoResult<Vec<EditRequest>>;
    async fn get_edit_request(&self, id: Uuid) -> RepoResult<Option<EditRequest>>;
    async fn create_edit_request(
        &self,
        marker_id: Uuid,
        req: CreateEditRequest,
    ) -> RepoResult<EditRequest>;
    /// Applies the proposed changes to the marker and marks the request approved, as
    /// one unit. Only `pending` requests can be approved (`AlreadyReviewed` otherwise).
    async fn approve_edit_request(
        &self,
        id: Uuid,
        reviewer: Uuid,
        note: Option<String>,
    ) -> RepoResult<EditRequest>;
    async fn reject_edit_request(
        &self,
        id: Uuid,
        reviewer: Uuid,
        note: Option<String>,
    ) -> RepoResult<EditRequest>;

    // --- Admins ---
    async fn get_admin(&self, id: Uuid) -> RepoResult<Option<Admin>>;
    // Case-insensitive.
    async fn get_admin_by_email(&self, email: &str) -> RepoResult<Option<Admin>>;
    async fn create_admin(&self, email: &str, password_hash: &str) -> RepoResult<Admin>;
    async fn get_stats(&self) -> RepoResult<AdminDashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const CATEGORY_COLUMNS: &str = "id, name, color, icon, display_order, created_at, updated_at";

const MARKER_COLUMNS: &str = "id, name, description, category_id, latitude, longitude, address, \
     image_url, website, submitter_name, submitter_email, status, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, marker_id, author_name, content, status, created_at";

const EDIT_REQUEST_COLUMNS: &str = "id, marker_id, changes, reason, requester_name, status, \
     review_note, reviewed_by, reviewed_at, created_at";

const ADMIN_COLUMNS: &str = "id, email, password_hash, created_at";

/// Escapes LIKE wildcards so user input is matched literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Partial marker update shared by the admin edit and the edit request approval, so
/// it can run on the pool or inside a transaction.
async fn apply_marker_changes<'e, E>(
    executor: E,
    id: Uuid,
    changes: &MarkerChanges,
) -> Result<Option<Marker>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"
        UPDATE markers
        SET name = COALESCE($2, name),
            description = COALESCE($3, description),
            category_id = COALESCE($4, category_id),
            latitude = COALESCE($5, latitude),
            longitude = COALESCE($6, longitude),
            address = COALESCE($7, address),
            image_url = COALESCE($8, image_url),
            website = COALESCE($9, website),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {MARKER_COLUMNS}
        "#
    );

    sqlx::query_as::<_, Marker>(&sql)
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.category_id)
        .bind(changes.latitude)
        .bind(changes.longitude)
        .bind(changes.address.as_deref())
        .bind(changes.image_url.as_deref())
        .bind(changes.website.as_deref())
        .fetch_optional(executor)
        .await
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- CATEGORIES ---

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY display_order ASC, name ASC");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// create_category
    ///
    /// The next `display_order` is computed in the same statement as the insert.
    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category> {
        let sql = format!(
            r#"
            INSERT INTO categories (id, name, color, icon, display_order, created_at, updated_at)
            VALUES ($1, $2, $3, $4,
                    (SELECT COALESCE(MAX(display_order) + 1, 0) FROM categories),
                    NOW(), NOW())
            RETURNING {CATEGORY_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.name.trim())
            .bind(&req.color)
            .bind(&req.icon)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> RepoResult<Option<Category>> {
        let sql = format!(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                color = COALESCE($3, color),
                icon = COALESCE($4, icon),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(req.name.as_deref().map(str::trim))
            .bind(req.color.as_deref())
            .bind(req.icon.as_deref())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// reorder_categories
    ///
    /// One UPDATE per assignment inside a single transaction. Returning early drops the
    /// transaction, which rolls every previous assignment back.
    async fn reorder_categories(&self, order: &[CategoryOrder]) -> RepoResult<Vec<Category>> {
        let mut tx = self.pool.begin().await?;

        for entry in order {
            let result = sqlx::query(
                "UPDATE categories SET display_order = $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(entry.display_order)
            .bind(entry.id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound("category"));
            }
        }

        tx.commit().await?;
        self.list_categories().await
    }

    // --- MARKERS ---

    /// list_markers
    ///
    /// Dynamic filtering with QueryBuilder so every user-provided value is bound, never
    /// interpolated.
    async fn list_markers(&self, query: &MarkerQuery) -> RepoResult<Vec<Marker>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MARKER_COLUMNS} FROM markers WHERE TRUE"));

        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }

        if let Some(category_id) = query.category_id {
            builder.push(" AND category_id = ").push_bind(category_id);
        }

        if let Some(search) = &query.search {
            let pattern = like_pattern(search);
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR description ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR address ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        if let Some(bbox) = query.bbox {
            builder.push(" AND longitude BETWEEN ").push_bind(bbox.min_lon);
            builder.push(" AND ").push_bind(bbox.max_lon);
            builder.push(" AND latitude BETWEEN ").push_bind(bbox.min_lat);
            builder.push(" AND ").push_bind(bbox.max_lat);
        }

        builder.push(" ORDER BY created_at DESC");

        Ok(builder
            .build_query_as::<Marker>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_marker(&self, id: Uuid) -> RepoResult<Option<Marker>> {
        let sql = format!("SELECT {MARKER_COLUMNS} FROM markers WHERE id = $1");
        Ok(sqlx::query_as::<_, Marker>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_marker(&self, req: CreateMarkerRequest) -> RepoResult<Marker> {
        let sql = format!(
            r#"
            INSERT INTO markers (
                id, name, description, category_id, latitude, longitude, address,
                image_url, website, submitter_name, submitter_email, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', NOW(), NOW())
            RETURNING {MARKER_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Marker>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.name.trim())
            .bind(req.description.unwrap_or_default())
            .bind(req.category_id)
            .bind(req.latitude)
            .bind(req.longitude)
            .bind(req.address)
            .bind(req.image_url)
            .bind(req.website)
            .bind(req.submitter_name)
            .bind(req.submitter_email)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_marker(&self, id: Uuid, changes: MarkerChanges) -> RepoResult<Option<Marker>> {
        Ok(apply_marker_changes(&self.pool, id, &changes).await?)
    }

    async fn set_marker_status(
        &self,
        id: Uuid,
        status: ModerationStatus,
    ) -> RepoResult<Option<Marker>> {
        let sql = format!(
            "UPDATE markers SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {MARKER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Marker>(&sql)
            .bind(status)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_marker(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM markers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- COMMENTS ---

    async fn list_comments(&self, query: &CommentQuery) -> RepoResult<Vec<Comment>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE TRUE"));

        if let Some(marker_id) = query.marker_id {
            builder.push(" AND marker_id = ").push_bind(marker_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }

        // A marker's thread reads top-down; the moderation queue shows newest first.
        if query.marker_id.is_some() {
            builder.push(" ORDER BY created_at ASC");
        } else {
            builder.push(" ORDER BY created_at DESC");
        }

        Ok(builder
            .build_query_as::<Comment>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_comment(
        &self,
        marker_id: Uuid,
        req: CreateCommentRequest,
    ) -> RepoResult<Comment> {
        let sql = format!(
            r#"
            INSERT INTO comments (id, marker_id, author_name, content, status, created_at)
            VALUES ($1, $2, $3, $4, 'pending', NOW())
            RETURNING {COMMENT_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(Uuid::new_v4())
            .bind(marker_id)
            .bind(req.author_name.trim())
            .bind(req.content.trim())
            .fetch_one(&self.pool)
            .await?)
    }

    async fn set_comment_status(
        &self,
        id: Uuid,
        status: ModerationStatus,
    ) -> RepoResult<Option<Comment>> {
        let sql = format!("UPDATE comments SET status = $1 WHERE id = $2 RETURNING {COMMENT_COLUMNS}");
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(status)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- EDIT REQUESTS ---

    async fn list_edit_requests(
        &self,
        status: Option<ModerationStatus>,
    ) -> RepoResult<Vec<EditRequest>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {EDIT_REQUEST_COLUMNS} FROM edit_requests WHERE TRUE"
        ));
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status);
        }
        builder.push(" ORDER BY created_at DESC");

        Ok(builder
            .build_query_as::<EditRequest>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_edit_request(&self, id: Uuid) -> RepoResult<Option<EditRequest>> {
        let sql = format!("SELECT {EDIT_REQUEST_COLUMNS} FROM edit_requests WHERE id = $1");
        Ok(sqlx::query_as::<_, EditRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_edit_request(
        &self,
        marker_id: Uuid,
        req: CreateEditRequest,
    ) -> RepoResult<EditRequest> {
        let sql = format!(
            r#"
            INSERT INTO edit_requests (id, marker_id, changes, reason, requester_name, status, created_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', NOW())
            RETURNING {EDIT_REQUEST_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, EditRequest>(&sql)
            .bind(Uuid::new_v4())
            .bind(marker_id)
            .bind(Json(&req.changes))
            .bind(req.reason)
            .bind(req.requester_name)
            .fetch_one(&self.pool)
            .await?)
    }

    /// approve_edit_request
    ///
    /// Locks the request row (`FOR UPDATE`) so two admins approving concurrently cannot
    /// both apply it; the second one sees it already approved.
    async fn approve_edit_request(
        &self,
        id: Uuid,
        reviewer: Uuid,
        note: Option<String>,
    ) -> RepoResult<EditRequest> {
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT {EDIT_REQUEST_COLUMNS} FROM edit_requests WHERE id = $1 FOR UPDATE");
        let request = sqlx::query_as::<_, EditRequest>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound("edit request"))?;

        if request.status != ModerationStatus::Pending {
            return Err(RepositoryError::AlreadyReviewed(request.status));
        }

        apply_marker_changes(&mut *tx, request.marker_id, &request.changes)
            .await?
            .ok_or(RepositoryError::NotFound("marker"))?;

        let update = format!(
            r#"
            UPDATE edit_requests
            SET status = 'approved', review_note = $2, reviewed_by = $3, reviewed_at = NOW()
            WHERE id = $1
            RETURNING {EDIT_REQUEST_COLUMNS}
            "#
        );
        let approved = sqlx::query_as::<_, EditRequest>(&update)
            .bind(id)
            .bind(note)
            .bind(reviewer)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(approved)
    }

    /// reject_edit_request
    ///
    /// The `status = 'pending'` guard makes the transition atomic without a transaction;
    /// a miss is then disambiguated into not-found or already-reviewed.
    async fn reject_edit_request(
        &self,
        id: Uuid,
        reviewer: Uuid,
        note: Option<String>,
    ) -> RepoResult<EditRequest> {
        let update = format!(
            r#"
            UPDATE edit_requests
            SET status = 'rejected', review_note = $2, reviewed_by = $3, reviewed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {EDIT_REQUEST_COLUMNS}
            "#
        );
        let rejected = sqlx::query_as::<_, EditRequest>(&update)
            .bind(id)
            .bind(note)
            .bind(reviewer)
            .fetch_optional(&self.pool)
            .await?;

        match rejected {
            Some(request) => Ok(request),
            None => match self.get_edit_request(id).await? {
                Some(existing) => Err(RepositoryError::AlreadyReviewed(existing.status)),
                None => Err(RepositoryError::NotFound("edit request")),
            },
        }
    }

    // --- ADMINS ---

    async fn get_admin(&self, id: Uuid) -> RepoResult<Option<Admin>> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1");
        Ok(sqlx::query_as::<_, Admin>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_admin_by_email(&self, email: &str) -> RepoResult<Option<Admin>> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE email = LOWER($1)");
        Ok(sqlx::query_as::<_, Admin>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_admin(&self, email: &str, password_hash: &str) -> RepoResult<Admin> {
        let sql = format!(
            "INSERT INTO admins (id, email, password_hash, created_at) VALUES ($1, LOWER($2), $3, NOW()) RETURNING {ADMIN_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Admin>(&sql)
            .bind(Uuid::new_v4())
            .bind(email.trim())
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await?)
    }

    /// get_stats
    ///
    /// Compiles every dashboard counter in a single round trip.
    async fn get_stats(&self) -> RepoResult<AdminDashboardStats> {
        Ok(sqlx::query_as::<_, AdminDashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM markers) AS markers_total,
                (SELECT COUNT(*) FROM markers WHERE status = 'pending') AS markers_pending,
                (SELECT COUNT(*) FROM markers WHERE status = 'approved') AS markers_approved,
                (SELECT COUNT(*) FROM markers WHERE status = 'rejected') AS markers_rejected,
                (SELECT COUNT(*) FROM comments WHERE status = 'pending') AS comments_pending,
                (SELECT COUNT(*) FROM edit_requests WHERE status = 'pending') AS edit_requests_pending,
                (SELECT COUNT(*) FROM categories) AS categories_total
            "#,
        )
        .fetch_one(&self.pool)
        .await?)
    }
}
