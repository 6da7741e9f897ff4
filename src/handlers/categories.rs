use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::ApiError,
    extract::{AppJson, AppPath},
    models::{Category, CategoryOrder, CreateCategoryRequest, UpdateCategoryRequest},
};

/// get_categories
///
/// [Public Route] All categories in legend order.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn get_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.repo.list_categories().await?))
}

/// create_category
///
/// [Admin Route] New categories are appended at the end of the legend.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Name already used")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    payload.name = payload.name.trim().to_string();
    payload.validate()?;

    let category = state.repo.create_category(payload).await?;
    tracing::info!(category_id = %category.id, name = %category.name, "category created");

    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
#[utoipa::path(
    put,
    path = "/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 404, description = "Not found"),
        (status = 409, description = "Name already used")
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(mut payload): AppJson<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    payload.name = payload.name.map(|name| name.trim().to_string());
    payload.validate()?;

    state
        .repo
        .update_category(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("category"))
}

/// delete_category
///
/// [Admin Route] A category still used by markers cannot be removed (409).
#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Still used by markers")
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_category(id).await? {
        tracing::info!(category_id = %id, "category deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("category"))
    }
}

/// reorder_categories
///
/// [Admin Route] Applies a batch of `display_order` assignments atomically: either
/// every category moves or none does. Returns the list in its new order.
#[utoipa::path(
    put,
    path = "/admin/categories/reorder",
    request_body = [CategoryOrder],
    responses(
        (status = 200, description = "Reordered", body = [Category]),
        (status = 400, description = "Empty batch or duplicate ids"),
        (status = 404, description = "Unknown category; nothing was changed")
    )
)]
pub async fn reorder_categories(
    State(state): State<AppState>,
    AppJson(order): AppJson<Vec<CategoryOrder>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    validate_order(&order)?;

    let categories = state.repo.reorder_categories(&order).await?;
    tracing::info!(moved = order.len(), "categories reordered");

    Ok(Json(categories))
}

fn validate_order(order: &[CategoryOrder]) -> Result<(), ApiError> {
    if order.is_empty() {
        return Err(ApiError::Validation("reorder batch is empty".to_string()));
    }

    let mut seen = HashSet::with_capacity(order.len());
    if let Some(dup) = order.iter().find(|entry| !seen.insert(entry.id)) {
        return Err(ApiError::Validation(format!(
            "category {} appears more than once",
            dup.id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_batch_must_be_non_empty_and_unique() {
        assert!(validate_order(&[]).is_err());

        let id = Uuid::new_v4();
        let dup = [
            CategoryOrder { id, display_order: 0 },
            CategoryOrder { id, display_order: 1 },
        ];
        assert!(validate_order(&dup).is_err());

        let ok = [
            CategoryOrder { id, display_order: 1 },
            CategoryOrder { id: Uuid::new_v4(), display_order: 0 },
        ];
        assert!(validate_order(&ok).is_ok());
    }
}
