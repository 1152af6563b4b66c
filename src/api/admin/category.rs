use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{patch, post},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::entities::category::{self, Entity as CategoryEntity};
use crate::entities::order_item::{self, Entity as OrderItemEntity};
use crate::entities::product::{self, Entity as ProductEntity};
use crate::error::ApiError;

//ROUTERS
pub fn admin_category_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/categories", post(create_category))
        .route(
            "/categories/:id",
            patch(patch_category).delete(delete_category),
        )
        .layer(Extension(db))
}

//ROUTES
async fn create_category(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateCategory>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;

    let existing = CategoryEntity::find()
        .filter(category::Column::Name.eq(&payload.name))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Category already exists".to_string()));
    }

    let categ = category::ActiveModel {
        name: Set(payload.name),
        description: Set(payload.description),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(CategoryResponse::new(categ))))
}

async fn patch_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchCategory>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;

    let model = CategoryEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No category with {id} id was found.")))?;
    let mut categ: category::ActiveModel = model.clone().into();

    if let Some(name) = payload.name {
        let taken = CategoryEntity::find()
            .filter(category::Column::Name.eq(&name))
            .filter(category::Column::Id.ne(id))
            .one(&txn)
            .await?;
        if taken.is_some() {
            return Err(ApiError::Conflict("Category already exists".to_string()));
        }
        categ.name = Set(name);
    }
    if let Some(description) = payload.description {
        categ.description = Set(Some(description));
    }

    // An empty patch would otherwise trip RecordNotUpdated.
    let categ = if categ.is_changed() {
        categ.update(&txn).await?
    } else {
        model
    };

    txn.commit().await?;

    Ok((StatusCode::OK, Json(CategoryResponse::new(categ))))
}

async fn delete_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;

    let categ = CategoryEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No category with {id} id was found.")))?;

    // The cascade takes the category's products with it, and order history
    // holds a reference to any product that has been purchased.
    let product_ids: Vec<i32> = ProductEntity::find()
        .filter(product::Column::CategoryId.eq(id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|prod| prod.id)
        .collect();
    if !product_ids.is_empty() {
        let referenced = OrderItemEntity::find()
            .filter(order_item::Column::ProductId.is_in(product_ids))
            .one(&txn)
            .await?;
        if referenced.is_some() {
            return Err(ApiError::Conflict(
                "Category contains products referenced by existing orders".to_string(),
            ));
        }
    }

    let categ: category::ActiveModel = categ.into();
    categ.delete(&txn).await?;

    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

//Structs
#[derive(Deserialize, Validate)]
struct CreateCategory {
    #[validate(length(min = 1))]
    name: String,
    description: Option<String>,
}

#[derive(Deserialize, Validate)]
struct PatchCategory {
    #[validate(length(min = 1))]
    name: Option<String>,
    description: Option<String>,
}

#[derive(Serialize)]
struct CategoryResponse {
    id: i32,
    name: String,
    description: Option<String>,
}

impl CategoryResponse {
    fn new(value: category::Model) -> CategoryResponse {
        CategoryResponse {
            id: value.id,
            name: value.name,
            description: value.description,
        }
    }
}
