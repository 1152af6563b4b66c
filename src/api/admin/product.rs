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

use crate::entities::category::Entity as CategoryEntity;
use crate::entities::order_item::{self, Entity as OrderItemEntity};
use crate::entities::product::{self, Entity as ProductEntity};
use crate::error::ApiError;

//ROUTERS
pub fn admin_product_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products", post(create_product))
        .route(
            "/products/:id",
            patch(patch_product).delete(delete_product),
        )
        .layer(Extension(db))
}

//ROUTES
async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateProduct>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    // Names are stored uppercase so uniqueness ignores case.
    let name = payload.name.to_uppercase();

    let txn = db.begin().await?;

    let category = CategoryEntity::find_by_id(payload.category_id)
        .one(&txn)
        .await?;
    if category.is_none() {
        return Err(ApiError::NotFound(format!(
            "No category with {} id was found.",
            payload.category_id
        )));
    }

    let existing = ProductEntity::find()
        .filter(product::Column::Name.eq(&name))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Product already exists".to_string()));
    }

    let product = product::ActiveModel {
        name: Set(name),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        category_id: Set(payload.category_id),
        image_url: Set(payload.image_url),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(ProductResponse::new(product))))
}

async fn patch_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchProduct>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;

    let model = ProductEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with {id} id was found.")))?;
    let mut product: product::ActiveModel = model.clone().into();

    if let Some(name) = payload.name {
        let name = name.to_uppercase();
        let taken = ProductEntity::find()
            .filter(product::Column::Name.eq(&name))
            .filter(product::Column::Id.ne(id))
            .one(&txn)
            .await?;
        if taken.is_some() {
            return Err(ApiError::Conflict("Product already exists".to_string()));
        }
        product.name = Set(name);
    }
    if let Some(description) = payload.description {
        product.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        product.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        product.stock = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        let category = CategoryEntity::find_by_id(category_id).one(&txn).await?;
        if category.is_none() {
            return Err(ApiError::NotFound(format!(
                "No category with {category_id} id was found."
            )));
        }
        product.category_id = Set(category_id);
    }
    if let Some(image_url) = payload.image_url {
        product.image_url = Set(Some(image_url));
    }

    // An empty patch would otherwise trip RecordNotUpdated.
    let product = if product.is_changed() {
        product.update(&txn).await?
    } else {
        model
    };

    txn.commit().await?;

    Ok((StatusCode::OK, Json(ProductResponse::new(product))))
}

async fn delete_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;

    let product = ProductEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with {id} id was found.")))?;

    // Order history keeps its reference and blocks the delete; cart lines cascade.
    let referenced = OrderItemEntity::find()
        .filter(order_item::Column::ProductId.eq(id))
        .one(&txn)
        .await?;
    if referenced.is_some() {
        return Err(ApiError::Conflict(
            "Product is referenced by existing orders".to_string(),
        ));
    }

    let product: product::ActiveModel = product.into();
    product.delete(&txn).await?;

    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

//Structs
#[derive(Deserialize, Validate)]
struct CreateProduct {
    #[validate(length(min = 1))]
    name: String,
    description: Option<String>,
    #[validate(range(min = 0.0))]
    price: f64,
    #[validate(range(min = 0))]
    stock: i32,
    category_id: i32,
    image_url: Option<String>,
}

#[derive(Deserialize, Validate)]
struct PatchProduct {
    #[validate(length(min = 1))]
    name: Option<String>,
    description: Option<String>,
    #[validate(range(min = 0.0))]
    price: Option<f64>,
    #[validate(range(min = 0))]
    stock: Option<i32>,
    category_id: Option<i32>,
    image_url: Option<String>,
}

#[derive(Serialize)]
struct ProductResponse {
    id: i32,
    name: String,
    description: Option<String>,
    price: f64,
    stock: i32,
    category_id: i32,
    image_url: Option<String>,
}

impl ProductResponse {
    fn new(value: product::Model) -> ProductResponse {
        ProductResponse {
            id: value.id,
            name: value.name,
            description: value.description,
            price: value.price,
            stock: value.stock,
            category_id: value.category_id,
            image_url: value.image_url,
        }
    }
}
