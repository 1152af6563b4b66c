use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::entities::cart::{self, Entity as CartEntity};
use crate::entities::cart_item::{self, Entity as CartItemEntity};
use crate::entities::product::{self, Entity as ProductEntity};
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

//ROUTERS
pub fn cart_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_cart_item))
        .route(
            "/cart/items/:id",
            patch(patch_cart_item).delete(remove_cart_item),
        )
        .layer(Extension(db))
}

//ROUTES
async fn get_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = CartEntity::find()
        .filter(cart::Column::UserId.eq(user.id))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active cart was found".to_string()))?;

    let items = CartItemEntity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .find_also_related(ProductEntity)
        .all(&*db)
        .await?;

    let items: Vec<CartItemResponse> = items
        .into_iter()
        .map(|(item, prod)| CartItemResponse::new(item, prod))
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "id": cart.id,
            "user_id": cart.user_id,
            "items": items
        })),
    ))
}

async fn add_cart_item(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<AddCartItem>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;

    let product = ProductEntity::find_by_id(payload.product_id)
        .one(&txn)
        .await?;
    if product.is_none() {
        return Err(ApiError::NotFound(format!(
            "No product with {} id was found.",
            payload.product_id
        )));
    }

    // The first added item creates the cart.
    let cart = CartEntity::find()
        .filter(cart::Column::UserId.eq(user.id))
        .one(&txn)
        .await?;
    let cart = match cart {
        Some(cart) => cart,
        None => {
            cart::ActiveModel {
                user_id: Set(user.id),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    let existing = CartItemEntity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .filter(cart_item::Column::ProductId.eq(payload.product_id))
        .one(&txn)
        .await?;

    // Adding a product already in the cart merges into the existing line.
    let (status, item) = match existing {
        Some(item) => {
            let quantity = item.quantity.checked_add(payload.quantity).ok_or_else(|| {
                ApiError::Validation("Quantity exceeds the supported maximum".to_string())
            })?;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            (StatusCode::OK, item.update(&txn).await?)
        }
        None => {
            let item = cart_item::ActiveModel {
                cart_id: Set(cart.id),
                product_id: Set(payload.product_id),
                quantity: Set(payload.quantity),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            (StatusCode::CREATED, item)
        }
    };

    txn.commit().await?;

    Ok((
        status,
        Json(json!({
            "id": item.id,
            "cart_id": item.cart_id,
            "product_id": item.product_id,
            "quantity": item.quantity
        })),
    ))
}

async fn patch_cart_item(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<PatchCartItem>,
) -> Result<Response, ApiError> {
    payload.validate()?;

    let item = find_owned_item(&db, id, &user).await?;

    // Zero quantity removes the line instead of keeping an empty one.
    if payload.quantity == 0 {
        let item: cart_item::ActiveModel = item.into();
        item.delete(&*db).await?;
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let mut item: cart_item::ActiveModel = item.into();
    item.quantity = Set(payload.quantity);
    let item = item.update(&*db).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "id": item.id,
            "cart_id": item.cart_id,
            "product_id": item.product_id,
            "quantity": item.quantity
        })),
    )
        .into_response())
}

async fn remove_cart_item(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let item = find_owned_item(&db, id, &user).await?;

    let item: cart_item::ActiveModel = item.into();
    item.delete(&*db).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn clear_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = CartEntity::find()
        .filter(cart::Column::UserId.eq(user.id))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active cart was found".to_string()))?;

    let txn = db.begin().await?;

    CartItemEntity::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    let cart: cart::ActiveModel = cart.into();
    cart.delete(&txn).await?;

    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

//utilities
async fn find_owned_item(
    db: &DatabaseConnection,
    id: i32,
    user: &CurrentUser,
) -> Result<cart_item::Model, ApiError> {
    let result = CartItemEntity::find_by_id(id)
        .find_also_related(CartEntity)
        .one(db)
        .await?;

    let (item, cart) = result
        .ok_or_else(|| ApiError::NotFound(format!("No cart item with {id} id was found.")))?;
    let cart = cart
        .ok_or_else(|| ApiError::Internal(format!("Cart item {} has no parent cart", item.id)))?;

    if cart.user_id != user.id {
        return Err(ApiError::Forbidden(
            "Cart item belongs to another user".to_string(),
        ));
    }

    Ok(item)
}

//Structs
#[derive(Deserialize, Validate)]
struct AddCartItem {
    product_id: i32,
    #[validate(range(min = 1))]
    quantity: i32,
}

#[derive(Deserialize, Validate)]
struct PatchCartItem {
    #[validate(range(min = 0))]
    quantity: i32,
}

#[derive(Serialize)]
struct CartItemResponse {
    id: i32,
    product_id: i32,
    quantity: i32,
    product: Option<CartProductResponse>,
}

impl CartItemResponse {
    fn new(item: cart_item::Model, prod: Option<product::Model>) -> CartItemResponse {
        CartItemResponse {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            product: prod.map(CartProductResponse::new),
        }
    }
}

#[derive(Serialize)]
struct CartProductResponse {
    id: i32,
    name: String,
    price: f64,
    image_url: Option<String>,
}

impl CartProductResponse {
    fn new(value: product::Model) -> CartProductResponse {
        CartProductResponse {
            id: value.id,
            name: value.name,
            price: value.price,
            image_url: value.image_url,
        }
    }
}
