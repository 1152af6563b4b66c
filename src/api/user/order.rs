use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::api::{page_link, PageQuery};
use crate::entities::cart::{self, Entity as CartEntity};
use crate::entities::cart_item::{self, Entity as CartItemEntity};
use crate::entities::order::{self, Entity as OrderEntity, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItemEntity};
use crate::entities::product::Entity as ProductEntity;
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

const DEFAULT_PER_PAGE: u64 = 10;

//ROUTERS
pub fn order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/orders", get(get_orders).post(create_order))
        .route("/orders/:id", delete(delete_order))
        .layer(Extension(db))
}

//ROUTES
async fn get_orders(
    Query(query): Query<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = query.resolve(DEFAULT_PER_PAGE)?;

    let paginator = OrderEntity::find()
        .filter(order::Column::UserId.eq(user.id))
        .order_by_asc(order::Column::Id)
        .paginate(&*db, per_page);
    let totals = paginator.num_items_and_pages().await?;

    let orders = paginator.fetch_page(page - 1).await?;
    if orders.is_empty() {
        return Err(ApiError::NotFound("No orders found".to_string()));
    }

    let items = orders.load_many(OrderItemEntity, &*db).await?;
    let orders: Vec<OrderResponse> = orders
        .into_iter()
        .zip(items)
        .map(|(order, items)| OrderResponse::new(order, items))
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "orders": orders,
            "prev_page": (page > 1).then(|| page_link("/api/orders", page - 1, per_page)),
            "next_page": (page < totals.number_of_pages)
                .then(|| page_link("/api/orders", page + 1, per_page)),
            "total_pages": totals.number_of_pages,
            "total_items": totals.number_of_items
        })),
    ))
}

async fn create_order(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;

    let cart = CartEntity::find()
        .filter(cart::Column::UserId.eq(user.id))
        .one(&txn)
        .await?
        .ok_or(ApiError::EmptyCart)?;

    let cart_items = CartItemEntity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .find_also_related(ProductEntity)
        .all(&txn)
        .await?;
    if cart_items.is_empty() {
        return Err(ApiError::EmptyCart);
    }

    // Prices are captured per line so later catalog edits leave the order intact.
    let mut total_price = 0.0;
    let mut lines = Vec::with_capacity(cart_items.len());
    for (item, prod) in cart_items {
        let prod = prod.ok_or_else(|| {
            ApiError::Internal(format!(
                "Cart item {} references a missing product",
                item.id
            ))
        })?;
        total_price += prod.price * item.quantity as f64;
        lines.push((item.product_id, item.quantity, prod.price));
    }
    if total_price <= 0.0 {
        return Err(ApiError::Validation(
            "Order total must be greater than zero".to_string(),
        ));
    }

    let order = order::ActiveModel {
        user_id: Set(user.id),
        status: Set(OrderStatus::Processing),
        total_price: Set(total_price),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut order_items = Vec::with_capacity(lines.len());
    for (product_id, quantity, price) in lines {
        let item = order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            price_at_order_time: Set(price),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        order_items.push(item);
    }

    // The cart is consumed by the order.
    CartItemEntity::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    let cart: cart::ActiveModel = cart.into();
    cart.delete(&txn).await?;

    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::new(order, order_items))))
}

async fn delete_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let order = OrderEntity::find_by_id(id)
        .filter(order::Column::UserId.eq(user.id))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No order with {id} id was found.")))?;

    let txn = db.begin().await?;

    OrderItemEntity::delete_many()
        .filter(order_item::Column::OrderId.eq(order.id))
        .exec(&txn)
        .await?;
    let order: order::ActiveModel = order.into();
    order.delete(&txn).await?;

    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

//Structs
#[derive(Serialize)]
struct OrderResponse {
    id: i32,
    user_id: i32,
    status: OrderStatus,
    total_price: f64,
    created_at: sea_orm::prelude::DateTimeUtc,
    items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    fn new(order: order::Model, items: Vec<order_item::Model>) -> OrderResponse {
        OrderResponse {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            total_price: order.total_price,
            created_at: order.created_at,
            items: items.into_iter().map(OrderItemResponse::new).collect(),
        }
    }
}

#[derive(Serialize)]
struct OrderItemResponse {
    id: i32,
    product_id: i32,
    quantity: i32,
    price_at_order_time: f64,
}

impl OrderItemResponse {
    fn new(value: order_item::Model) -> OrderItemResponse {
        OrderItemResponse {
            id: value.id,
            product_id: value.product_id,
            quantity: value.quantity,
            price_at_order_time: value.price_at_order_time,
        }
    }
}
