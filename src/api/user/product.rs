use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::api::{page_link, PageQuery};
use crate::entities::category;
use crate::entities::product::{self, Entity as ProductEntity};
use crate::error::ApiError;

const DEFAULT_PER_PAGE: u64 = 20;

//ROUTERS
pub fn product_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products", get(get_products))
        .route("/products/:id", get(get_product))
        .layer(Extension(db))
}

//ROUTES
async fn get_products(
    Query(query): Query<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = query.resolve(DEFAULT_PER_PAGE)?;

    let paginator = ProductEntity::find()
        .order_by_asc(product::Column::Id)
        .paginate(&*db, per_page);
    let totals = paginator.num_items_and_pages().await?;

    let products = paginator.fetch_page(page - 1).await?;
    if products.is_empty() {
        return Err(ApiError::NotFound("No products found".to_string()));
    }

    let products: Vec<ProductResponse> = products.into_iter().map(ProductResponse::new).collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "products": products,
            "prev_page": (page > 1).then(|| page_link("/api/products", page - 1, per_page)),
            "next_page": (page < totals.number_of_pages)
                .then(|| page_link("/api/products", page + 1, per_page)),
            "total_pages": totals.number_of_pages,
            "total_items": totals.number_of_items
        })),
    ))
}

async fn get_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let result = ProductEntity::find_by_id(id)
        .find_also_related(category::Entity)
        .one(&*db)
        .await?;

    match result {
        Some((prod, categ)) => Ok((StatusCode::OK, Json(ProductDetailResponse::new(prod, categ)))),
        None => Err(ApiError::NotFound(format!(
            "No product with {id} id was found."
        ))),
    }
}

//Structs
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

#[derive(Serialize)]
struct ProductDetailResponse {
    id: i32,
    name: String,
    description: Option<String>,
    price: f64,
    stock: i32,
    image_url: Option<String>,
    category: Option<ProductCategoryResponse>,
}

#[derive(Serialize)]
struct ProductCategoryResponse {
    id: i32,
    name: String,
    description: Option<String>,
}

impl ProductDetailResponse {
    fn new(value: product::Model, categ: Option<category::Model>) -> ProductDetailResponse {
        ProductDetailResponse {
            id: value.id,
            name: value.name,
            description: value.description,
            price: value.price,
            stock: value.stock,
            image_url: value.image_url,
            category: categ.map(|value| ProductCategoryResponse {
                id: value.id,
                name: value.name,
                description: value.description,
            }),
        }
    }
}
