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
use crate::entities::category::{self, Entity as CategoryEntity};
use crate::error::ApiError;

const DEFAULT_PER_PAGE: u64 = 20;

//ROUTERS
pub fn category_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/categories", get(get_categories))
        .route("/categories/:id", get(get_category))
        .layer(Extension(db))
}

//ROUTES
async fn get_categories(
    Query(query): Query<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = query.resolve(DEFAULT_PER_PAGE)?;

    let paginator = CategoryEntity::find()
        .order_by_asc(category::Column::Id)
        .paginate(&*db, per_page);
    let totals = paginator.num_items_and_pages().await?;

    let categories = paginator.fetch_page(page - 1).await?;
    if categories.is_empty() {
        return Err(ApiError::NotFound("No categories found".to_string()));
    }

    let categories: Vec<CategoryResponse> =
        categories.into_iter().map(CategoryResponse::new).collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "categories": categories,
            "prev_page": (page > 1).then(|| page_link("/api/categories", page - 1, per_page)),
            "next_page": (page < totals.number_of_pages)
                .then(|| page_link("/api/categories", page + 1, per_page)),
            "total_pages": totals.number_of_pages,
            "total_items": totals.number_of_items
        })),
    ))
}

async fn get_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let result = CategoryEntity::find_by_id(id).one(&*db).await?;

    match result {
        Some(categ) => Ok((StatusCode::OK, Json(CategoryResponse::new(categ)))),
        None => Err(ApiError::NotFound(format!(
            "No category with {id} id was found."
        ))),
    }
}

//Structs
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
