use axum::{Json, extract::State};

use vista_db::models::ItemRow;
use vista_types::api::{CreateItemRequest, Item, Page};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::{AppState, blocking};

pub async fn create_item(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateItemRequest>,
) -> Result<Json<Item>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::validation("Title must not be empty"));
    }

    let db = state.clone();
    let row = blocking(move || db.db.create_item(&req.title, req.description.as_deref())).await?;

    Ok(Json(to_item(row)))
}

pub async fn list_items(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.list_items(page.skip, page.limit)).await?;

    Ok(Json(rows.into_iter().map(to_item).collect()))
}

fn to_item(row: ItemRow) -> Item {
    Item {
        id: row.id,
        title: row.title,
        description: row.description,
    }
}
