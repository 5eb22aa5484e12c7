//! Inventory read endpoints.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use trefa_core::models::VehicleFilters;
use trefa_core::AppError;

use crate::error::HttpAppError;
use crate::services::InventoryService;

const CACHE_CONTROL: &str = "public, max-age=60";

/// `GET /vehicles`.
///
/// Without a query string every listed vehicle is returned as `{data, count}`; with one,
/// a filtered page.
pub async fn list_vehicles(
    State(inventory): State<InventoryService>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let body = if pairs.is_empty() {
        let vehicles = inventory.list_listed().await?;
        json!({ "data": vehicles.as_slice(), "count": vehicles.len() })
    } else {
        let filters = VehicleFilters::from_query_pairs(&pairs);
        let page = inventory.list_filtered(&filters).await?;
        serde_json::to_value(page).map_err(|e| AppError::Internal(e.to_string()))?
    };

    Ok(([(header::CACHE_CONTROL, CACHE_CONTROL)], Json(body)))
}

/// `GET /vehicles/{slug}`.
pub async fn get_vehicle(
    State(inventory): State<InventoryService>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let vehicle = inventory
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

    Ok(([(header::CACHE_CONTROL, CACHE_CONTROL)], Json(vehicle)))
}
