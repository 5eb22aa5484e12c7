//! Inventory listing and health endpoint tests.
//!
//! Run with: `cargo test -p trefa-api --test vehicles_test`

mod helpers;

use helpers::{test_server, vehicle, StaticInventory, PUBLIC_BASE};
use serde_json::Value;
use std::sync::Arc;
use trefa_api::SyncHandle;

fn inventory() -> Arc<StaticInventory> {
    Arc::new(StaticInventory::new(vec![
        vehicle("rec1", "nissan-versa-2021", "Nissan", "Comprado"),
        vehicle("rec2", "kia-rio-2020", "Kia", "Comprado"),
        vehicle("rec3", "nissan-march-2019", "Nissan", "Comprado"),
        vehicle("rec4", "mazda-3-2018", "Mazda", "Vendido"),
    ]))
}

fn no_sync() -> SyncHandle {
    SyncHandle::Unavailable("Missing AIRTABLE_API_KEY".to_string())
}

#[tokio::test]
async fn test_list_without_query_returns_all_listed() {
    let repo = inventory();
    let server = test_server(repo.clone(), no_sync());

    let response = server.get("/vehicles").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("cache-control"), "public, max-age=60");
    let body: Value = response.json();
    assert_eq!(body["count"], 3);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["data"][0]["id"], "rec1");
    assert_eq!(
        body["data"][0]["thumbnail"],
        format!("{}/rec1/front.webp", PUBLIC_BASE)
    );
    assert_eq!(
        body["data"][0]["galeriaExterior"][0],
        format!("{}/rec1/side.webp", PUBLIC_BASE)
    );
}

#[tokio::test]
async fn test_listing_is_served_from_cache() {
    let repo = inventory();
    let server = test_server(repo.clone(), no_sync());

    server.get("/vehicles").await.assert_status_ok();
    server.get("/vehicles").await.assert_status_ok();

    assert_eq!(repo.reads(), 1);
}

#[tokio::test]
async fn test_filtered_listing_pages() {
    let server = test_server(inventory(), no_sync());

    let response = server.get("/vehicles?marca=Nissan&pageSize=1&page=2").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("cache-control"), "public, max-age=60");
    let body: Value = response.json();
    assert_eq!(body["totalCount"], 2);
    assert_eq!(body["page"], 2);
    assert_eq!(body["pageSize"], 1);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["vehicles"][0]["id"], "rec3");
}

#[tokio::test]
async fn test_repeated_filters_accumulate() {
    let server = test_server(inventory(), no_sync());

    let body: Value = server.get("/vehicles?marca=Nissan&marca=Kia").await.json();

    assert_eq!(body["totalCount"], 3);
    assert_eq!(body["totalPages"], 1);
}

#[tokio::test]
async fn test_get_vehicle_by_slug() {
    let server = test_server(inventory(), no_sync());

    let response = server.get("/vehicles/kia-rio-2020").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("cache-control"), "public, max-age=60");
    let body: Value = response.json();
    assert_eq!(body["id"], "rec2");
    assert_eq!(body["record_id"], "rec2");
}

#[tokio::test]
async fn test_unknown_slug_is_not_found() {
    let server = test_server(inventory(), no_sync());

    let response = server.get("/vehicles/does-not-exist").await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["error"], "Vehicle not found");
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_health_checks() {
    let server = test_server(inventory(), no_sync());
    let live: Value = server.get("/health").await.json();
    assert_eq!(live["status"], "alive");

    let ready = server.get("/health/ready").await;
    assert_eq!(ready.status_code(), 200);
    let body: Value = ready.json();
    assert_eq!(body["database"], "healthy");

    let down = test_server(
        Arc::new(StaticInventory::new(Vec::new()).unhealthy()),
        no_sync(),
    );
    let response = down.get("/health/ready").await;
    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["status"], "not_ready");
}
