//! BOMs, production orders and material transfers for production.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal_of, uuid_of, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

async fn pump_bom(app: &TestApp) -> Value {
    app.data(
        Method::POST,
        "/api/bom",
        Some(json!({
            "product_code": "FG-PUMP",
            "product_name": "Garden pump",
            "quantity": "2",
            "status": "active",
            "lines": [
                { "item_code": "RM-HOUSING", "quantity": "2", "rate": "15" },
                { "item_code": "RM-SCREW", "quantity": "16", "rate": "0.05" },
                { "item_code": "LABOUR", "line_type": "resource", "quantity": "1", "rate": "40" }
            ]
        })),
    )
    .await
}

#[tokio::test]
async fn bom_requirements_scale_with_quantity() {
    let app = TestApp::new().await;
    let bom = pump_bom(&app).await;
    assert!(bom["bom_number"].as_str().unwrap().starts_with("BOM-"));
    let bom_id = uuid_of(&bom["id"]);

    // defaults to the batch size of two
    let base = app
        .data(Method::GET, &format!("/api/bom/{bom_id}/requirements"), None)
        .await;
    assert_eq!(decimal_of(&base["produce_quantity"]), dec!(2));
    assert_eq!(decimal_of(&base["lines"][0]["quantity"]), dec!(2));

    let scaled = app
        .data(
            Method::GET,
            &format!("/api/bom/{bom_id}/requirements?quantity=5"),
            None,
        )
        .await;
    let lines = scaled["lines"].as_array().unwrap();
    assert_eq!(decimal_of(&lines[0]["quantity"]), dec!(5));
    assert_eq!(decimal_of(&lines[1]["quantity"]), dec!(40));
    // 5 x 15 + 40 x 0.05 + 2.5 x 40
    assert_eq!(decimal_of(&scaled["total_cost"]), dec!(177));
}

#[tokio::test]
async fn bom_rejects_bad_lines() {
    let app = TestApp::new().await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/bom",
            Some(json!({
                "product_code": "FG-X",
                "product_name": "Broken",
                "lines": [{ "item_code": "RM-1", "quantity": "0", "rate": "1" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/bom",
            Some(json!({ "product_code": "FG-X", "product_name": "Empty", "lines": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn production_order_takes_material_lines_from_bom() {
    let app = TestApp::new().await;
    let stores = app.create_warehouse("WH-STORES").await;
    let floor = app.create_warehouse("WH-FLOOR").await;
    let bom = pump_bom(&app).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/production-order",
            Some(json!({
                "bom_id": bom["id"],
                "planned_quantity": "4",
                "source_warehouse_id": stores,
                "target_warehouse_id": floor
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order = &body["data"];
    assert!(order["order_number"].as_str().unwrap().starts_with("PRD-"));
    assert_eq!(order["status"], "planned");
    assert_eq!(order["product_code"], "FG-PUMP");

    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 2, "resource lines are not materials");
    assert_eq!(items[0]["item_code"], "RM-HOUSING");
    assert_eq!(decimal_of(&items[0]["required_quantity"]), dec!(4));
    assert_eq!(decimal_of(&items[1]["required_quantity"]), dec!(32));
}

#[tokio::test]
async fn obsolete_bom_cannot_start_production() {
    let app = TestApp::new().await;
    let stores = app.create_warehouse("WH-STORES").await;
    let floor = app.create_warehouse("WH-FLOOR").await;
    let bom = pump_bom(&app).await;
    let bom_id = uuid_of(&bom["id"]);

    app.data(
        Method::PUT,
        &format!("/api/bom/{bom_id}"),
        Some(json!({ "status": "obsolete" })),
    )
    .await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/production-order",
            Some(json!({
                "bom_id": bom_id,
                "planned_quantity": "1",
                "source_warehouse_id": stores,
                "target_warehouse_id": floor
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn production_status_follows_lifecycle() {
    let app = TestApp::new().await;
    let stores = app.create_warehouse("WH-STORES").await;
    let floor = app.create_warehouse("WH-FLOOR").await;
    let order = app
        .data(
            Method::POST,
            "/api/production-order",
            Some(json!({
                "product_code": "FG-KIT",
                "planned_quantity": "1",
                "source_warehouse_id": stores,
                "target_warehouse_id": floor,
                "items": [{ "item_code": "RM-1", "required_quantity": "2" }]
            })),
        )
        .await;
    let id = uuid_of(&order["id"]);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/production-order/{id}/status"),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for next in ["released", "in_progress", "completed"] {
        let updated = app
            .data(
                Method::PUT,
                &format!("/api/production-order/{id}/status"),
                Some(json!({ "status": next })),
            )
            .await;
        assert_eq!(updated["status"], next);
    }
}

#[tokio::test]
async fn transfer_for_production_moves_outstanding_materials() {
    let app = TestApp::new().await;
    let stores = app.create_warehouse("WH-STORES").await;
    let floor = app.create_warehouse("WH-FLOOR").await;
    let bom = pump_bom(&app).await;

    let po = app
        .approved_purchase_order(&[("RM-HOUSING", "10", "15"), ("RM-SCREW", "100", "0.05")])
        .await;
    app.receive_all(&po, stores, "LOT-A", Some("2031-01-01"))
        .await;

    let order = app
        .data(
            Method::POST,
            "/api/production-order",
            Some(json!({
                "bom_id": bom["id"],
                "planned_quantity": "2",
                "source_warehouse_id": stores,
                "target_warehouse_id": floor
            })),
        )
        .await;
    let order_id = uuid_of(&order["id"]);

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/production-order/{order_id}/transfer"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["production_order_id"], order_id.to_string());
    assert_eq!(body["data"]["lines"].as_array().unwrap().len(), 2);

    let refreshed = app
        .data(Method::GET, &format!("/api/production-order/{order_id}"), None)
        .await;
    assert_eq!(refreshed["status"], "released");
    for item in refreshed["items"].as_array().unwrap() {
        assert_eq!(
            decimal_of(&item["transferred_quantity"]),
            decimal_of(&item["required_quantity"])
        );
    }

    let on_floor = app
        .data(
            Method::GET,
            &format!("/api/inventory/batches?warehouse_id={floor}&item_code=RM-SCREW"),
            None,
        )
        .await;
    assert_eq!(decimal_of(&on_floor["items"][0]["quantity"]), dec!(16));

    // nothing left to move
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/production-order/{order_id}/transfer"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let transfers = app
        .data(
            Method::GET,
            &format!("/api/stock-transfer?production_order_id={order_id}"),
            None,
        )
        .await;
    assert_eq!(transfers["total"], 1);
}

#[tokio::test]
async fn production_transfer_with_missing_stock_is_unprocessable() {
    let app = TestApp::new().await;
    let stores = app.create_warehouse("WH-STORES").await;
    let floor = app.create_warehouse("WH-FLOOR").await;
    let order = app
        .data(
            Method::POST,
            "/api/production-order",
            Some(json!({
                "product_code": "FG-KIT",
                "planned_quantity": "1",
                "source_warehouse_id": stores,
                "target_warehouse_id": floor,
                "items": [{ "item_code": "RM-NONE", "required_quantity": "2" }]
            })),
        )
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/production-order/{}/transfer", order["id"].as_str().unwrap()),
            Some(json!({ "remarks": "first pick" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("RM-NONE"));

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/production-order/{}", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
