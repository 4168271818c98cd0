//! Quotations, orders, conversion and goods receipts.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal_of, uuid_of, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

async fn approve(app: &TestApp, segment: &str, id: Uuid) {
    for status in ["submitted", "approved"] {
        app.data(
            Method::PUT,
            &format!("/api/{segment}/{id}/status"),
            Some(json!({ "status": status })),
        )
        .await;
    }
}

#[tokio::test]
async fn document_totals_follow_line_pricing() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/sales-quotation",
            Some(json!({
                "party_name": "Globex",
                "discount_percent": "10",
                "lines": [
                    { "item_code": "FG-PUMP", "quantity": "2", "rate": "100", "tax_percent": "10" },
                    { "item_code": "FG-HOSE", "quantity": "4", "rate": "12.50" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let doc = &body["data"];
    assert!(doc["document_number"].as_str().unwrap().starts_with("SQ-"));
    assert_eq!(doc["status"], "draft");
    assert_eq!(doc["currency"], "USD");
    assert_eq!(doc["lines"].as_array().unwrap().len(), 2);
    assert_eq!(decimal_of(&doc["subtotal"]), dec!(250));
    let grand_total = decimal_of(&doc["grand_total"]);
    assert!(grand_total > dec!(0) && grand_total < dec!(275), "{grand_total}");
}

#[tokio::test]
async fn documents_take_the_configured_currency() {
    let app = TestApp::configured(|cfg| cfg.default_currency = "eur".into()).await;

    let line = json!([{ "item_code": "RM-1", "quantity": "1", "rate": "1" }]);
    let doc = app
        .data(
            Method::POST,
            "/api/purchase-quotation",
            Some(json!({ "party_name": "Acme", "lines": line })),
        )
        .await;
    assert_eq!(doc["currency"], "EUR");

    let doc = app
        .data(
            Method::POST,
            "/api/purchase-quotation",
            Some(json!({ "party_name": "Acme", "currency": "gbp", "lines": line })),
        )
        .await;
    assert_eq!(doc["currency"], "GBP");
}

#[tokio::test]
async fn document_needs_a_party() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/purchase-quotation",
            Some(json!({ "lines": [{ "item_code": "RM-1", "quantity": "1", "rate": "1" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn only_drafts_are_editable() {
    let app = TestApp::new().await;
    let doc = app
        .data(
            Method::POST,
            "/api/purchase-quotation",
            Some(json!({
                "party_name": "Acme",
                "lines": [{ "item_code": "RM-1", "quantity": "1", "rate": "5" }]
            })),
        )
        .await;
    let id = uuid_of(&doc["id"]);

    let edited = app
        .data(
            Method::PUT,
            &format!("/api/purchase-quotation/{id}"),
            Some(json!({ "lines": [{ "item_code": "RM-1", "quantity": "3", "rate": "5" }] })),
        )
        .await;
    assert_eq!(decimal_of(&edited["grand_total"]), dec!(15));

    app.data(
        Method::PUT,
        &format!("/api/purchase-quotation/{id}/status"),
        Some(json!({ "status": "submitted" })),
    )
    .await;

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/purchase-quotation/{id}"),
            Some(json!({ "notes": "too late" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/purchase-quotation/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn illegal_status_jump_is_rejected() {
    let app = TestApp::new().await;
    let doc = app
        .data(
            Method::POST,
            "/api/purchase-order",
            Some(json!({
                "party_name": "Acme",
                "lines": [{ "item_code": "RM-1", "quantity": "1", "rate": "5" }]
            })),
        )
        .await;

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/purchase-order/{}/status", doc["id"].as_str().unwrap()),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approved_sales_quotation_converts_to_order() {
    let app = TestApp::new().await;
    let customer = app
        .data(
            Method::POST,
            "/api/customers",
            Some(json!({ "name": "Initech", "email": "buyer@initech.test" })),
        )
        .await;

    let quotation = app
        .data(
            Method::POST,
            "/api/sales-quotation",
            Some(json!({
                "customer_id": customer["id"],
                "lines": [{ "item_code": "FG-PUMP", "quantity": "3", "rate": "80" }]
            })),
        )
        .await;
    assert_eq!(quotation["party_name"], "Initech");
    let quotation_id = uuid_of(&quotation["id"]);

    // drafts cannot be converted
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/sales-quotation/{quotation_id}/convert"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    approve(&app, "sales-quotation", quotation_id).await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/sales-quotation/{quotation_id}/convert"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = &body["data"]["order"];
    assert_eq!(body["data"]["quotation"]["status"], "converted");
    assert_eq!(order["kind"], "sales_order");
    assert_eq!(order["status"], "draft");
    assert_eq!(order["source_document_id"], quotation_id.to_string());
    assert_eq!(order["customer_id"], customer["id"]);
    assert_eq!(decimal_of(&order["grand_total"]), dec!(240));
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains(order["document_number"].as_str().unwrap()));

    // the new order is reachable under its own route
    let order_id = order["id"].as_str().unwrap();
    let fetched = app
        .data(Method::GET, &format!("/api/sales-order/{order_id}"), None)
        .await;
    assert_eq!(fetched["lines"].as_array().unwrap().len(), 1);

    // and not under another kind's
    let (status, _) = app
        .call(Method::GET, &format!("/api/purchase-order/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // a converted quotation cannot be converted again
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/sales-quotation/{quotation_id}/convert"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn orders_have_no_convert_route() {
    let app = TestApp::new().await;
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/sales-order/{}/convert", Uuid::new_v4()),
            None,
        )
        .await;
    assert!(
        status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED,
        "{status}"
    );
}

fn receipt_line(line: &Value, received: &str) -> Value {
    json!({ "order_line_id": line["id"], "received_quantity": received })
}

#[tokio::test]
async fn partial_receipts_advance_the_order() {
    let app = TestApp::new().await;
    let warehouse = app.create_warehouse("WH-GRN").await;
    let po = app.approved_purchase_order(&[("RM-GEAR", "10", "3")]).await;
    let po_id = po["id"].as_str().unwrap();
    let line = &po["lines"][0];

    let first = app
        .data(
            Method::POST,
            "/api/grn",
            Some(json!({
                "purchase_order_id": po_id,
                "warehouse_id": warehouse,
                "lines": [receipt_line(line, "4")]
            })),
        )
        .await;
    assert_eq!(first["purchase_order_status"], "partially_received");
    // no batch number given, so the receipt number is used
    assert_eq!(first["lines"][0]["batch_number"], first["grn_number"]);

    // more than what is still outstanding
    let (status, body) = app
        .call(
            Method::POST,
            "/api/grn",
            Some(json!({
                "purchase_order_id": po_id,
                "warehouse_id": warehouse,
                "lines": [receipt_line(line, "7")]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    // rejected goods do not count against the order
    let second = app
        .data(
            Method::POST,
            "/api/grn",
            Some(json!({
                "purchase_order_id": po_id,
                "warehouse_id": warehouse,
                "lines": [{
                    "order_line_id": line["id"],
                    "received_quantity": "8",
                    "rejected_quantity": "2",
                    "batch_number": "G-2"
                }]
            })),
        )
        .await;
    assert_eq!(second["purchase_order_status"], "completed");
    assert_eq!(decimal_of(&second["lines"][0]["accepted_quantity"]), dec!(6));

    let order = app
        .data(Method::GET, &format!("/api/purchase-order/{po_id}"), None)
        .await;
    assert_eq!(order["status"], "completed");
    assert_eq!(decimal_of(&order["lines"][0]["received_quantity"]), dec!(10));

    let availability = app
        .data(Method::GET, "/api/inventory/availability/RM-GEAR", None)
        .await;
    assert_eq!(decimal_of(&availability["total_quantity"]), dec!(10));

    let receipts = app
        .data(Method::GET, &format!("/api/grn?purchase_order_id={po_id}"), None)
        .await;
    assert_eq!(receipts["total"], 2);

    // completed orders take no more receipts
    let (status, _) = app
        .call(
            Method::POST,
            "/api/grn",
            Some(json!({
                "purchase_order_id": po_id,
                "warehouse_id": warehouse,
                "lines": [receipt_line(line, "1")]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn draft_orders_cannot_be_received() {
    let app = TestApp::new().await;
    let warehouse = app.create_warehouse("WH-GRN").await;
    let po = app
        .data(
            Method::POST,
            "/api/purchase-order",
            Some(json!({
                "party_name": "Acme",
                "lines": [{ "item_code": "RM-1", "quantity": "2", "rate": "1" }]
            })),
        )
        .await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/grn",
            Some(json!({
                "purchase_order_id": po["id"],
                "warehouse_id": warehouse,
                "lines": [receipt_line(&po["lines"][0], "2")]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn documents_filter_by_status() {
    let app = TestApp::new().await;
    app.approved_purchase_order(&[("RM-1", "1", "1")]).await;
    app.data(
        Method::POST,
        "/api/purchase-order",
        Some(json!({
            "party_name": "Acme",
            "lines": [{ "item_code": "RM-1", "quantity": "1", "rate": "1" }]
        })),
    )
    .await;

    let approved = app
        .data(Method::GET, "/api/purchase-order?status=approved", None)
        .await;
    assert_eq!(approved["total"], 1);
    let all = app.data(Method::GET, "/api/purchase-order", None).await;
    assert_eq!(all["total"], 2);
}
