//! Login, token lifecycle and route-group permissions.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp, PASSWORD};
use erp_api::entities::operator::OperatorRole;
use serde_json::json;

#[tokio::test]
async fn login_returns_token_in_envelope() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": app.admin.email, "password": PASSWORD })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["operator"]["role"], "admin");
    assert!(body["data"]["access_token"].as_str().unwrap().len() > 20);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": app.admin.email, "password": "not-the-password" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn deactivated_operator_cannot_log_in() {
    let app = TestApp::new().await;
    let staff = app.operator("Sam Staff", OperatorRole::Staff).await;

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/operators/{}", staff.operator_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": staff.email, "password": PASSWORD })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_bad_token_is_rejected() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/warehouse", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/warehouse", Some("not-a-jwt"), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_reports_the_caller_and_logout_revokes() {
    let app = TestApp::new().await;
    let agent = app.operator("Alex Agent", OperatorRole::Agent).await;

    let (status, body) = app
        .call_as(&agent.token, Method::GET, "/api/auth/me", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], agent.email.as_str());

    let (status, _) = app
        .call_as(&agent.token, Method::POST, "/api/auth/logout", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call_as(&agent.token, Method::GET, "/api/auth/me", None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_reads_warehouses_but_cannot_create_them() {
    let app = TestApp::new().await;
    let staff = app.operator("Sam Staff", OperatorRole::Staff).await;

    let (status, body) = app
        .call_as(&staff.token, Method::GET, "/api/warehouse", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = app
        .call_as(
            &staff.token,
            Method::POST,
            "/api/warehouse",
            Some(json!({ "code": "WH-X", "name": "Nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn agent_is_kept_out_of_purchasing() {
    let app = TestApp::new().await;
    let agent = app.operator("Alex Agent", OperatorRole::Agent).await;

    for uri in ["/api/purchase-order", "/api/grn", "/api/bom"] {
        let (status, _) = app.call_as(&agent.token, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "agent reached {uri}");
    }

    let (status, _) = app
        .call_as(&agent.token, Method::GET, "/api/helpdesk/tickets", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call_as(&agent.token, Method::GET, "/api/sales-order", None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn only_admins_manage_operators() {
    let app = TestApp::new().await;
    let manager = app.operator("Mia Manager", OperatorRole::Manager).await;

    let (status, _) = app
        .call_as(&manager.token, Method::GET, "/api/operators", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let payload = json!({
        "name": "New Agent",
        "email": "new.agent@erp.test",
        "password": "long-enough-password",
        "role": "agent"
    });
    let (status, _) = app
        .call_as(&manager.token, Method::POST, "/api/operators", Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::POST, "/api/operators", Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "agent");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn health_and_status_are_public() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["checks"]["database"], "healthy");

    let response = app.request(Method::GET, "/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn pricing_calculates_totals() {
    let app = TestApp::new().await;
    let staff = app.operator("Sam Staff", OperatorRole::Staff).await;

    let (status, body) = app
        .call_as(
            &staff.token,
            Method::POST,
            "/api/pricing/calculate",
            Some(json!({
                "lines": [
                    { "quantity": "2", "rate": "50", "discount_percent": "10", "tax_percent": "20" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // 2 x 50 = 100, less 10% = 90, plus 20% tax = 108
    assert_eq!(
        common::decimal_of(&body["data"]["totals"]["grand_total"]),
        rust_decimal_macros::dec!(108)
    );

    let (status, _) = app
        .call_as(
            &staff.token,
            Method::POST,
            "/api/pricing/calculate",
            Some(json!({ "lines": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pricing_rejects_amounts_out_of_range() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/pricing/calculate",
            Some(json!({
                "lines": [{ "quantity": "1000000000000000", "rate": "1000000000000000" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.to_string().contains("out of range"), "{body}");

    // the service keeps answering afterwards
    let (status, _) = app
        .call(
            Method::POST,
            "/api/pricing/calculate",
            Some(json!({ "lines": [{ "quantity": "1", "rate": "1" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
