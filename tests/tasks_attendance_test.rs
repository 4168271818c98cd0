//! Tasks, attendance and customer records.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{uuid_of, TestApp};
use erp_api::entities::{attendance, operator::OperatorRole};
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde_json::json;

#[tokio::test]
async fn task_lifecycle_and_filters() {
    let app = TestApp::new().await;
    let staff = app.operator("Sam Staff", OperatorRole::Staff).await;

    let (status, body) = app
        .call_as(
            &staff.token,
            Method::POST,
            "/api/tasks",
            Some(json!({
                "title": "Count bin A-01",
                "project": "Stocktake",
                "assigned_to": staff.operator_id,
                "priority": "high",
                "due_date": "2020-01-31"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let task = &body["data"];
    assert_eq!(task["status"], "todo");
    assert!(task["completed_at"].is_null());
    let task_id = uuid_of(&task["id"]);

    app.data(
        Method::POST,
        "/api/tasks",
        Some(json!({ "title": "Order labels", "project": "Packaging" })),
    )
    .await;

    let stocktake = app
        .data(Method::GET, "/api/tasks?project=Stocktake", None)
        .await;
    assert_eq!(stocktake["total"], 1);
    let mine = app
        .data(
            Method::GET,
            &format!("/api/tasks?assigned_to={}", staff.operator_id),
            None,
        )
        .await;
    assert_eq!(mine["total"], 1);
    let overdue = app.data(Method::GET, "/api/tasks?overdue=true", None).await;
    assert_eq!(overdue["total"], 1);

    let done = app
        .data(
            Method::PUT,
            &format!("/api/tasks/{task_id}/status"),
            Some(json!({ "status": "done" })),
        )
        .await;
    assert_eq!(done["status"], "done");
    assert!(done["completed_at"].is_string());

    // finished tasks are no longer overdue
    let overdue = app.data(Method::GET, "/api/tasks?overdue=true", None).await;
    assert_eq!(overdue["total"], 0);

    let reopened = app
        .data(
            Method::PUT,
            &format!("/api/tasks/{task_id}"),
            Some(json!({ "status": "in_progress", "title": "Recount bin A-01" })),
        )
        .await;
    assert_eq!(reopened["title"], "Recount bin A-01");
    assert!(reopened["completed_at"].is_null());

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/tasks/{task_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(Method::GET, &format!("/api/tasks/{task_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn task_for_unknown_operator_is_not_found() {
    let app = TestApp::new().await;
    let (status, _) = app
        .call(
            Method::POST,
            "/api/tasks",
            Some(json!({ "title": "Ghost work", "assigned_to": uuid::Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn attendance_check_in_and_out() {
    let app = TestApp::new().await;
    let staff = app.operator("Sam Staff", OperatorRole::Staff).await;

    // nothing to close yet
    let (status, _) = app
        .call_as(&staff.token, Method::POST, "/api/attendance/check-out", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call_as(
            &staff.token,
            Method::POST,
            "/api/attendance/check-in",
            Some(json!({ "notes": "early shift" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["operator_id"], staff.operator_id.to_string());
    assert!(body["data"]["check_out"].is_null());

    let (status, _) = app
        .call_as(&staff.token, Method::POST, "/api/attendance/check-in", None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .call_as(&staff.token, Method::POST, "/api/attendance/check-out", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["check_out"].is_string());
    assert_eq!(body["data"]["worked_minutes"], 0);

    let (status, _) = app
        .call_as(&staff.token, Method::POST, "/api/attendance/check-out", None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .call_as(&staff.token, Method::GET, "/api/attendance/summary", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["days_present"], 1);
    assert_eq!(body["data"]["open_days"], 0);
}

#[tokio::test]
async fn check_out_closes_a_shift_started_yesterday() {
    let app = TestApp::new().await;
    let staff = app.operator("Nico Nights", OperatorRole::Staff).await;

    let started = Utc::now() - Duration::hours(26);
    attendance::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        operator_id: Set(staff.operator_id),
        work_date: Set(started.date_naive()),
        check_in: Set(started),
        check_out: Set(None),
        worked_minutes: Set(None),
        notes: Set(None),
        created_at: Set(started),
    }
    .insert(app.state.db.as_ref())
    .await
    .unwrap();

    let (status, body) = app
        .call_as(&staff.token, Method::POST, "/api/attendance/check-out", None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["work_date"], started.date_naive().to_string());
    assert!(body["data"]["worked_minutes"].as_i64().unwrap() >= 26 * 60);

    // nothing left open
    let (status, _) = app
        .call_as(&staff.token, Method::POST, "/api/attendance/check-out", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_managers_record_for_others() {
    let app = TestApp::new().await;
    let staff = app.operator("Sam Staff", OperatorRole::Staff).await;
    let colleague = app.operator("Cleo Staff", OperatorRole::Staff).await;
    let manager = app.operator("Mia Manager", OperatorRole::Manager).await;

    let (status, _) = app
        .call_as(
            &staff.token,
            Method::POST,
            "/api/attendance/check-in",
            Some(json!({ "operator_id": colleague.operator_id })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call_as(
            &manager.token,
            Method::POST,
            "/api/attendance/check-in",
            Some(json!({ "operator_id": colleague.operator_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["operator_id"], colleague.operator_id.to_string());

    let records = app
        .data(
            Method::GET,
            &format!("/api/attendance?operator_id={}", colleague.operator_id),
            None,
        )
        .await;
    assert_eq!(records["total"], 1);

    let (status, _) = app
        .call(
            Method::GET,
            "/api/attendance?from=2024-02-01&to=2024-01-01",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn customer_crud_keeps_emails_unique() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/customers",
            Some(json!({ "name": "Initech", "email": "buyer@initech.test", "company": "Initech" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = uuid_of(&body["data"]["id"]);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/customers",
            Some(json!({ "name": "Copycat", "email": "buyer@initech.test" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let updated = app
        .data(
            Method::PUT,
            &format!("/api/customers/{id}"),
            Some(json!({ "phone": "+1 555 0100" })),
        )
        .await;
    assert_eq!(updated["phone"], "+1 555 0100");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/customers",
            Some(json!({ "name": "Bad", "email": "not-an-email" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/customers/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(Method::GET, &format!("/api/customers/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
