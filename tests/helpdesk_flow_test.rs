//! Ticket lifecycle, mail threading and automatic assignment.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, uuid_of, TestApp};
use erp_api::entities::operator::OperatorRole;
use serde_json::{json, Value};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const CUSTOMER: &str = "jane@customer.test";

async fn open_ticket(app: &TestApp, subject: &str) -> Value {
    let (status, body) = app
        .call(
            Method::POST,
            "/api/helpdesk/tickets",
            Some(json!({
                "subject": subject,
                "body": "The pump leaks after an hour.",
                "customer_email": CUSTOMER,
                "customer_name": "Jane Doe",
                "priority": "high"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn new_ticket_is_acknowledged_by_email() {
    let app = TestApp::new().await;
    let ticket = open_ticket(&app, "Pump leaking").await;

    let number = ticket["ticket_number"].as_str().unwrap();
    assert!(number.starts_with("TKT-"));
    assert_eq!(ticket["status"], "open");
    assert_eq!(ticket["acknowledgement"]["delivered"], true);

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to[0].email, CUSTOMER);
    assert!(sent[0].subject.contains(number));
    assert_eq!(
        sent[0].message_id,
        ticket["acknowledgement"]["message_id"].as_str().unwrap()
    );

    // the first message plus the acknowledgement
    assert_eq!(ticket["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_acknowledgement_still_opens_the_ticket() {
    let app = TestApp::new().await;
    app.mailer.set_failing(true);

    let ticket = open_ticket(&app, "Pump leaking").await;
    assert_eq!(ticket["acknowledgement"]["delivered"], false);
    assert!(ticket["acknowledgement"]["error"].as_str().is_some());
    assert!(app.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn replies_are_mailed_but_notes_are_not() {
    let app = TestApp::new().await;
    let agent = app.operator("Alex Agent", OperatorRole::Agent).await;
    let ticket = open_ticket(&app, "Pump leaking").await;
    let id = ticket["id"].as_str().unwrap();

    let (status, body) = app
        .call_as(
            &agent.token,
            Method::POST,
            &format!("/api/helpdesk/tickets/{id}/reply"),
            Some(json!({ "body": "Please send a photo of the seal." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["delivery"]["delivered"], true);
    assert_eq!(body["data"]["ticket_status"], "in_progress");

    let reply = app.mailer.last().await.unwrap();
    // threaded under the acknowledgement
    assert_eq!(
        reply.in_reply_to.as_deref(),
        ticket["acknowledgement"]["message_id"].as_str()
    );

    let (status, body) = app
        .call_as(
            &agent.token,
            Method::POST,
            &format!("/api/helpdesk/tickets/{id}/reply"),
            Some(json!({ "body": "Probably the O-ring batch.", "internal": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"].get("delivery").is_none());
    assert_eq!(app.mailer.sent().await.len(), 2);
}

#[tokio::test]
async fn undelivered_reply_is_not_a_thread_parent() {
    let app = TestApp::new().await;
    let agent = app.operator("Alex Agent", OperatorRole::Agent).await;
    let ticket = open_ticket(&app, "Pump leaking").await;
    let id = ticket["id"].as_str().unwrap();
    let ack_id = ticket["acknowledgement"]["message_id"].as_str().unwrap();

    app.mailer.set_failing(true);
    let (status, body) = app
        .call_as(
            &agent.token,
            Method::POST,
            &format!("/api/helpdesk/tickets/{id}/reply"),
            Some(json!({ "body": "Lost in transit." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["delivery"]["delivered"], false);

    app.mailer.set_failing(false);
    app.call_as(
        &agent.token,
        Method::POST,
        &format!("/api/helpdesk/tickets/{id}/reply"),
        Some(json!({ "body": "Please send a photo of the seal." })),
    )
    .await;

    let reply = app.mailer.last().await.unwrap();
    assert_eq!(reply.in_reply_to.as_deref(), Some(ack_id));
}

#[tokio::test]
async fn references_alone_find_the_thread() {
    let app = TestApp::new().await;
    let ticket = open_ticket(&app, "Pump leaking").await;
    let ack_id = ticket["acknowledgement"]["message_id"].as_str().unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/helpdesk/inbound",
            Some(json!({
                "from": CUSTOMER,
                "subject": "Re: Pump leaking",
                "message_id": "<forwarded@customer.test>",
                "in_reply_to": "<unknown@elsewhere.test>",
                "references": [format!("<first@customer.test> <{ack_id}>")],
                "text": "Forwarding from my phone."
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["action"], "threaded");
    assert_eq!(body["data"]["matched_by"], "references");
    assert_eq!(body["data"]["ticket_id"], ticket["id"]);
}

#[tokio::test]
async fn customer_reply_threads_then_reopens() {
    let app = TestApp::new().await;
    let ticket = open_ticket(&app, "Pump leaking").await;
    let id = ticket["id"].as_str().unwrap();
    let ack_id = ticket["acknowledgement"]["message_id"].as_str().unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/helpdesk/inbound",
            Some(json!({
                "from": "Jane Doe <jane@customer.test>",
                "subject": "Re: Pump leaking",
                "message_id": "<reply-1@customer.test>",
                "in_reply_to": format!("<{ack_id}>"),
                "text": "Photo attached."
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["action"], "threaded");
    assert_eq!(body["data"]["matched_by"], "in_reply_to");
    assert_eq!(body["data"]["ticket_id"], id);

    app.data(
        Method::PUT,
        &format!("/api/helpdesk/tickets/{id}/status"),
        Some(json!({ "status": "resolved" })),
    )
    .await;

    // subject token alone is enough to find the ticket
    let number = ticket["ticket_number"].as_str().unwrap();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/helpdesk/inbound",
            Some(json!({
                "from": CUSTOMER,
                "subject": format!("Re: [{number}] Pump leaking"),
                "message_id": "reply-2@customer.test",
                "text": "It is leaking again."
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["action"], "reopened");
    assert_eq!(body["data"]["matched_by"], "subject_token");

    let detail = app
        .data(Method::GET, &format!("/api/helpdesk/tickets/{id}"), None)
        .await;
    assert_eq!(detail["status"], "open");
    assert_eq!(detail["reopened_count"], 1);
    assert_eq!(detail["messages"].as_array().unwrap().len(), 4);

    // redelivery of the same message
    let (status, body) = app
        .call(
            Method::POST,
            "/api/helpdesk/inbound",
            Some(json!({
                "from": CUSTOMER,
                "subject": "Re: Pump leaking",
                "message_id": "<reply-2@customer.test>",
                "text": "It is leaking again."
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["action"], "duplicate");
}

#[tokio::test]
async fn raw_email_opens_a_ticket() {
    let app = TestApp::new().await;
    let raw = "From: Bob Buyer <bob@shop.test>\r\n\
               To: support@erp.local\r\n\
               Subject: Invoice question\r\n\
               Message-ID: <first@shop.test>\r\n\
               \r\n\
               Why was I charged twice?\r\n";

    let response = app
        .request_text("/api/helpdesk/inbound", &app.admin.token, raw)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["action"], "created");
    let ticket_id = uuid_of(&body["data"]["ticket_id"]);

    let detail = app
        .data(Method::GET, &format!("/api/helpdesk/tickets/{ticket_id}"), None)
        .await;
    assert_eq!(detail["subject"], "Invoice question");
    assert_eq!(detail["customer_email"], "bob@shop.test");
    assert_eq!(detail["source"], "email");

    let response = app
        .request_text("/api/helpdesk/inbound", &app.admin.token, "   ")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn setting_the_current_status_is_rejected() {
    let app = TestApp::new().await;
    let ticket = open_ticket(&app, "Pump leaking").await;

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/helpdesk/tickets/{}/status", ticket["id"].as_str().unwrap()),
            Some(json!({ "status": "open" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assignment_endpoint_picks_the_agent() {
    let server = MockServer::start().await;
    let app = TestApp::with_assignment_url(Some(server.uri())).await;
    let first = app.operator("Al Agent", OperatorRole::Agent).await;
    let chosen = app.operator("Bea Agent", OperatorRole::Agent).await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "assigned_to": chosen.operator_id })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ticket = open_ticket(&app, "Pump leaking").await;
    assert_eq!(ticket["assigned_to"], chosen.operator_id.to_string());
    assert_ne!(ticket["assigned_to"], first.operator_id.to_string());
}

#[tokio::test]
async fn failing_endpoint_falls_back_to_least_loaded_agent() {
    let server = MockServer::start().await;
    let app = TestApp::with_assignment_url(Some(server.uri())).await;
    let al = app.operator("Al Agent", OperatorRole::Agent).await;
    let bea = app.operator("Bea Agent", OperatorRole::Agent).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    // equal load goes to the name sorting first
    let first = open_ticket(&app, "Pump leaking").await;
    assert_eq!(first["assigned_to"], al.operator_id.to_string());

    let second = open_ticket(&app, "Hose split").await;
    assert_eq!(second["assigned_to"], bea.operator_id.to_string());

    // manual reassignment then an explicit auto-assign run
    let id = second["id"].as_str().unwrap();
    let assigned = app
        .data(
            Method::PUT,
            &format!("/api/helpdesk/tickets/{id}/assign"),
            Some(json!({ "operator_id": al.operator_id })),
        )
        .await;
    assert_eq!(assigned["assigned_to"], al.operator_id.to_string());

    let outcome = app
        .data(
            Method::POST,
            &format!("/api/helpdesk/tickets/{id}/auto-assign"),
            None,
        )
        .await;
    assert_eq!(outcome["strategy"], "least_loaded");
    assert_eq!(outcome["ticket"]["assigned_to"], bea.operator_id.to_string());
}

#[tokio::test]
async fn no_agents_leaves_ticket_unassigned() {
    let app = TestApp::new().await;
    let ticket = open_ticket(&app, "Pump leaking").await;
    assert!(ticket["assigned_to"].is_null());

    let tickets = app
        .data(Method::GET, "/api/helpdesk/tickets?status=open&search=pump", None)
        .await;
    assert_eq!(tickets["total"], 1);
}
