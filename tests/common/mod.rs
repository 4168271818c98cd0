#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use erp_api::{
    auth::{LoginCredentials, TokenResponse},
    config::AppConfig,
    db,
    entities::operator::OperatorRole,
    events::{self, EventSender},
    handlers::AppServices,
    mail::InMemoryTransport,
    services::{helpdesk::AutoAssigner, operators::CreateOperatorInput},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";

/// An operator account together with a bearer token for it
#[derive(Debug, Clone)]
pub struct Session {
    pub operator_id: Uuid,
    pub email: String,
    pub token: String,
}

/// Application wired onto a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: InMemoryTransport,
    pub admin: Session,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_assignment_url(None).await
    }

    /// Test app whose auto-assigner posts to `url`.
    pub async fn with_assignment_url(url: Option<String>) -> Self {
        Self::configured(|cfg| cfg.assignment_url = url).await
    }

    /// Test app built from the default test config after `adjust` ran on it.
    pub async fn configured(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.api_max_page_size = 50;
        adjust(&mut cfg);
        let url = cfg.assignment_url.clone();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let mailer = InMemoryTransport::new();
        let assigner =
            AutoAssigner::new(url, Duration::from_secs(2)).expect("assignment client for tests");
        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            &cfg,
            Arc::new(mailer.clone()),
            assigner,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            started_at: Utc::now(),
        };
        let router = erp_api::app(state.clone());

        let mut app = Self {
            router,
            state,
            mailer,
            admin: Session {
                operator_id: Uuid::nil(),
                email: String::new(),
                token: String::new(),
            },
            _event_task: event_task,
        };
        app.admin = app.operator("Ada Admin", OperatorRole::Admin).await;
        app
    }

    /// Creates an operator with `role` and logs it in.
    pub async fn operator(&self, name: &str, role: OperatorRole) -> Session {
        let email = format!(
            "{}.{}@erp.test",
            name.to_ascii_lowercase().replace(' ', "."),
            &Uuid::new_v4().simple().to_string()[..6]
        );
        let created = self
            .state
            .services
            .operators
            .create_operator(CreateOperatorInput {
                name: name.to_string(),
                email: email.clone(),
                password: PASSWORD.to_string(),
                role,
            })
            .await
            .expect("create operator");
        let token: TokenResponse = self
            .state
            .services
            .auth
            .login(&LoginCredentials {
                email: email.clone(),
                password: PASSWORD.to_string(),
            })
            .await
            .expect("login operator");

        Session {
            operator_id: created.id,
            email,
            token: token.access_token,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Sends a raw text body, the way a mail gateway pushes messages.
    pub async fn request_text(&self, uri: &str, token: &str, body: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(body.to_string()))
            .expect("request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Request as the admin operator; returns the status and parsed body.
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = self.admin.token.clone();
        self.call_as(&token, method, uri, body).await
    }

    pub async fn call_as(
        &self,
        token: &str,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, Some(token), body).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    /// Data of a successful call; panics with the body otherwise.
    pub async fn data(&self, method: Method, uri: &str, body: Option<Value>) -> Value {
        let (status, json) = self.call(method.clone(), uri, body).await;
        assert!(
            status.is_success(),
            "{method} {uri} failed with {status}: {json}"
        );
        json["data"].clone()
    }

    pub async fn create_warehouse(&self, code: &str) -> Uuid {
        let data = self
            .data(
                Method::POST,
                "/api/warehouse",
                Some(json!({ "code": code, "name": format!("{code} warehouse") })),
            )
            .await;
        uuid_of(&data["id"])
    }

    /// Approved purchase order for `lines` of `(item_code, quantity, rate)`.
    pub async fn approved_purchase_order(&self, lines: &[(&str, &str, &str)]) -> Value {
        let lines: Vec<Value> = lines
            .iter()
            .map(|(item, qty, rate)| json!({ "item_code": item, "quantity": qty, "rate": rate }))
            .collect();
        let po = self
            .data(
                Method::POST,
                "/api/purchase-order",
                Some(json!({ "party_name": "Acme Supplies", "lines": lines })),
            )
            .await;
        let id = uuid_of(&po["id"]);
        for status in ["submitted", "approved"] {
            self.data(
                Method::PUT,
                &format!("/api/purchase-order/{id}/status"),
                Some(json!({ "status": status })),
            )
            .await;
        }
        self.data(Method::GET, &format!("/api/purchase-order/{id}"), None)
            .await
    }

    /// Receives every line of an approved purchase order in full.
    pub async fn receive_all(
        &self,
        po: &Value,
        warehouse_id: Uuid,
        batch_number: &str,
        expiry: Option<&str>,
    ) -> Value {
        let lines: Vec<Value> = po["lines"]
            .as_array()
            .expect("order lines")
            .iter()
            .map(|line| {
                json!({
                    "order_line_id": line["id"],
                    "received_quantity": line["quantity"],
                    "batch_number": batch_number,
                    "expiry_date": expiry,
                })
            })
            .collect();
        self.data(
            Method::POST,
            "/api/grn",
            Some(json!({
                "purchase_order_id": po["id"],
                "warehouse_id": warehouse_id,
                "lines": lines,
            })),
        )
        .await
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn uuid_of(value: &Value) -> Uuid {
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(|| panic!("expected uuid, got {value}"))
}

/// Decimals travel as strings; compare them numerically.
pub fn decimal_of(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap_or_else(|_| panic!("not a decimal: {s}")),
        Value::Number(n) => n.to_string().parse().expect("numeric decimal"),
        other => panic!("expected decimal, got {other}"),
    }
}
