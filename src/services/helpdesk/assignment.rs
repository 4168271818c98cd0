use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Ticket summary posted to the assignment endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentRequest {
    pub ticket_id: Uuid,
    pub ticket_number: String,
    pub subject: String,
    pub body: String,
    pub priority: String,
    pub category: Option<String>,
    pub customer_email: String,
}

#[derive(Debug, Deserialize)]
struct AssignmentReply {
    #[serde(default, alias = "assigned_to", alias = "agent_id")]
    operator_id: Option<Uuid>,
}

/// How a ticket ended up with its assignee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    External,
    LeastLoaded,
    Unassigned,
}

/// Open ticket count of one active agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLoad {
    pub operator_id: Uuid,
    pub name: String,
    pub open_tickets: u64,
}

/// Agent with the fewest open tickets; ties go to the name sorting first.
pub fn pick_least_loaded(loads: &[AgentLoad]) -> Option<Uuid> {
    loads
        .iter()
        .min_by(|a, b| {
            a.open_tickets
                .cmp(&b.open_tickets)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.operator_id.cmp(&b.operator_id))
        })
        .map(|load| load.operator_id)
}

/// Client for the external auto-assignment endpoint
#[derive(Clone)]
pub struct AutoAssigner {
    client: reqwest::Client,
    url: Option<String>,
}

impl AutoAssigner {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::ExternalServiceError(format!("assignment client: {}", e)))?;
        Ok(Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
        })
    }

    /// Assigner that never calls out; only the least-loaded fallback applies.
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Operator suggested by the endpoint, if one is configured and answers.
    #[instrument(skip(self, request), fields(ticket = %request.ticket_number))]
    pub async fn suggest(&self, request: &AssignmentRequest) -> Result<Option<Uuid>, ServiceError> {
        let Some(url) = &self.url else {
            return Ok(None);
        };

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("auto-assign request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Auto-assign endpoint refused ticket");
            return Err(ServiceError::ExternalServiceError(format!(
                "auto-assign endpoint returned {}",
                status
            )));
        }

        let reply: AssignmentReply = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("auto-assign reply: {}", e)))?;
        debug!(operator_id = ?reply.operator_id, "Auto-assign suggestion");
        Ok(reply.operator_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> AssignmentRequest {
        AssignmentRequest {
            ticket_id: Uuid::new_v4(),
            ticket_number: "TKT-0A1B2C3D".into(),
            subject: "Pump broken".into(),
            body: "It leaks".into(),
            priority: "high".into(),
            category: None,
            customer_email: "jane@customer.test".into(),
        }
    }

    fn load(name: &str, open: u64) -> AgentLoad {
        AgentLoad {
            operator_id: Uuid::new_v4(),
            name: name.into(),
            open_tickets: open,
        }
    }

    #[test]
    fn least_loaded_agent_wins() {
        let loads = vec![load("Bea", 3), load("Cal", 1), load("Al", 1)];
        assert_eq!(pick_least_loaded(&loads), Some(loads[2].operator_id));
        assert_eq!(pick_least_loaded(&[]), None);
    }

    #[tokio::test]
    async fn returns_suggested_operator() {
        let server = MockServer::start().await;
        let operator = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/ai/auto-assign"))
            .and(body_partial_json(serde_json::json!({ "ticket_number": "TKT-0A1B2C3D" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "assigned_to": operator })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let assigner = AutoAssigner::new(
            Some(format!("{}/ai/auto-assign", server.uri())),
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(assigner.suggest(&request()).await.unwrap(), Some(operator));
    }

    #[tokio::test]
    async fn server_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let assigner = AutoAssigner::new(Some(server.uri()), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            assigner.suggest(&request()).await,
            Err(ServiceError::ExternalServiceError(_))
        ));
    }

    #[tokio::test]
    async fn disabled_assigner_suggests_nothing() {
        let assigner = AutoAssigner::disabled();
        assert!(!assigner.is_enabled());
        assert_eq!(assigner.suggest(&request()).await.unwrap(), None);
    }
}
