use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use super::{MailError, OutboundEmail};
use crate::config::MailConfig;

/// Delivers outbound helpdesk mail
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;

    fn name(&self) -> &'static str;
}

/// Builds the transport selected by `mail.transport`.
pub fn build_transport(config: &MailConfig) -> Result<Arc<dyn MailTransport>, MailError> {
    if config.uses_relay() {
        let url = config
            .relay_url
            .clone()
            .ok_or_else(|| MailError::Configuration("mail.relay_url is not set".into()))?;
        let relay = RelayTransport::new(
            url,
            config.relay_secret.clone(),
            Duration::from_secs(config.relay_timeout_secs),
            config.relay_max_retries,
        )?;
        Ok(Arc::new(relay))
    } else {
        Ok(Arc::new(LogTransport))
    }
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        email.validate()?;
        info!(
            message_id = %email.message_id,
            to = %email.to.iter().map(|m| m.email.as_str()).collect::<Vec<_>>().join(","),
            subject = %email.subject,
            "Outbound mail (log transport)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps sent messages in memory; can be switched to fail every send.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransport {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    failing: Arc<std::sync::atomic::AtomicBool>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn last(&self) -> Option<OutboundEmail> {
        self.sent.lock().await.last().cloned()
    }
}

#[async_trait]
impl MailTransport for InMemoryTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        email.validate()?;
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MailError::Transport("in-memory transport set to fail".into()));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// HMAC-SHA256 over `"{timestamp}.{body}"`, hex encoded.
pub fn sign_payload(secret: &str, timestamp: &str, body: &str) -> Result<String, MailError> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| MailError::Configuration(format!("invalid relay secret: {}", e)))?;
    mac.update(format!("{}.{}", timestamp, body).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Serialize)]
struct RelayHeader<'a> {
    name: &'a str,
    value: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: String,
    to: Vec<String>,
    subject: &'a str,
    text: &'a str,
    message_id: &'a str,
    headers: Vec<RelayHeader<'a>>,
}

impl<'a> From<&'a OutboundEmail> for RelayPayload<'a> {
    fn from(email: &'a OutboundEmail) -> Self {
        Self {
            from: email.from.to_string(),
            to: email.to.iter().map(ToString::to_string).collect(),
            subject: &email.subject,
            text: &email.text_body,
            message_id: &email.message_id,
            headers: email
                .headers()
                .into_iter()
                .map(|(name, value)| RelayHeader { name, value })
                .collect(),
        }
    }
}

/// Posts messages as JSON to an HTTP mail relay.
///
/// Requests carry `X-Relay-Timestamp` and, when a secret is configured,
/// `X-Relay-Signature`. Transport errors, 5xx and 429 are retried with
/// exponential backoff; other 4xx responses fail immediately.
#[derive(Clone)]
pub struct RelayTransport {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
    max_retries: u32,
    base_backoff: Duration,
}

impl RelayTransport {
    pub fn new(
        url: String,
        secret: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            url,
            secret,
            max_retries: max_retries.max(1),
            base_backoff: Duration::from_secs(1),
        })
    }

    /// Overrides the first backoff delay (doubles per attempt).
    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2_u32.pow(attempt.saturating_sub(1))
    }
}

#[async_trait]
impl MailTransport for RelayTransport {
    #[instrument(skip(self, email), fields(message_id = %email.message_id))]
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        email.validate()?;
        let body = serde_json::to_string(&RelayPayload::from(email))
            .map_err(|e| MailError::InvalidMessage(e.to_string()))?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self
            .secret
            .as_deref()
            .map(|secret| sign_payload(secret, &timestamp, &body))
            .transpose()?;

        let mut last_error = MailError::Transport("relay not attempted".into());
        for attempt in 1..=self.max_retries {
            let mut request = self
                .client
                .post(&self.url)
                .header("Content-Type", "application/json")
                .header("X-Relay-Timestamp", &timestamp)
                .body(body.clone());
            if let Some(sig) = &signature {
                request = request.header("X-Relay-Signature", sig);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(attempt, "Mail accepted by relay");
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    warn!(
                        "Relay rejected mail with status {} (attempt {}/{})",
                        status, attempt, self.max_retries
                    );
                    last_error = MailError::Rejected {
                        status: status.as_u16(),
                        body: text,
                    };
                    if status.is_client_error() && status.as_u16() != 429 {
                        return Err(last_error);
                    }
                }
                Err(e) => {
                    warn!(
                        "Relay delivery error: {} (attempt {}/{})",
                        e, attempt, self.max_retries
                    );
                    last_error = MailError::Transport(e.to_string());
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        error!("Mail delivery failed after {} attempts", self.max_retries);
        Err(last_error)
    }

    fn name(&self) -> &'static str {
        "relay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::Mailbox;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email() -> OutboundEmail {
        OutboundEmail {
            from: Mailbox::new("helpdesk@example.com", None),
            to: vec![Mailbox::new("jane@customer.test", Some("Jane".into()))],
            subject: "[TKT-0A1B2C3D] Broken pump".into(),
            text_body: "Thanks, we received your request.".into(),
            message_id: "ack@erp.local".into(),
            in_reply_to: Some("first@customer.test".into()),
            references: vec!["first@customer.test".into()],
        }
    }

    fn relay(server: &MockServer, retries: u32) -> RelayTransport {
        RelayTransport::new(
            format!("{}/send", server.uri()),
            Some("relay-secret".into()),
            Duration::from_secs(2),
            retries,
        )
        .unwrap()
        .with_base_backoff(Duration::from_millis(5))
    }

    #[test]
    fn signature_is_stable_hex() {
        let a = sign_payload("secret", "1700000000", "{}").unwrap();
        let b = sign_payload("secret", "1700000000", "{}").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sign_payload("other", "1700000000", "{}").unwrap());
    }

    #[tokio::test]
    async fn relay_posts_signed_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header_exists("X-Relay-Signature"))
            .and(header_exists("X-Relay-Timestamp"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        relay(&server, 3).send(&email()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["message_id"], "ack@erp.local");
        let headers = body["headers"].as_array().unwrap();
        assert!(headers
            .iter()
            .any(|h| h["name"] == "In-Reply-To" && h["value"] == "<first@customer.test>"));
    }

    #[tokio::test]
    async fn relay_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = relay(&server, 3).send(&email()).await;
        assert!(matches!(result, Err(MailError::Rejected { status: 503, .. })));
    }

    #[tokio::test]
    async fn relay_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad address"))
            .expect(1)
            .mount(&server)
            .await;

        let result = relay(&server, 3).send(&email()).await;
        match result {
            Err(MailError::Rejected { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad address");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn in_memory_transport_records_and_fails_on_demand() {
        let transport = InMemoryTransport::new();
        transport.send(&email()).await.unwrap();
        assert_eq!(transport.sent().await.len(), 1);

        transport.set_failing(true);
        assert!(transport.send(&email()).await.is_err());
        assert_eq!(transport.sent().await.len(), 1);
    }

    #[test]
    fn relay_transport_requires_url() {
        let config = MailConfig {
            transport: "relay".into(),
            ..MailConfig::default()
        };
        assert!(build_transport(&config).is_err());
        assert_eq!(
            build_transport(&MailConfig::default()).unwrap().name(),
            "log"
        );
    }
}
