//! Helpdesk mail: outbound message model, RFC 5322 header parsing and the
//! transports that deliver replies.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub mod parser;
pub mod transport;

pub use parser::{
    extract_message_ids, extract_ticket_number, normalize_subject, parse_mailbox,
    parse_raw_email, ParsedEmail,
};
pub use transport::{
    build_transport, InMemoryTransport, LogTransport, MailTransport, RelayTransport,
};

/// Mail errors
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Relay rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A display name plus address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mailbox {
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if !name.trim().is_empty() => {
                write!(f, "\"{}\" <{}>", name.replace('"', "'"), self.email)
            }
            _ => write!(f, "<{}>", self.email),
        }
    }
}

/// Message handed to a [`MailTransport`]. Message-IDs are kept without the
/// surrounding angle brackets; [`OutboundEmail::headers`] adds them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from: Mailbox,
    pub to: Vec<Mailbox>,
    pub subject: String,
    pub text_body: String,
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
}

impl OutboundEmail {
    /// Threading and addressing headers in wire form.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("From", self.from.to_string()),
            (
                "To",
                self.to
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            ("Subject", self.subject.clone()),
            ("Message-ID", angle(&self.message_id)),
        ];
        if let Some(parent) = &self.in_reply_to {
            headers.push(("In-Reply-To", angle(parent)));
        }
        if !self.references.is_empty() {
            headers.push((
                "References",
                self.references
                    .iter()
                    .map(|id| angle(id))
                    .collect::<Vec<_>>()
                    .join(" "),
            ));
        }
        headers
    }

    pub fn validate(&self) -> Result<(), MailError> {
        if self.to.is_empty() {
            return Err(MailError::InvalidMessage("no recipients".into()));
        }
        if self.to.iter().any(|m| !m.email.contains('@')) {
            return Err(MailError::InvalidMessage("malformed recipient".into()));
        }
        if self.message_id.trim().is_empty() {
            return Err(MailError::InvalidMessage("missing Message-ID".into()));
        }
        Ok(())
    }
}

fn angle(id: &str) -> String {
    format!("<{}>", id.trim_matches(|c| c == '<' || c == '>'))
}

/// New Message-ID `<uuid>@<domain>` (returned without brackets).
pub fn generate_message_id(domain: &str) -> String {
    format!("{}@{}", Uuid::new_v4().simple(), domain.trim())
}

/// Subject carrying the ticket token, e.g. `[TKT-1A2B3C4D] Printer jammed`.
pub fn ticket_subject(ticket_number: &str, subject: &str) -> String {
    let clean = normalize_subject(subject);
    format!("[{}] {}", ticket_number, clean)
}

/// Reply subject: `Re: [TKT-…] original`.
pub fn reply_subject(ticket_number: &str, subject: &str) -> String {
    format!("Re: {}", ticket_subject(ticket_number, subject))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OutboundEmail {
        OutboundEmail {
            from: Mailbox::new("helpdesk@example.com", Some("Helpdesk".into())),
            to: vec![Mailbox::new("jane@customer.test", None)],
            subject: "Re: [TKT-0A1B2C3D] Broken pump".into(),
            text_body: "We are on it".into(),
            message_id: "abc@erp.local".into(),
            in_reply_to: Some("first@customer.test".into()),
            references: vec!["first@customer.test".into()],
        }
    }

    #[test]
    fn headers_wrap_ids_in_angle_brackets() {
        let headers = sample().headers();
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("Message-ID"), "<abc@erp.local>");
        assert_eq!(get("In-Reply-To"), "<first@customer.test>");
        assert_eq!(get("References"), "<first@customer.test>");
        assert_eq!(get("From"), "\"Helpdesk\" <helpdesk@example.com>");
    }

    #[test]
    fn validation_requires_recipient() {
        let mut email = sample();
        email.to.clear();
        assert!(email.validate().is_err());
    }

    #[test]
    fn ticket_subject_is_not_doubled() {
        assert_eq!(
            reply_subject("TKT-0A1B2C3D", "Re: [TKT-0A1B2C3D] Broken pump"),
            "Re: [TKT-0A1B2C3D] Broken pump"
        );
        assert_eq!(
            ticket_subject("TKT-0A1B2C3D", "Broken pump"),
            "[TKT-0A1B2C3D] Broken pump"
        );
    }

    #[test]
    fn generated_ids_use_domain() {
        let id = generate_message_id("erp.local");
        assert!(id.ends_with("@erp.local"));
        assert_ne!(id, generate_message_id("erp.local"));
    }
}
