//! Working out which ticket an inbound email belongs to.
//!
//! Candidates are tried in order: the `In-Reply-To` id, the `References`
//! ids newest first, then a `[TKT-XXXXXXXX]` token in the subject. The first
//! candidate that names a known message or ticket wins.

use serde::Serialize;

use crate::entities::ticket::TicketStatus;
use crate::mail::extract_ticket_number;

/// Which header a thread match came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    InReplyTo,
    References,
    SubjectToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadKey {
    /// Message-ID of an earlier message in some thread
    MessageId(String, MatchSource),
    /// Ticket number taken from the subject
    TicketNumber(String),
}

impl ThreadKey {
    pub fn source(&self) -> MatchSource {
        match self {
            ThreadKey::MessageId(_, source) => *source,
            ThreadKey::TicketNumber(_) => MatchSource::SubjectToken,
        }
    }
}

/// Lookup keys for an inbound message, in the order they should be tried.
pub fn thread_keys(in_reply_to: Option<&str>, references: &[String], subject: &str) -> Vec<ThreadKey> {
    let mut keys: Vec<ThreadKey> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    if let Some(parent) = in_reply_to.map(str::trim).filter(|p| !p.is_empty()) {
        seen.push(parent);
        keys.push(ThreadKey::MessageId(parent.to_string(), MatchSource::InReplyTo));
    }
    for reference in references.iter().rev() {
        let reference = reference.trim();
        if reference.is_empty() || seen.contains(&reference) {
            continue;
        }
        seen.push(reference);
        keys.push(ThreadKey::MessageId(reference.to_string(), MatchSource::References));
    }
    if let Some(number) = extract_ticket_number(subject) {
        keys.push(ThreadKey::TicketNumber(number));
    }
    keys
}

/// A reply from the ticket's own customer reopens a finished ticket.
pub fn should_reopen(status: TicketStatus, customer_email: &str, sender_email: &str) -> bool {
    status.is_finished() && customer_email.trim().eq_ignore_ascii_case(sender_email.trim())
}
