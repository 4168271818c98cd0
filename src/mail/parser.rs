use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{MailError, Mailbox};

static MSG_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>\s]+)>").expect("message id regex"));

static TICKET_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[(TKT-[0-9A-F]{8})\]").expect("ticket token regex"));

static REPLY_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(re|fw|fwd|aw|sv|wg)\s*(\[\d+\])?\s*:\s*").expect("reply prefix regex")
});

static BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)boundary\s*=\s*"?([^";]+)"?"#).expect("boundary regex"));

/// Headers and text body pulled out of an inbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEmail {
    pub from: Mailbox,
    pub to: Vec<Mailbox>,
    pub subject: String,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub date: Option<String>,
    pub text_body: String,
}

/// Parses a raw RFC 5322 message. Folded headers are unfolded, header names
/// match case-insensitively and the first occurrence wins. For multipart
/// bodies the first `text/plain` part is used.
pub fn parse_raw_email(raw: &str) -> Result<ParsedEmail, MailError> {
    let normalized = raw.replace("\r\n", "\n");
    let (header_block, body) = split_head(&normalized);
    let headers = parse_headers(header_block);
    if headers.is_empty() {
        return Err(MailError::Parse("message has no headers".into()));
    }

    let from_raw = header(&headers, "from")
        .ok_or_else(|| MailError::Parse("missing From header".into()))?;
    let from = parse_mailbox(from_raw)
        .ok_or_else(|| MailError::Parse(format!("unreadable From header: {}", from_raw)))?;

    let to = header(&headers, "to")
        .map(|value| {
            split_addresses(value)
                .iter()
                .filter_map(|a| parse_mailbox(a))
                .collect()
        })
        .unwrap_or_default();

    let message_id = header(&headers, "message-id")
        .and_then(|v| extract_message_ids(v).into_iter().next());
    let in_reply_to = header(&headers, "in-reply-to")
        .and_then(|v| extract_message_ids(v).into_iter().next());
    let references = header(&headers, "references")
        .map(extract_message_ids)
        .unwrap_or_default();

    let content_type = header(&headers, "content-type").unwrap_or("text/plain");
    let encoding = header(&headers, "content-transfer-encoding");
    let text_body = extract_text(content_type, encoding, body);

    Ok(ParsedEmail {
        from,
        to,
        subject: header(&headers, "subject").unwrap_or_default().to_string(),
        message_id,
        in_reply_to,
        references,
        date: header(&headers, "date").map(str::to_string),
        text_body,
    })
}

fn split_head(message: &str) -> (&str, &str) {
    match message.find("\n\n") {
        Some(pos) => (&message[..pos], &message[pos + 2..]),
        None => (message, ""),
    }
}

fn parse_headers(block: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in block.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    headers
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn extract_text(content_type: &str, encoding: Option<&str>, body: &str) -> String {
    let lowered = content_type.to_ascii_lowercase();
    if lowered.starts_with("multipart/") {
        if let Some(boundary) = BOUNDARY_RE
            .captures(content_type)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
        {
            let delimiter = format!("--{}", boundary);
            for part in body.split(delimiter.as_str()).skip(1) {
                if part.starts_with("--") {
                    break;
                }
                let part = part.trim_start_matches('\n');
                let (head, part_body) = split_head(part);
                let part_headers = parse_headers(head);
                let part_type = header(&part_headers, "content-type").unwrap_or("text/plain");
                if part_type.to_ascii_lowercase().starts_with("multipart/") {
                    let nested = extract_text(
                        part_type,
                        header(&part_headers, "content-transfer-encoding"),
                        part_body,
                    );
                    if !nested.is_empty() {
                        return nested;
                    }
                } else if part_type.to_ascii_lowercase().starts_with("text/plain") {
                    return decode_body(
                        header(&part_headers, "content-transfer-encoding"),
                        part_body,
                    );
                }
            }
        }
        return String::new();
    }
    decode_body(encoding, body)
}

fn decode_body(encoding: Option<&str>, body: &str) -> String {
    match encoding.map(|e| e.trim().to_ascii_lowercase()) {
        Some(e) if e == "quoted-printable" => decode_quoted_printable(body),
        _ => body.trim_end().to_string(),
    }
}

fn decode_quoted_printable(body: &str) -> String {
    let mut bytes = Vec::with_capacity(body.len());
    let mut lines = body.lines().peekable();
    while let Some(line) = lines.next() {
        let (content, soft_break) = match line.strip_suffix('=') {
            Some(stripped) => (stripped, true),
            None => (line, false),
        };
        let raw = content.as_bytes();
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'=' && i + 2 < raw.len() {
                let hex = std::str::from_utf8(&raw[i + 1..i + 3]).ok();
                if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    bytes.push(value);
                    i += 3;
                    continue;
                }
            }
            bytes.push(raw[i]);
            i += 1;
        }
        if !soft_break && lines.peek().is_some() {
            bytes.push(b'\n');
        }
    }
    String::from_utf8_lossy(&bytes).trim_end().to_string()
}

/// All `<id>` tokens in a header value, brackets removed, in order.
pub fn extract_message_ids(value: &str) -> Vec<String> {
    let ids: Vec<String> = MSG_ID_RE
        .captures_iter(value)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();
    if ids.is_empty() {
        // bare ids without brackets
        return value
            .split_whitespace()
            .filter(|token| token.contains('@'))
            .map(|token| token.trim_matches(|c| c == '<' || c == '>' || c == ',').to_string())
            .collect();
    }
    ids
}

/// Reads `Name <addr>`, `"Name" <addr>` or a bare address.
pub fn parse_mailbox(value: &str) -> Option<Mailbox> {
    let value = value.trim();
    if let (Some(open), Some(close)) = (value.rfind('<'), value.rfind('>')) {
        if open < close {
            let email = value[open + 1..close].trim().to_ascii_lowercase();
            if !email.contains('@') {
                return None;
            }
            let name = value[..open].trim().trim_matches('"').trim();
            return Some(Mailbox::new(
                email,
                (!name.is_empty()).then(|| name.to_string()),
            ));
        }
    }
    let email = value.trim_matches('"').trim();
    if email.contains('@') && !email.contains(char::is_whitespace) {
        Some(Mailbox::new(email.to_ascii_lowercase(), None))
    } else {
        None
    }
}

fn split_addresses(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => {
                out.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

/// `[TKT-XXXXXXXX]` token from a subject, upper-cased.
pub fn extract_ticket_number(subject: &str) -> Option<String> {
    TICKET_TOKEN_RE
        .captures(subject)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

/// Strips reply/forward prefixes and ticket tokens, collapsing whitespace.
pub fn normalize_subject(subject: &str) -> String {
    let mut current = TICKET_TOKEN_RE.replace_all(subject, " ").to_string();
    loop {
        let stripped = REPLY_PREFIX_RE.replace(&current, "").to_string();
        if stripped == current {
            break;
        }
        current = stripped;
    }
    current.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = "From: \"Jane Doe\" <Jane@Customer.test>\r\n\
To: Helpdesk <helpdesk@example.com>, ops@example.com\r\n\
Subject: Re: [tkt-0a1b2c3d] Broken pump\r\n\
Message-ID: <reply-2@customer.test>\r\n\
In-Reply-To: <ack-1@erp.local>\r\n\
References: <first@customer.test>\r\n <ack-1@erp.local>\r\n\
Date: Tue, 5 Mar 2024 10:00:00 +0000\r\n\
\r\n\
Still broken.\r\n";

    #[test]
    fn parses_threading_headers() {
        let email = parse_raw_email(REPLY).unwrap();
        assert_eq!(email.from.email, "jane@customer.test");
        assert_eq!(email.from.name.as_deref(), Some("Jane Doe"));
        assert_eq!(email.to.len(), 2);
        assert_eq!(email.message_id.as_deref(), Some("reply-2@customer.test"));
        assert_eq!(email.in_reply_to.as_deref(), Some("ack-1@erp.local"));
        assert_eq!(
            email.references,
            vec!["first@customer.test".to_string(), "ack-1@erp.local".to_string()]
        );
        assert_eq!(email.text_body, "Still broken.");
        assert!(email.date.is_some());
    }

    #[test]
    fn first_header_occurrence_wins() {
        let raw = "From: a@x.test\nSubject: one\nsubject: two\n\nbody";
        assert_eq!(parse_raw_email(raw).unwrap().subject, "one");
    }

    #[test]
    fn missing_from_is_an_error() {
        assert!(parse_raw_email("Subject: hi\n\nbody").is_err());
    }

    #[test]
    fn multipart_uses_plain_text_part() {
        let raw = "From: a@x.test\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\n\
\n\
preamble\n\
--XYZ\n\
Content-Type: text/html\n\
\n\
<p>html</p>\n\
--XYZ\n\
Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
Caf=C3=A9 is =\n\
open\n\
--XYZ--\n";
        let email = parse_raw_email(raw).unwrap();
        assert_eq!(email.text_body, "Café is open");
    }

    #[test]
    fn ticket_token_is_found_case_insensitively() {
        assert_eq!(
            extract_ticket_number("Re: [tkt-0a1b2c3d] Broken pump"),
            Some("TKT-0A1B2C3D".to_string())
        );
        assert_eq!(extract_ticket_number("TKT-0A1B2C3D without brackets"), None);
    }

    #[test]
    fn subject_normalization() {
        assert_eq!(
            normalize_subject("RE: Fwd: [TKT-0A1B2C3D]   Broken   pump"),
            "Broken pump"
        );
        assert_eq!(normalize_subject("Re[2]: hello"), "hello");
    }

    #[test]
    fn mailbox_forms() {
        assert_eq!(
            parse_mailbox("bob@x.test"),
            Some(Mailbox::new("bob@x.test", None))
        );
        assert_eq!(
            parse_mailbox("Bob <BOB@x.test>"),
            Some(Mailbox::new("bob@x.test", Some("Bob".into())))
        );
        assert_eq!(parse_mailbox("not an address"), None);
    }

    #[test]
    fn bare_message_ids_are_accepted() {
        assert_eq!(
            extract_message_ids("abc@x.test"),
            vec!["abc@x.test".to_string()]
        );
    }
}
