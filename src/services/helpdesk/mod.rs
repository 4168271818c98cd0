//! Helpdesk tickets and their mail threads.
//!
//! Every ticket has a thread of [`ticket_message`] rows. Outbound mail keeps
//! standard `In-Reply-To`/`References` headers so that customer replies
//! can be matched back to their ticket when they arrive at the inbound
//! route.

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::MailConfig,
    entities::{
        customer::{self, Entity as CustomerEntity},
        operator::{self, Entity as OperatorEntity, OperatorRole},
        ticket::{self, Entity as TicketEntity, Priority, TicketSource, TicketStatus},
        ticket_message::{self, DeliveryStatus, Entity as MessageEntity, MessageDirection},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    mail::{
        extract_message_ids, generate_message_id, normalize_subject, parse_mailbox,
        parse_raw_email, reply_subject, ticket_subject, Mailbox, MailTransport, OutboundEmail,
        ParsedEmail,
    },
    services::{like_pattern, paginate, Page},
};

pub mod assignment;
pub mod threading;

pub use assignment::{AgentLoad, AssignmentRequest, AssignmentStrategy, AutoAssigner};
pub use threading::{thread_keys, MatchSource, ThreadKey};

const NO_SUBJECT: &str = "(no subject)";

/// `TKT-` plus eight upper-case hex digits.
pub fn generate_ticket_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("TKT-{}", hex[..8].to_ascii_uppercase())
}

const OPEN_STATUSES: [TicketStatus; 3] = [
    TicketStatus::Open,
    TicketStatus::InProgress,
    TicketStatus::OnHold,
];

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTicketInput {
    #[validate(length(min = 1, max = 300))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub body: String,
    #[validate(email)]
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub customer_id: Option<Uuid>,
    #[schema(value_type = Option<String>, example = "medium")]
    pub priority: Option<Priority>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReplyInput {
    #[validate(length(min = 1))]
    pub body: String,
    /// Internal notes are stored but never emailed
    #[serde(default)]
    pub internal: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateTicketStatusInput {
    #[schema(value_type = String, example = "resolved")]
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignTicketInput {
    pub operator_id: Uuid,
}

/// Inbound mail pushed as JSON. When `raw` is present the other fields are
/// ignored and the raw message is parsed instead.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct InboundEmailInput {
    pub raw: Option<String>,
    pub from: Option<String>,
    pub from_name: Option<String>,
    pub subject: Option<String>,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(alias = "body")]
    pub text: Option<String>,
}

/// An inbound message with its headers already normalised
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub from: Mailbox,
    pub subject: String,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub body: String,
}

impl From<ParsedEmail> for InboundMessage {
    fn from(email: ParsedEmail) -> Self {
        Self {
            from: email.from,
            subject: email.subject,
            message_id: email.message_id,
            in_reply_to: email.in_reply_to,
            references: email.references,
            body: email.text_body,
        }
    }
}

impl InboundMessage {
    pub fn from_raw(raw: &str) -> Result<Self, ServiceError> {
        Ok(parse_raw_email(raw)?.into())
    }
}

impl TryFrom<InboundEmailInput> for InboundMessage {
    type Error = ServiceError;

    fn try_from(input: InboundEmailInput) -> Result<Self, Self::Error> {
        if let Some(raw) = input.raw.as_deref().filter(|r| !r.trim().is_empty()) {
            return Self::from_raw(raw);
        }
        let from_raw = input
            .from
            .as_deref()
            .ok_or_else(|| ServiceError::ValidationError("from is required".into()))?;
        let mut from = parse_mailbox(from_raw).ok_or_else(|| {
            ServiceError::ValidationError(format!("unreadable sender address: {}", from_raw))
        })?;
        if from.name.is_none() {
            from.name = input.from_name.filter(|n| !n.trim().is_empty());
        }
        Ok(Self {
            from,
            subject: input.subject.unwrap_or_default(),
            message_id: input
                .message_id
                .as_deref()
                .and_then(|v| extract_message_ids(v).into_iter().next()),
            in_reply_to: input
                .in_reply_to
                .as_deref()
                .and_then(|v| extract_message_ids(v).into_iter().next()),
            references: input
                .references
                .iter()
                .flat_map(|v| extract_message_ids(v))
                .collect(),
            body: input.text.unwrap_or_default(),
        })
    }
}

/// The operator writing a reply
#[derive(Debug, Clone)]
pub struct ReplyAuthor {
    pub operator_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: ticket::Model,
    pub messages: Vec<ticket_message::Model>,
}

/// What happened to an outbound email
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryReport {
    pub message_id: String,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedTicket {
    #[serde(flatten)]
    pub detail: TicketDetail,
    pub acknowledgement: DeliveryReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyOutcome {
    pub message: ticket_message::Model,
    pub ticket_status: TicketStatus,
    /// Absent for internal notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundAction {
    Created,
    Threaded,
    Reopened,
    Duplicate,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboundOutcome {
    pub action: InboundAction,
    pub ticket_id: Uuid,
    pub ticket_number: String,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<MatchSource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutcome {
    pub ticket: ticket::Model,
    pub strategy: AssignmentStrategy,
}

/// Ticketing plus the mail glue around it
#[derive(Clone)]
pub struct HelpdeskService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    mailer: Arc<dyn MailTransport>,
    mail: MailConfig,
    assigner: AutoAssigner,
}

impl HelpdeskService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        mailer: Arc<dyn MailTransport>,
        mail: MailConfig,
        assigner: AutoAssigner,
    ) -> Self {
        Self {
            db,
            event_sender,
            mailer,
            mail,
            assigner,
        }
    }

    fn sender(&self) -> Mailbox {
        Mailbox::new(self.mail.from_address.clone(), Some(self.mail.from_name.clone()))
    }

    #[instrument(skip(self))]
    pub async fn list_tickets(
        &self,
        filter: TicketFilter,
        page: u64,
        per_page: u64,
    ) -> Result<Page<ticket::Model>, ServiceError> {
        let mut query = TicketEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(ticket::Column::Status.eq(status));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(ticket::Column::Priority.eq(priority));
        }
        if let Some(operator) = filter.assigned_to {
            query = query.filter(ticket::Column::AssignedTo.eq(operator));
        }
        if let Some(term) = filter.search.filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(&term);
            query = query.filter(
                Condition::any()
                    .add(ticket::Column::TicketNumber.like(pattern.clone()))
                    .add(ticket::Column::Subject.like(pattern.clone()))
                    .add(ticket::Column::CustomerEmail.like(pattern)),
            );
        }
        paginate(
            query.order_by_desc(ticket::Column::LastMessageAt),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    async fn find_ticket<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<ticket::Model, ServiceError> {
        TicketEntity::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Ticket", id))
    }

    async fn thread<C: ConnectionTrait>(
        conn: &C,
        ticket_id: Uuid,
    ) -> Result<Vec<ticket_message::Model>, ServiceError> {
        MessageEntity::find()
            .filter(ticket_message::Column::TicketId.eq(ticket_id))
            .order_by_asc(ticket_message::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_ticket(&self, id: Uuid) -> Result<TicketDetail, ServiceError> {
        let db = self.db.as_ref();
        let ticket = Self::find_ticket(db, id).await?;
        let messages = Self::thread(db, id).await?;
        Ok(TicketDetail { ticket, messages })
    }

    async fn customer_by_email<C: ConnectionTrait>(
        conn: &C,
        email: &str,
    ) -> Result<Option<customer::Model>, ServiceError> {
        CustomerEntity::find()
            .filter(customer::Column::Email.eq(email))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Inserts a ticket with its first inbound message.
    async fn open_ticket<C: ConnectionTrait>(
        conn: &C,
        new: NewTicket,
    ) -> Result<(ticket::Model, ticket_message::Model), ServiceError> {
        let now = Utc::now();
        let ticket = ticket::ActiveModel {
            id: Set(Uuid::new_v4()),
            ticket_number: Set(generate_ticket_number()),
            subject: Set(new.subject),
            customer_email: Set(new.customer.email.clone()),
            customer_name: Set(new.customer.name.clone()),
            customer_id: Set(new.customer_id),
            status: Set(TicketStatus::Open),
            priority: Set(new.priority),
            category: Set(new.category),
            assigned_to: Set(None),
            source: Set(new.source),
            last_message_at: Set(now),
            reopened_count: Set(0),
            resolved_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(|e| {
            error!("Failed to create ticket: {}", e);
            ServiceError::db_error(e)
        })?;

        let message = ticket_message::ActiveModel {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket.id),
            direction: Set(MessageDirection::Inbound),
            author_email: Set(new.customer.email),
            author_name: Set(new.customer.name),
            subject: Set(Some(ticket.subject.clone())),
            body: Set(new.body),
            message_id: Set(new.message_id),
            in_reply_to: Set(None),
            references: Set(new.references.join(" ")),
            delivery_status: Set(DeliveryStatus::Received),
            delivery_error: Set(None),
            is_internal: Set(false),
            created_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;

        Ok((ticket, message))
    }

    /// Sends `email` and records it as an outbound message of `ticket_id`.
    /// A failed send is stored with `delivery_status = failed`.
    async fn send_and_record(
        &self,
        ticket_id: Uuid,
        author: Mailbox,
        email: OutboundEmail,
    ) -> Result<(ticket_message::Model, DeliveryReport), ServiceError> {
        let result = self.mailer.send(&email).await;
        let (status, failure) = match &result {
            Ok(()) => (DeliveryStatus::Sent, None),
            Err(e) => {
                warn!(
                    ticket_id = %ticket_id,
                    transport = self.mailer.name(),
                    error = %e,
                    "Outbound mail failed"
                );
                counter!("helpdesk.mail.failed", 1);
                (DeliveryStatus::Failed, Some(e.to_string()))
            }
        };
        if result.is_ok() {
            counter!("helpdesk.mail.sent", 1);
        }

        let message = ticket_message::ActiveModel {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket_id),
            direction: Set(MessageDirection::Outbound),
            author_email: Set(author.email),
            author_name: Set(author.name),
            subject: Set(Some(email.subject.clone())),
            body: Set(email.text_body.clone()),
            message_id: Set(email.message_id.clone()),
            in_reply_to: Set(email.in_reply_to.clone()),
            references: Set(email.references.join(" ")),
            delivery_status: Set(status),
            delivery_error: Set(failure.clone()),
            is_internal: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        let report = DeliveryReport {
            message_id: email.message_id,
            delivered: failure.is_none(),
            error: failure,
        };
        Ok((message, report))
    }

    /// Opens a ticket from the portal and acknowledges it by email.
    #[instrument(skip(self, input), fields(customer = %input.customer_email))]
    pub async fn create_ticket(&self, input: CreateTicketInput) -> Result<CreatedTicket, ServiceError> {
        input.validate()?;
        let email = input.customer_email.trim().to_lowercase();

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let customer_id = match input.customer_id {
            Some(id) => {
                CustomerEntity::find_by_id(id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| ServiceError::not_found("Customer", id))?;
                Some(id)
            }
            None => Self::customer_by_email(&txn, &email).await?.map(|c| c.id),
        };
        let (ticket, first) = Self::open_ticket(
            &txn,
            NewTicket {
                subject: input.subject.trim().to_string(),
                body: input.body.clone(),
                customer: Mailbox::new(email, input.customer_name.clone()),
                customer_id,
                priority: input.priority.unwrap_or_default(),
                category: input.category.clone(),
                source: TicketSource::Portal,
                message_id: generate_message_id(&self.mail.message_id_domain),
                references: Vec::new(),
            },
        )
        .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("helpdesk.tickets.created", 1);
        info!(ticket_id = %ticket.id, ticket_number = %ticket.ticket_number, "Ticket created");
        self.event_sender
            .send_or_log(Event::TicketCreated {
                ticket_id: ticket.id,
                ticket_number: ticket.ticket_number.clone(),
                source: TicketSource::Portal.to_string(),
            })
            .await;

        let ack = OutboundEmail {
            from: self.sender(),
            to: vec![Mailbox::new(ticket.customer_email.clone(), ticket.customer_name.clone())],
            subject: ticket_subject(&ticket.ticket_number, &ticket.subject),
            text_body: format!(
                "We have received your request and opened ticket {}.\n\n\
                 Reply to this email to add more information.\n\n> {}",
                ticket.ticket_number,
                first.body.replace('\n', "\n> ")
            ),
            message_id: generate_message_id(&self.mail.message_id_domain),
            in_reply_to: Some(first.message_id.clone()),
            references: vec![first.message_id.clone()],
        };
        let (_, acknowledgement) = self.send_and_record(ticket.id, self.sender(), ack).await?;

        self.assign_quietly(&ticket, &first.body).await;
        let detail = self.get_ticket(ticket.id).await?;
        Ok(CreatedTicket {
            detail,
            acknowledgement,
        })
    }

    /// Adds an agent reply or internal note to a ticket.
    #[instrument(skip(self, input, author), fields(operator = %author.operator_id))]
    pub async fn reply(
        &self,
        ticket_id: Uuid,
        author: ReplyAuthor,
        input: ReplyInput,
    ) -> Result<ReplyOutcome, ServiceError> {
        input.validate()?;
        let db = self.db.as_ref();
        let ticket = Self::find_ticket(db, ticket_id).await?;
        let agent = Mailbox::new(author.email.clone(), Some(author.name.clone()));

        if input.internal {
            let note = ticket_message::ActiveModel {
                id: Set(Uuid::new_v4()),
                ticket_id: Set(ticket.id),
                direction: Set(MessageDirection::Outbound),
                author_email: Set(agent.email),
                author_name: Set(agent.name),
                subject: Set(None),
                body: Set(input.body),
                message_id: Set(generate_message_id(&self.mail.message_id_domain)),
                in_reply_to: Set(None),
                references: Set(String::new()),
                delivery_status: Set(DeliveryStatus::Internal),
                delivery_error: Set(None),
                is_internal: Set(true),
                created_at: Set(Utc::now()),
            }
            .insert(db)
            .await
            .map_err(ServiceError::db_error)?;
            info!(ticket_id = %ticket.id, "Internal note added");
            return Ok(ReplyOutcome {
                message: note,
                ticket_status: ticket.status,
                delivery: None,
            });
        }

        // undelivered mail never reached the customer, so it cannot be a parent
        let parent = MessageEntity::find()
            .filter(ticket_message::Column::TicketId.eq(ticket.id))
            .filter(ticket_message::Column::IsInternal.eq(false))
            .filter(ticket_message::Column::DeliveryStatus.ne(DeliveryStatus::Failed))
            .order_by_desc(ticket_message::Column::CreatedAt)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        let (in_reply_to, references) = match &parent {
            Some(parent) => (
                Some(parent.message_id.clone()),
                parent
                    .reply_references()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            ),
            None => (None, Vec::new()),
        };

        let email = OutboundEmail {
            from: self.sender(),
            to: vec![Mailbox::new(ticket.customer_email.clone(), ticket.customer_name.clone())],
            subject: reply_subject(&ticket.ticket_number, &ticket.subject),
            text_body: input.body,
            message_id: generate_message_id(&self.mail.message_id_domain),
            in_reply_to,
            references,
        };
        let (message, report) = self.send_and_record(ticket.id, agent, email).await?;

        let status = if ticket.status == TicketStatus::Open {
            TicketStatus::InProgress
        } else {
            ticket.status
        };
        let previous = ticket.status;
        let mut active: ticket::ActiveModel = ticket.into();
        active.status = Set(status);
        active.last_message_at = Set(message.created_at);
        active.updated_at = Set(Utc::now());
        active.update(db).await.map_err(ServiceError::db_error)?;

        if previous != status {
            self.event_sender
                .send_or_log(Event::TicketStatusChanged {
                    ticket_id,
                    from: previous.to_string(),
                    to: status.to_string(),
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::TicketReplied {
                ticket_id,
                message_id: report.message_id.clone(),
                delivered: report.delivered,
            })
            .await;
        info!(ticket_id = %ticket_id, delivered = report.delivered, "Reply recorded");

        Ok(ReplyOutcome {
            message,
            ticket_status: status,
            delivery: Some(report),
        })
    }

    async fn resolve_thread<C: ConnectionTrait>(
        conn: &C,
        message: &InboundMessage,
    ) -> Result<Option<(ticket::Model, MatchSource)>, ServiceError> {
        for key in thread_keys(message.in_reply_to.as_deref(), &message.references, &message.subject) {
            let source = key.source();
            let found = match key {
                ThreadKey::MessageId(id, _) => {
                    let parent = MessageEntity::find()
                        .filter(ticket_message::Column::MessageId.eq(id))
                        .one(conn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    match parent {
                        Some(parent) => TicketEntity::find_by_id(parent.ticket_id)
                            .one(conn)
                            .await
                            .map_err(ServiceError::db_error)?,
                        None => None,
                    }
                }
                ThreadKey::TicketNumber(number) => TicketEntity::find()
                    .filter(ticket::Column::TicketNumber.eq(number))
                    .one(conn)
                    .await
                    .map_err(ServiceError::db_error)?,
            };
            if let Some(ticket) = found {
                return Ok(Some((ticket, source)));
            }
        }
        Ok(None)
    }

    /// Files an inbound email: duplicates are acknowledged, replies join
    /// their ticket (reopening it for the customer), anything else opens a
    /// new ticket.
    #[instrument(skip(self, message), fields(from = %message.from.email))]
    pub async fn ingest_inbound(&self, message: InboundMessage) -> Result<InboundOutcome, ServiceError> {
        let message_id = message
            .message_id
            .clone()
            .unwrap_or_else(|| generate_message_id(&self.mail.message_id_domain));

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = MessageEntity::find()
            .filter(ticket_message::Column::MessageId.eq(message_id.as_str()))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if let Some(existing) = existing {
            let ticket = Self::find_ticket(&txn, existing.ticket_id).await?;
            txn.commit().await.map_err(ServiceError::db_error)?;
            counter!("helpdesk.inbound.duplicate", 1);
            info!(message_id = %message_id, "Duplicate inbound message ignored");
            return Ok(InboundOutcome {
                action: InboundAction::Duplicate,
                ticket_id: ticket.id,
                ticket_number: ticket.ticket_number,
                message_id,
                matched_by: None,
            });
        }

        let Some((ticket, matched_by)) = Self::resolve_thread(&txn, &message).await? else {
            let subject = match normalize_subject(&message.subject) {
                s if s.is_empty() => NO_SUBJECT.to_string(),
                s => s,
            };
            let customer_id = Self::customer_by_email(&txn, &message.from.email)
                .await?
                .map(|c| c.id);
            let body = message.body.clone();
            let (ticket, _) = Self::open_ticket(
                &txn,
                NewTicket {
                    subject,
                    body: message.body,
                    customer: message.from,
                    customer_id,
                    priority: Priority::default(),
                    category: None,
                    source: TicketSource::Email,
                    message_id: message_id.clone(),
                    references: message.references,
                },
            )
            .await?;
            txn.commit().await.map_err(ServiceError::db_error)?;

            counter!("helpdesk.inbound.created", 1);
            info!(ticket_number = %ticket.ticket_number, "Ticket opened from email");
            self.event_sender
                .send_or_log(Event::TicketCreated {
                    ticket_id: ticket.id,
                    ticket_number: ticket.ticket_number.clone(),
                    source: TicketSource::Email.to_string(),
                })
                .await;
            self.assign_quietly(&ticket, &body).await;
            return Ok(InboundOutcome {
                action: InboundAction::Created,
                ticket_id: ticket.id,
                ticket_number: ticket.ticket_number,
                message_id,
                matched_by: None,
            });
        };

        let now = Utc::now();
        ticket_message::ActiveModel {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket.id),
            direction: Set(MessageDirection::Inbound),
            author_email: Set(message.from.email.clone()),
            author_name: Set(message.from.name.clone()),
            subject: Set(Some(message.subject.clone()).filter(|s| !s.is_empty())),
            body: Set(message.body.clone()),
            message_id: Set(message_id.clone()),
            in_reply_to: Set(message.in_reply_to.clone()),
            references: Set(message.references.join(" ")),
            delivery_status: Set(DeliveryStatus::Received),
            delivery_error: Set(None),
            is_internal: Set(false),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let reopen = threading::should_reopen(ticket.status, &ticket.customer_email, &message.from.email);
        let previous = ticket.status;
        let reopened_count = ticket.reopened_count + i32::from(reopen);
        let ticket_id = ticket.id;
        let ticket_number = ticket.ticket_number.clone();

        let mut active: ticket::ActiveModel = ticket.into();
        active.last_message_at = Set(now);
        active.updated_at = Set(now);
        if reopen {
            active.status = Set(TicketStatus::Open);
            active.reopened_count = Set(reopened_count);
            active.resolved_at = Set(None);
        }
        active.update(&txn).await.map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("helpdesk.inbound.threaded", 1);
        if reopen {
            counter!("helpdesk.tickets.reopened", 1);
            info!(%ticket_number, from = %previous, reopened_count, "Ticket reopened by customer reply");
            self.event_sender
                .send_or_log(Event::TicketReopened {
                    ticket_id,
                    ticket_number: ticket_number.clone(),
                    reopened_count,
                })
                .await;
        } else {
            info!(%ticket_number, ?matched_by, "Inbound mail threaded");
        }

        Ok(InboundOutcome {
            action: if reopen {
                InboundAction::Reopened
            } else {
                InboundAction::Threaded
            },
            ticket_id,
            ticket_number,
            message_id,
            matched_by: Some(matched_by),
        })
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, status: TicketStatus) -> Result<ticket::Model, ServiceError> {
        let db = self.db.as_ref();
        let ticket = Self::find_ticket(db, id).await?;
        let from = ticket.status;
        if !from.can_transition_to(status) {
            return Err(ServiceError::InvalidStatus(format!(
                "cannot move ticket {} from {} to {}",
                ticket.ticket_number, from, status
            )));
        }

        let reopened = from.is_finished() && !status.is_finished();
        let reopened_count = ticket.reopened_count + i32::from(reopened);
        let ticket_number = ticket.ticket_number.clone();
        let now = Utc::now();
        let mut active: ticket::ActiveModel = ticket.into();
        active.status = Set(status);
        active.updated_at = Set(now);
        if status == TicketStatus::Resolved {
            active.resolved_at = Set(Some(now));
        } else if !status.is_finished() {
            active.resolved_at = Set(None);
        }
        if reopened {
            active.reopened_count = Set(reopened_count);
        }
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        info!(ticket_id = %id, %from, to = %status, "Ticket status changed");
        self.event_sender
            .send_or_log(Event::TicketStatusChanged {
                ticket_id: id,
                from: from.to_string(),
                to: status.to_string(),
            })
            .await;
        if reopened {
            self.event_sender
                .send_or_log(Event::TicketReopened {
                    ticket_id: id,
                    ticket_number,
                    reopened_count,
                })
                .await;
        }
        Ok(updated)
    }

    async fn active_operator(&self, operator_id: Uuid) -> Result<operator::Model, ServiceError> {
        let operator = OperatorEntity::find_by_id(operator_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Operator", operator_id))?;
        if !operator.is_active {
            return Err(ServiceError::ValidationError(format!(
                "operator {} is inactive",
                operator.email
            )));
        }
        Ok(operator)
    }

    async fn set_assignee(
        &self,
        ticket: ticket::Model,
        operator_id: Uuid,
        automatic: bool,
    ) -> Result<ticket::Model, ServiceError> {
        let ticket_id = ticket.id;
        let mut active: ticket::ActiveModel = ticket.into();
        active.assigned_to = Set(Some(operator_id));
        active.updated_at = Set(Utc::now());
        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(ticket_id = %ticket_id, operator_id = %operator_id, automatic, "Ticket assigned");
        self.event_sender
            .send_or_log(Event::TicketAssigned {
                ticket_id,
                operator_id,
                automatic,
            })
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn assign(&self, id: Uuid, operator_id: Uuid) -> Result<ticket::Model, ServiceError> {
        let ticket = Self::find_ticket(self.db.as_ref(), id).await?;
        self.active_operator(operator_id).await?;
        self.set_assignee(ticket, operator_id, false).await
    }

    /// Active agents with their open ticket counts.
    async fn agent_loads(&self) -> Result<Vec<AgentLoad>, ServiceError> {
        let db = self.db.as_ref();
        let agents = OperatorEntity::find()
            .filter(operator::Column::Role.eq(OperatorRole::Agent))
            .filter(operator::Column::IsActive.eq(true))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut loads = Vec::with_capacity(agents.len());
        for agent in agents {
            let open_tickets = TicketEntity::find()
                .filter(ticket::Column::AssignedTo.eq(agent.id))
                .filter(ticket::Column::Status.is_in(OPEN_STATUSES))
                .count(db)
                .await
                .map_err(ServiceError::db_error)?;
            loads.push(AgentLoad {
                operator_id: agent.id,
                name: agent.name,
                open_tickets,
            });
        }
        Ok(loads)
    }

    /// Asks the assignment endpoint for an operator, falling back to the
    /// least loaded active agent when it is unset, fails or names someone
    /// who cannot take tickets.
    #[instrument(skip(self))]
    pub async fn auto_assign(&self, id: Uuid) -> Result<AssignmentOutcome, ServiceError> {
        let ticket = Self::find_ticket(self.db.as_ref(), id).await?;
        let body = MessageEntity::find()
            .filter(ticket_message::Column::TicketId.eq(id))
            .filter(ticket_message::Column::Direction.eq(MessageDirection::Inbound))
            .order_by_asc(ticket_message::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .map(|m| m.body)
            .unwrap_or_default();
        self.run_assignment(ticket, &body).await
    }

    async fn run_assignment(&self, ticket: ticket::Model, body: &str) -> Result<AssignmentOutcome, ServiceError> {
        let request = AssignmentRequest {
            ticket_id: ticket.id,
            ticket_number: ticket.ticket_number.clone(),
            subject: ticket.subject.clone(),
            body: body.to_string(),
            priority: ticket.priority.to_string(),
            category: ticket.category.clone(),
            customer_email: ticket.customer_email.clone(),
        };

        let suggested = match self.assigner.suggest(&request).await {
            Ok(Some(operator_id)) => match self.active_operator(operator_id).await {
                Ok(_) => Some(operator_id),
                Err(e) => {
                    warn!(operator_id = %operator_id, error = %e, "Ignoring auto-assign suggestion");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Auto-assign endpoint failed, using fallback");
                counter!("helpdesk.assignment.external_failed", 1);
                None
            }
        };
        if let Some(operator_id) = suggested {
            let ticket = self.set_assignee(ticket, operator_id, true).await?;
            return Ok(AssignmentOutcome {
                ticket,
                strategy: AssignmentStrategy::External,
            });
        }

        match assignment::pick_least_loaded(&self.agent_loads().await?) {
            Some(operator_id) => {
                let ticket = self.set_assignee(ticket, operator_id, true).await?;
                Ok(AssignmentOutcome {
                    ticket,
                    strategy: AssignmentStrategy::LeastLoaded,
                })
            }
            None => {
                warn!(ticket_id = %ticket.id, "No active agent available for assignment");
                Ok(AssignmentOutcome {
                    ticket,
                    strategy: AssignmentStrategy::Unassigned,
                })
            }
        }
    }

    /// Assignment for freshly created tickets; failures only get logged.
    async fn assign_quietly(&self, ticket: &ticket::Model, body: &str) {
        if let Err(e) = self.run_assignment(ticket.clone(), body).await {
            warn!(ticket_id = %ticket.id, error = %e, "Automatic assignment failed");
        }
    }
}

/// Fields for a new ticket and its first message
struct NewTicket {
    subject: String,
    body: String,
    customer: Mailbox,
    customer_id: Option<Uuid>,
    priority: Priority,
    category: Option<String>,
    source: TicketSource,
    message_id: String,
    references: Vec<String>,
}
