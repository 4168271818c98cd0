use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One entry in a ticket's thread: customer mail, agent reply or internal note.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub direction: MessageDirection,
    pub author_email: String,
    #[sea_orm(nullable)]
    pub author_name: Option<String>,
    #[sea_orm(nullable)]
    pub subject: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    /// RFC 5322 Message-ID without angle brackets
    #[sea_orm(unique)]
    pub message_id: String,
    #[sea_orm(nullable)]
    pub in_reply_to: Option<String>,
    /// Space separated Message-IDs, oldest first
    #[sea_orm(column_name = "reference_ids", column_type = "Text")]
    pub references: String,
    pub delivery_status: DeliveryStatus,
    #[sea_orm(nullable)]
    pub delivery_error: Option<String>,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// References chain for a reply to this message.
    pub fn reply_references(&self) -> String {
        if self.references.trim().is_empty() {
            self.message_id.clone()
        } else {
            format!("{} {}", self.references.trim(), self.message_id)
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ticket::Entity",
        from = "Column::TicketId",
        to = "super::ticket::Column::Id",
        on_delete = "Cascade"
    )]
    Ticket,
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageDirection {
    #[sea_orm(string_value = "inbound")]
    Inbound,
    #[sea_orm(string_value = "outbound")]
    Outbound,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "internal")]
    Internal,
}
