use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Purchase/sales quotation or order. The four kinds share one table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trade_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: DocumentKind,
    #[sea_orm(unique)]
    pub document_number: String,
    /// Supplier for purchase documents, customer for sales documents
    pub party_name: String,
    #[sea_orm(nullable)]
    pub customer_id: Option<Uuid>,
    pub document_date: NaiveDate,
    #[sea_orm(nullable)]
    pub valid_until: Option<NaiveDate>,
    pub status: DocumentStatus,
    pub currency: String,
    pub discount_percent: Decimal,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    #[sea_orm(nullable)]
    pub source_document_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::trade_document_line::Entity")]
    Lines,
}

impl Related<super::trade_document_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentKind {
    #[sea_orm(string_value = "purchase_quotation")]
    PurchaseQuotation,
    #[sea_orm(string_value = "purchase_order")]
    PurchaseOrder,
    #[sea_orm(string_value = "sales_quotation")]
    SalesQuotation,
    #[sea_orm(string_value = "sales_order")]
    SalesOrder,
}

impl DocumentKind {
    pub fn number_prefix(self) -> &'static str {
        match self {
            DocumentKind::PurchaseQuotation => "PQ",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::SalesQuotation => "SQ",
            DocumentKind::SalesOrder => "SO",
        }
    }

    pub fn is_quotation(self) -> bool {
        matches!(
            self,
            DocumentKind::PurchaseQuotation | DocumentKind::SalesQuotation
        )
    }

    /// The order kind a quotation converts into.
    pub fn converts_to(self) -> Option<DocumentKind> {
        match self {
            DocumentKind::PurchaseQuotation => Some(DocumentKind::PurchaseOrder),
            DocumentKind::SalesQuotation => Some(DocumentKind::SalesOrder),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::PurchaseQuotation => "Purchase quotation",
            DocumentKind::PurchaseOrder => "Purchase order",
            DocumentKind::SalesQuotation => "Sales quotation",
            DocumentKind::SalesOrder => "Sales order",
        }
    }
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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "converted")]
    Converted,
    #[sea_orm(string_value = "partially_received")]
    PartiallyReceived,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}
