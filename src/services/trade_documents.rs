use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{generate_document_number, normalize_code},
    entities::{
        customer::Entity as CustomerEntity,
        trade_document::{self, DocumentKind, DocumentStatus, Entity as DocumentEntity},
        trade_document_line::{self, Entity as DocumentLineEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    pricing::{compute_document, LineBreakdown, LineInput, Totals},
    services::{like_pattern, paginate, Page},
};


#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct DocumentLineInput {
    #[validate(length(min = 1, max = 64))]
    pub item_code: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "3")]
    pub quantity: Decimal,
    #[schema(value_type = String, example = "19.99")]
    pub rate: Decimal,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub tax_percent: Option<Decimal>,
}

impl DocumentLineInput {
    fn pricing(&self) -> LineInput {
        LineInput {
            quantity: self.quantity,
            rate: self.rate,
            discount_percent: self.discount_percent,
            tax_percent: self.tax_percent,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDocumentInput {
    /// Supplier or customer name; taken from the customer when omitted
    #[validate(length(max = 200))]
    pub party_name: Option<String>,
    pub customer_id: Option<Uuid>,
    pub document_date: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[schema(value_type = Option<String>)]
    pub discount_percent: Option<Decimal>,
    pub notes: Option<String>,
    #[validate]
    pub lines: Vec<DocumentLineInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateDocumentInput {
    #[validate(length(min = 1, max = 200))]
    pub party_name: Option<String>,
    pub customer_id: Option<Uuid>,
    pub document_date: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[schema(value_type = Option<String>)]
    pub discount_percent: Option<Decimal>,
    pub notes: Option<String>,
    /// Replaces every line when present
    pub lines: Option<Vec<DocumentLineInput>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateDocumentStatusInput {
    #[schema(value_type = String, example = "submitted")]
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub customer_id: Option<Uuid>,
    pub search: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: trade_document::Model,
    pub lines: Vec<trade_document_line::Model>,
}

/// Result of converting a quotation
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub quotation: trade_document::Model,
    pub order: DocumentDetail,
}

/// Statuses a kind of document can be in.
pub fn status_allowed(kind: DocumentKind, status: DocumentStatus) -> bool {
    use DocumentStatus::*;
    match status {
        Draft | Submitted | Approved | Cancelled => true,
        Converted => kind.is_quotation(),
        PartiallyReceived => kind == DocumentKind::PurchaseOrder,
        Completed => !kind.is_quotation(),
    }
}

/// Status changes allowed through the status route. Conversion and goods
/// receipt move documents into `converted`, `partially_received` and
/// `completed` on their own.
pub fn can_transition(kind: DocumentKind, from: DocumentStatus, to: DocumentStatus) -> bool {
    use DocumentStatus::*;
    if !status_allowed(kind, to) {
        return false;
    }
    match (from, to) {
        (Draft, Submitted) | (Draft, Cancelled) => true,
        (Submitted, Approved) | (Submitted, Draft) | (Submitted, Cancelled) => true,
        (Approved, Cancelled) => true,
        (Approved, Completed) => kind == DocumentKind::SalesOrder,
        _ => false,
    }
}

fn price_lines(
    lines: &[DocumentLineInput],
    discount_percent: Decimal,
) -> Result<(Vec<LineBreakdown>, Totals), ServiceError> {
    let inputs: Vec<LineInput> = lines.iter().map(DocumentLineInput::pricing).collect();
    compute_document(&inputs, Some(discount_percent))
}

async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    document_id: Uuid,
    lines: &[DocumentLineInput],
    priced: &[LineBreakdown],
) -> Result<(), ServiceError> {
    for (index, (line, breakdown)) in lines.iter().zip(priced).enumerate() {
        trade_document_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            document_id: Set(document_id),
            line_no: Set(index as i32 + 1),
            item_code: Set(normalize_code(&line.item_code)),
            description: Set(line.description.clone()),
            quantity: Set(line.quantity),
            rate: Set(line.rate),
            discount_percent: Set(line.discount_percent.unwrap_or_default()),
            tax_percent: Set(line.tax_percent.unwrap_or_default()),
            amount: Set(breakdown.amount),
            line_total: Set(breakdown.line_total),
            received_quantity: Set(Decimal::ZERO),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;
    }
    Ok(())
}

fn apply_totals(active: &mut trade_document::ActiveModel, totals: &Totals) {
    active.subtotal = Set(totals.subtotal);
    active.discount_total = Set(totals.discount_total);
    active.tax_total = Set(totals.tax_total);
    active.grand_total = Set(totals.grand_total);
}

fn check_dates(document_date: NaiveDate, valid_until: Option<NaiveDate>) -> Result<(), ServiceError> {
    match valid_until {
        Some(until) if until < document_date => Err(ServiceError::ValidationError(
            "valid_until must not be before document_date".into(),
        )),
        _ => Ok(()),
    }
}

/// Quotations and orders on the purchase and sales side
#[derive(Clone)]
pub struct TradeDocumentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    /// Used when a new document names no currency
    default_currency: String,
}

impl TradeDocumentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        default_currency: &str,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_currency: normalize_code(default_currency),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_documents(
        &self,
        kind: DocumentKind,
        filter: DocumentFilter,
        page: u64,
        per_page: u64,
    ) -> Result<Page<trade_document::Model>, ServiceError> {
        let mut query = DocumentEntity::find().filter(trade_document::Column::Kind.eq(kind));
        if let Some(status) = filter.status {
            query = query.filter(trade_document::Column::Status.eq(status));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(trade_document::Column::CustomerId.eq(customer_id));
        }
        if let Some(term) = filter.search.filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(&term);
            query = query.filter(
                Condition::any()
                    .add(trade_document::Column::DocumentNumber.like(pattern.clone()))
                    .add(trade_document::Column::PartyName.like(pattern)),
            );
        }
        if let Some(from) = filter.from_date {
            query = query.filter(trade_document::Column::DocumentDate.gte(from));
        }
        if let Some(to) = filter.to_date {
            query = query.filter(trade_document::Column::DocumentDate.lte(to));
        }
        paginate(
            query.order_by_desc(trade_document::Column::CreatedAt),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    /// Loads a document, insisting on its kind so ids do not leak across routes.
    pub(crate) async fn find_document<C: ConnectionTrait>(
        conn: &C,
        kind: DocumentKind,
        id: Uuid,
    ) -> Result<trade_document::Model, ServiceError> {
        DocumentEntity::find_by_id(id)
            .filter(trade_document::Column::Kind.eq(kind))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found(kind.label(), id))
    }

    pub(crate) async fn load_lines<C: ConnectionTrait>(
        conn: &C,
        document_id: Uuid,
    ) -> Result<Vec<trade_document_line::Model>, ServiceError> {
        DocumentLineEntity::find()
            .filter(trade_document_line::Column::DocumentId.eq(document_id))
            .order_by_asc(trade_document_line::Column::LineNo)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_document(&self, kind: DocumentKind, id: Uuid) -> Result<DocumentDetail, ServiceError> {
        let db = self.db.as_ref();
        let document = Self::find_document(db, kind, id).await?;
        let lines = Self::load_lines(db, id).await?;
        Ok(DocumentDetail { document, lines })
    }

    async fn resolve_party<C: ConnectionTrait>(
        conn: &C,
        party_name: Option<&str>,
        customer_id: Option<Uuid>,
    ) -> Result<String, ServiceError> {
        let given = party_name.map(str::trim).filter(|p| !p.is_empty());
        let customer = match customer_id {
            Some(id) => Some(
                CustomerEntity::find_by_id(id)
                    .one(conn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| ServiceError::not_found("Customer", id))?,
            ),
            None => None,
        };
        match (given, customer) {
            (Some(name), _) => Ok(name.to_string()),
            (None, Some(customer)) => Ok(customer.name),
            (None, None) => Err(ServiceError::ValidationError(
                "party_name or customer_id is required".into(),
            )),
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create_document(
        &self,
        kind: DocumentKind,
        input: CreateDocumentInput,
    ) -> Result<DocumentDetail, ServiceError> {
        input.validate()?;
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "document needs at least one line".into(),
            ));
        }
        let discount_percent = input.discount_percent.unwrap_or_default();
        let (priced, totals) = price_lines(&input.lines, discount_percent)?;
        let document_date = input.document_date.unwrap_or_else(|| Utc::now().date_naive());
        check_dates(document_date, input.valid_until)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let party_name =
            Self::resolve_party(&txn, input.party_name.as_deref(), input.customer_id).await?;

        let now = Utc::now();
        let mut active = trade_document::ActiveModel {
            id: Set(Uuid::new_v4()),
            kind: Set(kind),
            document_number: Set(generate_document_number(kind.number_prefix())),
            party_name: Set(party_name),
            customer_id: Set(input.customer_id),
            document_date: Set(document_date),
            valid_until: Set(input.valid_until),
            status: Set(DocumentStatus::Draft),
            currency: Set(input
                .currency
                .as_deref()
                .map(normalize_code)
                .unwrap_or_else(|| self.default_currency.clone())),
            discount_percent: Set(discount_percent),
            source_document_id: Set(None),
            notes: Set(input.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        apply_totals(&mut active, &totals);
        let document = active.insert(&txn).await.map_err(|e| {
            error!("Failed to create {}: {}", kind, e);
            ServiceError::db_error(e)
        })?;
        insert_lines(&txn, document.id, &input.lines, &priced).await?;
        let lines = Self::load_lines(&txn, document.id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(document_id = %document.id, number = %document.document_number, %kind, "Document created");
        self.event_sender
            .send_or_log(Event::DocumentCreated {
                document_id: document.id,
                kind: kind.to_string(),
                document_number: document.document_number.clone(),
            })
            .await;
        Ok(DocumentDetail { document, lines })
    }

    /// Edits a draft. Totals are recomputed from the resulting lines.
    #[instrument(skip(self, input))]
    pub async fn update_document(
        &self,
        kind: DocumentKind,
        id: Uuid,
        input: UpdateDocumentInput,
    ) -> Result<DocumentDetail, ServiceError> {
        input.validate()?;
        for line in input.lines.iter().flatten() {
            line.validate()?;
        }
        if matches!(&input.lines, Some(lines) if lines.is_empty()) {
            return Err(ServiceError::ValidationError(
                "document needs at least one line".into(),
            ));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = Self::find_document(&txn, kind, id).await?;
        if existing.status != DocumentStatus::Draft {
            return Err(ServiceError::InvalidStatus(format!(
                "{} {} is {}; only drafts can be edited",
                kind.label(),
                existing.document_number,
                existing.status
            )));
        }

        let discount_percent = input.discount_percent.unwrap_or(existing.discount_percent);
        let document_date = input.document_date.unwrap_or(existing.document_date);
        let valid_until = input.valid_until.or(existing.valid_until);
        check_dates(document_date, valid_until)?;

        let replaced = match &input.lines {
            Some(lines) => {
                let (priced, totals) = price_lines(lines, discount_percent)?;
                Some((lines, priced, totals))
            }
            None => None,
        };
        let totals = match &replaced {
            Some((_, _, totals)) => totals.clone(),
            None => {
                let current: Vec<DocumentLineInput> = Self::load_lines(&txn, id)
                    .await?
                    .into_iter()
                    .map(|l| DocumentLineInput {
                        item_code: l.item_code,
                        description: l.description,
                        quantity: l.quantity,
                        rate: l.rate,
                        discount_percent: Some(l.discount_percent),
                        tax_percent: Some(l.tax_percent),
                    })
                    .collect();
                price_lines(&current, discount_percent)?.1
            }
        };

        let mut active: trade_document::ActiveModel = existing.into();
        if input.party_name.is_some() || input.customer_id.is_some() {
            let party = Self::resolve_party(&txn, input.party_name.as_deref(), input.customer_id).await?;
            active.party_name = Set(party);
        }
        if input.customer_id.is_some() {
            active.customer_id = Set(input.customer_id);
        }
        if let Some(currency) = &input.currency {
            active.currency = Set(normalize_code(currency));
        }
        if input.notes.is_some() {
            active.notes = Set(input.notes.clone());
        }
        active.document_date = Set(document_date);
        active.valid_until = Set(valid_until);
        active.discount_percent = Set(discount_percent);
        apply_totals(&mut active, &totals);
        active.updated_at = Set(Utc::now());

        if let Some((lines, priced, _)) = &replaced {
            DocumentLineEntity::delete_many()
                .filter(trade_document_line::Column::DocumentId.eq(id))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            insert_lines(&txn, id, lines, priced).await?;
        }
        let document = active.update(&txn).await.map_err(ServiceError::db_error)?;
        let lines = Self::load_lines(&txn, id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(document_id = %id, %kind, "Document updated");
        Ok(DocumentDetail { document, lines })
    }

    #[instrument(skip(self))]
    pub async fn delete_document(&self, kind: DocumentKind, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = Self::find_document(&txn, kind, id).await?;
        if existing.status != DocumentStatus::Draft {
            return Err(ServiceError::InvalidStatus(format!(
                "{} {} is {}; only drafts can be deleted",
                kind.label(),
                existing.document_number,
                existing.status
            )));
        }
        DocumentLineEntity::delete_many()
            .filter(trade_document_line::Column::DocumentId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        DocumentEntity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(document_id = %id, %kind, "Document deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        kind: DocumentKind,
        id: Uuid,
        status: DocumentStatus,
    ) -> Result<trade_document::Model, ServiceError> {
        let db = self.db.as_ref();
        let existing = Self::find_document(db, kind, id).await?;
        let from = existing.status;
        if !can_transition(kind, from, status) {
            warn!(document_id = %id, %from, to = %status, "Rejected document status change");
            return Err(ServiceError::InvalidStatus(format!(
                "cannot move {} from {} to {}",
                kind.label().to_lowercase(),
                from,
                status
            )));
        }

        let mut active: trade_document::ActiveModel = existing.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        info!(document_id = %id, %from, to = %status, "Document status changed");
        self.event_sender
            .send_or_log(Event::DocumentStatusChanged {
                document_id: id,
                from: from.to_string(),
                to: status.to_string(),
            })
            .await;
        Ok(updated)
    }

    /// Turns an approved quotation into a draft order of the matching kind.
    #[instrument(skip(self))]
    pub async fn convert_quotation(&self, kind: DocumentKind, id: Uuid) -> Result<Conversion, ServiceError> {
        let target_kind = kind.converts_to().ok_or_else(|| {
            ServiceError::InvalidOperation(format!("{} cannot be converted", kind.label()))
        })?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let quotation = Self::find_document(&txn, kind, id).await?;
        if quotation.status != DocumentStatus::Approved {
            return Err(ServiceError::InvalidStatus(format!(
                "{} {} is {}; only approved quotations can be converted",
                kind.label(),
                quotation.document_number,
                quotation.status
            )));
        }
        let source_lines = Self::load_lines(&txn, id).await?;

        let now = Utc::now();
        let order = trade_document::ActiveModel {
            id: Set(Uuid::new_v4()),
            kind: Set(target_kind),
            document_number: Set(generate_document_number(target_kind.number_prefix())),
            party_name: Set(quotation.party_name.clone()),
            customer_id: Set(quotation.customer_id),
            document_date: Set(now.date_naive()),
            valid_until: Set(None),
            status: Set(DocumentStatus::Draft),
            currency: Set(quotation.currency.clone()),
            discount_percent: Set(quotation.discount_percent),
            subtotal: Set(quotation.subtotal),
            discount_total: Set(quotation.discount_total),
            tax_total: Set(quotation.tax_total),
            grand_total: Set(quotation.grand_total),
            source_document_id: Set(Some(quotation.id)),
            notes: Set(quotation.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        for line in source_lines {
            trade_document_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                document_id: Set(order.id),
                line_no: Set(line.line_no),
                item_code: Set(line.item_code),
                description: Set(line.description),
                quantity: Set(line.quantity),
                rate: Set(line.rate),
                discount_percent: Set(line.discount_percent),
                tax_percent: Set(line.tax_percent),
                amount: Set(line.amount),
                line_total: Set(line.line_total),
                received_quantity: Set(Decimal::ZERO),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        let mut active: trade_document::ActiveModel = quotation.into();
        active.status = Set(DocumentStatus::Converted);
        active.updated_at = Set(now);
        let quotation = active.update(&txn).await.map_err(ServiceError::db_error)?;
        let lines = Self::load_lines(&txn, order.id).await?;
        txn.commit().await.map_err(|e| {
            error!("Failed to commit conversion: {}", e);
            ServiceError::db_error(e)
        })?;

        info!(
            quotation_id = %quotation.id,
            order_id = %order.id,
            order_number = %order.document_number,
            "Quotation converted"
        );
        self.event_sender
            .send_or_log(Event::DocumentConverted {
                source_id: quotation.id,
                target_id: order.id,
                target_number: order.document_number.clone(),
            })
            .await;
        Ok(Conversion {
            quotation,
            order: DocumentDetail {
                document: order,
                lines,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use DocumentKind::*;
    use DocumentStatus::*;

    #[rstest]
    #[case(PurchaseQuotation, Draft, Submitted, true)]
    #[case(PurchaseQuotation, Submitted, Approved, true)]
    #[case(PurchaseQuotation, Approved, Converted, false)]
    #[case(SalesQuotation, Approved, Completed, false)]
    #[case(PurchaseOrder, Approved, Completed, false)]
    #[case(SalesOrder, Approved, Completed, true)]
    #[case(PurchaseOrder, Approved, PartiallyReceived, false)]
    #[case(SalesOrder, Cancelled, Draft, false)]
    #[case(PurchaseOrder, Submitted, Draft, true)]
    fn status_route_transitions(
        #[case] kind: DocumentKind,
        #[case] from: DocumentStatus,
        #[case] to: DocumentStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(can_transition(kind, from, to), allowed);
    }

    #[test]
    fn statuses_follow_document_kind() {
        assert!(status_allowed(SalesQuotation, Converted));
        assert!(!status_allowed(SalesOrder, Converted));
        assert!(status_allowed(PurchaseOrder, PartiallyReceived));
        assert!(!status_allowed(SalesOrder, PartiallyReceived));
    }

    #[test]
    fn valid_until_cannot_precede_document_date() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert!(check_dates(date, NaiveDate::from_ymd_opt(2024, 5, 1)).is_err());
        assert!(check_dates(date, Some(date)).is_ok());
        assert!(check_dates(date, None).is_ok());
    }
}
