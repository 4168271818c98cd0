use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::generate_document_number,
    entities::{
        grn::{self, Entity as GrnEntity},
        grn_line::{self, Entity as GrnLineEntity},
        trade_document::{self, DocumentKind, DocumentStatus},
        trade_document_line,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::{add_stock, IncomingStock},
        paginate,
        trade_documents::TradeDocumentService,
        warehouses::{ensure_bin_in_warehouse, fetch_warehouse},
        Page,
    },
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GrnLineInput {
    pub order_line_id: Uuid,
    #[schema(value_type = String, example = "10")]
    pub received_quantity: Decimal,
    /// Defaults to received minus rejected
    #[schema(value_type = Option<String>)]
    pub accepted_quantity: Option<Decimal>,
    /// Defaults to received minus accepted
    #[schema(value_type = Option<String>)]
    pub rejected_quantity: Option<Decimal>,
    #[validate(length(min = 1, max = 64))]
    pub batch_number: Option<String>,
    pub bin_id: Option<Uuid>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateGrnInput {
    pub purchase_order_id: Uuid,
    pub warehouse_id: Uuid,
    pub received_date: Option<NaiveDate>,
    #[validate(length(max = 200))]
    pub received_by: Option<String>,
    pub remarks: Option<String>,
    #[validate]
    pub lines: Vec<GrnLineInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrnDetail {
    #[serde(flatten)]
    pub grn: grn::Model,
    pub lines: Vec<grn_line::Model>,
    /// Purchase order status after this receipt
    pub purchase_order_status: DocumentStatus,
}

/// Received, accepted and rejected quantities after defaults are filled in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiptSplit {
    pub received: Decimal,
    pub accepted: Decimal,
    pub rejected: Decimal,
}

/// Fills in whichever of accepted/rejected is missing and checks
/// `accepted + rejected = received`.
pub fn split_receipt(
    received: Decimal,
    accepted: Option<Decimal>,
    rejected: Option<Decimal>,
) -> Result<ReceiptSplit, ServiceError> {
    if received <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "received_quantity must be greater than zero".into(),
        ));
    }
    let (accepted, rejected) = match (accepted, rejected) {
        (Some(a), Some(r)) => (a, r),
        (Some(a), None) => (a, received - a),
        (None, Some(r)) => (received - r, r),
        (None, None) => (received, Decimal::ZERO),
    };
    if accepted < Decimal::ZERO || rejected < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "accepted and rejected quantities must not be negative".into(),
        ));
    }
    if accepted + rejected != received {
        return Err(ServiceError::ValidationError(format!(
            "accepted ({}) + rejected ({}) must equal received ({})",
            accepted, rejected, received
        )));
    }
    Ok(ReceiptSplit {
        received,
        accepted,
        rejected,
    })
}

/// Status of a purchase order given its lines after a receipt.
pub fn receipt_status(lines: &[trade_document_line::Model]) -> DocumentStatus {
    if lines.iter().all(|l| l.outstanding().is_zero()) {
        DocumentStatus::Completed
    } else if lines.iter().any(|l| l.received_quantity > Decimal::ZERO) {
        DocumentStatus::PartiallyReceived
    } else {
        DocumentStatus::Approved
    }
}

/// Goods receipt against purchase orders
#[derive(Clone)]
pub struct GrnService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl GrnService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_receipts(
        &self,
        purchase_order_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<grn::Model>, ServiceError> {
        let mut query = GrnEntity::find();
        if let Some(order_id) = purchase_order_id {
            query = query.filter(grn::Column::PurchaseOrderId.eq(order_id));
        }
        paginate(
            query.order_by_desc(grn::Column::CreatedAt),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    async fn load_lines<C: ConnectionTrait>(conn: &C, grn_id: Uuid) -> Result<Vec<grn_line::Model>, ServiceError> {
        GrnLineEntity::find()
            .filter(grn_line::Column::GrnId.eq(grn_id))
            .order_by_asc(grn_line::Column::ItemCode)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_receipt(&self, id: Uuid) -> Result<GrnDetail, ServiceError> {
        let db = self.db.as_ref();
        let grn = GrnEntity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Goods receipt", id))?;
        let order =
            TradeDocumentService::find_document(db, DocumentKind::PurchaseOrder, grn.purchase_order_id)
                .await?;
        let lines = Self::load_lines(db, id).await?;
        Ok(GrnDetail {
            grn,
            lines,
            purchase_order_status: order.status,
        })
    }

    /// Records a receipt: accepted stock lands in inventory and the purchase
    /// order advances, in one transaction.
    #[instrument(skip(self, input), fields(purchase_order_id = %input.purchase_order_id))]
    pub async fn create_receipt(&self, input: CreateGrnInput) -> Result<GrnDetail, ServiceError> {
        input.validate()?;
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "goods receipt needs at least one line".into(),
            ));
        }
        let splits = input
            .lines
            .iter()
            .enumerate()
            .map(|(index, line)| {
                split_receipt(line.received_quantity, line.accepted_quantity, line.rejected_quantity)
                    .map_err(|e| match e {
                        ServiceError::ValidationError(msg) => {
                            ServiceError::ValidationError(format!("line {}: {}", index + 1, msg))
                        }
                        other => other,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let order = TradeDocumentService::find_document(
            &txn,
            DocumentKind::PurchaseOrder,
            input.purchase_order_id,
        )
        .await?;
        if !matches!(
            order.status,
            DocumentStatus::Approved | DocumentStatus::PartiallyReceived
        ) {
            warn!(order = %order.document_number, status = %order.status, "Receipt against closed order");
            return Err(ServiceError::InvalidStatus(format!(
                "purchase order {} is {}; goods can only be received against approved orders",
                order.document_number, order.status
            )));
        }
        fetch_warehouse(&txn, input.warehouse_id).await?;

        let order_lines = TradeDocumentService::load_lines(&txn, order.id).await?;
        let by_id: HashMap<Uuid, &trade_document_line::Model> =
            order_lines.iter().map(|l| (l.id, l)).collect();

        let mut accepted_per_line: HashMap<Uuid, Decimal> = HashMap::new();
        for (line, split) in input.lines.iter().zip(&splits) {
            let order_line = by_id.get(&line.order_line_id).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "line {} is not on purchase order {}",
                    line.order_line_id, order.document_number
                ))
            })?;
            let total = accepted_per_line.entry(order_line.id).or_default();
            *total += split.accepted;
            if *total > order_line.outstanding() {
                return Err(ServiceError::ValidationError(format!(
                    "{}: accepted {} exceeds outstanding {}",
                    order_line.item_code,
                    total,
                    order_line.outstanding()
                )));
            }
            if let Some(bin) = line.bin_id {
                ensure_bin_in_warehouse(&txn, bin, input.warehouse_id).await?;
            }
        }

        let now = Utc::now();
        let grn_number = generate_document_number("GRN");
        let grn = grn::ActiveModel {
            id: Set(Uuid::new_v4()),
            grn_number: Set(grn_number.clone()),
            purchase_order_id: Set(order.id),
            warehouse_id: Set(input.warehouse_id),
            received_date: Set(input.received_date.unwrap_or_else(|| now.date_naive())),
            received_by: Set(input.received_by.clone()),
            remarks: Set(input.remarks.clone()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!("Failed to create goods receipt: {}", e);
            ServiceError::db_error(e)
        })?;

        for (line, split) in input.lines.iter().zip(&splits) {
            let order_line = by_id[&line.order_line_id];
            let batch_number = line
                .batch_number
                .as_deref()
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .unwrap_or(&grn_number)
                .to_string();

            if split.accepted > Decimal::ZERO {
                add_stock(
                    &txn,
                    IncomingStock {
                        item_code: &order_line.item_code,
                        item_name: order_line.description.clone(),
                        batch_number: &batch_number,
                        warehouse_id: input.warehouse_id,
                        bin_id: line.bin_id,
                        quantity: split.accepted,
                        unit_cost: Some(order_line.rate),
                        expiry_date: line.expiry_date,
                    },
                )
                .await?;
            }

            grn_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                grn_id: Set(grn.id),
                order_line_id: Set(order_line.id),
                item_code: Set(order_line.item_code.clone()),
                received_quantity: Set(split.received),
                accepted_quantity: Set(split.accepted),
                rejected_quantity: Set(split.rejected),
                batch_number: Set(batch_number),
                bin_id: Set(line.bin_id),
                expiry_date: Set(line.expiry_date),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        let mut updated_lines = Vec::with_capacity(order_lines.len());
        for order_line in order_lines.iter().cloned() {
            match accepted_per_line.get(&order_line.id).copied() {
                Some(accepted) if !accepted.is_zero() => {
                    let received = order_line.received_quantity + accepted;
                    let mut active: trade_document_line::ActiveModel = order_line.into();
                    active.received_quantity = Set(received);
                    updated_lines.push(active.update(&txn).await.map_err(ServiceError::db_error)?);
                }
                _ => updated_lines.push(order_line),
            }
        }

        let previous = order.status;
        let next = receipt_status(&updated_lines);
        if next != previous {
            let mut active: trade_document::ActiveModel = order.clone().into();
            active.status = Set(next);
            active.updated_at = Set(now);
            active.update(&txn).await.map_err(ServiceError::db_error)?;
        }
        let lines = Self::load_lines(&txn, grn.id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        let accepted_quantity: Decimal = splits.iter().map(|s| s.accepted).sum();
        info!(
            grn_id = %grn.id,
            grn_number = %grn.grn_number,
            order = %order.document_number,
            %accepted_quantity,
            "Goods received"
        );
        self.event_sender
            .send_or_log(Event::GoodsReceived {
                grn_id: grn.id,
                purchase_order_id: order.id,
                accepted_quantity,
            })
            .await;
        if next != previous {
            self.event_sender
                .send_or_log(Event::DocumentStatusChanged {
                    document_id: order.id,
                    from: previous.to_string(),
                    to: next.to_string(),
                })
                .await;
        }

        Ok(GrnDetail {
            grn,
            lines,
            purchase_order_status: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn order_line(quantity: Decimal, received: Decimal) -> trade_document_line::Model {
        trade_document_line::Model {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            line_no: 1,
            item_code: "PAPER".into(),
            description: None,
            quantity,
            rate: dec!(2),
            discount_percent: dec!(0),
            tax_percent: dec!(0),
            amount: quantity * dec!(2),
            line_total: quantity * dec!(2),
            received_quantity: received,
        }
    }

    #[test]
    fn split_fills_missing_side() {
        let split = split_receipt(dec!(10), Some(dec!(7)), None).unwrap();
        assert_eq!(split.rejected, dec!(3));
        let split = split_receipt(dec!(10), None, Some(dec!(1))).unwrap();
        assert_eq!(split.accepted, dec!(9));
        let split = split_receipt(dec!(10), None, None).unwrap();
        assert_eq!(split.accepted, dec!(10));
    }

    #[test]
    fn split_must_add_up() {
        assert_matches!(
            split_receipt(dec!(10), Some(dec!(6)), Some(dec!(3))),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            split_receipt(dec!(10), Some(dec!(12)), None),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            split_receipt(dec!(0), None, None),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn order_status_follows_received_quantities() {
        assert_eq!(
            receipt_status(&[order_line(dec!(5), dec!(5)), order_line(dec!(2), dec!(2))]),
            DocumentStatus::Completed
        );
        assert_eq!(
            receipt_status(&[order_line(dec!(5), dec!(1)), order_line(dec!(2), dec!(0))]),
            DocumentStatus::PartiallyReceived
        );
        assert_eq!(
            receipt_status(&[order_line(dec!(5), dec!(0))]),
            DocumentStatus::Approved
        );
    }
}
