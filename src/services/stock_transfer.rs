use chrono::Utc;
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
    common::{generate_document_number, normalize_code},
    entities::{
        production_order::{self, ProductionStatus},
        production_order_item,
        stock_transfer::{self, Entity as TransferEntity, TransferStatus},
        stock_transfer_line::{self, Entity as TransferLineEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::{
            add_stock, load_candidates, plan_allocation, take_stock, Allocation, BatchCandidate,
            IncomingStock,
        },
        paginate,
        production::ProductionService,
        warehouses::{ensure_bin_in_warehouse, fetch_warehouse},
        Page,
    },
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TransferLineInput {
    #[validate(length(min = 1, max = 64))]
    pub item_code: String,
    #[schema(value_type = String, example = "4")]
    pub quantity: Decimal,
    /// Draw only from this batch; planner picks FEFO otherwise
    pub batch_number: Option<String>,
    pub from_bin_id: Option<Uuid>,
    pub to_bin_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTransferInput {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub remarks: Option<String>,
    #[validate]
    pub lines: Vec<TransferLineInput>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TransferFromProductionInput {
    /// Destination bin inside the order's target warehouse
    pub to_bin_id: Option<Uuid>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferDetail {
    #[serde(flatten)]
    pub transfer: stock_transfer::Model,
    pub lines: Vec<stock_transfer_line::Model>,
}

/// A line waiting to be allocated and posted
#[derive(Debug, Clone)]
struct PendingLine {
    production_order_item_id: Option<Uuid>,
    item_code: String,
    quantity: Decimal,
    batch_number: Option<String>,
    from_bin_id: Option<Uuid>,
    to_bin_id: Option<Uuid>,
}

struct Header {
    production_order_id: Option<Uuid>,
    from_warehouse_id: Uuid,
    to_warehouse_id: Uuid,
    remarks: Option<String>,
}

/// Formats `ITEM (short N)` entries for an insufficient stock error.
fn shortage_message(shortages: &[(String, Decimal)]) -> String {
    let items: Vec<String> = shortages
        .iter()
        .map(|(code, short)| format!("{} (short {})", code, short.normalize()))
        .collect();
    format!("insufficient stock for: {}", items.join(", "))
}

/// Plans every line against the source warehouse. Batches shared by several
/// lines are drawn down as earlier lines consume them.
async fn allocate_lines<C: ConnectionTrait>(
    conn: &C,
    from_warehouse_id: Uuid,
    lines: &[PendingLine],
) -> Result<Vec<(PendingLine, Allocation)>, ServiceError> {
    let mut consumed: HashMap<Uuid, Decimal> = HashMap::new();
    let mut shortages = Vec::new();
    let mut planned = Vec::new();

    for line in lines {
        let batches = load_candidates(conn, &line.item_code, from_warehouse_id, line.from_bin_id).await?;
        let candidates: Vec<BatchCandidate> = batches
            .iter()
            .filter(|b| {
                line.batch_number
                    .as_deref()
                    .map_or(true, |wanted| b.batch_number == wanted)
            })
            .map(|b| {
                let mut candidate = BatchCandidate::from(b);
                candidate.available -= consumed.get(&b.id).copied().unwrap_or_default();
                candidate
            })
            .collect();

        let plan = plan_allocation(line.quantity, &candidates);
        if !plan.is_satisfied() {
            shortages.push((line.item_code.clone(), plan.shortfall));
            continue;
        }
        for allocation in plan.allocations {
            *consumed.entry(allocation.batch_id).or_default() += allocation.quantity;
            planned.push((line.clone(), allocation));
        }
    }

    if !shortages.is_empty() {
        return Err(ServiceError::InsufficientStock(shortage_message(&shortages)));
    }
    Ok(planned)
}

/// Moves stock for every line and records the transfer, all on `conn`.
async fn post_transfer<C: ConnectionTrait>(
    conn: &C,
    header: Header,
    lines: Vec<PendingLine>,
) -> Result<TransferDetail, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "transfer needs at least one line".into(),
        ));
    }
    if lines.iter().any(|l| l.quantity <= Decimal::ZERO) {
        return Err(ServiceError::ValidationError(
            "quantity must be greater than zero".into(),
        ));
    }

    fetch_warehouse(conn, header.from_warehouse_id).await?;
    fetch_warehouse(conn, header.to_warehouse_id).await?;
    for line in &lines {
        if let Some(bin) = line.from_bin_id {
            ensure_bin_in_warehouse(conn, bin, header.from_warehouse_id).await?;
        }
        if let Some(bin) = line.to_bin_id {
            ensure_bin_in_warehouse(conn, bin, header.to_warehouse_id).await?;
        }
    }

    let planned = allocate_lines(conn, header.from_warehouse_id, &lines).await?;
    let same_warehouse = header.from_warehouse_id == header.to_warehouse_id;
    if same_warehouse && planned.iter().any(|(line, a)| a.bin_id == line.to_bin_id) {
        return Err(ServiceError::ValidationError(
            "source and destination are the same; choose a different bin".into(),
        ));
    }

    let now = Utc::now();
    let transfer = stock_transfer::ActiveModel {
        id: Set(Uuid::new_v4()),
        transfer_number: Set(generate_document_number("TRF")),
        production_order_id: Set(header.production_order_id),
        from_warehouse_id: Set(header.from_warehouse_id),
        to_warehouse_id: Set(header.to_warehouse_id),
        status: Set(TransferStatus::Posted),
        remarks: Set(header.remarks),
        posted_at: Set(now),
        created_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)?;

    for (line, allocation) in &planned {
        let source = take_stock(conn, allocation.batch_id, allocation.quantity).await?;
        add_stock(
            conn,
            IncomingStock {
                item_code: &source.item_code,
                item_name: source.item_name.clone(),
                batch_number: &source.batch_number,
                warehouse_id: header.to_warehouse_id,
                bin_id: line.to_bin_id,
                quantity: allocation.quantity,
                unit_cost: source.unit_cost,
                expiry_date: source.expiry_date,
            },
        )
        .await?;

        stock_transfer_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            stock_transfer_id: Set(transfer.id),
            production_order_item_id: Set(line.production_order_item_id),
            item_code: Set(line.item_code.clone()),
            batch_number: Set(allocation.batch_number.clone()),
            from_bin_id: Set(allocation.bin_id),
            to_bin_id: Set(line.to_bin_id),
            quantity: Set(allocation.quantity),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;
    }

    let lines = StockTransferService::load_lines(conn, transfer.id).await?;
    Ok(TransferDetail { transfer, lines })
}

/// Stock transfers between warehouses and bins
#[derive(Clone)]
pub struct StockTransferService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl StockTransferService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_transfers(
        &self,
        production_order_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<stock_transfer::Model>, ServiceError> {
        let mut query = TransferEntity::find();
        if let Some(order_id) = production_order_id {
            query = query.filter(stock_transfer::Column::ProductionOrderId.eq(order_id));
        }
        paginate(
            query.order_by_desc(stock_transfer::Column::CreatedAt),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    async fn load_lines<C: ConnectionTrait>(
        conn: &C,
        transfer_id: Uuid,
    ) -> Result<Vec<stock_transfer_line::Model>, ServiceError> {
        TransferLineEntity::find()
            .filter(stock_transfer_line::Column::StockTransferId.eq(transfer_id))
            .order_by_asc(stock_transfer_line::Column::ItemCode)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_transfer(&self, id: Uuid) -> Result<TransferDetail, ServiceError> {
        let db = self.db.as_ref();
        let transfer = TransferEntity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Stock transfer", id))?;
        let lines = Self::load_lines(db, id).await?;
        Ok(TransferDetail { transfer, lines })
    }

    /// Posts a manual transfer.
    #[instrument(skip(self, input))]
    pub async fn create_transfer(&self, input: CreateTransferInput) -> Result<TransferDetail, ServiceError> {
        input.validate()?;
        let lines = input
            .lines
            .iter()
            .map(|l| PendingLine {
                production_order_item_id: None,
                item_code: normalize_code(&l.item_code),
                quantity: l.quantity,
                batch_number: l
                    .batch_number
                    .as_deref()
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string),
                from_bin_id: l.from_bin_id,
                to_bin_id: l.to_bin_id,
            })
            .collect();
        let header = Header {
            production_order_id: None,
            from_warehouse_id: input.from_warehouse_id,
            to_warehouse_id: input.to_warehouse_id,
            remarks: input.remarks,
        };

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let detail = post_transfer(&txn, header, lines).await.map_err(|e| {
            warn!(error = %e, "Stock transfer rejected");
            e
        })?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        self.announce(&detail).await;
        Ok(detail)
    }

    /// Transfers every outstanding item of a production order from its
    /// source warehouse to its target warehouse.
    #[instrument(skip(self, input))]
    pub async fn create_from_production_order(
        &self,
        order_id: Uuid,
        input: TransferFromProductionInput,
    ) -> Result<TransferDetail, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let order = ProductionService::find_order(&txn, order_id).await?;
        if !order.status.accepts_transfers() {
            return Err(ServiceError::InvalidStatus(format!(
                "production order {} is {}",
                order.order_number, order.status
            )));
        }

        let items = ProductionService::load_items(&txn, order_id).await?;
        let lines: Vec<PendingLine> = items
            .iter()
            .filter(|item| item.outstanding() > Decimal::ZERO)
            .map(|item| PendingLine {
                production_order_item_id: Some(item.id),
                item_code: item.item_code.clone(),
                quantity: item.outstanding(),
                batch_number: None,
                from_bin_id: None,
                to_bin_id: input.to_bin_id,
            })
            .collect();
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation(format!(
                "production order {} has nothing left to transfer",
                order.order_number
            )));
        }

        let header = Header {
            production_order_id: Some(order.id),
            from_warehouse_id: order.source_warehouse_id,
            to_warehouse_id: order.target_warehouse_id,
            remarks: input.remarks,
        };
        let detail = post_transfer(&txn, header, lines).await.map_err(|e| {
            warn!(order_id = %order_id, error = %e, "Production transfer rejected");
            e
        })?;

        for item in items {
            let moved: Decimal = detail
                .lines
                .iter()
                .filter(|l| l.production_order_item_id == Some(item.id))
                .map(|l| l.quantity)
                .sum();
            if moved.is_zero() {
                continue;
            }
            let transferred = item.transferred_quantity + moved;
            let mut active: production_order_item::ActiveModel = item.into();
            active.transferred_quantity = Set(transferred);
            active.update(&txn).await.map_err(ServiceError::db_error)?;
        }

        let released = order.status == ProductionStatus::Planned;
        if released {
            let mut active: production_order::ActiveModel = order.into();
            active.status = Set(ProductionStatus::Released);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await.map_err(ServiceError::db_error)?;
        }
        txn.commit().await.map_err(|e| {
            error!("Failed to commit production transfer: {}", e);
            ServiceError::db_error(e)
        })?;

        if released {
            self.event_sender
                .send_or_log(Event::ProductionOrderStatusChanged {
                    order_id,
                    from: ProductionStatus::Planned.to_string(),
                    to: ProductionStatus::Released.to_string(),
                })
                .await;
        }
        self.announce(&detail).await;
        Ok(detail)
    }

    async fn announce(&self, detail: &TransferDetail) {
        info!(
            transfer_id = %detail.transfer.id,
            transfer_number = %detail.transfer.transfer_number,
            lines = detail.lines.len(),
            "Stock transfer posted"
        );
        self.event_sender
            .send_or_log(Event::StockTransferPosted {
                transfer_id: detail.transfer.id,
                transfer_number: detail.transfer.transfer_number.clone(),
                production_order_id: detail.transfer.production_order_id,
                line_count: detail.lines.len(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn shortage_message_names_each_item() {
        let message = shortage_message(&[("BOLT".into(), dec!(3.000)), ("NUT".into(), dec!(1))]);
        assert_eq!(message, "insufficient stock for: BOLT (short 3), NUT (short 1)");
    }
}
