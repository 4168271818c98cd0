use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
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
        bom::BomStatus,
        bom_line::BomLineType,
        production_order::{self, Entity as ProductionOrderEntity, ProductionStatus},
        production_order_item::{self, Entity as ProductionOrderItemEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        bom::{scale_lines, BomService},
        paginate,
        warehouses::fetch_warehouse,
        Page,
    },
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProductionItemInput {
    #[validate(length(min = 1, max = 64))]
    pub item_code: String,
    pub item_name: Option<String>,
    #[schema(value_type = String, example = "10")]
    pub required_quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProductionOrderInput {
    pub bom_id: Option<Uuid>,
    /// Taken from the BOM when omitted
    pub product_code: Option<String>,
    #[schema(value_type = String, example = "5")]
    pub planned_quantity: Decimal,
    pub source_warehouse_id: Uuid,
    pub target_warehouse_id: Uuid,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate]
    pub items: Vec<ProductionItemInput>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateProductionStatusInput {
    #[schema(value_type = String, example = "released")]
    pub status: ProductionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionOrderDetail {
    #[serde(flatten)]
    pub order: production_order::Model,
    pub items: Vec<production_order_item::Model>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductionFilter {
    pub status: Option<ProductionStatus>,
    pub product_code: Option<String>,
}

#[derive(Clone)]
pub struct ProductionService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ProductionService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: ProductionFilter,
        page: u64,
        per_page: u64,
    ) -> Result<Page<production_order::Model>, ServiceError> {
        let mut query = ProductionOrderEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(production_order::Column::Status.eq(status));
        }
        if let Some(code) = filter.product_code {
            query = query.filter(production_order::Column::ProductCode.eq(normalize_code(&code)));
        }
        paginate(
            query.order_by_desc(production_order::Column::CreatedAt),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    pub(crate) async fn find_order<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<production_order::Model, ServiceError> {
        ProductionOrderEntity::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Production order", id))
    }

    pub(crate) async fn load_items<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<production_order_item::Model>, ServiceError> {
        ProductionOrderItemEntity::find()
            .filter(production_order_item::Column::ProductionOrderId.eq(order_id))
            .order_by_asc(production_order_item::Column::ItemCode)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<ProductionOrderDetail, ServiceError> {
        let db = self.db.as_ref();
        let order = Self::find_order(db, id).await?;
        let items = Self::load_items(db, id).await?;
        Ok(ProductionOrderDetail { order, items })
    }

    /// Creates a planned order. Without explicit items the material lines of
    /// the BOM, scaled to the planned quantity, become the order items.
    #[instrument(skip(self, input))]
    pub async fn create_order(
        &self,
        input: CreateProductionOrderInput,
    ) -> Result<ProductionOrderDetail, ServiceError> {
        input.validate()?;
        if input.planned_quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "planned_quantity must be greater than zero".into(),
            ));
        }
        if input
            .items
            .iter()
            .any(|item| item.required_quantity <= Decimal::ZERO)
        {
            return Err(ServiceError::ValidationError(
                "required_quantity must be greater than zero".into(),
            ));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        fetch_warehouse(&txn, input.source_warehouse_id).await?;
        fetch_warehouse(&txn, input.target_warehouse_id).await?;

        let mut items: Vec<(String, Option<String>, Decimal)> = input
            .items
            .iter()
            .map(|i| (normalize_code(&i.item_code), i.item_name.clone(), i.required_quantity))
            .collect();

        let mut product_code = input.product_code.as_deref().map(normalize_code);
        if let Some(bom_id) = input.bom_id {
            let bom = BomService::find_bom(&txn, bom_id).await?;
            if bom.status == BomStatus::Obsolete {
                return Err(ServiceError::InvalidOperation(format!(
                    "BOM {} is obsolete",
                    bom.bom_number
                )));
            }
            if items.is_empty() {
                let lines = BomService::load_lines(&txn, bom_id).await?;
                items = scale_lines(&bom, &lines, input.planned_quantity)?
                    .into_iter()
                    .filter(|r| r.line_type == BomLineType::Material)
                    .map(|r| (r.item_code, r.item_name, r.quantity))
                    .collect();
            }
            product_code.get_or_insert(bom.product_code);
        }

        let product_code = product_code.filter(|c| !c.is_empty()).ok_or_else(|| {
            ServiceError::ValidationError("product_code or bom_id is required".into())
        })?;
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "production order needs at least one item".into(),
            ));
        }

        let now = Utc::now();
        let order = production_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(generate_document_number("PRD")),
            bom_id: Set(input.bom_id),
            product_code: Set(product_code),
            planned_quantity: Set(input.planned_quantity),
            source_warehouse_id: Set(input.source_warehouse_id),
            target_warehouse_id: Set(input.target_warehouse_id),
            status: Set(ProductionStatus::Planned),
            due_date: Set(input.due_date),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!("Failed to create production order: {}", e);
            ServiceError::db_error(e)
        })?;

        for (item_code, item_name, required_quantity) in items {
            production_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                production_order_id: Set(order.id),
                item_code: Set(item_code),
                item_name: Set(item_name),
                required_quantity: Set(required_quantity),
                transferred_quantity: Set(Decimal::ZERO),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }
        let items = Self::load_items(&txn, order.id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(order_id = %order.id, order_number = %order.order_number, "Production order created");
        self.event_sender
            .send_or_log(Event::ProductionOrderCreated {
                order_id: order.id,
                order_number: order.order_number.clone(),
            })
            .await;
        Ok(ProductionOrderDetail { order, items })
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: ProductionStatus,
    ) -> Result<production_order::Model, ServiceError> {
        let order = Self::find_order(self.db.as_ref(), id).await?;
        let from = order.status;
        if !from.can_transition_to(status) {
            warn!(order_id = %id, %from, to = %status, "Rejected production status change");
            return Err(ServiceError::InvalidStatus(format!(
                "cannot move production order from {} to {}",
                from, status
            )));
        }

        let mut active: production_order::ActiveModel = order.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(order_id = %id, %from, to = %status, "Production order status changed");
        self.event_sender
            .send_or_log(Event::ProductionOrderStatusChanged {
                order_id: id,
                from: from.to_string(),
                to: status.to_string(),
            })
            .await;
        Ok(updated)
    }
}
