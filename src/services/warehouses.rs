use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::normalize_code,
    entities::{
        inventory_batch::{self, Entity as BatchEntity},
        warehouse::{self, Entity as WarehouseEntity},
        warehouse_bin::{self, Entity as BinEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{like_pattern, paginate, Page},
};

pub(crate) async fn fetch_warehouse<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<warehouse::Model, ServiceError> {
    WarehouseEntity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Warehouse", id))
}

pub(crate) async fn fetch_bin<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<warehouse_bin::Model, ServiceError> {
    BinEntity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Bin", id))
}

/// Fails unless `bin_id` is a bin of `warehouse_id`.
pub(crate) async fn ensure_bin_in_warehouse<C: ConnectionTrait>(
    conn: &C,
    bin_id: Uuid,
    warehouse_id: Uuid,
) -> Result<warehouse_bin::Model, ServiceError> {
    let bin = fetch_bin(conn, bin_id).await?;
    if bin.warehouse_id != warehouse_id {
        return Err(ServiceError::ValidationError(format!(
            "bin {} does not belong to warehouse {}",
            bin.code, warehouse_id
        )));
    }
    Ok(bin)
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateWarehouseInput {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWarehouseInput {
    #[validate(length(min = 1, max = 32))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBinInput {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub zone: Option<String>,
    #[schema(value_type = Option<String>)]
    pub capacity: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBinInput {
    #[validate(length(min = 1, max = 32))]
    pub code: Option<String>,
    pub zone: Option<String>,
    #[schema(value_type = Option<String>)]
    pub capacity: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Warehouse together with its bins
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseDetail {
    #[serde(flatten)]
    pub warehouse: warehouse::Model,
    pub bins: Vec<warehouse_bin::Model>,
}

fn check_capacity(capacity: Option<Decimal>) -> Result<(), ServiceError> {
    match capacity {
        Some(c) if c < Decimal::ZERO => Err(ServiceError::ValidationError(
            "capacity must not be negative".into(),
        )),
        _ => Ok(()),
    }
}

/// Warehouses and the bins inside them
#[derive(Clone)]
pub struct WarehouseService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl WarehouseService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_warehouses(
        &self,
        search: Option<String>,
        active: Option<bool>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<warehouse::Model>, ServiceError> {
        let mut query = WarehouseEntity::find();
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(&term);
            query = query.filter(
                Condition::any()
                    .add(warehouse::Column::Code.like(pattern.to_ascii_uppercase()))
                    .add(warehouse::Column::Name.like(pattern)),
            );
        }
        if let Some(active) = active {
            query = query.filter(warehouse::Column::IsActive.eq(active));
        }
        paginate(
            query.order_by_asc(warehouse::Column::Code),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    pub async fn find_warehouse(&self, id: Uuid) -> Result<warehouse::Model, ServiceError> {
        fetch_warehouse(self.db.as_ref(), id).await
    }

    #[instrument(skip(self))]
    pub async fn get_warehouse(&self, id: Uuid) -> Result<WarehouseDetail, ServiceError> {
        let warehouse = self.find_warehouse(id).await?;
        let bins = warehouse
            .find_related(BinEntity)
            .order_by_asc(warehouse_bin::Column::Code)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(WarehouseDetail { warehouse, bins })
    }

    async fn ensure_code_free(&self, code: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = WarehouseEntity::find().filter(warehouse::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(warehouse::Column::Id.ne(id));
        }
        let taken = query
            .count(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "warehouse code {} already exists",
                code
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_warehouse(
        &self,
        input: CreateWarehouseInput,
    ) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;
        let code = normalize_code(&input.code);
        self.ensure_code_free(&code, None).await?;

        let now = Utc::now();
        let created = warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(input.name.trim().to_string()),
            address: Set(input.address),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| {
            error!("Failed to create warehouse: {}", e);
            ServiceError::db_error(e)
        })?;

        info!(warehouse_id = %created.id, code = %created.code, "Warehouse created");
        self.event_sender
            .send_or_log(Event::WarehouseCreated {
                warehouse_id: created.id,
                code: created.code.clone(),
            })
            .await;
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_warehouse(
        &self,
        id: Uuid,
        input: UpdateWarehouseInput,
    ) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;
        let existing = self.find_warehouse(id).await?;
        let mut active: warehouse::ActiveModel = existing.into();

        if let Some(code) = input.code {
            let code = normalize_code(&code);
            self.ensure_code_free(&code, Some(id)).await?;
            active.code = Set(code);
        }
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if input.address.is_some() {
            active.address = Set(input.address);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Deletes a warehouse with its bins. Fails while any batch still holds stock.
    #[instrument(skip(self))]
    pub async fn delete_warehouse(&self, id: Uuid) -> Result<(), ServiceError> {
        let warehouse = self.find_warehouse(id).await?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let stocked = BatchEntity::find()
            .filter(inventory_batch::Column::WarehouseId.eq(id))
            .filter(inventory_batch::Column::Quantity.gt(Decimal::ZERO))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if stocked > 0 {
            return Err(ServiceError::Conflict(format!(
                "warehouse {} still holds stock in {} batch(es)",
                warehouse.code, stocked
            )));
        }

        BatchEntity::delete_many()
            .filter(inventory_batch::Column::WarehouseId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        BinEntity::delete_many()
            .filter(warehouse_bin::Column::WarehouseId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        WarehouseEntity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(warehouse_id = %id, "Warehouse deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_bins(&self, warehouse_id: Uuid) -> Result<Vec<warehouse_bin::Model>, ServiceError> {
        self.find_warehouse(warehouse_id).await?;
        BinEntity::find()
            .filter(warehouse_bin::Column::WarehouseId.eq(warehouse_id))
            .order_by_asc(warehouse_bin::Column::Code)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn find_bin(&self, id: Uuid) -> Result<warehouse_bin::Model, ServiceError> {
        fetch_bin(self.db.as_ref(), id).await
    }

    async fn ensure_bin_code_free(
        &self,
        warehouse_id: Uuid,
        code: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = BinEntity::find()
            .filter(warehouse_bin::Column::WarehouseId.eq(warehouse_id))
            .filter(warehouse_bin::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(warehouse_bin::Column::Id.ne(id));
        }
        if query
            .count(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            > 0
        {
            return Err(ServiceError::Conflict(format!(
                "bin {} already exists in this warehouse",
                code
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_bin(
        &self,
        warehouse_id: Uuid,
        input: CreateBinInput,
    ) -> Result<warehouse_bin::Model, ServiceError> {
        input.validate()?;
        check_capacity(input.capacity)?;
        self.find_warehouse(warehouse_id).await?;
        let code = normalize_code(&input.code);
        self.ensure_bin_code_free(warehouse_id, &code, None).await?;

        let now = Utc::now();
        let bin = warehouse_bin::ActiveModel {
            id: Set(Uuid::new_v4()),
            warehouse_id: Set(warehouse_id),
            code: Set(code),
            zone: Set(input.zone),
            capacity: Set(input.capacity),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        info!(bin_id = %bin.id, %warehouse_id, "Bin created");
        Ok(bin)
    }

    #[instrument(skip(self))]
    pub async fn update_bin(
        &self,
        bin_id: Uuid,
        input: UpdateBinInput,
    ) -> Result<warehouse_bin::Model, ServiceError> {
        input.validate()?;
        check_capacity(input.capacity)?;
        let bin = self.find_bin(bin_id).await?;
        let warehouse_id = bin.warehouse_id;
        let mut active: warehouse_bin::ActiveModel = bin.into();

        if let Some(code) = input.code {
            let code = normalize_code(&code);
            self.ensure_bin_code_free(warehouse_id, &code, Some(bin_id))
                .await?;
            active.code = Set(code);
        }
        if input.zone.is_some() {
            active.zone = Set(input.zone);
        }
        if input.capacity.is_some() {
            active.capacity = Set(input.capacity);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn delete_bin(&self, bin_id: Uuid) -> Result<(), ServiceError> {
        let bin = self.find_bin(bin_id).await?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let stocked = BatchEntity::find()
            .filter(inventory_batch::Column::BinId.eq(bin_id))
            .filter(inventory_batch::Column::Quantity.gt(Decimal::ZERO))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if stocked > 0 {
            return Err(ServiceError::Conflict(format!(
                "bin {} still holds stock",
                bin.code
            )));
        }
        BatchEntity::delete_many()
            .filter(inventory_batch::Column::BinId.eq(bin_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        bin.delete(&txn).await.map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(())
    }
}
