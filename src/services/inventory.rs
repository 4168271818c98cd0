use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        inventory_batch::{self, Entity as BatchEntity},
        warehouse::{self, Entity as WarehouseEntity},
    },
    errors::ServiceError,
    services::{paginate, Page},
};

/// A batch that may be drawn from
#[derive(Debug, Clone, PartialEq)]
pub struct BatchCandidate {
    pub batch_id: Uuid,
    pub batch_number: String,
    pub bin_id: Option<Uuid>,
    pub available: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub received_at: DateTime<Utc>,
}

impl From<&inventory_batch::Model> for BatchCandidate {
    fn from(batch: &inventory_batch::Model) -> Self {
        Self {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            bin_id: batch.bin_id,
            available: batch.quantity,
            expiry_date: batch.expiry_date,
            received_at: batch.received_at,
        }
    }
}

/// Quantity taken from one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Allocation {
    pub batch_id: Uuid,
    pub batch_number: String,
    pub bin_id: Option<Uuid>,
    #[schema(value_type = String)]
    pub quantity: Decimal,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AllocationPlan {
    #[schema(value_type = String)]
    pub requested: Decimal,
    #[schema(value_type = String)]
    pub allocated: Decimal,
    #[schema(value_type = String)]
    pub shortfall: Decimal,
    pub allocations: Vec<Allocation>,
}

impl AllocationPlan {
    pub fn is_satisfied(&self) -> bool {
        self.shortfall.is_zero()
    }
}

/// First-expiry-first-out ordering: dated batches before undated ones,
/// earliest expiry first, then oldest receipt, then batch number.
fn fefo_order(a: &BatchCandidate, b: &BatchCandidate) -> Ordering {
    let expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    expiry
        .then_with(|| a.received_at.cmp(&b.received_at))
        .then_with(|| a.batch_number.cmp(&b.batch_number))
}

/// Plans which batches cover `requested`.
///
/// Candidates without stock are ignored and a batch listed twice is only
/// used once. When the candidates cannot cover the request the plan takes
/// everything available and reports the remainder as `shortfall`.
pub fn plan_allocation(requested: Decimal, candidates: &[BatchCandidate]) -> AllocationPlan {
    let mut seen = HashSet::new();
    let mut ordered: Vec<&BatchCandidate> = candidates
        .iter()
        .filter(|c| c.available > Decimal::ZERO)
        .filter(|c| seen.insert(c.batch_id))
        .collect();
    ordered.sort_by(|a, b| fefo_order(a, b));

    let mut remaining = requested.max(Decimal::ZERO);
    let mut allocations = Vec::new();
    for candidate in ordered {
        if remaining.is_zero() {
            break;
        }
        let take = candidate.available.min(remaining);
        remaining -= take;
        allocations.push(Allocation {
            batch_id: candidate.batch_id,
            batch_number: candidate.batch_number.clone(),
            bin_id: candidate.bin_id,
            quantity: take,
            expiry_date: candidate.expiry_date,
        });
    }

    AllocationPlan {
        requested,
        allocated: requested.max(Decimal::ZERO) - remaining,
        shortfall: remaining,
        allocations,
    }
}

/// Batches with stock for `item_code` in `warehouse_id`, optionally limited to one bin.
pub(crate) async fn load_candidates<C: ConnectionTrait>(
    conn: &C,
    item_code: &str,
    warehouse_id: Uuid,
    bin_id: Option<Uuid>,
) -> Result<Vec<inventory_batch::Model>, ServiceError> {
    let mut query = BatchEntity::find()
        .filter(inventory_batch::Column::ItemCode.eq(item_code))
        .filter(inventory_batch::Column::WarehouseId.eq(warehouse_id))
        .filter(inventory_batch::Column::Quantity.gt(Decimal::ZERO));
    if let Some(bin) = bin_id {
        query = query.filter(inventory_batch::Column::BinId.eq(bin));
    }
    let mut batches = query.all(conn).await.map_err(ServiceError::db_error)?;
    batches.sort_by(|a, b| fefo_order(&BatchCandidate::from(a), &BatchCandidate::from(b)));
    Ok(batches)
}

/// Removes `quantity` from a batch; fails when the batch holds less.
pub(crate) async fn take_stock<C: ConnectionTrait>(
    conn: &C,
    batch_id: Uuid,
    quantity: Decimal,
) -> Result<inventory_batch::Model, ServiceError> {
    let batch = BatchEntity::find_by_id(batch_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Batch", batch_id))?;

    if batch.quantity < quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "batch {} of {} holds {}, {} requested",
            batch.batch_number, batch.item_code, batch.quantity, quantity
        )));
    }

    let remaining = batch.quantity - quantity;
    let mut active: inventory_batch::ActiveModel = batch.into();
    active.quantity = Set(remaining);
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(ServiceError::db_error)
}

/// Stock arriving in a warehouse
#[derive(Debug, Clone)]
pub(crate) struct IncomingStock<'a> {
    pub item_code: &'a str,
    pub item_name: Option<String>,
    pub batch_number: &'a str,
    pub warehouse_id: Uuid,
    pub bin_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
}

/// Adds stock to the batch with the same item, batch number, warehouse and
/// bin, creating it when absent.
pub(crate) async fn add_stock<C: ConnectionTrait>(
    conn: &C,
    incoming: IncomingStock<'_>,
) -> Result<inventory_batch::Model, ServiceError> {
    let bin_condition = match incoming.bin_id {
        Some(bin) => Condition::all().add(inventory_batch::Column::BinId.eq(bin)),
        None => Condition::all().add(inventory_batch::Column::BinId.is_null()),
    };
    let existing = BatchEntity::find()
        .filter(inventory_batch::Column::ItemCode.eq(incoming.item_code))
        .filter(inventory_batch::Column::BatchNumber.eq(incoming.batch_number))
        .filter(inventory_batch::Column::WarehouseId.eq(incoming.warehouse_id))
        .filter(bin_condition)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let now = Utc::now();
    match existing {
        Some(batch) => {
            let quantity = batch.quantity + incoming.quantity;
            let expiry = batch.expiry_date.or(incoming.expiry_date);
            let mut active: inventory_batch::ActiveModel = batch.into();
            active.quantity = Set(quantity);
            active.expiry_date = Set(expiry);
            active.updated_at = Set(now);
            active.update(conn).await.map_err(ServiceError::db_error)
        }
        None => inventory_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_code: Set(incoming.item_code.to_string()),
            item_name: Set(incoming.item_name),
            batch_number: Set(incoming.batch_number.to_string()),
            warehouse_id: Set(incoming.warehouse_id),
            bin_id: Set(incoming.bin_id),
            quantity: Set(incoming.quantity),
            unit_cost: Set(incoming.unit_cost),
            expiry_date: Set(incoming.expiry_date),
            received_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error),
    }
}

/// Filters for the batch list
#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    pub warehouse_id: Option<Uuid>,
    pub bin_id: Option<Uuid>,
    pub item_code: Option<String>,
    pub in_stock_only: bool,
}

/// Stock of one item in one warehouse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WarehouseStock {
    pub warehouse_id: Uuid,
    pub warehouse_code: String,
    #[schema(value_type = String)]
    pub quantity: Decimal,
    pub batch_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemAvailability {
    pub item_code: String,
    #[schema(value_type = String)]
    pub total_quantity: Decimal,
    pub warehouses: Vec<WarehouseStock>,
}

/// Read side of inventory plus the allocation planner
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_batches(
        &self,
        filter: BatchFilter,
        page: u64,
        per_page: u64,
    ) -> Result<Page<inventory_batch::Model>, ServiceError> {
        let mut query = BatchEntity::find();
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(inventory_batch::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(bin_id) = filter.bin_id {
            query = query.filter(inventory_batch::Column::BinId.eq(bin_id));
        }
        if let Some(item_code) = filter.item_code.filter(|c| !c.trim().is_empty()) {
            query = query.filter(inventory_batch::Column::ItemCode.eq(item_code.trim()));
        }
        if filter.in_stock_only {
            query = query.filter(inventory_batch::Column::Quantity.gt(Decimal::ZERO));
        }
        let query = query
            .order_by_asc(inventory_batch::Column::ItemCode)
            .order_by_asc(inventory_batch::Column::ReceivedAt);

        paginate(query, self.db.as_ref(), page, per_page).await
    }

    #[instrument(skip(self))]
    pub async fn get_batch(&self, id: Uuid) -> Result<inventory_batch::Model, ServiceError> {
        BatchEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Batch", id))
    }

    /// Total on hand for an item, broken down per warehouse.
    #[instrument(skip(self))]
    pub async fn availability(&self, item_code: &str) -> Result<ItemAvailability, ServiceError> {
        let db = self.db.as_ref();
        let rows = BatchEntity::find()
            .filter(inventory_batch::Column::ItemCode.eq(item_code))
            .filter(inventory_batch::Column::Quantity.gt(Decimal::ZERO))
            .find_also_related(WarehouseEntity)
            .all(db)
            .await
            .map_err(|e| {
                error!("Failed to load availability for {}: {}", item_code, e);
                ServiceError::db_error(e)
            })?;

        let mut per_warehouse: BTreeMap<String, WarehouseStock> = BTreeMap::new();
        for (batch, warehouse) in rows {
            let code = warehouse
                .as_ref()
                .map(|w: &warehouse::Model| w.code.clone())
                .unwrap_or_default();
            let entry = per_warehouse
                .entry(code.clone())
                .or_insert_with(|| WarehouseStock {
                    warehouse_id: batch.warehouse_id,
                    warehouse_code: code,
                    quantity: Decimal::ZERO,
                    batch_count: 0,
                });
            entry.quantity += batch.quantity;
            entry.batch_count += 1;
        }

        let warehouses: Vec<WarehouseStock> = per_warehouse.into_values().collect();
        Ok(ItemAvailability {
            item_code: item_code.to_string(),
            total_quantity: warehouses.iter().map(|w| w.quantity).sum(),
            warehouses,
        })
    }

    /// Batches of an item available in a warehouse, in allocation order.
    #[instrument(skip(self))]
    pub async fn lookup_batches(
        &self,
        item_code: &str,
        warehouse_id: Uuid,
    ) -> Result<Vec<inventory_batch::Model>, ServiceError> {
        load_candidates(self.db.as_ref(), item_code, warehouse_id, None).await
    }

    /// Allocation preview without moving stock.
    #[instrument(skip(self))]
    pub async fn plan(
        &self,
        item_code: &str,
        warehouse_id: Uuid,
        quantity: Decimal,
    ) -> Result<AllocationPlan, ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "quantity must be greater than zero".into(),
            ));
        }
        let batches = self.lookup_batches(item_code, warehouse_id).await?;
        let candidates: Vec<BatchCandidate> = batches.iter().map(BatchCandidate::from).collect();
        Ok(plan_allocation(quantity, &candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn candidate(n: &str, qty: Decimal, expiry: Option<(i32, u32, u32)>, day: u32) -> BatchCandidate {
        BatchCandidate {
            batch_id: Uuid::new_v4(),
            batch_number: n.to_string(),
            bin_id: None,
            available: qty,
            expiry_date: expiry.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            received_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn earliest_expiry_is_used_first() {
        let batches = vec![
            candidate("LATE", dec!(10), Some((2025, 6, 1)), 1),
            candidate("NONE", dec!(10), None, 1),
            candidate("SOON", dec!(4), Some((2024, 12, 1)), 5),
        ];
        let plan = plan_allocation(dec!(12), &batches);
        assert!(plan.is_satisfied());
        let used: Vec<(&str, Decimal)> = plan
            .allocations
            .iter()
            .map(|a| (a.batch_number.as_str(), a.quantity))
            .collect();
        assert_eq!(used, vec![("SOON", dec!(4)), ("LATE", dec!(8))]);
    }

    #[test]
    fn undated_batches_fall_back_to_receipt_order() {
        let batches = vec![
            candidate("NEWER", dec!(5), None, 9),
            candidate("OLDER", dec!(5), None, 2),
        ];
        let plan = plan_allocation(dec!(6), &batches);
        assert_eq!(plan.allocations[0].batch_number, "OLDER");
        assert_eq!(plan.allocations[1].quantity, dec!(1));
    }

    #[test]
    fn shortfall_is_reported() {
        let batches = vec![candidate("A", dec!(3), None, 1), candidate("B", dec!(0), None, 1)];
        let plan = plan_allocation(dec!(5), &batches);
        assert!(!plan.is_satisfied());
        assert_eq!(plan.allocated, dec!(3));
        assert_eq!(plan.shortfall, dec!(2));
        assert_eq!(plan.allocations.len(), 1);
    }

    #[test]
    fn duplicate_candidates_are_used_once() {
        let a = candidate("A", dec!(3), None, 1);
        let plan = plan_allocation(dec!(5), &[a.clone(), a]);
        assert_eq!(plan.allocated, dec!(3));
        assert_eq!(plan.allocations.len(), 1);
    }

    prop_compose! {
        fn arb_candidate()(qty in 0u32..500, expiry in proptest::option::of(0u32..400), day in 1u32..28) -> BatchCandidate {
            BatchCandidate {
                batch_id: Uuid::new_v4(),
                batch_number: format!("B{}", qty),
                bin_id: None,
                available: Decimal::from(qty),
                expiry_date: expiry.and_then(|d| NaiveDate::from_ymd_opt(2024, 1, 1).map(|base| base + chrono::Duration::days(d as i64))),
                received_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            }
        }
    }

    proptest! {
        #[test]
        fn plan_never_overdraws_and_sums_to_request(
            candidates in proptest::collection::vec(arb_candidate(), 0..12),
            requested in 1u32..3000,
        ) {
            let requested = Decimal::from(requested);
            let plan = plan_allocation(requested, &candidates);
            let total: Decimal = candidates.iter().map(|c| c.available).sum();

            let allocated: Decimal = plan.allocations.iter().map(|a| a.quantity).sum();
            prop_assert_eq!(allocated, plan.allocated);
            prop_assert_eq!(plan.allocated + plan.shortfall, requested);
            if total >= requested {
                prop_assert!(plan.is_satisfied());
            } else {
                prop_assert_eq!(plan.shortfall, requested - total);
            }

            let mut ids = HashSet::new();
            for allocation in &plan.allocations {
                prop_assert!(ids.insert(allocation.batch_id));
                prop_assert!(allocation.quantity > Decimal::ZERO);
                let source = candidates.iter().find(|c| c.batch_id == allocation.batch_id).unwrap();
                prop_assert!(allocation.quantity <= source.available);
            }
        }
    }
}
