use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A quantity of one item, from one batch, sitting in one warehouse (and optionally one bin).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_code: String,
    #[sea_orm(nullable)]
    pub item_name: Option<String>,
    pub batch_number: String,
    pub warehouse_id: Uuid,
    #[sea_orm(nullable)]
    pub bin_id: Option<Uuid>,
    pub quantity: Decimal,
    #[sea_orm(nullable)]
    pub unit_cost: Option<Decimal>,
    #[sea_orm(nullable)]
    pub expiry_date: Option<NaiveDate>,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
