use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_transfer_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stock_transfer_id: Uuid,
    #[sea_orm(nullable)]
    pub production_order_item_id: Option<Uuid>,
    pub item_code: String,
    pub batch_number: String,
    #[sea_orm(nullable)]
    pub from_bin_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub to_bin_id: Option<Uuid>,
    pub quantity: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_transfer::Entity",
        from = "Column::StockTransferId",
        to = "super::stock_transfer::Column::Id",
        on_delete = "Cascade"
    )]
    StockTransfer,
}

impl Related<super::stock_transfer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockTransfer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
