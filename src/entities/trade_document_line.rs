use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trade_document_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub document_id: Uuid,
    pub line_no: i32,
    pub item_code: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub discount_percent: Decimal,
    pub tax_percent: Decimal,
    pub amount: Decimal,
    pub line_total: Decimal,
    /// Goods received so far (purchase orders only)
    pub received_quantity: Decimal,
}

impl Model {
    pub fn outstanding(&self) -> Decimal {
        (self.quantity - self.received_quantity).max(Decimal::ZERO)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trade_document::Entity",
        from = "Column::DocumentId",
        to = "super::trade_document::Column::Id",
        on_delete = "Cascade"
    )]
    Document,
}

impl Related<super::trade_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
