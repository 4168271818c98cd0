use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{generate_document_number, normalize_code},
    entities::{
        bom::{self, BomStatus, Entity as BomEntity},
        bom_line::{self, BomLineType, Entity as BomLineEntity},
        production_order::{self, Entity as ProductionOrderEntity, ProductionStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    pricing::{in_range, line_amount, validate_line, LineInput},
    services::{like_pattern, paginate, Page},
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BomLineInput {
    #[validate(length(min = 1, max = 64))]
    pub item_code: String,
    pub item_name: Option<String>,
    #[serde(default)]
    #[schema(value_type = String, example = "material")]
    pub line_type: BomLineType,
    #[schema(value_type = String, example = "2")]
    pub quantity: Decimal,
    #[schema(value_type = String, example = "12.50")]
    pub rate: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBomInput {
    #[validate(length(min = 1, max = 64))]
    pub product_code: String,
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    /// Batch size the lines produce; defaults to 1
    #[schema(value_type = Option<String>)]
    pub quantity: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "draft")]
    pub status: Option<BomStatus>,
    pub notes: Option<String>,
    #[validate]
    pub lines: Vec<BomLineInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBomInput {
    #[validate(length(min = 1, max = 64))]
    pub product_code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub product_name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub quantity: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub status: Option<BomStatus>,
    pub notes: Option<String>,
    /// Replaces every line when present
    pub lines: Option<Vec<BomLineInput>>,
}

/// BOM with its lines in line order
#[derive(Debug, Clone, Serialize)]
pub struct BomDetail {
    #[serde(flatten)]
    pub bom: bom::Model,
    pub lines: Vec<bom_line::Model>,
}

/// Scaled need for one line
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Requirement {
    pub item_code: String,
    pub item_name: Option<String>,
    #[schema(value_type = String)]
    pub line_type: BomLineType,
    #[schema(value_type = String)]
    pub quantity: Decimal,
    #[schema(value_type = String)]
    pub rate: Decimal,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BomRequirements {
    pub bom_id: Uuid,
    pub bom_number: String,
    pub product_code: String,
    #[schema(value_type = String)]
    pub produce_quantity: Decimal,
    pub lines: Vec<Requirement>,
    #[schema(value_type = String)]
    pub total_cost: Decimal,
}

fn check_lines(lines: &[BomLineInput]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "a BOM needs at least one line".into(),
        ));
    }
    for (index, line) in lines.iter().enumerate() {
        validate_line(&LineInput::new(line.quantity, line.rate)).map_err(|e| match e {
            ServiceError::ValidationError(msg) => {
                ServiceError::ValidationError(format!("line {}: {}", index + 1, msg))
            }
            other => other,
        })?;
    }
    Ok(())
}

fn check_batch_size(quantity: Decimal) -> Result<(), ServiceError> {
    if quantity <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "quantity must be greater than zero".into(),
        ));
    }
    Ok(())
}

/// Scales every line of a BOM to produce `produce` units.
pub fn scale_lines(
    bom: &bom::Model,
    lines: &[bom_line::Model],
    produce: Decimal,
) -> Result<Vec<Requirement>, ServiceError> {
    let factor = if bom.quantity.is_zero() {
        Decimal::ZERO
    } else {
        in_range(produce.checked_div(bom.quantity))?
    };
    lines
        .iter()
        .map(|line| {
            let quantity = in_range(line.quantity.checked_mul(factor))?;
            Ok(Requirement {
                item_code: line.item_code.clone(),
                item_name: line.item_name.clone(),
                line_type: line.line_type,
                quantity,
                rate: line.rate,
                amount: line_amount(quantity, line.rate)?,
            })
        })
        .collect()
}

async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    bom_id: Uuid,
    lines: &[BomLineInput],
) -> Result<Decimal, ServiceError> {
    let mut total = Decimal::ZERO;
    for (index, line) in lines.iter().enumerate() {
        let amount = line_amount(line.quantity, line.rate)?;
        total = in_range(total.checked_add(amount))?;
        bom_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            bom_id: Set(bom_id),
            line_no: Set(index as i32 + 1),
            item_code: Set(normalize_code(&line.item_code)),
            item_name: Set(line.item_name.clone()),
            line_type: Set(line.line_type),
            quantity: Set(line.quantity),
            rate: Set(line.rate),
            amount: Set(amount),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;
    }
    Ok(total)
}

/// Bill of Materials service
#[derive(Clone)]
pub struct BomService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl BomService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_boms(
        &self,
        search: Option<String>,
        status: Option<BomStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<bom::Model>, ServiceError> {
        let mut query = BomEntity::find();
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(&term);
            query = query.filter(
                Condition::any()
                    .add(bom::Column::BomNumber.like(pattern.clone()))
                    .add(bom::Column::ProductCode.like(pattern.clone()))
                    .add(bom::Column::ProductName.like(pattern)),
            );
        }
        if let Some(status) = status {
            query = query.filter(bom::Column::Status.eq(status));
        }
        paginate(
            query.order_by_desc(bom::Column::CreatedAt),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    pub async fn find_bom<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<bom::Model, ServiceError> {
        BomEntity::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("BOM", id))
    }

    pub(crate) async fn load_lines<C: ConnectionTrait>(
        conn: &C,
        bom_id: Uuid,
    ) -> Result<Vec<bom_line::Model>, ServiceError> {
        BomLineEntity::find()
            .filter(bom_line::Column::BomId.eq(bom_id))
            .order_by_asc(bom_line::Column::LineNo)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_bom(&self, id: Uuid) -> Result<BomDetail, ServiceError> {
        let db = self.db.as_ref();
        let bom = Self::find_bom(db, id).await?;
        let lines = Self::load_lines(db, id).await?;
        Ok(BomDetail { bom, lines })
    }

    #[instrument(skip(self, input), fields(product_code = %input.product_code))]
    pub async fn create_bom(&self, input: CreateBomInput) -> Result<BomDetail, ServiceError> {
        input.validate()?;
        let quantity = input.quantity.unwrap_or(Decimal::ONE);
        check_batch_size(quantity)?;
        check_lines(&input.lines)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        let bom = bom::ActiveModel {
            id: Set(id),
            bom_number: Set(generate_document_number("BOM")),
            product_code: Set(normalize_code(&input.product_code)),
            product_name: Set(input.product_name.trim().to_string()),
            quantity: Set(quantity),
            status: Set(input.status.unwrap_or(BomStatus::Draft)),
            notes: Set(input.notes.clone()),
            total_cost: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!("Failed to create BOM: {}", e);
            ServiceError::db_error(e)
        })?;

        let total = insert_lines(&txn, id, &input.lines).await?;
        let mut active: bom::ActiveModel = bom.into();
        active.total_cost = Set(total);
        let bom = active.update(&txn).await.map_err(ServiceError::db_error)?;
        let lines = Self::load_lines(&txn, id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(bom_id = %bom.id, bom_number = %bom.bom_number, "BOM created");
        self.event_sender
            .send_or_log(Event::BomCreated {
                bom_id: bom.id,
                bom_number: bom.bom_number.clone(),
            })
            .await;
        Ok(BomDetail { bom, lines })
    }

    #[instrument(skip(self, input))]
    pub async fn update_bom(&self, id: Uuid, input: UpdateBomInput) -> Result<BomDetail, ServiceError> {
        input.validate()?;
        for line in input.lines.iter().flatten() {
            line.validate()?;
        }
        if let Some(quantity) = input.quantity {
            check_batch_size(quantity)?;
        }
        if let Some(lines) = &input.lines {
            check_lines(lines)?;
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = Self::find_bom(&txn, id).await?;
        let mut active: bom::ActiveModel = existing.into();

        if let Some(code) = &input.product_code {
            active.product_code = Set(normalize_code(code));
        }
        if let Some(name) = &input.product_name {
            active.product_name = Set(name.trim().to_string());
        }
        if let Some(quantity) = input.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        if input.notes.is_some() {
            active.notes = Set(input.notes.clone());
        }
        if let Some(lines) = &input.lines {
            BomLineEntity::delete_many()
                .filter(bom_line::Column::BomId.eq(id))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            let total = insert_lines(&txn, id, lines).await?;
            active.total_cost = Set(total);
        }
        active.updated_at = Set(Utc::now());

        let bom = active.update(&txn).await.map_err(ServiceError::db_error)?;
        let lines = Self::load_lines(&txn, id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(bom_id = %id, "BOM updated");
        Ok(BomDetail { bom, lines })
    }

    /// Deletes a BOM unless an open production order still uses it.
    #[instrument(skip(self))]
    pub async fn delete_bom(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let bom = Self::find_bom(&txn, id).await?;

        let in_use = ProductionOrderEntity::find()
            .filter(production_order::Column::BomId.eq(id))
            .filter(production_order::Column::Status.is_in([
                ProductionStatus::Planned,
                ProductionStatus::Released,
                ProductionStatus::InProgress,
            ]))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "BOM {} is used by {} open production order(s)",
                bom.bom_number, in_use
            )));
        }

        BomLineEntity::delete_many()
            .filter(bom_line::Column::BomId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        BomEntity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(bom_id = %id, "BOM deleted");
        Ok(())
    }

    /// Material and resource needs for producing `produce` units.
    #[instrument(skip(self))]
    pub async fn requirements(&self, id: Uuid, produce: Decimal) -> Result<BomRequirements, ServiceError> {
        check_batch_size(produce)?;
        let detail = self.get_bom(id).await?;
        let lines = scale_lines(&detail.bom, &detail.lines, produce)?;
        let total_cost = lines
            .iter()
            .try_fold(Decimal::ZERO, |sum, l| in_range(sum.checked_add(l.amount)))?;

        Ok(BomRequirements {
            bom_id: detail.bom.id,
            bom_number: detail.bom.bom_number,
            product_code: detail.bom.product_code,
            produce_quantity: produce,
            lines,
            total_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bom(quantity: Decimal) -> bom::Model {
        bom::Model {
            id: Uuid::new_v4(),
            bom_number: "BOM-1".into(),
            product_code: "CHAIR".into(),
            product_name: "Chair".into(),
            quantity,
            status: BomStatus::Active,
            notes: None,
            total_cost: dec!(0),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(bom_id: Uuid, code: &str, quantity: Decimal, rate: Decimal) -> bom_line::Model {
        bom_line::Model {
            id: Uuid::new_v4(),
            bom_id,
            line_no: 1,
            item_code: code.into(),
            item_name: None,
            line_type: BomLineType::Material,
            quantity,
            rate,
            amount: quantity * rate,
        }
    }

    #[test]
    fn requirements_scale_by_batch_size() {
        let header = bom(dec!(2));
        let lines = vec![
            line(header.id, "LEG", dec!(8), dec!(3)),
            line(header.id, "SEAT", dec!(2), dec!(10)),
        ];
        let scaled = scale_lines(&header, &lines, dec!(5)).unwrap();
        assert_eq!(scaled[0].quantity, dec!(20));
        assert_eq!(scaled[0].amount, dec!(60));
        assert_eq!(scaled[1].quantity, dec!(5));
    }

    #[test]
    fn oversized_requirements_are_rejected() {
        let header = bom(dec!(0.0001));
        let lines = vec![line(header.id, "LEG", dec!(1000000000000), dec!(1))];
        assert!(matches!(
            scale_lines(&header, &lines, Decimal::MAX),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn invalid_lines_name_their_position() {
        let lines = vec![
            BomLineInput {
                item_code: "A".into(),
                item_name: None,
                line_type: BomLineType::Material,
                quantity: dec!(1),
                rate: dec!(1),
            },
            BomLineInput {
                item_code: "B".into(),
                item_name: None,
                line_type: BomLineType::Resource,
                quantity: dec!(1),
                rate: dec!(-2),
            },
        ];
        let err = check_lines(&lines).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
