use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::hash_password,
    entities::operator::{self, Entity as OperatorEntity, OperatorRole},
    errors::ServiceError,
    services::{like_pattern, paginate, Page},
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOperatorInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[schema(value_type = String, example = "agent")]
    pub role: OperatorRole,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateOperatorInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
    #[schema(value_type = Option<String>)]
    pub role: Option<OperatorRole>,
    pub is_active: Option<bool>,
}

/// Operator as shown over the API, without the password hash
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OperatorView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[schema(value_type = String)]
    pub role: OperatorRole,
    pub is_active: bool,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<operator::Model> for OperatorView {
    fn from(model: operator::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperatorFilter {
    pub search: Option<String>,
    pub role: Option<OperatorRole>,
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct OperatorService {
    db: Arc<DatabaseConnection>,
}

impl OperatorService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = OperatorEntity::find().filter(operator::Column::Email.eq(email));
        if let Some(id) = except {
            query = query.filter(operator::Column::Id.ne(id));
        }
        if query
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "an operator with email {} already exists",
                email
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_operators(
        &self,
        filter: OperatorFilter,
        page: u64,
        per_page: u64,
    ) -> Result<Page<OperatorView>, ServiceError> {
        let mut query = OperatorEntity::find();
        if let Some(term) = filter.search.filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(&term);
            query = query.filter(
                Condition::any()
                    .add(operator::Column::Name.like(pattern.clone()))
                    .add(operator::Column::Email.like(pattern)),
            );
        }
        if let Some(role) = filter.role {
            query = query.filter(operator::Column::Role.eq(role));
        }
        if let Some(active) = filter.active {
            query = query.filter(operator::Column::IsActive.eq(active));
        }
        let page = paginate(
            query.order_by_asc(operator::Column::Name),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await?;
        Ok(page.map(OperatorView::from))
    }

    async fn find_operator(&self, id: Uuid) -> Result<operator::Model, ServiceError> {
        OperatorEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Operator", id))
    }

    #[instrument(skip(self))]
    pub async fn get_operator(&self, id: Uuid) -> Result<OperatorView, ServiceError> {
        self.find_operator(id).await.map(OperatorView::from)
    }

    #[instrument(skip(self, input), fields(email = %input.email, role = %input.role))]
    pub async fn create_operator(&self, input: CreateOperatorInput) -> Result<OperatorView, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        self.ensure_email_free(&email, None).await?;
        let password_hash = hash_password(&input.password)?;

        let now = Utc::now();
        let operator = operator::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            email: Set(email),
            role: Set(input.role),
            password_hash: Set(password_hash),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| {
            error!("Failed to create operator: {}", e);
            ServiceError::db_error(e)
        })?;

        info!(operator_id = %operator.id, "Operator created");
        Ok(operator.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_operator(
        &self,
        id: Uuid,
        input: UpdateOperatorInput,
    ) -> Result<OperatorView, ServiceError> {
        input.validate()?;
        let existing = self.find_operator(id).await?;

        let mut active: operator::ActiveModel = existing.into();
        if let Some(email) = &input.email {
            let email = email.trim().to_lowercase();
            self.ensure_email_free(&email, Some(id)).await?;
            active.email = Set(email);
        }
        if let Some(name) = &input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(password) = &input.password {
            active.password_hash = Set(hash_password(password)?);
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(is_active) = input.is_active {
            if !is_active {
                warn!(operator_id = %id, "Operator deactivated");
            }
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(updated.into())
    }

    /// Deactivates rather than deletes, so tickets and attendance keep their
    /// operator.
    #[instrument(skip(self))]
    pub async fn delete_operator(&self, id: Uuid) -> Result<(), ServiceError> {
        self.update_operator(
            id,
            UpdateOperatorInput {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .map(|_| ())
    }
}
