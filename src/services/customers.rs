use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::customer::{self, Entity as CustomerEntity},
    errors::ServiceError,
    services::{like_pattern, paginate, Page},
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomerInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = CustomerEntity::find().filter(customer::Column::Email.eq(email));
        if let Some(id) = except {
            query = query.filter(customer::Column::Id.ne(id));
        }
        let taken = query
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(format!(
                "a customer with email {} already exists",
                email
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        search: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<customer::Model>, ServiceError> {
        let mut query = CustomerEntity::find();
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(&term);
            query = query.filter(
                Condition::any()
                    .add(customer::Column::Name.like(pattern.clone()))
                    .add(customer::Column::Email.like(pattern.clone()))
                    .add(customer::Column::Company.like(pattern)),
            );
        }
        paginate(
            query.order_by_asc(customer::Column::Name),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        CustomerEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Customer", id))
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_customer(&self, input: CreateCustomerInput) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        self.ensure_email_free(&email, None).await?;

        let now = Utc::now();
        let customer = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            email: Set(email),
            phone: Set(input.phone),
            company: Set(input.company),
            address: Set(input.address),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| {
            error!("Failed to create customer: {}", e);
            ServiceError::db_error(e)
        })?;

        info!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    #[instrument(skip(self, input))]
    pub async fn update_customer(
        &self,
        id: Uuid,
        input: UpdateCustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let existing = self.get_customer(id).await?;

        let mut active: customer::ActiveModel = existing.into();
        if let Some(email) = &input.email {
            let email = email.trim().to_lowercase();
            self.ensure_email_free(&email, Some(id)).await?;
            active.email = Set(email);
        }
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if input.phone.is_some() {
            active.phone = Set(input.phone);
        }
        if input.company.is_some() {
            active.company = Set(input.company);
        }
        if input.address.is_some() {
            active.address = Set(input.address);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = CustomerEntity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Customer", id));
        }
        info!(customer_id = %id, "Customer deleted");
        Ok(())
    }
}
