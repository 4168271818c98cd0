use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, Select};
use serde::Serialize;

use crate::errors::ServiceError;

// Parties
pub mod customers;
pub mod operators;

// Warehousing and inventory
pub mod inventory;
pub mod warehouses;

// Manufacturing
pub mod bom;
pub mod production;
pub mod stock_transfer;

// Purchasing and sales
pub mod grn;
pub mod trade_documents;

// Helpdesk
pub mod helpdesk;

// HR and projects
pub mod attendance;
pub mod tasks;

/// One page of a list query
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Runs `query` one page at a time; `page` is 1-based.
pub(crate) async fn paginate<E>(
    query: Select<E>,
    db: &DatabaseConnection,
    page: u64,
    per_page: u64,
) -> Result<Page<E::Model>, ServiceError>
where
    E: EntityTrait,
    E::Model: Send + Sync,
{
    let per_page = per_page.max(1);
    let page = page.max(1);
    let paginator = query.paginate(db, per_page);
    let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
    let items = paginator
        .fetch_page(page - 1)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(Page {
        items,
        total,
        page,
        per_page,
    })
}

/// `%term%` for LIKE searches, with LIKE wildcards in the term escaped away.
pub(crate) fn like_pattern(term: &str) -> String {
    let cleaned: String = term
        .trim()
        .chars()
        .filter(|c| *c != '%' && *c != '_')
        .collect();
    format!("%{}%", cleaned)
}
