pub mod attendance;
pub mod auth;
pub mod bom;
pub mod common;
pub mod customers;
pub mod grn;
pub mod helpdesk;
pub mod inventory;
pub mod operators;
pub mod pricing;
pub mod production;
pub mod stock_transfers;
pub mod tasks;
pub mod trade_documents;
pub mod warehouses;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::mail::MailTransport;
use crate::services::{
    attendance::AttendanceService, bom::BomService, customers::CustomerService, grn::GrnService,
    helpdesk::{AutoAssigner, HelpdeskService}, inventory::InventoryService,
    operators::OperatorService, production::ProductionService,
    stock_transfer::StockTransferService, tasks::TaskService,
    trade_documents::TradeDocumentService, warehouses::WarehouseService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub warehouses: Arc<WarehouseService>,
    pub inventory: Arc<InventoryService>,
    pub bom: Arc<BomService>,
    pub production: Arc<ProductionService>,
    pub stock_transfers: Arc<StockTransferService>,
    pub trade_documents: Arc<TradeDocumentService>,
    pub grn: Arc<GrnService>,
    pub helpdesk: Arc<HelpdeskService>,
    pub tasks: Arc<TaskService>,
    pub attendance: Arc<AttendanceService>,
    pub customers: Arc<CustomerService>,
    pub operators: Arc<OperatorService>,
}

impl AppServices {
    /// Wires every service onto the shared pool and event bus.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
        mailer: Arc<dyn MailTransport>,
        assigner: AutoAssigner,
    ) -> Self {
        let auth = Arc::new(AuthService::new(config.into(), db_pool.clone()));
        let helpdesk = Arc::new(HelpdeskService::new(
            db_pool.clone(),
            event_sender.clone(),
            mailer,
            config.mail.clone(),
            assigner,
        ));

        Self {
            auth,
            warehouses: Arc::new(WarehouseService::new(db_pool.clone(), event_sender.clone())),
            inventory: Arc::new(InventoryService::new(db_pool.clone())),
            bom: Arc::new(BomService::new(db_pool.clone(), event_sender.clone())),
            production: Arc::new(ProductionService::new(db_pool.clone(), event_sender.clone())),
            stock_transfers: Arc::new(StockTransferService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            trade_documents: Arc::new(TradeDocumentService::new(
                db_pool.clone(),
                event_sender.clone(),
                &config.default_currency,
            )),
            grn: Arc::new(GrnService::new(db_pool.clone(), event_sender.clone())),
            helpdesk,
            tasks: Arc::new(TaskService::new(db_pool.clone(), event_sender.clone())),
            attendance: Arc::new(AttendanceService::new(db_pool.clone(), event_sender)),
            customers: Arc::new(CustomerService::new(db_pool.clone())),
            operators: Arc::new(OperatorService::new(db_pool)),
        }
    }
}
