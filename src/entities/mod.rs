// Parties
pub mod customer;
pub mod operator;

// Warehousing
pub mod inventory_batch;
pub mod warehouse;
pub mod warehouse_bin;

// Manufacturing
pub mod bom;
pub mod bom_line;
pub mod production_order;
pub mod production_order_item;
pub mod stock_transfer;
pub mod stock_transfer_line;

// Purchasing and sales
pub mod grn;
pub mod grn_line;
pub mod trade_document;
pub mod trade_document_line;

// Helpdesk
pub mod ticket;
pub mod ticket_message;

// HR and projects
pub mod attendance;
pub mod task;
