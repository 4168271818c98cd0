use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ERP API",
        version = "0.3.0",
        description = r#"
# ERP API

Warehousing, manufacturing, purchasing, sales, helpdesk and HR on one JSON surface.

## Features

- **Warehouses and bins**: stock locations with FEFO batch allocation
- **Manufacturing**: bills of materials, production orders and material transfers
- **Purchasing and sales**: quotations, orders, conversion and goods receipts
- **Helpdesk**: email-threaded tickets with automatic reopen and assignment
- **HR and projects**: attendance check-in/out and project tasks

## Authentication

Log in with `POST /api/auth/login` and send the returned token on every other call:

```
Authorization: Bearer <your-jwt-token>
```

## Responses

Every body uses the same envelope:

```json
{
  "success": true,
  "data": {},
  "message": null
}
```

Errors carry `success: false` and a `message`.

## Pagination

List endpoints accept `page` (default 1) and `per_page` (clamped to the configured maximum).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "pricing", description = "Line and document totals"),
        (name = "warehouses", description = "Warehouses and bins"),
        (name = "inventory", description = "Batches and availability"),
        (name = "bom", description = "Bills of materials"),
        (name = "production", description = "Production orders"),
        (name = "stock-transfers", description = "Inter-warehouse stock movement"),
        (name = "purchasing", description = "Quotations, orders and goods receipts"),
        (name = "helpdesk", description = "Tickets, replies and inbound mail"),
        (name = "attendance", description = "Operator attendance")
    ),
    paths(
        crate::handlers::pricing::calculate,
        crate::handlers::warehouses::list_warehouses,
        crate::handlers::warehouses::create_warehouse,
        crate::handlers::inventory::list_batches,
        crate::handlers::bom::list_boms,
        crate::handlers::bom::create_bom,
        crate::handlers::production::create_order,
        crate::handlers::stock_transfers::create_transfer,
        crate::handlers::stock_transfers::create_from_production_order,
        crate::handlers::grn::create_receipt,
        crate::handlers::helpdesk::list_tickets,
        crate::handlers::helpdesk::create_ticket,
        crate::handlers::helpdesk::reply_to_ticket,
        crate::handlers::helpdesk::receive_inbound_email,
        crate::handlers::attendance::check_in,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::auth::LoginCredentials,
            crate::auth::TokenResponse,
            crate::handlers::pricing::CalculateRequest,
            crate::handlers::pricing::CalculateResponse,
            crate::pricing::LineInput,
            crate::pricing::LineBreakdown,
            crate::pricing::Totals,
            crate::services::warehouses::CreateWarehouseInput,
            crate::services::warehouses::CreateBinInput,
            crate::services::bom::CreateBomInput,
            crate::services::bom::BomLineInput,
            crate::services::production::CreateProductionOrderInput,
            crate::services::stock_transfer::CreateTransferInput,
            crate::services::stock_transfer::TransferLineInput,
            crate::services::stock_transfer::TransferFromProductionInput,
            crate::services::trade_documents::CreateDocumentInput,
            crate::services::trade_documents::DocumentLineInput,
            crate::services::grn::CreateGrnInput,
            crate::services::grn::GrnLineInput,
            crate::services::helpdesk::CreateTicketInput,
            crate::services::helpdesk::ReplyInput,
            crate::services::helpdesk::InboundEmailInput,
            crate::services::attendance::CheckInInput,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("ERP API"));
        assert!(json.contains("/api/warehouse"));
        assert!(json.contains("/api/helpdesk/inbound"));
        assert!(json.contains("bearer_auth"));
    }
}
