// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Backoffice API",
        description = "Clientes, catálogo, preventas/servicios, calendario e integração Verifactu"
    ),
    paths(
        // --- Customers ---
        handlers::customers::list_customers,
        handlers::customers::create_customer,
        handlers::customers::get_customer,
        handlers::customers::update_customer,
        handlers::customers::delete_customer,
        handlers::customers::sync_customer,
        handlers::customers::sync_pending_customers,

        // --- Catalog ---
        handlers::catalog::list_services,
        handlers::catalog::create_service,
        handlers::catalog::get_service,
        handlers::catalog::update_service,
        handlers::catalog::delete_service,

        // --- Sales ---
        handlers::sales::list_sales,
        handlers::sales::create_sale,
        handlers::sales::get_sale,
        handlers::sales::update_sale,
        handlers::sales::delete_sale,
        handlers::sales::change_status,
        handlers::sales::sale_pdf,

        // --- Calendar ---
        handlers::calendar::list_events,
        handlers::calendar::create_event,
        handlers::calendar::update_event,
        handlers::calendar::delete_event,

        // --- Verifactu ---
        handlers::verifactu::execute_action,
        handlers::verifactu::connection_status,

        // --- Dashboard ---
        handlers::dashboard::get_summary,
    ),
    components(
        schemas(
            // --- Customers ---
            models::customer::SyncStatus,
            models::customer::Customer,
            handlers::customers::CustomerPayload,
            handlers::customers::SyncCustomerPayload,

            // --- Sync ---
            models::sync::SyncOutcome,
            models::sync::BulkSyncItem,
            models::sync::BulkSyncSummary,
            models::sync::BulkSyncReport,

            // --- Catalog ---
            models::catalog::CatalogService,
            handlers::catalog::CatalogServicePayload,

            // --- Sales ---
            models::sales::SaleKind,
            models::sales::SaleStatus,
            models::sales::SaleRecord,
            models::sales::SaleLine,
            models::sales::SaleComplement,
            models::sales::SaleRecordDetail,
            models::sales::VatBreakdown,
            handlers::sales::SaleLinePayload,
            handlers::sales::SaleComplementPayload,
            handlers::sales::CreateSalePayload,
            handlers::sales::UpdateSalePayload,
            handlers::sales::ChangeStatusPayload,

            // --- Calendar ---
            models::calendar::CalendarEventType,
            models::calendar::CalendarEvent,
            handlers::calendar::CreateEventPayload,
            handlers::calendar::UpdateEventPayload,

            // --- Verifactu ---
            models::verifactu::TaxServiceResult,
            models::verifactu::TaxCustomerData,
            models::verifactu::TaxInvoiceLine,
            models::verifactu::TaxInvoiceData,
            models::verifactu::TaxCustomerPayload,
            models::verifactu::UpdateTaxCustomerPayload,
            models::verifactu::CreateInvoicePayload,
            models::verifactu::InvoiceRefPayload,
            models::verifactu::CancelInvoicePayload,

            // --- Dashboard ---
            models::dashboard::SyncStatusCount,
            models::dashboard::SaleStatusTotals,
            models::dashboard::DashboardSummary,
        )
    ),
    tags(
        (name = "Customers", description = "Cadastro de clientes e sincronização com a Verifactu"),
        (name = "Catalog", description = "Catálogo de serviços"),
        (name = "Sales", description = "Preventas e serviços (presupuesto → contrato → factura)"),
        (name = "Calendar", description = "Eventos do calendário"),
        (name = "Verifactu", description = "Proxy das ações da API fiscal"),
        (name = "Dashboard", description = "Indicadores gerenciais")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_area() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/api/customers/sync",
            "/api/catalog/{id}",
            "/api/sales/{id}/status",
            "/api/calendar/events",
            "/api/verifactu",
            "/api/dashboard/summary",
        ] {
            assert!(paths.contains_key(path), "faltando {}", path);
        }
    }

    #[test]
    fn flattened_tax_customer_payloads_are_documented() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.expect("components").schemas;
        for name in ["TaxCustomerPayload", "UpdateTaxCustomerPayload", "CancelInvoicePayload"] {
            assert!(schemas.contains_key(name), "faltando {}", name);
        }
    }
}
