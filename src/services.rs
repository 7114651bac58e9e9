pub mod calendar_service;
pub mod catalog_service;
pub mod customer_service;
pub mod dashboard_service;
pub mod document_service;
pub mod sales_service;
pub mod sync_service;
pub mod tax_client;
pub mod verifactu_service;
