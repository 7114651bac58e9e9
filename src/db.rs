pub mod customer_repo;
pub use customer_repo::CustomerRepository;
pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod sales_repo;
pub use sales_repo::{SaleFilter, SalesRepository};
pub mod calendar_repo;
pub use calendar_repo::CalendarRepository;
pub mod dashboard_repo;
pub use dashboard_repo::DashboardRepository;
