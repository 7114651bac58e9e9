// src/models/dashboard.rs

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

// 1. Clientes por status de sincronização ("null" conta como pending)
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusCount {
    pub sync_status: String,
    pub total: i64,
}

// 2. Vendas por status (quantidade e valor)
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleStatusTotals {
    pub status: String,
    pub count: i64,
    pub amount: Decimal,
}

// 3. Os cards do topo
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub customers_total: i64,
    pub customers_by_sync_status: Vec<SyncStatusCount>,
    pub sales_by_status: Vec<SaleStatusTotals>,
    pub invoiced_this_month: Decimal,
}
