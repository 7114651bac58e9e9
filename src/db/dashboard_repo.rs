// src/db/dashboard_repo.rs

use rust_decimal::Decimal;
use sqlx::{Acquire, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::dashboard::{DashboardSummary, SaleStatusTotals, SyncStatusCount},
};

#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_summary<'e, E>(&self, executor: E) -> Result<DashboardSummary, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        // Transação para ter um snapshot consistente dos números
        let mut tx = executor.begin().await?;

        // A. Clientes por status de sincronização
        let customers_by_sync_status = sqlx::query_as::<_, SyncStatusCount>(
            r#"
            SELECT COALESCE(sync_status::TEXT, 'pending') AS sync_status, COUNT(*) AS total
            FROM customers
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let customers_total: i64 = customers_by_sync_status.iter().map(|c| c.total).sum();

        // B. Vendas por status
        let sales_by_status = sqlx::query_as::<_, SaleStatusTotals>(
            r#"
            SELECT status::TEXT AS status, COUNT(*) AS count,
                   COALESCE(SUM(total_amount), 0) AS amount
            FROM sale_records
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        // C. Faturado no mês corrente
        let invoiced_this_month: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(total_amount)
            FROM sale_records
            WHERE status = 'invoiced'
              AND issued_at >= date_trunc('month', NOW())
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(DashboardSummary {
            customers_total,
            customers_by_sync_status,
            sales_by_status,
            invoiced_this_month: invoiced_this_month.unwrap_or(Decimal::ZERO),
        })
    }
}
