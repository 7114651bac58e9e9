// src/db/sales_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::sales::{
        line_total, SaleComplement, SaleComplementInput, SaleKind, SaleLine, SaleLineInput,
        SaleRecord, SaleStatus, VERIFACTU_SUBMITTING,
    },
};

#[derive(Clone)]
pub struct SalesRepository {
    pool: PgPool,
}

/// Filtros da listagem (todos opcionais).
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub kind: Option<SaleKind>,
    pub status: Option<SaleStatus>,
    pub customer_id: Option<i64>,
}

impl SalesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CABEÇALHO
    // =========================================================================

    pub async fn create_record<'e, E>(
        &self,
        executor: E,
        kind: SaleKind,
        customer_id: i64,
        title: &str,
        notes: Option<&str>,
        total_amount: Decimal,
    ) -> Result<SaleRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, SaleRecord>(
            r#"
            INSERT INTO sale_records (kind, customer_id, title, notes, status, total_amount)
            VALUES ($1, $2, $3, $4, 'draft', $5)
            RETURNING *
            "#,
        )
        .bind(kind)
        .bind(customer_id)
        .bind(title)
        .bind(notes)
        .bind(total_amount)
        .fetch_one(executor)
        .await?;

        Ok(record)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: i64) -> Result<Option<SaleRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, SaleRecord>("SELECT * FROM sale_records WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(record)
    }

    /// Trava a linha (FOR UPDATE) para transições de status concorrentes.
    pub async fn find_for_update<'e, E>(&self, executor: E, id: i64) -> Result<Option<SaleRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, SaleRecord>("SELECT * FROM sale_records WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(record)
    }

    pub async fn find_by_external_invoice_id<'e, E>(
        &self,
        executor: E,
        external_invoice_id: &str,
    ) -> Result<Option<SaleRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, SaleRecord>(
            "SELECT * FROM sale_records WHERE external_invoice_id = $1 LIMIT 1",
        )
        .bind(external_invoice_id)
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }

    pub async fn list_records<'e, E>(
        &self,
        executor: E,
        filter: &SaleFilter,
    ) -> Result<Vec<SaleRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let records = sqlx::query_as::<_, SaleRecord>(
            r#"
            SELECT * FROM sale_records
            WHERE ($1::sale_kind IS NULL OR kind = $1)
              AND ($2::sale_status IS NULL OR status = $2)
              AND ($3::BIGINT IS NULL OR customer_id = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.kind)
        .bind(filter.status)
        .bind(filter.customer_id)
        .fetch_all(executor)
        .await?;

        Ok(records)
    }

    pub async fn update_header<'e, E>(
        &self,
        executor: E,
        id: i64,
        title: &str,
        notes: Option<&str>,
        total_amount: Decimal,
    ) -> Result<SaleRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, SaleRecord>(
            r#"
            UPDATE sale_records
            SET title = $2, notes = $3, total_amount = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(notes)
        .bind(total_amount)
        .fetch_one(executor)
        .await?;

        Ok(record)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: i64,
        status: SaleStatus,
    ) -> Result<SaleRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, SaleRecord>(
            "UPDATE sale_records SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_one(executor)
        .await?;

        Ok(record)
    }

    /// Marca como faturada com os dados da Verifactu.
    pub async fn mark_invoiced<'e, E>(
        &self,
        executor: E,
        id: i64,
        invoice_number: &str,
        external_invoice_id: Option<&str>,
        verifactu_status: Option<&str>,
        issued_at: DateTime<Utc>,
    ) -> Result<SaleRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, SaleRecord>(
            r#"
            UPDATE sale_records SET
                status = 'invoiced',
                invoice_number = $2,
                external_invoice_id = $3,
                verifactu_status = $4,
                issued_at = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(invoice_number)
        .bind(external_invoice_id)
        .bind(verifactu_status)
        .bind(issued_at)
        .fetch_one(executor)
        .await?;

        Ok(record)
    }

    pub async fn update_verifactu_status<'e, E>(
        &self,
        executor: E,
        external_invoice_id: &str,
        verifactu_status: &str,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE sale_records SET verifactu_status = $2, updated_at = NOW()
            WHERE external_invoice_id = $1
            "#,
        )
        .bind(external_invoice_id)
        .bind(verifactu_status)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Reserva a venda para emissão (`verifactu_status = submitting`).
    pub async fn claim_invoicing<'e, E>(&self, executor: E, id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE sale_records SET verifactu_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(VERIFACTU_SUBMITTING)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Desfaz a reserva, só se ela ainda estiver de pé.
    pub async fn release_invoicing<'e, E>(&self, executor: E, id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE sale_records SET verifactu_status = NULL, updated_at = NOW()
            WHERE id = $1 AND verifactu_status = $2
            "#,
        )
        .bind(id)
        .bind(VERIFACTU_SUBMITTING)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_record<'e, E>(&self, executor: E, id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Linhas e complementos caem por ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM sale_records WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  LINHAS E COMPLEMENTOS
    // =========================================================================

    pub async fn insert_line<'e, E>(
        &self,
        executor: E,
        sale_record_id: i64,
        position: i32,
        line: &SaleLineInput,
    ) -> Result<SaleLine, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inserted = sqlx::query_as::<_, SaleLine>(
            r#"
            INSERT INTO sale_lines (
                sale_record_id, position, service_code, description,
                unit_price, quantity, vat_rate, line_total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(sale_record_id)
        .bind(position)
        .bind(&line.service_code)
        .bind(&line.description)
        .bind(line.unit_price)
        .bind(line.quantity)
        .bind(line.vat_rate)
        .bind(checked_line_total(line.unit_price, line.quantity)?)
        .fetch_one(executor)
        .await?;

        Ok(inserted)
    }

    pub async fn insert_complement<'e, E>(
        &self,
        executor: E,
        sale_record_id: i64,
        position: i32,
        complement: &SaleComplementInput,
    ) -> Result<SaleComplement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inserted = sqlx::query_as::<_, SaleComplement>(
            r#"
            INSERT INTO sale_complements (
                sale_record_id, position, description, unit_price, quantity, line_total
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(sale_record_id)
        .bind(position)
        .bind(&complement.description)
        .bind(complement.unit_price)
        .bind(complement.quantity)
        .bind(checked_line_total(complement.unit_price, complement.quantity)?)
        .fetch_one(executor)
        .await?;

        Ok(inserted)
    }

    pub async fn list_lines<'e, E>(&self, executor: E, sale_record_id: i64) -> Result<Vec<SaleLine>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lines = sqlx::query_as::<_, SaleLine>(
            "SELECT * FROM sale_lines WHERE sale_record_id = $1 ORDER BY position ASC",
        )
        .bind(sale_record_id)
        .fetch_all(executor)
        .await?;

        Ok(lines)
    }

    pub async fn list_complements<'e, E>(
        &self,
        executor: E,
        sale_record_id: i64,
    ) -> Result<Vec<SaleComplement>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let complements = sqlx::query_as::<_, SaleComplement>(
            "SELECT * FROM sale_complements WHERE sale_record_id = $1 ORDER BY position ASC",
        )
        .bind(sale_record_id)
        .fetch_all(executor)
        .await?;

        Ok(complements)
    }

    pub async fn delete_lines<'e, E>(&self, executor: E, sale_record_id: i64) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM sale_lines WHERE sale_record_id = $1")
            .bind(sale_record_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete_complements<'e, E>(&self, executor: E, sale_record_id: i64) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM sale_complements WHERE sale_record_id = $1")
            .bind(sale_record_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn count_for_customer<'e, E>(&self, executor: E, customer_id: i64) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_records WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}

// O total nunca é persistido se não couber na coluna
fn checked_line_total(unit_price: Decimal, quantity: Decimal) -> Result<Decimal, AppError> {
    line_total(unit_price, quantity).ok_or_else(|| AppError::invalid_field("lines", "invalid_amount"))
}
