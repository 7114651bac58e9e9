// src/db/customer_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::{
        db_utils::{foreign_key_violation_as, unique_violation_as},
        error::AppError,
    },
    models::customer::{Customer, CustomerInput, SyncStatus},
    services::sync_service::{CustomerSyncStore, SyncUpdate},
};

const CUSTOMER_COLUMNS: &str = r#"
    id, name, tax_id, email, phone, address, city, postal_code, province, country,
    sector, notes, external_id, sync_status, sync_message, sync_timestamp,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CRUD (dados de identidade)
    // =========================================================================

    pub async fn create_customer<'e, E>(
        &self,
        executor: E,
        input: &CustomerInput,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO customers (
                name, tax_id, email, phone, address, city, postal_code,
                province, country, sector, notes, sync_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, 'ES'), $10, $11, 'pending')
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Customer>(&sql)
            .bind(&input.name)
            .bind(&input.tax_id)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.address)
            .bind(&input.city)
            .bind(&input.postal_code)
            .bind(&input.province)
            .bind(&input.country)
            .bind(&input.sector)
            .bind(&input.notes)
            .fetch_one(executor)
            .await
            .map_err(|e| unique_violation_as(e, "tax_id_already_exists"))
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: i64) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(customer)
    }

    /// Lista com busca opcional por nome, NIF ou e-mail.
    pub async fn list_customers<'e, E>(
        &self,
        executor: E,
        search: Option<&str>,
    ) -> Result<Vec<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let search_term = search.map(|q| format!("%{}%", q.trim()));
        let sql = format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customers
            WHERE $1::TEXT IS NULL
               OR name ILIKE $1
               OR tax_id ILIKE $1
               OR email ILIKE $1
            ORDER BY name ASC
            "#
        );

        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(search_term)
            .fetch_all(executor)
            .await?;

        Ok(customers)
    }

    /// Atualiza só a identidade. Os campos de sync ficam intocados.
    pub async fn update_customer<'e, E>(
        &self,
        executor: E,
        id: i64,
        input: &CustomerInput,
    ) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE customers SET
                name = $2, tax_id = $3, email = $4, phone = $5, address = $6,
                city = $7, postal_code = $8, province = $9,
                country = COALESCE($10, country), sector = $11, notes = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(&input.tax_id)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.address)
            .bind(&input.city)
            .bind(&input.postal_code)
            .bind(&input.province)
            .bind(&input.country)
            .bind(&input.sector)
            .bind(&input.notes)
            .fetch_optional(executor)
            .await
            .map_err(|e| unique_violation_as(e, "tax_id_already_exists"))
    }

    /// Retorna quantas linhas foram apagadas (0 = não existia).
    pub async fn delete_customer<'e, E>(&self, executor: E, id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await
            .map_err(|e| foreign_key_violation_as(e, "customer_has_sales"))?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  SINCRONIZAÇÃO
    // =========================================================================

    pub async fn list_pending<'e, E>(&self, executor: E) -> Result<Vec<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customers
            WHERE sync_status IS NULL OR sync_status = 'pending'
            ORDER BY id ASC
            "#
        );

        let customers = sqlx::query_as::<_, Customer>(&sql)
            .fetch_all(executor)
            .await?;

        Ok(customers)
    }

    /// external_id NULL no update = mantém o atual (COALESCE).
    pub async fn write_sync_state<'e, E>(
        &self,
        executor: E,
        id: i64,
        status: SyncStatus,
        external_id: Option<&str>,
        message: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE customers SET
                sync_status = $2,
                external_id = COALESCE($3, external_id),
                sync_message = $4,
                sync_timestamp = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .bind(status)
            .bind(external_id)
            .bind(message)
            .bind(timestamp)
            .fetch_optional(executor)
            .await?;

        Ok(customer)
    }
}

// O SyncService fala com o banco só através desta trait
#[async_trait]
impl CustomerSyncStore for CustomerRepository {
    async fn find_customer(&self, id: i64) -> Result<Option<Customer>, AppError> {
        self.find_by_id(&self.pool, id).await
    }

    async fn list_pending_customers(&self) -> Result<Vec<Customer>, AppError> {
        self.list_pending(&self.pool).await
    }

    async fn record_sync_result(&self, id: i64, update: &SyncUpdate) -> Result<Customer, AppError> {
        self.write_sync_state(
            &self.pool,
            id,
            update.status,
            update.external_id.as_deref(),
            update.message.as_deref(),
            update.timestamp,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cliente {}", id)))
    }
}
