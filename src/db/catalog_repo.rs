// src/db/catalog_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::{db_utils::unique_violation_as, error::AppError},
    models::catalog::{CatalogService, CatalogServiceInput},
};

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_service<'e, E>(
        &self,
        executor: E,
        input: &CatalogServiceInput,
    ) -> Result<CatalogService, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, CatalogService>(
            r#"
            INSERT INTO catalog_services (code, name, description, unit_price, vat_rate, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.unit_price)
        .bind(input.vat_rate)
        .bind(input.active)
        .fetch_one(executor)
        .await
        .map_err(|e| unique_violation_as(e, "service_code_already_exists"))
    }

    pub async fn list_services<'e, E>(
        &self,
        executor: E,
        only_active: bool,
    ) -> Result<Vec<CatalogService>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let services = sqlx::query_as::<_, CatalogService>(
            "SELECT * FROM catalog_services WHERE ($1 = FALSE OR active) ORDER BY code ASC",
        )
        .bind(only_active)
        .fetch_all(executor)
        .await?;

        Ok(services)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: i64) -> Result<Option<CatalogService>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let service = sqlx::query_as::<_, CatalogService>("SELECT * FROM catalog_services WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(service)
    }

    /// Busca vários códigos de uma vez (usado ao montar as linhas de uma venda).
    pub async fn find_active_by_codes<'e, E>(
        &self,
        executor: E,
        codes: &[String],
    ) -> Result<Vec<CatalogService>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let services = sqlx::query_as::<_, CatalogService>(
            "SELECT * FROM catalog_services WHERE active AND code = ANY($1)",
        )
        .bind(codes)
        .fetch_all(executor)
        .await?;

        Ok(services)
    }

    pub async fn update_service<'e, E>(
        &self,
        executor: E,
        id: i64,
        input: &CatalogServiceInput,
    ) -> Result<Option<CatalogService>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, CatalogService>(
            r#"
            UPDATE catalog_services SET
                code = $2, name = $3, description = $4,
                unit_price = $5, vat_rate = $6, active = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.unit_price)
        .bind(input.vat_rate)
        .bind(input.active)
        .fetch_optional(executor)
        .await
        .map_err(|e| unique_violation_as(e, "service_code_already_exists"))
    }

    pub async fn delete_service<'e, E>(&self, executor: E, id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM catalog_services WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
