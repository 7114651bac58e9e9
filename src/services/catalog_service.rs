// src/services/catalog_service.rs

use sqlx::{Executor, Postgres};

use crate::{
    common::error::AppError,
    db::CatalogRepository,
    models::{
        catalog::{CatalogService, CatalogServiceInput},
        sales::{money_in_range, vat_in_range},
    },
};

// Gerencia o catálogo de serviços vendáveis
#[derive(Clone)]
pub struct CatalogManager {
    repo: CatalogRepository,
}

impl CatalogManager {
    pub fn new(repo: CatalogRepository) -> Self {
        Self { repo }
    }

    pub async fn create_service<'e, E>(&self, executor: E, input: CatalogServiceInput) -> Result<CatalogService, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let input = prepare_input(input)?;
        self.repo.create_service(executor, &input).await
    }

    pub async fn list_services<'e, E>(&self, executor: E, only_active: bool) -> Result<Vec<CatalogService>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_services(executor, only_active).await
    }

    pub async fn get_service<'e, E>(&self, executor: E, id: i64) -> Result<CatalogService, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_by_id(executor, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Servicio {}", id)))
    }

    pub async fn update_service<'e, E>(
        &self,
        executor: E,
        id: i64,
        input: CatalogServiceInput,
    ) -> Result<CatalogService, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let input = prepare_input(input)?;
        self.repo
            .update_service(executor, id, &input)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Servicio {}", id)))
    }

    // As linhas de venda guardam cópia de código/preço, então apagar é seguro
    pub async fn delete_service<'e, E>(&self, executor: E, id: i64) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        match self.repo.delete_service(executor, id).await? {
            0 => Err(AppError::NotFound(format!("Servicio {}", id))),
            _ => Ok(()),
        }
    }
}

fn prepare_input(mut input: CatalogServiceInput) -> Result<CatalogServiceInput, AppError> {
    input.code = input.code.trim().to_uppercase();
    input.name = input.name.trim().to_string();

    if !money_in_range(input.unit_price) || !vat_in_range(input.vat_rate) {
        return Err(AppError::InvalidInput("invalid_amount".to_string()));
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn input(price: i64, vat: i64) -> CatalogServiceInput {
        CatalogServiceInput {
            code: " mant-01 ".into(),
            name: "Mantenimiento".into(),
            description: None,
            unit_price: Decimal::from(price),
            vat_rate: Decimal::from(vat),
            active: true,
        }
    }

    #[test]
    fn code_is_trimmed_and_uppercased() {
        assert_eq!(prepare_input(input(10, 21)).unwrap().code, "MANT-01");
    }

    #[test]
    fn rejects_negative_price_and_out_of_range_vat() {
        assert!(matches!(prepare_input(input(-1, 21)), Err(AppError::InvalidInput(_))));
        assert!(matches!(prepare_input(input(1, 101)), Err(AppError::InvalidInput(_))));
        assert!(prepare_input(input(0, 0)).is_ok());
    }

    #[test]
    fn rejects_price_wider_than_money_column() {
        assert!(matches!(
            prepare_input(input(10_000_000_000, 21)),
            Err(AppError::InvalidInput(_))
        ));
        assert!(prepare_input(input(9_999_999_999, 21)).is_ok());
    }
}
