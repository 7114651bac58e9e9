// src/services/customer_service.rs

use chrono::Utc;
use sqlx::{Acquire, Executor, Postgres};

use crate::{
    common::{error::AppError, tax_id::normalize_tax_id},
    db::{CalendarRepository, CustomerRepository, SalesRepository},
    models::{
        calendar::NewCalendarEvent,
        customer::{Customer, CustomerInput},
    },
};

#[derive(Clone)]
pub struct CustomerService {
    repo: CustomerRepository,
    sales_repo: SalesRepository,
    calendar_repo: CalendarRepository,
}

impl CustomerService {
    pub fn new(repo: CustomerRepository, sales_repo: SalesRepository, calendar_repo: CalendarRepository) -> Self {
        Self {
            repo,
            sales_repo,
            calendar_repo,
        }
    }

    /// Cria o cliente (sempre `pending`) e registra o evento no calendário.
    pub async fn create_customer<'e, E>(&self, executor: E, input: CustomerInput) -> Result<Customer, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let input = normalize_input(input);
        let mut tx = executor.begin().await?;

        let customer = self.repo.create_customer(&mut *tx, &input).await?;

        let event = NewCalendarEvent::customer_registered(customer.id, &customer.name, Utc::now());
        self.calendar_repo.insert_event(&mut *tx, &event).await?;

        tx.commit().await?;

        tracing::info!(customer_id = customer.id, "✅ Cliente criado");
        Ok(customer)
    }

    pub async fn list_customers<'e, E>(&self, executor: E, search: Option<&str>) -> Result<Vec<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.repo.list_customers(executor, search).await
    }

    pub async fn get_customer<'e, E>(&self, executor: E, id: i64) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_by_id(executor, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cliente {}", id)))
    }

    /// Edição de identidade. Não mexe no status de sincronização.
    pub async fn update_customer<'e, E>(
        &self,
        executor: E,
        id: i64,
        input: CustomerInput,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let input = normalize_input(input);
        self.repo
            .update_customer(executor, id, &input)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cliente {}", id)))
    }

    /// Recusa apagar cliente que ainda tem vendas (409).
    pub async fn delete_customer<'e, E>(&self, executor: E, id: i64) -> Result<(), AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        if self.repo.find_by_id(&mut *tx, id).await?.is_none() {
            return Err(AppError::NotFound(format!("Cliente {}", id)));
        }

        // A FK também barra, mas assim a resposta é explícita
        let sales = self.sales_repo.count_for_customer(&mut *tx, id).await?;
        if sales > 0 {
            return Err(AppError::Conflict("customer_has_sales".to_string()));
        }

        self.repo.delete_customer(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(customer_id = id, "🗑️ Cliente removido");
        Ok(())
    }
}

/// NIF normalizado e campos opcionais vazios viram NULL.
fn normalize_input(mut input: CustomerInput) -> CustomerInput {
    input.name = input.name.trim().to_string();
    input.tax_id = normalize_tax_id(&input.tax_id);
    input.country = input
        .country
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());

    for field in [
        &mut input.email,
        &mut input.phone,
        &mut input.address,
        &mut input.city,
        &mut input.postal_code,
        &mut input.province,
        &mut input.sector,
        &mut input.notes,
    ] {
        *field = field.take().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_tax_id_and_blank_fields() {
        let input = CustomerInput {
            name: "  Talleres Pérez ".into(),
            tax_id: "b-1234567.4".into(),
            email: Some("   ".into()),
            city: Some(" Sevilla ".into()),
            country: Some("es".into()),
            ..Default::default()
        };

        let out = normalize_input(input);

        assert_eq!(out.name, "Talleres Pérez");
        assert_eq!(out.tax_id, "B12345674");
        assert_eq!(out.email, None);
        assert_eq!(out.city.as_deref(), Some("Sevilla"));
        assert_eq!(out.country.as_deref(), Some("ES"));
    }

    #[test]
    fn missing_country_stays_none_for_database_default() {
        let out = normalize_input(CustomerInput {
            name: "X".into(),
            tax_id: "12345678Z".into(),
            country: Some(" ".into()),
            ..Default::default()
        });
        assert_eq!(out.country, None);
    }
}
