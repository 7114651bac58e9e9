// src/services/sales_service.rs
//
// Preventas e serviços: cabeçalho + linhas + complementos gravados sempre na
// mesma transação, e a máquina de estados com seus eventos de calendário.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};

use crate::{
    common::error::AppError,
    db::{CalendarRepository, CatalogRepository, CustomerRepository, SaleFilter, SalesRepository},
    models::{
        calendar::NewCalendarEvent,
        catalog::CatalogService,
        sales::{
            compute_total, default_vat_rate, invoice_number_for, line_total, money_in_range, quantity_in_range,
            vat_in_range, SaleComplementInput, SaleContent, SaleKind, SaleLineDraft, SaleLineInput, SaleRecord,
            SaleRecordDetail, SaleStatus,
        },
    },
};

#[derive(Clone)]
pub struct SalesService {
    repo: SalesRepository,
    customer_repo: CustomerRepository,
    catalog_repo: CatalogRepository,
    calendar_repo: CalendarRepository,
}

impl SalesService {
    pub fn new(
        repo: SalesRepository,
        customer_repo: CustomerRepository,
        catalog_repo: CatalogRepository,
        calendar_repo: CalendarRepository,
    ) -> Self {
        Self {
            repo,
            customer_repo,
            catalog_repo,
            calendar_repo,
        }
    }

    // =========================================================================
    //  1. CRUD
    // =========================================================================

    pub async fn create_sale<'e, E>(
        &self,
        executor: E,
        kind: SaleKind,
        customer_id: i64,
        content: SaleContent,
    ) -> Result<SaleRecordDetail, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        if self.customer_repo.find_by_id(&mut *tx, customer_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Cliente {}", customer_id)));
        }

        let (lines, complements) = self.resolve_content(&mut tx, &content).await?;
        let total = checked_total(&lines, &complements)?;

        let record = self
            .repo
            .create_record(
                &mut *tx,
                kind,
                customer_id,
                content.title.trim(),
                content.notes.as_deref(),
                total,
            )
            .await?;

        self.write_items(&mut tx, record.id, &lines, &complements).await?;
        let detail = self.load_detail(&mut tx, record.id).await?;

        tx.commit().await?;

        tracing::info!(sale_id = record.id, total = %total, "✅ Venda criada");
        Ok(detail)
    }

    pub async fn list_sales<'e, E>(&self, executor: E, filter: &SaleFilter) -> Result<Vec<SaleRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_records(executor, filter).await
    }

    pub async fn get_sale<'e, E>(&self, executor: E, id: i64) -> Result<SaleRecordDetail, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;
        self.load_detail(&mut conn, id).await
    }

    /// Substitui título, notas, linhas e complementos. Só em draft/pending.
    pub async fn update_sale<'e, E>(&self, executor: E, id: i64, content: SaleContent) -> Result<SaleRecordDetail, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let record = self
            .repo
            .find_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Venta {}", id)))?;

        if !matches!(record.status, SaleStatus::Draft | SaleStatus::Pending) {
            return Err(AppError::Conflict("sale_locked".to_string()));
        }

        let (lines, complements) = self.resolve_content(&mut tx, &content).await?;
        let total = checked_total(&lines, &complements)?;

        self.repo
            .update_header(&mut *tx, id, content.title.trim(), content.notes.as_deref(), total)
            .await?;
        self.repo.delete_lines(&mut *tx, id).await?;
        self.repo.delete_complements(&mut *tx, id).await?;
        self.write_items(&mut tx, id, &lines, &complements).await?;

        let detail = self.load_detail(&mut tx, id).await?;
        tx.commit().await?;

        Ok(detail)
    }

    /// Faturadas não podem ser apagadas.
    pub async fn delete_sale<'e, E>(&self, executor: E, id: i64) -> Result<(), AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let record = self
            .repo
            .find_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Venta {}", id)))?;

        if record.status == SaleStatus::Invoiced {
            return Err(AppError::Conflict("sale_locked".to_string()));
        }

        self.repo.delete_record(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    //  2. MÁQUINA DE ESTADOS
    // =========================================================================

    pub async fn change_status<'e, E>(&self, executor: E, id: i64, next: SaleStatus) -> Result<SaleRecord, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let record = self
            .repo
            .find_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Venta {}", id)))?;

        // Mesmo status: no-op
        if record.status == next {
            return Ok(record);
        }

        let has_lines = !requires_lines(next) || !self.repo.list_lines(&mut *tx, id).await?.is_empty();
        check_transition(record.status, next, has_lines)?;

        let updated = match transition_effect(&record, next, Utc::now()) {
            TransitionEffect::StatusOnly => self.repo.update_status(&mut *tx, id, next).await?,
            TransitionEffect::Contract(event) => {
                let updated = self.repo.update_status(&mut *tx, id, next).await?;
                self.calendar_repo.insert_event(&mut *tx, &event).await?;
                updated
            }
            // Faturamento local, sem passar pela Verifactu
            TransitionEffect::Invoice { number, issued_at, event } => {
                let updated = self.repo.mark_invoiced(&mut *tx, id, &number, None, None, issued_at).await?;
                self.calendar_repo.insert_event(&mut *tx, &event).await?;
                updated
            }
        };

        tx.commit().await?;

        tracing::info!(sale_id = id, from = ?record.status, to = ?next, "🔁 Status da venda alterado");
        Ok(updated)
    }

    // =========================================================================
    //  3. AUXILIARES
    // =========================================================================

    /// Cabeçalho + nome do cliente + linhas + complementos.
    pub(crate) async fn load_detail(&self, conn: &mut PgConnection, id: i64) -> Result<SaleRecordDetail, AppError> {
        let header = self
            .repo
            .find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Venta {}", id)))?;

        let customer_name = self
            .customer_repo
            .find_by_id(&mut *conn, header.customer_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_default();

        let lines = self.repo.list_lines(&mut *conn, id).await?;
        let complements = self.repo.list_complements(&mut *conn, id).await?;

        Ok(SaleRecordDetail {
            header,
            customer_name,
            lines,
            complements,
        })
    }

    async fn resolve_content(
        &self,
        conn: &mut PgConnection,
        content: &SaleContent,
    ) -> Result<(Vec<SaleLineInput>, Vec<SaleComplementInput>), AppError> {
        let codes: Vec<String> = content.lines.iter().map(|l| normalize_code(&l.service_code)).collect();
        let catalog = self.catalog_repo.find_active_by_codes(&mut *conn, &codes).await?;

        let lines = resolve_lines(&catalog, &content.lines)?;
        let complements = validate_complements(&content.complements)?;
        Ok((lines, complements))
    }

    async fn write_items(
        &self,
        conn: &mut PgConnection,
        sale_id: i64,
        lines: &[SaleLineInput],
        complements: &[SaleComplementInput],
    ) -> Result<(), AppError> {
        for (position, line) in lines.iter().enumerate() {
            self.repo.insert_line(&mut *conn, sale_id, position as i32, line).await?;
        }
        for (position, complement) in complements.iter().enumerate() {
            self.repo
                .insert_complement(&mut *conn, sale_id, position as i32, complement)
                .await?;
        }
        Ok(())
    }
}

fn requires_lines(next: SaleStatus) -> bool {
    matches!(next, SaleStatus::Pending | SaleStatus::Approved | SaleStatus::Invoiced)
}

/// Transição permitida pelo grafo e, para estados adiante, com ao menos uma linha.
fn check_transition(current: SaleStatus, next: SaleStatus, has_lines: bool) -> Result<(), AppError> {
    if !current.can_transition_to(next) {
        return Err(AppError::invalid_field("status", "invalid_transition"));
    }
    if requires_lines(next) && !has_lines {
        return Err(AppError::invalid_field("lines", "empty_sale"));
    }
    Ok(())
}

/// O que gravar junto com o novo status.
#[derive(Debug)]
enum TransitionEffect {
    StatusOnly,
    Contract(NewCalendarEvent),
    Invoice {
        number: String,
        issued_at: DateTime<Utc>,
        event: NewCalendarEvent,
    },
}

fn transition_effect(record: &SaleRecord, next: SaleStatus, now: DateTime<Utc>) -> TransitionEffect {
    match next {
        SaleStatus::Approved => {
            TransitionEffect::Contract(NewCalendarEvent::contract_generated(record.customer_id, record.id, &record.title, now))
        }
        SaleStatus::Invoiced => {
            let number = invoice_number_for(record.id, now);
            let event = NewCalendarEvent::invoice_issued(record.customer_id, record.id, &number, now);
            TransitionEffect::Invoice {
                number,
                issued_at: now,
                event,
            }
        }
        _ => TransitionEffect::StatusOnly,
    }
}

fn checked_total(lines: &[SaleLineInput], complements: &[SaleComplementInput]) -> Result<Decimal, AppError> {
    compute_total(lines, complements).ok_or_else(|| AppError::invalid_field("lines", "invalid_amount"))
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Completa cada linha com os dados do catálogo.
fn resolve_lines(catalog: &[CatalogService], drafts: &[SaleLineDraft]) -> Result<Vec<SaleLineInput>, AppError> {
    let by_code: HashMap<&str, &CatalogService> = catalog.iter().map(|s| (s.code.as_str(), s)).collect();

    drafts
        .iter()
        .map(|draft| {
            if !quantity_in_range(draft.quantity)
                || draft.unit_price.is_some_and(|p| !money_in_range(p))
                || draft.vat_rate.is_some_and(|v| !vat_in_range(v))
            {
                return Err(AppError::invalid_field("lines", "invalid_amount"));
            }

            let code = normalize_code(&draft.service_code);
            if code.is_empty() {
                return Err(AppError::invalid_field("lines", "required"));
            }
            let description = draft
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string);

            let line = match (by_code.get(code.as_str()), draft.unit_price) {
                (Some(service), price) => SaleLineInput {
                    description: description.unwrap_or_else(|| service.name.clone()),
                    unit_price: price.unwrap_or(service.unit_price),
                    quantity: draft.quantity,
                    vat_rate: draft.vat_rate.unwrap_or(service.vat_rate),
                    service_code: code,
                },
                // Código fora do catálogo só com preço explícito
                (None, Some(price)) => SaleLineInput {
                    description: description.unwrap_or_else(|| code.clone()),
                    unit_price: price,
                    quantity: draft.quantity,
                    vat_rate: draft.vat_rate.unwrap_or_else(default_vat_rate),
                    service_code: code,
                },
                (None, None) => return Err(AppError::invalid_field("lines", "unknown_service_code")),
            };

            if line_total(line.unit_price, line.quantity).is_none() {
                return Err(AppError::invalid_field("lines", "invalid_amount"));
            }
            Ok(line)
        })
        .collect()
}

fn validate_complements(complements: &[SaleComplementInput]) -> Result<Vec<SaleComplementInput>, AppError> {
    complements
        .iter()
        .map(|c| {
            if c.description.trim().is_empty() {
                return Err(AppError::invalid_field("complements", "required"));
            }
            if !quantity_in_range(c.quantity)
                || !money_in_range(c.unit_price)
                || line_total(c.unit_price, c.quantity).is_none()
            {
                return Err(AppError::invalid_field("complements", "invalid_amount"));
            }
            Ok(SaleComplementInput {
                description: c.description.trim().to_string(),
                ..c.clone()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calendar::CalendarEventType;

    fn catalog_entry(code: &str, price: i64, vat: i64) -> CatalogService {
        let now = Utc::now();
        CatalogService {
            id: 1,
            code: code.into(),
            name: format!("Servicio {}", code),
            description: None,
            unit_price: Decimal::from(price),
            vat_rate: Decimal::from(vat),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn draft(code: &str, price: Option<i64>, qty: i64) -> SaleLineDraft {
        SaleLineDraft {
            service_code: code.into(),
            description: None,
            unit_price: price.map(Decimal::from),
            quantity: Decimal::from(qty),
            vat_rate: None,
        }
    }

    fn field_code(err: AppError) -> String {
        match err {
            AppError::ValidationError(errors) => errors
                .field_errors()
                .values()
                .flat_map(|v| v.iter())
                .map(|e| e.code.to_string())
                .next()
                .unwrap_or_default(),
            other => panic!("esperava ValidationError, veio {:?}", other),
        }
    }

    #[test]
    fn catalog_fills_missing_price_description_and_vat() {
        let catalog = vec![catalog_entry("MANT-01", 120, 10)];
        let lines = resolve_lines(&catalog, &[draft(" mant-01 ", None, 3)]).unwrap();

        assert_eq!(lines[0].service_code, "MANT-01");
        assert_eq!(lines[0].unit_price, Decimal::from(120));
        assert_eq!(lines[0].vat_rate, Decimal::from(10));
        assert_eq!(lines[0].description, "Servicio MANT-01");
    }

    #[test]
    fn explicit_price_overrides_catalog() {
        let catalog = vec![catalog_entry("MANT-01", 120, 21)];
        let lines = resolve_lines(&catalog, &[draft("MANT-01", Some(99), 1)]).unwrap();
        assert_eq!(lines[0].unit_price, Decimal::from(99));
    }

    #[test]
    fn unknown_code_without_price_is_rejected() {
        let err = resolve_lines(&[], &[draft("NOPE", None, 1)]).unwrap_err();
        assert_eq!(field_code(err), "unknown_service_code");
    }

    #[test]
    fn unknown_code_with_price_uses_default_vat() {
        let lines = resolve_lines(&[], &[draft("extra", Some(50), 2)]).unwrap();
        assert_eq!(lines[0].vat_rate, default_vat_rate());
        assert_eq!(lines[0].description, "EXTRA");
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let catalog = vec![catalog_entry("MANT-01", 120, 21)];
        let err = resolve_lines(&catalog, &[draft("MANT-01", None, 0)]).unwrap_err();
        assert_eq!(field_code(err), "invalid_amount");
    }

    #[test]
    fn complements_need_description() {
        let err = validate_complements(&[SaleComplementInput {
            description: "  ".into(),
            unit_price: Decimal::ONE,
            quantity: Decimal::ONE,
        }])
        .unwrap_err();
        assert_eq!(field_code(err), "required");
    }

    #[test]
    fn amounts_beyond_column_precision_are_rejected() {
        let catalog = vec![catalog_entry("MANT-01", 120, 21)];
        let huge = 1_000_000_000_000_000_i64;

        for bad in [
            draft("MANT-01", Some(huge), 1),
            draft("MANT-01", None, huge),
            // Cada fator cabe, o produto não
            draft("MANT-01", Some(9_000_000_000), 2),
        ] {
            let err = resolve_lines(&catalog, &[bad]).unwrap_err();
            assert_eq!(field_code(err), "invalid_amount");
        }

        let err = validate_complements(&[SaleComplementInput {
            description: "Desplazamiento".into(),
            unit_price: Decimal::from(huge),
            quantity: Decimal::from(huge),
        }])
        .unwrap_err();
        assert_eq!(field_code(err), "invalid_amount");
    }

    #[test]
    fn vat_rate_must_be_a_percentage() {
        let catalog = vec![catalog_entry("MANT-01", 120, 21)];
        for vat in [Decimal::from(101), Decimal::NEGATIVE_ONE] {
            let mut line = draft("MANT-01", None, 1);
            line.vat_rate = Some(vat);
            let err = resolve_lines(&catalog, &[line]).unwrap_err();
            assert_eq!(field_code(err), "invalid_amount");
        }
    }

    #[test]
    fn overflowing_sale_total_is_a_validation_error() {
        let catalog = vec![catalog_entry("MANT-01", 6_000_000_000, 21)];
        let lines = resolve_lines(&catalog, &[draft("MANT-01", None, 1), draft("MANT-01", None, 1)]).unwrap();
        let err = checked_total(&lines, &[]).unwrap_err();
        assert_eq!(field_code(err), "invalid_amount");
    }

    fn record(status: SaleStatus) -> SaleRecord {
        let now = Utc::now();
        SaleRecord {
            id: 7,
            kind: SaleKind::Service,
            customer_id: 3,
            title: "Mantenimiento anual".into(),
            notes: None,
            status,
            total_amount: Decimal::from(100),
            invoice_number: None,
            external_invoice_id: None,
            verifactu_status: None,
            issued_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_sale_cannot_move_forward_but_can_be_cancelled() {
        for next in [SaleStatus::Pending, SaleStatus::Approved] {
            let err = check_transition(SaleStatus::Draft, next, false).unwrap_err();
            assert_eq!(field_code(err), "empty_sale");
        }
        let err = check_transition(SaleStatus::Approved, SaleStatus::Invoiced, false).unwrap_err();
        assert_eq!(field_code(err), "empty_sale");

        assert!(check_transition(SaleStatus::Draft, SaleStatus::Cancelled, false).is_ok());
        assert!(check_transition(SaleStatus::Draft, SaleStatus::Pending, true).is_ok());
    }

    #[test]
    fn graph_is_checked_before_lines() {
        let err = check_transition(SaleStatus::Draft, SaleStatus::Invoiced, false).unwrap_err();
        assert_eq!(field_code(err), "invalid_transition");

        let err = check_transition(SaleStatus::Cancelled, SaleStatus::Draft, true).unwrap_err();
        assert_eq!(field_code(err), "invalid_transition");
    }

    #[test]
    fn approving_generates_contract_event() {
        let now = Utc::now();
        match transition_effect(&record(SaleStatus::Pending), SaleStatus::Approved, now) {
            TransitionEffect::Contract(event) => {
                assert_eq!(event.event_type, CalendarEventType::ContractGenerated);
                assert_eq!(event.title, "Contrato generado: Mantenimiento anual");
                assert_eq!(event.customer_id, Some(3));
                assert_eq!(event.sale_record_id, Some(7));
                assert_eq!(event.event_date, now.date_naive());
            }
            other => panic!("esperava contrato, veio {:?}", other),
        }
    }

    #[test]
    fn invoicing_numbers_the_sale_and_records_event() {
        let now = Utc::now();
        match transition_effect(&record(SaleStatus::Approved), SaleStatus::Invoiced, now) {
            TransitionEffect::Invoice { number, issued_at, event } => {
                assert_eq!(number, invoice_number_for(7, now));
                assert_eq!(issued_at, now);
                assert_eq!(event.event_type, CalendarEventType::InvoiceIssued);
                assert_eq!(event.title, format!("Factura {} emitida", number));
                assert_eq!(event.sale_record_id, Some(7));
            }
            other => panic!("esperava fatura, veio {:?}", other),
        }
    }

    #[test]
    fn other_transitions_have_no_event() {
        for next in [SaleStatus::Pending, SaleStatus::Draft, SaleStatus::Cancelled] {
            assert!(matches!(
                transition_effect(&record(SaleStatus::Draft), next, Utc::now()),
                TransitionEffect::StatusOnly
            ));
        }
    }

    #[test]
    fn only_forward_states_need_lines() {
        assert!(requires_lines(SaleStatus::Approved));
        assert!(requires_lines(SaleStatus::Pending));
        assert!(!requires_lines(SaleStatus::Cancelled));
        assert!(!requires_lines(SaleStatus::Draft));
    }
}
