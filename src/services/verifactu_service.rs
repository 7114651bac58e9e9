// src/services/verifactu_service.rs
//
// Proxy das ações da Verifactu. A criação de fatura é o único fluxo que
// também altera o banco: a venda vira `invoiced` e ganha o evento.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::{CalendarRepository, CustomerRepository, SalesRepository},
    models::{
        calendar::NewCalendarEvent,
        sales::{
            default_vat_rate, invoice_number_for, SaleRecord, SaleRecordDetail, SaleStatus, VERIFACTU_SUBMITTING,
        },
        verifactu::{TaxAction, TaxCustomerData, TaxInvoiceData, TaxInvoiceLine, TaxServiceResult},
    },
    services::{
        document_service::DocumentService,
        sales_service::SalesService,
        tax_client::{TaxServiceClient, TaxServiceError},
    },
};

/// Resposta de uma ação: JSON normal ou o PDF da fatura.
#[derive(Debug)]
pub enum ActionOutcome {
    Json(TaxServiceResult),
    Pdf { filename: String, bytes: Vec<u8> },
}

#[derive(Clone)]
pub struct VerifactuService {
    client: Arc<dyn TaxServiceClient>,
    sales_service: SalesService,
    sales_repo: SalesRepository,
    customer_repo: CustomerRepository,
    calendar_repo: CalendarRepository,
    document_service: DocumentService,
    call_timeout: Duration,
}

impl VerifactuService {
    pub fn new(
        client: Arc<dyn TaxServiceClient>,
        sales_service: SalesService,
        sales_repo: SalesRepository,
        customer_repo: CustomerRepository,
        calendar_repo: CalendarRepository,
        document_service: DocumentService,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            sales_service,
            sales_repo,
            customer_repo,
            calendar_repo,
            document_service,
            call_timeout,
        }
    }

    /// Valida e despacha a ação.
    #[tracing::instrument(skip(self, pool, action), fields(action = action.name()))]
    pub async fn execute(&self, pool: &PgPool, action: TaxAction) -> Result<ActionOutcome, AppError> {
        action.validate()?;

        let result = match action {
            TaxAction::CreateCustomer(payload) => {
                let data = TaxCustomerData::from(&payload);
                self.remote(self.client.create_customer(&data)).await?
            }
            TaxAction::UpdateCustomer(payload) => {
                let data = TaxCustomerData::from(&payload.customer);
                self.remote(self.client.update_customer(payload.external_id.trim(), &data))
                    .await?
            }
            TaxAction::ListCustomers => self.remote(self.client.list_customers()).await?,
            TaxAction::ListInvoices => self.remote(self.client.list_invoices()).await?,
            TaxAction::CreateInvoice(payload) => {
                let sale_id = payload
                    .sale_id
                    .ok_or_else(|| AppError::invalid_field("sale_id", "required"))?;
                self.create_invoice(pool, sale_id).await?
            }
            TaxAction::SendToHacienda(payload) => {
                let id = payload.invoice_id.trim();
                let result = self.remote(self.client.send_to_hacienda(id)).await?;
                self.track_status(pool, id, &result, Some("sent")).await?;
                result
            }
            TaxAction::CancelInvoice(payload) => {
                let id = payload.invoice_id.trim();
                let reason = payload.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
                let result = self.remote(self.client.cancel_invoice(id, reason)).await?;
                self.track_status(pool, id, &result, Some("cancelled")).await?;
                result
            }
            TaxAction::CheckHaciendaStatus(payload) => {
                let id = payload.invoice_id.trim();
                let result = self.remote(self.client.check_hacienda_status(id)).await?;
                self.track_status(pool, id, &result, None).await?;
                result
            }
            TaxAction::GetInvoicePdf(payload) => {
                return self.invoice_pdf(pool, payload.invoice_id.trim()).await;
            }
        };

        Ok(ActionOutcome::Json(result))
    }

    /// Health check da API. Só erro de transporte vira 502.
    pub async fn test_connection(&self) -> Result<TaxServiceResult, AppError> {
        match tokio::time::timeout(self.call_timeout, self.client.test_connection()).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(AppError::RemoteService(e.to_string())),
            Err(_) => Err(AppError::RemoteService("timeout".to_string())),
        }
    }

    // =========================================================================
    //  FLUXOS
    // =========================================================================

    // Reserva → chamada remota → gravação local. Se a gravação falhar depois
    // do registro remoto, a fatura remota é anulada.
    async fn create_invoice(&self, pool: &PgPool, sale_id: i64) -> Result<TaxServiceResult, AppError> {
        let (detail, external_customer_id) = self.claim_for_invoicing(pool, sale_id).await?;

        let issued_at = Utc::now();
        let invoice_number = invoice_number_for(sale_id, issued_at);
        let data = build_invoice_data(&detail, &external_customer_id, &invoice_number, issued_at.date_naive());

        let result = match self.remote(self.client.create_invoice(&data)).await {
            Ok(result) => result,
            Err(e) => {
                self.release_claim(pool, sale_id).await;
                return Err(e);
            }
        };

        let updated = self
            .settle_invoice(pool, sale_id, &invoice_number, &result, issued_at)
            .await?;

        tracing::info!(sale_id, invoice_number = %invoice_number, simulated = result.simulated, "🧾 Fatura emitida");

        let mut data = result.data.clone().unwrap_or_else(|| json!({}));
        if let Value::Object(map) = &mut data {
            map.insert(
                "saleRecord".to_string(),
                serde_json::to_value(&updated).map_err(anyhow::Error::from)?,
            );
        }

        Ok(TaxServiceResult {
            data: Some(data),
            ..result
        })
    }

    /// Trava a venda, confere as pré-condições e marca `submitting`.
    async fn claim_for_invoicing(&self, pool: &PgPool, sale_id: i64) -> Result<(SaleRecordDetail, String), AppError> {
        let mut tx = pool.begin().await?;

        let record = self
            .sales_repo
            .find_for_update(&mut *tx, sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Venta {}", sale_id)))?;
        check_invoicing_claim(&record, Utc::now(), self.claim_ttl())?;

        let detail = self.sales_service.load_detail(&mut tx, sale_id).await?;
        if detail.lines.is_empty() {
            return Err(AppError::invalid_field("sale_id", "empty_sale"));
        }

        let customer = self
            .customer_repo
            .find_by_id(&mut *tx, detail.header.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cliente {}", detail.header.customer_id)))?;
        let external_customer_id = customer
            .linked_external_id()
            .ok_or_else(|| AppError::invalid_field("sale_id", "customer_not_synced"))?
            .to_string();

        self.sales_repo.claim_invoicing(&mut *tx, sale_id).await?;
        tx.commit().await?;

        Ok((detail, external_customer_id))
    }

    /// Grava a fatura localmente; em caso de erro, compensa na Verifactu.
    async fn settle_invoice(
        &self,
        pool: &PgPool,
        sale_id: i64,
        invoice_number: &str,
        result: &TaxServiceResult,
        issued_at: DateTime<Utc>,
    ) -> Result<SaleRecord, AppError> {
        match self.mark_invoiced(pool, sale_id, invoice_number, result, issued_at).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                tracing::error!(sale_id, error = %e, "❌ Falha ao gravar fatura já registrada na Verifactu");
                self.compensate(sale_id, result).await;
                self.release_claim(pool, sale_id).await;
                Err(e)
            }
        }
    }

    async fn mark_invoiced(
        &self,
        pool: &PgPool,
        sale_id: i64,
        invoice_number: &str,
        result: &TaxServiceResult,
        issued_at: DateTime<Utc>,
    ) -> Result<SaleRecord, AppError> {
        let mut tx = pool.begin().await?;

        let current = self
            .sales_repo
            .find_for_update(&mut *tx, sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Venta {}", sale_id)))?;
        if current.status != SaleStatus::Approved {
            tracing::warn!(sale_id, "⚠️ Venda mudou de status durante o faturamento");
            return Err(AppError::Conflict("sale_locked".to_string()));
        }

        let external_invoice_id = result.external_id();
        let verifactu_status = result.remote_status().unwrap_or_else(|| "registered".to_string());
        let updated = self
            .sales_repo
            .mark_invoiced(
                &mut *tx,
                sale_id,
                invoice_number,
                external_invoice_id.as_deref(),
                Some(verifactu_status.as_str()),
                issued_at,
            )
            .await?;

        let event = NewCalendarEvent::invoice_issued(updated.customer_id, sale_id, invoice_number, issued_at);
        self.calendar_repo.insert_event(&mut *tx, &event).await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Anula a fatura remota que ficou sem contrapartida local.
    async fn compensate(&self, sale_id: i64, result: &TaxServiceResult) {
        let Some(external_id) = result.external_id() else {
            tracing::error!(sale_id, "❌ Fatura remota sem id: impossível anular automaticamente");
            return;
        };

        match self
            .remote(self.client.cancel_invoice(&external_id, Some(COMPENSATION_REASON)))
            .await
        {
            Ok(_) => tracing::warn!(sale_id, external_id = %external_id, "↩️ Fatura remota anulada"),
            Err(e) => tracing::error!(
                sale_id,
                external_id = %external_id,
                error = %e,
                "❌ Fatura remota órfã: anular manualmente"
            ),
        }
    }

    async fn release_claim(&self, pool: &PgPool, sale_id: i64) {
        if let Err(e) = self.sales_repo.release_invoicing(pool, sale_id).await {
            tracing::warn!(sale_id, error = %e, "⚠️ Não foi possível liberar a reserva de faturamento");
        }
    }

    // Reserva mais velha que isso é de um processo que morreu no meio
    fn claim_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.call_timeout * 4).unwrap_or_else(|_| chrono::Duration::minutes(5))
    }

    /// Propaga o novo estado da AEAT para a venda local, se existir.
    async fn track_status(
        &self,
        pool: &PgPool,
        invoice_id: &str,
        result: &TaxServiceResult,
        fallback: Option<&str>,
    ) -> Result<(), AppError> {
        let status = result.remote_status().or_else(|| fallback.map(str::to_string));
        if let Some(status) = status {
            let touched = self.sales_repo.update_verifactu_status(pool, invoice_id, &status).await?;
            tracing::debug!(invoice_id, status = %status, touched, "Status Verifactu atualizado");
        }
        Ok(())
    }

    /// PDF oficial em modo real; em simulação gera o PDF local da venda.
    async fn invoice_pdf(&self, pool: &PgPool, invoice_id: &str) -> Result<ActionOutcome, AppError> {
        let remote = tokio::time::timeout(self.call_timeout, self.client.get_invoice_pdf(invoice_id))
            .await
            .map_err(|_| AppError::RemoteService("timeout".to_string()))?
            .map_err(remote_error)?;

        let sale = self.sales_repo.find_by_external_invoice_id(pool, invoice_id).await?;
        let filename = format!(
            "factura_{}.pdf",
            sale.as_ref()
                .and_then(|s| s.invoice_number.clone())
                .unwrap_or_else(|| invoice_id.to_string())
        );

        let bytes = match (remote, sale) {
            (Some(bytes), _) => bytes,
            (None, Some(sale)) => self.document_service.generate_invoice_pdf(pool, sale.id).await?,
            (None, None) => return Err(AppError::NotFound(format!("Factura {}", invoice_id))),
        };

        Ok(ActionOutcome::Pdf { filename, bytes })
    }

    /// Chamada remota com timeout. `success = false` também é falha.
    async fn remote<F>(&self, call: F) -> Result<TaxServiceResult, AppError>
    where
        F: Future<Output = Result<TaxServiceResult, TaxServiceError>>,
    {
        let result = tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| AppError::RemoteService("timeout".to_string()))?
            .map_err(remote_error)?;

        if !result.success {
            let message = result
                .error
                .or(result.message)
                .unwrap_or_else(|| "Verifactu rechazó la operación".to_string());
            return Err(AppError::RemoteService(message));
        }
        Ok(result)
    }
}

const COMPENSATION_REASON: &str = "Anulación automática: la operación no se pudo registrar localmente";

fn remote_error(e: TaxServiceError) -> AppError {
    if let TaxServiceError::InvalidId(_) = e {
        return AppError::invalid_field("invoice_id", "invalid_identifier");
    }
    tracing::warn!("⚠️ Falha na API Verifactu: {}", e);
    AppError::RemoteService(e.to_string())
}

/// Só vendas aprovadas, e sem outra emissão em andamento.
fn check_invoicing_claim(
    record: &SaleRecord,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> Result<(), AppError> {
    if record.status != SaleStatus::Approved {
        return Err(AppError::invalid_field("sale_id", "sale_not_approved"));
    }
    let in_progress = record.verifactu_status.as_deref() == Some(VERIFACTU_SUBMITTING);
    if in_progress && now - record.updated_at < ttl {
        return Err(AppError::Conflict("invoice_in_progress".to_string()));
    }
    Ok(())
}

/// Monta o payload da fatura a partir da venda. Complementos usam o IVA padrão.
fn build_invoice_data(
    detail: &SaleRecordDetail,
    external_customer_id: &str,
    invoice_number: &str,
    issue_date: NaiveDate,
) -> TaxInvoiceData {
    let lines = detail
        .lines
        .iter()
        .map(|l| TaxInvoiceLine {
            description: l.description.clone(),
            quantity: l.quantity,
            unit_price: l.unit_price,
            vat_rate: l.vat_rate,
            total: l.line_total,
        })
        .chain(detail.complements.iter().map(|c| TaxInvoiceLine {
            description: c.description.clone(),
            quantity: c.quantity,
            unit_price: c.unit_price,
            vat_rate: default_vat_rate(),
            total: c.line_total,
        }))
        .collect();

    let breakdown = detail.vat_breakdown();
    let total_base: Decimal = breakdown.iter().map(|g| g.base).sum();
    let total_vat: Decimal = breakdown.iter().map(|g| g.vat_amount).sum();

    TaxInvoiceData {
        invoice_number: invoice_number.to_string(),
        issue_date,
        customer_id: external_customer_id.to_string(),
        description: detail.header.title.clone(),
        lines,
        total_base,
        total_vat,
        total: total_base + total_vat,
    }
}
