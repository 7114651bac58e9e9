// src/models/sales.rs

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sale_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SaleKind {
    Presale, // Preventa (orçamento)
    Service, // Serviço prestado ao cliente
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sale_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Draft,
    Pending,
    Approved,
    Invoiced,
    Cancelled,
}

impl SaleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SaleStatus::Invoiced | SaleStatus::Cancelled)
    }

    /// Máquina de estados da venda. Repetir o mesmo status é permitido (no-op).
    pub fn can_transition_to(self, next: SaleStatus) -> bool {
        use SaleStatus::*;

        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Draft, Pending)
                | (Draft, Approved)
                | (Draft, Cancelled)
                | (Pending, Approved)
                | (Pending, Draft)
                | (Pending, Cancelled)
                | (Approved, Invoiced)
                | (Approved, Cancelled)
        )
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub id: i64,
    pub kind: SaleKind,
    pub customer_id: i64,

    #[schema(example = "Mantenimiento anual 2026")]
    pub title: String,
    pub notes: Option<String>,
    pub status: SaleStatus,

    // Soma das linhas + complementos
    #[schema(example = "1440.00")]
    pub total_amount: Decimal,

    // --- Dados da fatura (preenchidos ao faturar) ---
    #[schema(example = "F2026-000007")]
    pub invoice_number: Option<String>,
    pub external_invoice_id: Option<String>,
    #[schema(example = "registered")]
    pub verifactu_status: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub id: i64,
    pub sale_record_id: i64,
    pub position: i32,
    #[schema(example = "MANT-01")]
    pub service_code: String,
    pub description: String,
    #[schema(example = "120.00")]
    pub unit_price: Decimal,
    #[schema(example = "12")]
    pub quantity: Decimal,
    #[schema(example = "21.00")]
    pub vat_rate: Decimal,
    #[schema(example = "1440.00")]
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleComplement {
    pub id: i64,
    pub sale_record_id: i64,
    pub position: i32,
    #[schema(example = "Desplazamiento")]
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    pub line_total: Decimal,
}

/// Cabeçalho + linhas + complementos (o que o frontend mostra).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecordDetail {
    #[serde(flatten)]
    pub header: SaleRecord,
    pub customer_name: String,
    pub lines: Vec<SaleLine>,
    pub complements: Vec<SaleComplement>,
}

impl SaleRecordDetail {
    /// Base tributável por alíquota de IVA. Complementos usam a alíquota padrão.
    pub fn vat_breakdown(&self) -> Vec<VatBreakdown> {
        let mut groups: Vec<VatBreakdown> = Vec::new();
        let lines = self
            .lines
            .iter()
            .map(|l| (l.vat_rate, l.line_total))
            .chain(self.complements.iter().map(|c| (default_vat_rate(), c.line_total)));

        for (rate, base) in lines {
            match groups.iter_mut().find(|g| g.vat_rate == rate) {
                Some(group) => group.base += base,
                None => groups.push(VatBreakdown { vat_rate: rate, base, vat_amount: Decimal::ZERO }),
            }
        }
        for group in &mut groups {
            group.vat_amount = round_money(group.base * group.vat_rate / Decimal::ONE_HUNDRED);
        }
        groups
    }

    pub fn total_with_vat(&self) -> Decimal {
        self.vat_breakdown()
            .iter()
            .map(|g| g.base + g.vat_amount)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VatBreakdown {
    pub vat_rate: Decimal,
    pub base: Decimal,
    pub vat_amount: Decimal,
}

// --- Entradas como chegam da API ---

/// Linha pedida pelo cliente. Preço, descrição e IVA vêm do catálogo quando omitidos.
#[derive(Debug, Clone)]
pub struct SaleLineDraft {
    pub service_code: String,
    pub description: Option<String>,
    pub unit_price: Option<Decimal>,
    pub quantity: Decimal,
    pub vat_rate: Option<Decimal>,
}

/// Conteúdo editável de uma venda (criação e substituição).
#[derive(Debug, Clone)]
pub struct SaleContent {
    pub title: String,
    pub notes: Option<String>,
    pub lines: Vec<SaleLineDraft>,
    pub complements: Vec<SaleComplementInput>,
}

// --- Entradas (já resolvidas contra o catálogo) ---

#[derive(Debug, Clone)]
pub struct SaleLineInput {
    pub service_code: String,
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    pub vat_rate: Decimal,
}

#[derive(Debug, Clone)]
pub struct SaleComplementInput {
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: Decimal,
}

// --- Cálculos ---

pub fn default_vat_rate() -> Decimal {
    Decimal::from(21)
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `verifactu_status` enquanto a fatura está sendo registrada na Verifactu.
pub const VERIFACTU_SUBMITTING: &str = "submitting";

// Limites das colunas: NUMERIC(12,2) para valores, NUMERIC(12,3) para quantidades
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

pub fn max_quantity() -> Decimal {
    Decimal::new(999_999_999_999, 3)
}

pub fn money_in_range(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= max_money()
}

pub fn quantity_in_range(value: Decimal) -> bool {
    value > Decimal::ZERO && value <= max_quantity()
}

pub fn vat_in_range(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED
}

/// None se estourar o Decimal ou a coluna `line_total`.
pub fn line_total(unit_price: Decimal, quantity: Decimal) -> Option<Decimal> {
    unit_price
        .checked_mul(quantity)
        .map(round_money)
        .filter(|total| *total <= max_money())
}

/// total = Σ linhas + Σ complementos. None se não couber em `total_amount`.
pub fn compute_total(lines: &[SaleLineInput], complements: &[SaleComplementInput]) -> Option<Decimal> {
    lines
        .iter()
        .map(|l| line_total(l.unit_price, l.quantity))
        .chain(complements.iter().map(|c| line_total(c.unit_price, c.quantity)))
        .try_fold(Decimal::ZERO, |acc, total| acc.checked_add(total?))
        .filter(|total| *total <= max_money())
}

/// Numeração de série das faturas: F<ano>-<id com 6 dígitos>
pub fn invoice_number_for(sale_id: i64, issued_at: DateTime<Utc>) -> String {
    format!("F{}-{:06}", issued_at.year(), sale_id)
}
