// src/handlers/sales.rs

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        response::{created, ApiResponse},
    },
    config::AppState,
    db::SaleFilter,
    middleware::i18n::Locale,
    models::sales::{
        SaleComplementInput, SaleContent, SaleKind, SaleLineDraft, SaleRecord, SaleRecordDetail, SaleStatus,
    },
};

fn one() -> Decimal {
    Decimal::ONE
}

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleLinePayload {
    #[serde(default)]
    #[schema(example = "MANT-01")]
    pub service_code: String,

    /// Padrão: nome do serviço no catálogo
    pub description: Option<String>,

    /// Padrão: preço do catálogo
    #[schema(example = "120.00")]
    pub unit_price: Option<Decimal>,

    #[serde(default = "one")]
    #[schema(example = "12")]
    pub quantity: Decimal,

    pub vat_rate: Option<Decimal>,
}

impl From<SaleLinePayload> for SaleLineDraft {
    fn from(p: SaleLinePayload) -> Self {
        Self {
            service_code: p.service_code,
            description: p.description,
            unit_price: p.unit_price,
            quantity: p.quantity,
            vat_rate: p.vat_rate,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleComplementPayload {
    #[serde(default)]
    #[schema(example = "Desplazamiento")]
    pub description: String,

    #[schema(example = "15.50")]
    pub unit_price: Decimal,

    #[serde(default = "one")]
    pub quantity: Decimal,
}

impl From<SaleComplementPayload> for SaleComplementInput {
    fn from(p: SaleComplementPayload) -> Self {
        Self {
            description: p.description,
            unit_price: p.unit_price,
            quantity: p.quantity,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSalePayload {
    pub kind: SaleKind,

    #[schema(example = 42)]
    pub customer_id: i64,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Mantenimiento anual 2026")]
    pub title: String,

    pub notes: Option<String>,

    #[serde(default)]
    pub lines: Vec<SaleLinePayload>,

    #[serde(default)]
    pub complements: Vec<SaleComplementPayload>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSalePayload {
    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub title: String,

    pub notes: Option<String>,

    #[serde(default)]
    pub lines: Vec<SaleLinePayload>,

    #[serde(default)]
    pub complements: Vec<SaleComplementPayload>,
}

fn into_content(
    title: String,
    notes: Option<String>,
    lines: Vec<SaleLinePayload>,
    complements: Vec<SaleComplementPayload>,
) -> SaleContent {
    SaleContent {
        title,
        notes,
        lines: lines.into_iter().map(Into::into).collect(),
        complements: complements.into_iter().map(Into::into).collect(),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeStatusPayload {
    pub status: SaleStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SalesQuery {
    pub kind: Option<SaleKind>,
    pub status: Option<SaleStatus>,
    pub customer_id: Option<i64>,
}

// =============================================================================
//  HANDLERS
// =============================================================================

// GET /api/sales
#[utoipa::path(
    get,
    path = "/api/sales",
    tag = "Sales",
    params(SalesQuery),
    responses((status = 200, description = "Vendas (preventas e serviços)", body = Vec<SaleRecord>))
)]
pub async fn list_sales(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<SalesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = SaleFilter {
        kind: query.kind,
        status: query.status,
        customer_id: query.customer_id,
    };

    let records = app_state
        .sales_service
        .list_sales(&app_state.db_pool, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(records))
}

// POST /api/sales
#[utoipa::path(
    post,
    path = "/api/sales",
    tag = "Sales",
    request_body = CreateSalePayload,
    responses(
        (status = 201, description = "Venda criada em draft", body = SaleRecordDetail),
        (status = 400, description = "Dados inválidos ou código fora do catálogo"),
        (status = 404, description = "Cliente não encontrado")
    )
)]
pub async fn create_sale(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CreateSalePayload>,
) -> Result<Response, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let content = into_content(payload.title, payload.notes, payload.lines, payload.complements);
    let detail = app_state
        .sales_service
        .create_sale(&app_state.db_pool, payload.kind, payload.customer_id, content)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(created(detail))
}

// GET /api/sales/{id}
#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    tag = "Sales",
    params(("id" = i64, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Venda com linhas e complementos", body = SaleRecordDetail),
        (status = 404, description = "Não encontrada")
    )
)]
pub async fn get_sale(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = app_state
        .sales_service
        .get_sale(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(detail))
}

// PUT /api/sales/{id}
#[utoipa::path(
    put,
    path = "/api/sales/{id}",
    tag = "Sales",
    request_body = UpdateSalePayload,
    params(("id" = i64, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Venda substituída", body = SaleRecordDetail),
        (status = 404, description = "Não encontrada"),
        (status = 409, description = "Venda já aprovada/faturada")
    )
)]
pub async fn update_sale(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSalePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let content = into_content(payload.title, payload.notes, payload.lines, payload.complements);
    let detail = app_state
        .sales_service
        .update_sale(&app_state.db_pool, id, content)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(detail))
}

// DELETE /api/sales/{id}
#[utoipa::path(
    delete,
    path = "/api/sales/{id}",
    tag = "Sales",
    params(("id" = i64, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Venda removida"),
        (status = 404, description = "Não encontrada"),
        (status = 409, description = "Venda faturada")
    )
)]
pub async fn delete_sale(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .sales_service
        .delete_sale(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(json!({ "id": id })))
}

// POST /api/sales/{id}/status
#[utoipa::path(
    post,
    path = "/api/sales/{id}/status",
    tag = "Sales",
    request_body = ChangeStatusPayload,
    params(("id" = i64, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Status alterado", body = SaleRecord),
        (status = 400, description = "Transição inválida ou venda sem linhas"),
        (status = 404, description = "Não encontrada")
    )
)]
pub async fn change_status(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
    Json(payload): Json<ChangeStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let record = app_state
        .sales_service
        .change_status(&app_state.db_pool, id, payload.status)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(record))
}

// GET /api/sales/{id}/pdf
#[utoipa::path(
    get,
    path = "/api/sales/{id}/pdf",
    tag = "Sales",
    params(("id" = i64, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "PDF da fatura/presupuesto", content_type = "application/pdf"),
        (status = 404, description = "Não encontrada")
    )
)]
pub async fn sale_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let pdf_bytes = app_state
        .document_service
        .generate_invoice_pdf(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("inline; filename=\"venta_{}.pdf\"", id)),
    ];

    Ok((headers, pdf_bytes).into_response())
}
