// src/handlers/customers.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        response::{created, ApiResponse},
        tax_id::validate_tax_id,
    },
    config::AppState,
    middleware::i18n::Locale,
    models::{
        customer::{Customer, CustomerInput},
        sync::{BulkSyncReport, SyncOutcome},
    },
};

// =============================================================================
//  ÁREA 1: CRUD
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    #[serde(default)]
    #[validate(length(min = 2, message = "required"))]
    #[schema(example = "Talleres Pérez S.L.")]
    pub name: String,

    #[serde(default)]
    #[validate(custom(function = "validate_tax_id"))]
    #[schema(example = "B12345674")]
    pub tax_id: String,

    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,

    #[validate(length(equal = 2, message = "invalid_country_code"))]
    #[schema(example = "ES")]
    pub country: Option<String>,

    pub sector: Option<String>,
    pub notes: Option<String>,
}

impl From<CustomerPayload> for CustomerInput {
    fn from(p: CustomerPayload) -> Self {
        Self {
            name: p.name,
            tax_id: p.tax_id,
            email: p.email,
            phone: p.phone,
            address: p.address,
            city: p.city,
            postal_code: p.postal_code,
            province: p.province,
            country: p.country,
            sector: p.sector,
            notes: p.notes,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CustomerQuery {
    /// Busca por nome, NIF ou e-mail
    pub search: Option<String>,
}

// GET /api/customers
#[utoipa::path(
    get,
    path = "/api/customers",
    tag = "Customers",
    params(CustomerQuery),
    responses(
        (status = 200, description = "Lista de clientes", body = Vec<Customer>)
    )
)]
pub async fn list_customers(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<CustomerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let customers = app_state
        .customer_service
        .list_customers(&app_state.db_pool, query.search.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(customers))
}

// POST /api/customers
#[utoipa::path(
    post,
    path = "/api/customers",
    tag = "Customers",
    request_body = CustomerPayload,
    responses(
        (status = 201, description = "Cliente criado (sync_status = pending)", body = Customer),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "NIF já cadastrado")
    )
)]
pub async fn create_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CustomerPayload>,
) -> Result<Response, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let customer = app_state
        .customer_service
        .create_customer(&app_state.db_pool, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(created(customer))
}

// GET /api/customers/{id}
#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(("id" = i64, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente", body = Customer),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn get_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = app_state
        .customer_service
        .get_customer(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(customer))
}

// PUT /api/customers/{id}
#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    tag = "Customers",
    request_body = CustomerPayload,
    params(("id" = i64, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente atualizado (status de sync preservado)", body = Customer),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn update_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
    Json(payload): Json<CustomerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let customer = app_state
        .customer_service
        .update_customer(&app_state.db_pool, id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(customer))
}

// DELETE /api/customers/{id}
#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(("id" = i64, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente removido"),
        (status = 404, description = "Não encontrado"),
        (status = 409, description = "Cliente tem vendas")
    )
)]
pub async fn delete_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .customer_service
        .delete_customer(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(json!({ "id": id })))
}

// =============================================================================
//  ÁREA 2: SINCRONIZAÇÃO COM A VERIFACTU
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncCustomerPayload {
    /// Número ou texto; texto não numérico conta como inexistente
    #[schema(value_type = i64, example = 42)]
    pub customer_id: Option<Value>,
}

enum CustomerRef {
    Missing,
    Id(i64),
    // Não é inteiro: tratado como cliente inexistente
    Invalid(String),
}

fn parse_customer_ref(value: Option<&Value>) -> CustomerRef {
    match value {
        None | Some(Value::Null) => CustomerRef::Missing,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(id) => CustomerRef::Id(id),
            None => CustomerRef::Invalid(n.to_string()),
        },
        Some(Value::String(s)) if s.trim().is_empty() => CustomerRef::Missing,
        Some(Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(id) => CustomerRef::Id(id),
            Err(_) => CustomerRef::Invalid(s.trim().to_string()),
        },
        Some(other) => CustomerRef::Invalid(other.to_string()),
    }
}

// POST /api/customers/sync
#[utoipa::path(
    post,
    path = "/api/customers/sync",
    tag = "Customers",
    request_body = SyncCustomerPayload,
    responses(
        (status = 200, description = "Sincronizado (ou simulado)", body = SyncOutcome),
        (status = 400, description = "customerId ausente"),
        (status = 404, description = "Cliente não encontrado"),
        (status = 502, description = "Verifactu falhou; o corpo traz o cliente com status error", body = SyncOutcome)
    )
)]
pub async fn sync_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<SyncCustomerPayload>,
) -> Result<Response, ApiError> {
    let customer_id = match parse_customer_ref(payload.customer_id.as_ref()) {
        CustomerRef::Id(id) => id,
        CustomerRef::Missing => {
            return Err(AppError::InvalidInput("customer_id_required".to_string())
                .to_api_error(&locale, &app_state.i18n_store));
        }
        CustomerRef::Invalid(raw) => {
            return Err(AppError::NotFound(format!("Cliente {}", raw)).to_api_error(&locale, &app_state.i18n_store));
        }
    };

    let outcome = app_state
        .sync_service
        .sync_one(customer_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(outcome)).into_response())
}

// PUT /api/customers/sync
#[utoipa::path(
    put,
    path = "/api/customers/sync",
    tag = "Customers",
    responses(
        (status = 200, description = "Resultado por cliente + resumo", body = BulkSyncReport)
    )
)]
pub async fn sync_pending_customers(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .sync_service
        .sync_all_pending()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(report))
}
