// src/handlers/catalog.rs

use axum::{
    extract::{Path, Query, State},
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
    middleware::i18n::Locale,
    models::{
        catalog::{CatalogService, CatalogServiceInput},
        sales::default_vat_rate,
    },
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogServicePayload {
    #[serde(default)]
    #[validate(length(min = 1, max = 32, message = "required"))]
    #[schema(example = "MANT-01")]
    pub code: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Mantenimiento mensual")]
    pub name: String,

    pub description: Option<String>,

    #[schema(example = "120.00")]
    pub unit_price: Decimal,

    // Padrão: 21%
    #[schema(example = "21")]
    pub vat_rate: Option<Decimal>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl From<CatalogServicePayload> for CatalogServiceInput {
    fn from(p: CatalogServicePayload) -> Self {
        Self {
            code: p.code,
            name: p.name,
            description: p.description,
            unit_price: p.unit_price,
            vat_rate: p.vat_rate.unwrap_or_else(default_vat_rate),
            active: p.active,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    /// Só serviços ativos
    #[serde(default)]
    pub only_active: bool,
}

// GET /api/catalog
#[utoipa::path(
    get,
    path = "/api/catalog",
    tag = "Catalog",
    params(CatalogQuery),
    responses((status = 200, description = "Serviços do catálogo", body = Vec<CatalogService>))
)]
pub async fn list_services(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let services = app_state
        .catalog_service
        .list_services(&app_state.db_pool, query.only_active)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(services))
}

// POST /api/catalog
#[utoipa::path(
    post,
    path = "/api/catalog",
    tag = "Catalog",
    request_body = CatalogServicePayload,
    responses(
        (status = 201, description = "Serviço criado", body = CatalogService),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Código já existe")
    )
)]
pub async fn create_service(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CatalogServicePayload>,
) -> Result<Response, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let service = app_state
        .catalog_service
        .create_service(&app_state.db_pool, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(created(service))
}

// GET /api/catalog/{id}
#[utoipa::path(
    get,
    path = "/api/catalog/{id}",
    tag = "Catalog",
    params(("id" = i64, Path, description = "ID do serviço")),
    responses(
        (status = 200, description = "Serviço", body = CatalogService),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn get_service(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let service = app_state
        .catalog_service
        .get_service(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(service))
}

// PUT /api/catalog/{id}
#[utoipa::path(
    put,
    path = "/api/catalog/{id}",
    tag = "Catalog",
    request_body = CatalogServicePayload,
    params(("id" = i64, Path, description = "ID do serviço")),
    responses(
        (status = 200, description = "Serviço atualizado", body = CatalogService),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn update_service(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
    Json(payload): Json<CatalogServicePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let service = app_state
        .catalog_service
        .update_service(&app_state.db_pool, id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(service))
}

// DELETE /api/catalog/{id}
#[utoipa::path(
    delete,
    path = "/api/catalog/{id}",
    tag = "Catalog",
    params(("id" = i64, Path, description = "ID do serviço")),
    responses(
        (status = 200, description = "Serviço removido"),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn delete_service(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .catalog_service
        .delete_service(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(json!({ "id": id })))
}
