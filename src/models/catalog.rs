// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogService {
    pub id: i64,

    #[schema(example = "MANT-01")]
    pub code: String,

    #[schema(example = "Mantenimiento mensual")]
    pub name: String,
    pub description: Option<String>,

    #[schema(example = "120.00")]
    pub unit_price: Decimal,

    // IVA em porcentagem
    #[schema(example = "21.00")]
    pub vat_rate: Decimal,

    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CatalogServiceInput {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
    pub active: bool,
}
