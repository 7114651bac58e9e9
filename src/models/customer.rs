// src/models/customer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- ENUMS ---

// Mapeia o CREATE TYPE sync_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sync_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,   // Nunca sincronizado
    Synced,    // Confirmado pela Verifactu
    Simulated, // Confirmado em modo simulação (sem credenciais)
    Error,     // Última tentativa falhou
}

// --- CLIENTE ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[schema(example = 42)]
    pub id: i64,

    #[schema(example = "Talleres García S.L.")]
    pub name: String,

    // NIF / NIE / CIF
    #[schema(example = "B12345674")]
    pub tax_id: String,

    #[schema(example = "admin@talleresgarcia.es")]
    pub email: Option<String>,
    pub phone: Option<String>,

    #[schema(example = "Calle Mayor, 1")]
    pub address: Option<String>,
    #[schema(example = "Madrid")]
    pub city: Option<String>,
    #[schema(example = "28013")]
    pub postal_code: Option<String>,
    pub province: Option<String>,
    #[schema(example = "ES")]
    pub country: String,

    #[schema(example = "Automoción")]
    pub sector: Option<String>,
    pub notes: Option<String>,

    // --- Metadados de sincronização (só o SyncService escreve aqui) ---
    #[schema(example = "EXT-1")]
    pub external_id: Option<String>,
    pub sync_status: Option<SyncStatus>,
    pub sync_message: Option<String>,
    pub sync_timestamp: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// O id externo, se existir e não estiver em branco.
    pub fn linked_external_id(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Status "unset" no banco conta como pendente.
    pub fn effective_sync_status(&self) -> SyncStatus {
        self.sync_status.unwrap_or(SyncStatus::Pending)
    }
}

/// Dados de identidade editáveis (criação e atualização completa).
#[derive(Debug, Clone, Default)]
pub struct CustomerInput {
    pub name: String,
    pub tax_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub sector: Option<String>,
    pub notes: Option<String>,
}
