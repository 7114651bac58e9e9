// src/models/sync.rs

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::customer::Customer;

/// Resultado de `sync_one`: o que a rota devolve para o frontend.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub simulated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub customer: Customer,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncItem {
    pub customer_id: i64,
    pub customer_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkSyncSummary {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncReport {
    pub success: bool,
    pub message: String,
    pub results: Vec<BulkSyncItem>,
    pub summary: BulkSyncSummary,
}

impl BulkSyncReport {
    pub fn from_results(results: Vec<BulkSyncItem>) -> Self {
        let total = results.len();
        let success = results.iter().filter(|r| r.success).count();
        let summary = BulkSyncSummary {
            total,
            success,
            errors: total - success,
        };
        let message = if total == 0 {
            "No hay clientes pendientes de sincronizar".to_string()
        } else {
            format!(
                "Sincronización completada: {} correctos, {} con error",
                summary.success, summary.errors
            )
        };

        Self {
            // O lote em si sempre "funciona"; falhas ficam por item
            success: true,
            message,
            results,
            summary,
        }
    }
}
