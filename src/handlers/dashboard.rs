// src/handlers/dashboard.rs

use axum::{extract::State, response::IntoResponse};

use crate::{
    common::{error::ApiError, response::ApiResponse},
    config::AppState,
    middleware::i18n::Locale,
    models::dashboard::DashboardSummary,
};

// GET /api/dashboard/summary
#[utoipa::path(
    get,
    path = "/api/dashboard/summary",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Clientes por status de sync, vendas por status e faturado no mês", body = DashboardSummary)
    )
)]
pub async fn get_summary(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let summary = app_state
        .dashboard_service
        .get_summary(&app_state.db_pool)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(summary))
}
