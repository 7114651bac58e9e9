// src/handlers/verifactu.rs

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::{
    common::{error::ApiError, i18n::I18nStore},
    config::AppState,
    middleware::i18n::Locale,
    models::verifactu::{TaxAction, TaxServiceResult},
    services::verifactu_service::ActionOutcome,
};

/// Converte o corpo cru na ação. Erro de parse = 400 com o motivo em `details`.
fn parse_action(body: Value, locale: &str, i18n: &I18nStore) -> Result<TaxAction, ApiError> {
    serde_json::from_value::<TaxAction>(body).map_err(|e| ApiError {
        status: StatusCode::BAD_REQUEST,
        error: i18n.translate(locale, "invalid_action"),
        details: Some(json!({ "action": e.to_string() })),
    })
}

// POST /api/verifactu
#[utoipa::path(
    post,
    path = "/api/verifactu",
    tag = "Verifactu",
    request_body(
        content = Object,
        description = "`{\"action\": \"create-customer\" | \"update-customer\" | \"list-customers\" | \"create-invoice\" | \"send-to-hacienda\" | \"cancel-invoice\" | \"check-hacienda-status\" | \"get-invoice-pdf\" | \"list-invoices\", ...campos}`"
    ),
    responses(
        (status = 200, description = "Resultado da Verifactu (ou PDF em get-invoice-pdf)", body = TaxServiceResult),
        (status = 400, description = "Ação desconhecida ou campos inválidos"),
        (status = 502, description = "Verifactu indisponível ou recusou a operação")
    )
)]
pub async fn execute_action(
    State(app_state): State<AppState>,
    locale: Locale,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError {
        status: StatusCode::BAD_REQUEST,
        error: app_state.i18n_store.translate(&locale, "invalid_body"),
        details: Some(json!({ "body": e.body_text() })),
    })?;

    let action = parse_action(body, &locale, &app_state.i18n_store)?;

    let outcome = app_state
        .verifactu_service
        .execute(&app_state.db_pool, action)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let response = match outcome {
        ActionOutcome::Json(result) => Json(result).into_response(),
        ActionOutcome::Pdf { filename, bytes } => {
            let headers = [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
            ];
            (headers, bytes).into_response()
        }
    };

    Ok(response)
}

// GET /api/verifactu/status
#[utoipa::path(
    get,
    path = "/api/verifactu/status",
    tag = "Verifactu",
    responses(
        (status = 200, description = "Conectividade com a Verifactu (ou modo simulação)", body = TaxServiceResult),
        (status = 502, description = "Verifactu inacessível")
    )
)]
pub async fn connection_status(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let result = app_state
        .verifactu_service
        .test_connection()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_is_rejected_with_reason() {
        let i18n = I18nStore::default();
        let err = parse_action(json!({ "action": "drop-database" }), "en", &i18n).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.error, "Unknown or malformed Verifactu action.");
        assert!(err.details.unwrap()["action"].as_str().unwrap().contains("drop-database"));
    }

    #[test]
    fn missing_action_tag_is_rejected() {
        let err = parse_action(json!({ "invoiceId": "F-1" }), "es", &I18nStore::default()).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn known_action_parses() {
        let action = parse_action(
            json!({ "action": "send-to-hacienda", "invoiceId": "F-1" }),
            "es",
            &I18nStore::default(),
        )
        .unwrap();
        assert_eq!(action.name(), "send-to-hacienda");
    }
}
