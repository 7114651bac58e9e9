// src/common/error.rs

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::i18n::I18nStore;

// Nosso tipo de erro de domínio. Os serviços só conhecem ele.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Erro de regra de negócio identificado por um código (chave de i18n)
    #[error("Entrada inválida: {0}")]
    InvalidInput(String),

    #[error("Recurso não encontrado: {0}")]
    NotFound(String),

    #[error("Conflito: {0}")]
    Conflict(String),

    // A API fiscal externa falhou (ou devolveu success = false)
    #[error("Falha no serviço fiscal: {0}")]
    RemoteService(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro ao gerar PDF: {0}")]
    Pdf(String),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

/// O erro "pronto para o cliente": status + mensagem já traduzida.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.error,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    /// Erro de validação de um campo, no mesmo formato que o `validator` gera.
    pub fn invalid_field(field: &'static str, code: &'static str) -> Self {
        let mut err = validator::ValidationError::new(code);
        err.message = Some(code.into());
        let mut errors = validator::ValidationErrors::new();
        errors.add(field, err);
        AppError::ValidationError(errors)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RemoteService(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) | AppError::Pdf(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Converte o erro de domínio em resposta HTTP traduzida para o idioma do cliente.
    pub fn to_api_error(&self, locale: &str, i18n: &I18nStore) -> ApiError {
        let status = self.status_code();

        match self {
            AppError::ValidationError(errors) => {
                // Retorna todos os detalhes da validação, campo -> códigos
                let mut details: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| {
                            let code = e
                                .message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string());
                            i18n.translate(locale, &code)
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                ApiError {
                    status,
                    error: i18n.translate(locale, "validation_failed"),
                    details: Some(json!(details)),
                }
            }
            AppError::InvalidInput(code) | AppError::Conflict(code) => {
                ApiError::new(status, i18n.translate(locale, code))
            }
            AppError::NotFound(resource) => ApiError::new(
                status,
                format!("{}: {}", i18n.translate(locale, "not_found"), resource),
            ),
            AppError::RemoteService(message) => ApiError::new(
                status,
                format!("{}: {}", i18n.translate(locale, "remote_service"), message),
            ),
            // Erros internos: loga o detalhe, devolve mensagem genérica
            e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                ApiError::new(status, i18n.translate(locale, "internal"))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(I18nStore::DEFAULT_LOCALE, &I18nStore::default())
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_http_status() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidInput("customer_id_required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Conflict("customer_has_sales".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::RemoteService("boom".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::DatabaseError(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let i18n = I18nStore::default();
        let api = AppError::DatabaseError(sqlx::Error::PoolTimedOut).to_api_error("en", &i18n);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.error.contains("PoolTimedOut"));
    }

    #[test]
    fn invalid_field_is_translated_into_details() {
        let i18n = I18nStore::default();
        let api = AppError::invalid_field("status", "invalid_transition").to_api_error("es", &i18n);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let details = api.details.unwrap();
        assert_eq!(
            details["status"][0].as_str().unwrap(),
            i18n.translate("es", "invalid_transition")
        );
    }

    #[test]
    fn not_found_keeps_resource_name() {
        let i18n = I18nStore::default();
        let api = AppError::NotFound("Cliente 999".into()).to_api_error("es", &i18n);
        assert!(api.error.ends_with("Cliente 999"));
    }
}
