// src/common/db_utils.rs

use crate::common::error::AppError;

// ---
// Helpers de mapeamento de erros do Postgres
// ---

/// Converte violação de chave única em `AppError::Conflict(code)`; o resto vira DatabaseError.
pub(crate) fn unique_violation_as(e: sqlx::Error, code: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::Conflict(code.to_string());
        }
    }
    e.into()
}

/// Violação de FK (ex: apagar cliente que ainda tem vendas) vira `Conflict(code)`.
pub(crate) fn foreign_key_violation_as(e: sqlx::Error, code: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_foreign_key_violation() {
            return AppError::Conflict(code.to_string());
        }
    }
    e.into()
}
