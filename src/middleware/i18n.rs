// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::common::i18n::I18nStore;

// Extrator de idioma a partir do Accept-Language
pub struct Locale(pub String);

impl std::ops::Deref for Locale {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let lang = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok())
            .and_then(primary_language)
            .unwrap_or_else(|| I18nStore::DEFAULT_LOCALE.to_string());

        Ok(Locale(lang))
    }
}

/// "pt-BR,pt;q=0.9" -> "pt". O fallback para idiomas sem tradução fica no I18nStore.
fn primary_language(header_str: &str) -> Option<String> {
    accept_language::parse(header_str)
        .first()
        .map(|tag| tag.split('-').next().unwrap_or(tag).to_lowercase())
}
