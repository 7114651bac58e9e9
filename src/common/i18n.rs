// src/common/i18n.rs

use std::{collections::HashMap, sync::Arc};

// (chave, [(idioma, mensagem)])
const MESSAGES: &[(&str, &[(&str, &str)])] = &[
    ("validation_failed", &[
        ("es", "Uno o más campos no son válidos."),
        ("en", "One or more fields are invalid."),
        ("pt", "Um ou mais campos são inválidos."),
    ]),
    ("required", &[
        ("es", "Campo obligatorio."),
        ("en", "This field is required."),
        ("pt", "Campo obrigatório."),
    ]),
    ("invalid_tax_id", &[
        ("es", "NIF/NIE/CIF no válido."),
        ("en", "Invalid Spanish tax identifier."),
        ("pt", "NIF/NIE/CIF inválido."),
    ]),
    ("invalid_email", &[
        ("es", "Correo electrónico no válido."),
        ("en", "Invalid e-mail address."),
        ("pt", "E-mail inválido."),
    ]),
    ("invalid_country_code", &[
        ("es", "El país debe ser un código ISO de 2 letras."),
        ("en", "Country must be a 2-letter ISO code."),
        ("pt", "O país deve ser um código ISO de 2 letras."),
    ]),
    ("invalid_amount", &[
        ("es", "Importe o cantidad no válidos."),
        ("en", "Invalid amount or quantity."),
        ("pt", "Valor ou quantidade inválidos."),
    ]),
    ("not_found", &[
        ("es", "Recurso no encontrado"),
        ("en", "Resource not found"),
        ("pt", "Recurso não encontrado"),
    ]),
    ("customer_id_required", &[
        ("es", "El campo customerId es obligatorio."),
        ("en", "customerId is required."),
        ("pt", "O campo customerId é obrigatório."),
    ]),
    ("customer_has_sales", &[
        ("es", "El cliente tiene preventas o servicios asociados."),
        ("en", "The customer still owns sale records."),
        ("pt", "O cliente ainda possui vendas vinculadas."),
    ]),
    ("tax_id_already_exists", &[
        ("es", "Ya existe un cliente con ese NIF."),
        ("en", "A customer with this tax id already exists."),
        ("pt", "Já existe um cliente com esse NIF."),
    ]),
    ("service_code_already_exists", &[
        ("es", "Ya existe un servicio con ese código."),
        ("en", "A catalog service with this code already exists."),
        ("pt", "Já existe um serviço com esse código."),
    ]),
    ("unknown_service_code", &[
        ("es", "Código de servicio desconocido o inactivo."),
        ("en", "Unknown or inactive service code."),
        ("pt", "Código de serviço desconhecido ou inativo."),
    ]),
    ("invalid_transition", &[
        ("es", "Cambio de estado no permitido."),
        ("en", "Status transition not allowed."),
        ("pt", "Transição de status não permitida."),
    ]),
    ("empty_sale", &[
        ("es", "La operación necesita al menos una línea."),
        ("en", "The record needs at least one line item."),
        ("pt", "A venda precisa de pelo menos um item."),
    ]),
    ("sale_locked", &[
        ("es", "La operación ya está facturada o cancelada."),
        ("en", "The record is already invoiced or cancelled."),
        ("pt", "A venda já está faturada ou cancelada."),
    ]),
    ("invoice_in_progress", &[
        ("es", "La factura de esta operación ya se está emitiendo."),
        ("en", "An invoice for this record is already being issued."),
        ("pt", "A fatura desta venda já está sendo emitida."),
    ]),
    ("invalid_identifier", &[
        ("es", "Identificador no válido."),
        ("en", "Invalid identifier."),
        ("pt", "Identificador inválido."),
    ]),
    ("sale_not_approved", &[
        ("es", "Solo se pueden facturar operaciones aprobadas."),
        ("en", "Only approved records can be invoiced."),
        ("pt", "Somente vendas aprovadas podem ser faturadas."),
    ]),
    ("customer_not_synced", &[
        ("es", "El cliente no está sincronizado con Verifactu."),
        ("en", "The customer is not synchronized with Verifactu."),
        ("pt", "O cliente não está sincronizado com a Verifactu."),
    ]),
    ("invalid_calendar_filter", &[
        ("es", "Indique año y mes juntos (mes 1-12)."),
        ("en", "Provide year and month together (month 1-12)."),
        ("pt", "Informe ano e mês juntos (mês 1-12)."),
    ]),
    ("invalid_action", &[
        ("es", "Acción de Verifactu no reconocida o mal formada."),
        ("en", "Unknown or malformed Verifactu action."),
        ("pt", "Ação Verifactu desconhecida ou malformada."),
    ]),
    ("invalid_body", &[
        ("es", "El cuerpo de la petición no es JSON válido."),
        ("en", "The request body is not valid JSON."),
        ("pt", "O corpo da requisição não é um JSON válido."),
    ]),
    ("remote_service", &[
        ("es", "Error en el servicio Verifactu"),
        ("en", "Verifactu service error"),
        ("pt", "Erro no serviço Verifactu"),
    ]),
    ("internal", &[
        ("es", "Se produjo un error inesperado."),
        ("en", "An unexpected error occurred."),
        ("pt", "Ocorreu um erro inesperado."),
    ]),
];

/// Catálogo de mensagens traduzidas. Barato de clonar (Arc).
#[derive(Clone)]
pub struct I18nStore {
    messages: Arc<HashMap<(&'static str, &'static str), &'static str>>,
}

impl I18nStore {
    pub const DEFAULT_LOCALE: &'static str = "es";

    pub fn translate(&self, locale: &str, key: &str) -> String {
        self.messages
            .get(&(locale_key(locale), key))
            .or_else(|| self.messages.get(&(Self::DEFAULT_LOCALE, key)))
            .map(|m| m.to_string())
            // Sem tradução: devolve o próprio código
            .unwrap_or_else(|| key.to_string())
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        let mut messages = HashMap::new();
        for (key, translations) in MESSAGES {
            for (lang, text) in *translations {
                messages.insert((*lang, *key), *text);
            }
        }
        Self {
            messages: Arc::new(messages),
        }
    }
}

fn locale_key(locale: &str) -> &'static str {
    match locale {
        "en" => "en",
        "pt" => "pt",
        _ => I18nStore::DEFAULT_LOCALE,
    }
}
