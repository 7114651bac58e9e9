// src/models/verifactu.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    common::tax_id::{normalize_tax_id, validate_tax_id},
    models::customer::Customer,
};

/// Resposta normalizada de qualquer chamada ao serviço fiscal (real ou simulado).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaxServiceResult {
    pub success: bool,
    #[serde(default)]
    pub simulated: bool,
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl TaxServiceResult {
    pub fn ok(data: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            simulated: false,
            data,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn simulated(data: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            simulated: true,
            ..Self::ok(data, message)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// `data.id` como string (a API devolve às vezes número, às vezes texto).
    pub fn external_id(&self) -> Option<String> {
        self.data_field("id")
    }

    /// `data.status` (estado do registro na AEAT).
    pub fn remote_status(&self) -> Option<String> {
        self.data_field("status")
    }

    fn data_field(&self, key: &str) -> Option<String> {
        match self.data.as_ref()?.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Cliente como a API da Verifactu espera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaxCustomerData {
    #[schema(example = "B12345674")]
    pub nif: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub country: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<&Customer> for TaxCustomerData {
    fn from(c: &Customer) -> Self {
        Self {
            nif: c.tax_id.clone(),
            name: c.name.clone(),
            address: c.address.clone().unwrap_or_default(),
            city: c.city.clone().unwrap_or_default(),
            postal_code: c.postal_code.clone(),
            province: c.province.clone(),
            country: c.country.clone(),
            email: c.email.clone(),
            phone: c.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaxInvoiceLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaxInvoiceData {
    #[schema(example = "F2026-000007")]
    pub invoice_number: String,
    #[schema(value_type = String, format = Date)]
    pub issue_date: NaiveDate,
    // id do cliente na Verifactu
    pub customer_id: String,
    pub description: String,
    pub lines: Vec<TaxInvoiceLine>,
    pub total_base: Decimal,
    pub total_vat: Decimal,
    pub total: Decimal,
}

// =============================================================================
//  AÇÕES DO PROXY (POST /api/verifactu)
// =============================================================================

/// Corpo `{"action": "...", ...campos}`. Ação desconhecida não desserializa.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TaxAction {
    CreateCustomer(TaxCustomerPayload),
    UpdateCustomer(UpdateTaxCustomerPayload),
    ListCustomers,
    CreateInvoice(CreateInvoicePayload),
    SendToHacienda(InvoiceRefPayload),
    CancelInvoice(CancelInvoicePayload),
    CheckHaciendaStatus(InvoiceRefPayload),
    GetInvoicePdf(InvoiceRefPayload),
    ListInvoices,
}

impl TaxAction {
    pub fn name(&self) -> &'static str {
        match self {
            TaxAction::CreateCustomer(_) => "create-customer",
            TaxAction::UpdateCustomer(_) => "update-customer",
            TaxAction::ListCustomers => "list-customers",
            TaxAction::CreateInvoice(_) => "create-invoice",
            TaxAction::SendToHacienda(_) => "send-to-hacienda",
            TaxAction::CancelInvoice(_) => "cancel-invoice",
            TaxAction::CheckHaciendaStatus(_) => "check-hacienda-status",
            TaxAction::GetInvoicePdf(_) => "get-invoice-pdf",
            TaxAction::ListInvoices => "list-invoices",
        }
    }

    /// Valida os campos exigidos pela ação.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            TaxAction::CreateCustomer(p) => p.validate(),
            // Um único 400 com os erros do id e dos dados do cliente
            TaxAction::UpdateCustomer(p) => match (p.validate(), p.customer.validate()) {
                (Ok(()), Ok(())) => Ok(()),
                (Err(errors), Ok(())) | (Ok(()), Err(errors)) => Err(errors),
                (Err(mut outer), Err(inner)) => {
                    outer.errors_mut().extend(inner.into_errors());
                    Err(outer)
                }
            },
            TaxAction::CreateInvoice(p) => p.validate(),
            TaxAction::SendToHacienda(p) | TaxAction::CheckHaciendaStatus(p) | TaxAction::GetInvoicePdf(p) => {
                p.validate()
            }
            TaxAction::CancelInvoice(p) => p.validate(),
            TaxAction::ListCustomers | TaxAction::ListInvoices => Ok(()),
        }
    }
}

// Campos ausentes viram "" e caem na validação (400), não no parser
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxCustomerPayload {
    #[validate(custom(function = "validate_tax_id"))]
    #[schema(example = "B12345674")]
    pub nif: String,

    #[validate(length(min = 1, message = "required"))]
    pub name: String,

    #[validate(length(min = 1, message = "required"))]
    pub address: String,

    #[validate(length(min = 1, message = "required"))]
    pub city: String,

    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,

    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<&TaxCustomerPayload> for TaxCustomerData {
    fn from(p: &TaxCustomerPayload) -> Self {
        Self {
            nif: normalize_tax_id(&p.nif),
            name: p.name.trim().to_string(),
            address: p.address.trim().to_string(),
            city: p.city.trim().to_string(),
            postal_code: p.postal_code.clone(),
            province: p.province.clone(),
            country: p
                .country
                .as_deref()
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "ES".to_string()),
            email: p.email.clone(),
            phone: p.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateTaxCustomerPayload {
    #[validate(length(min = 1, message = "required"))]
    pub external_id: String,

    #[serde(flatten)]
    pub customer: TaxCustomerPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateInvoicePayload {
    #[validate(required(message = "required"))]
    pub sale_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct InvoiceRefPayload {
    #[validate(length(min = 1, message = "required"))]
    pub invoice_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CancelInvoicePayload {
    #[validate(length(min = 1, message = "required"))]
    pub invoice_id: String,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn external_id_accepts_string_or_number() {
        let r = TaxServiceResult::ok(Some(json!({"id": "EXT-1"})), "ok");
        assert_eq!(r.external_id().as_deref(), Some("EXT-1"));

        let r = TaxServiceResult::ok(Some(json!({"id": 77})), "ok");
        assert_eq!(r.external_id().as_deref(), Some("77"));

        let r = TaxServiceResult::ok(Some(json!({"id": "  "})), "ok");
        assert_eq!(r.external_id(), None);

        assert_eq!(TaxServiceResult::failed("x").external_id(), None);
    }

    #[test]
    fn deserializes_remote_payload_without_simulated_flag() {
        let r: TaxServiceResult =
            serde_json::from_value(json!({"success": true, "data": {"id": "A"}})).unwrap();
        assert!(r.success);
        assert!(!r.simulated);
    }

    fn field_codes(errors: ValidationErrors) -> Vec<String> {
        let mut fields: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
        fields.sort();
        fields
    }

    #[test]
    fn parses_kebab_case_actions() {
        let action: TaxAction = serde_json::from_value(json!({
            "action": "cancel-invoice",
            "invoiceId": "INV-1",
            "reason": "duplicada"
        }))
        .unwrap();
        assert_eq!(action.name(), "cancel-invoice");
        assert!(action.validate().is_ok());

        let action: TaxAction = serde_json::from_value(json!({"action": "list-invoices"})).unwrap();
        assert!(matches!(action, TaxAction::ListInvoices));
    }

    #[test]
    fn unknown_action_is_rejected_by_the_parser() {
        assert!(serde_json::from_value::<TaxAction>(json!({"action": "drop-database"})).is_err());
        assert!(serde_json::from_value::<TaxAction>(json!({"invoiceId": "x"})).is_err());
    }

    #[test]
    fn create_customer_requires_valid_nif_and_address() {
        let action: TaxAction = serde_json::from_value(json!({
            "action": "create-customer",
            "nif": "12345678A",
            "name": "Talleres"
        }))
        .unwrap();

        let errors = action.validate().unwrap_err();
        assert_eq!(field_codes(errors), vec!["address", "city", "nif"]);
    }

    #[test]
    fn update_customer_validates_external_id_and_fields() {
        let action: TaxAction = serde_json::from_value(json!({
            "action": "update-customer",
            "nif": "B12345674",
            "name": "Talleres",
            "address": "Calle 1",
            "city": "Madrid"
        }))
        .unwrap();
        assert_eq!(field_codes(action.validate().unwrap_err()), vec!["external_id"]);

        let action: TaxAction = serde_json::from_value(json!({
            "action": "update-customer",
            "externalId": "EXT-1",
            "nif": "B12345674",
            "name": "",
            "address": "Calle 1",
            "city": "Madrid"
        }))
        .unwrap();
        assert_eq!(field_codes(action.validate().unwrap_err()), vec!["name"]);
    }

    #[test]
    fn update_customer_reports_all_missing_fields_at_once() {
        let action: TaxAction = serde_json::from_value(json!({
            "action": "update-customer",
            "nif": "B12345674",
            "address": "Calle 1",
            "city": "Madrid"
        }))
        .unwrap();
        assert_eq!(field_codes(action.validate().unwrap_err()), vec!["external_id", "name"]);
    }

    #[test]
    fn update_customer_payload_serializes_flat() {
        let payload = UpdateTaxCustomerPayload {
            external_id: "EXT-1".into(),
            customer: TaxCustomerPayload {
                nif: "B12345674".into(),
                name: "Talleres".into(),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["externalId"], json!("EXT-1"));
        assert_eq!(value["nif"], json!("B12345674"));
        assert!(value.get("customer").is_none());
    }

    #[test]
    fn create_invoice_requires_sale_id() {
        let action: TaxAction = serde_json::from_value(json!({"action": "create-invoice"})).unwrap();
        assert_eq!(field_codes(action.validate().unwrap_err()), vec!["sale_id"]);
    }

    #[test]
    fn payload_normalizes_nif_and_country() {
        let payload = TaxCustomerPayload {
            nif: "b-12345674".into(),
            name: " Talleres ".into(),
            address: "Calle 1".into(),
            city: "Madrid".into(),
            ..Default::default()
        };
        let data = TaxCustomerData::from(&payload);
        assert_eq!(data.nif, "B12345674");
        assert_eq!(data.name, "Talleres");
        assert_eq!(data.country, "ES");
    }
}
