// src/models/calendar.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "calendar_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CalendarEventType {
    InvoiceIssued,
    ContractGenerated,
    CustomerRegistered,
    Custom,
}

// Registro derivado: nunca é a fonte da verdade
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: i64,
    pub event_type: CalendarEventType,
    #[schema(example = "Factura F2026-000007 emitida")]
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String, format = Date, example = "2026-03-01")]
    pub event_date: NaiveDate,
    pub customer_id: Option<i64>,
    pub sale_record_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCalendarEvent {
    pub event_type: CalendarEventType,
    pub title: String,
    pub description: Option<String>,
    pub event_date: NaiveDate,
    pub customer_id: Option<i64>,
    pub sale_record_id: Option<i64>,
}

impl NewCalendarEvent {
    pub fn customer_registered(customer_id: i64, customer_name: &str, at: DateTime<Utc>) -> Self {
        Self {
            event_type: CalendarEventType::CustomerRegistered,
            title: format!("Nuevo cliente: {}", customer_name),
            description: None,
            event_date: at.date_naive(),
            customer_id: Some(customer_id),
            sale_record_id: None,
        }
    }

    pub fn contract_generated(customer_id: i64, sale_id: i64, title: &str, at: DateTime<Utc>) -> Self {
        Self {
            event_type: CalendarEventType::ContractGenerated,
            title: format!("Contrato generado: {}", title),
            description: None,
            event_date: at.date_naive(),
            customer_id: Some(customer_id),
            sale_record_id: Some(sale_id),
        }
    }

    pub fn invoice_issued(customer_id: i64, sale_id: i64, invoice_number: &str, at: DateTime<Utc>) -> Self {
        Self {
            event_type: CalendarEventType::InvoiceIssued,
            title: format!("Factura {} emitida", invoice_number),
            description: None,
            event_date: at.date_naive(),
            customer_id: Some(customer_id),
            sale_record_id: Some(sale_id),
        }
    }
}

/// Atualização parcial (PUT): só os campos presentes mudam.
#[derive(Debug, Clone, Default)]
pub struct CalendarEventPatch {
    pub event_type: Option<CalendarEventType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
}

/// Intervalo [início, fim) de um mês. None se o mês for inválido.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_range_handles_december() {
        let (start, end) = month_range(2026, 12).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }

    #[test]
    fn month_range_rejects_invalid_month() {
        assert!(month_range(2026, 0).is_none());
        assert!(month_range(2026, 13).is_none());
    }

    #[test]
    fn customer_registration_event_points_to_customer_only() {
        let at = Utc::now();
        let event = NewCalendarEvent::customer_registered(42, "Talleres Ruiz", at);
        assert_eq!(event.event_type, CalendarEventType::CustomerRegistered);
        assert_eq!(event.title, "Nuevo cliente: Talleres Ruiz");
        assert_eq!(event.event_date, at.date_naive());
        assert_eq!(event.customer_id, Some(42));
        assert_eq!(event.sale_record_id, None);
    }
}
