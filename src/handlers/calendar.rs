// src/handlers/calendar.rs

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        response::{created, ApiResponse},
    },
    config::AppState,
    middleware::i18n::Locale,
    models::calendar::{CalendarEvent, CalendarEventPatch, CalendarEventType, NewCalendarEvent},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct CalendarQuery {
    /// Junto com `month`
    pub year: Option<i32>,
    /// 1-12, junto com `year`
    pub month: Option<u32>,
}

fn default_event_type() -> CalendarEventType {
    CalendarEventType::Custom
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventPayload {
    #[serde(default = "default_event_type")]
    pub event_type: CalendarEventType,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Revisión trimestral")]
    pub title: String,

    pub description: Option<String>,

    #[schema(value_type = String, format = Date, example = "2026-03-01")]
    pub event_date: NaiveDate,

    pub customer_id: Option<i64>,
    pub sale_record_id: Option<i64>,
}

impl From<CreateEventPayload> for NewCalendarEvent {
    fn from(p: CreateEventPayload) -> Self {
        Self {
            event_type: p.event_type,
            title: p.title.trim().to_string(),
            description: p.description,
            event_date: p.event_date,
            customer_id: p.customer_id,
            sale_record_id: p.sale_record_id,
        }
    }
}

// PUT parcial: campo ausente = mantém o valor atual
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventPayload {
    pub event_type: Option<CalendarEventType>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub event_date: Option<NaiveDate>,
}

impl From<UpdateEventPayload> for CalendarEventPatch {
    fn from(p: UpdateEventPayload) -> Self {
        Self {
            event_type: p.event_type,
            title: p.title.map(|t| t.trim().to_string()),
            description: p.description,
            event_date: p.event_date,
        }
    }
}

// GET /api/calendar/events
#[utoipa::path(
    get,
    path = "/api/calendar/events",
    tag = "Calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Eventos (do mês, se filtrado)", body = Vec<CalendarEvent>),
        (status = 400, description = "Ano sem mês, mês sem ano ou mês inválido")
    )
)]
pub async fn list_events(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<CalendarQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let events = app_state
        .calendar_service
        .list_events(&app_state.db_pool, query.year, query.month)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(events))
}

// POST /api/calendar/events
#[utoipa::path(
    post,
    path = "/api/calendar/events",
    tag = "Calendar",
    request_body = CreateEventPayload,
    responses(
        (status = 201, description = "Evento criado", body = CalendarEvent),
        (status = 400, description = "Dados inválidos")
    )
)]
pub async fn create_event(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CreateEventPayload>,
) -> Result<Response, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let event = app_state
        .calendar_service
        .create_event(&app_state.db_pool, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(created(event))
}

// PUT /api/calendar/events/{id}
#[utoipa::path(
    put,
    path = "/api/calendar/events/{id}",
    tag = "Calendar",
    request_body = UpdateEventPayload,
    params(("id" = i64, Path, description = "ID do evento")),
    responses(
        (status = 200, description = "Evento atualizado", body = CalendarEvent),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn update_event(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateEventPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let event = app_state
        .calendar_service
        .update_event(&app_state.db_pool, id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(event))
}

// DELETE /api/calendar/events/{id}
#[utoipa::path(
    delete,
    path = "/api/calendar/events/{id}",
    tag = "Calendar",
    params(("id" = i64, Path, description = "ID do evento")),
    responses(
        (status = 200, description = "Evento removido"),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn delete_event(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .calendar_service
        .delete_event(&app_state.db_pool, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(ApiResponse::ok(json!({ "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_payload_defaults_to_custom_event() {
        let payload: CreateEventPayload = serde_json::from_value(json!({
            "title": "  Llamar al gestor ",
            "eventDate": "2026-05-04"
        }))
        .unwrap();
        assert!(payload.validate().is_ok());

        let event: NewCalendarEvent = payload.into();
        assert_eq!(event.event_type, CalendarEventType::Custom);
        assert_eq!(event.title, "Llamar al gestor");
        assert_eq!(event.event_date, NaiveDate::from_ymd_opt(2026, 5, 4).unwrap());
    }

    #[test]
    fn update_payload_keeps_absent_fields_empty() {
        let payload: UpdateEventPayload = serde_json::from_value(json!({ "title": "Nuevo" })).unwrap();
        let patch: CalendarEventPatch = payload.into();
        assert_eq!(patch.title.as_deref(), Some("Nuevo"));
        assert!(patch.event_date.is_none());
        assert!(patch.event_type.is_none());
    }
}
