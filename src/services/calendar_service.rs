// src/services/calendar_service.rs

use sqlx::{Executor, Postgres};

use crate::{
    common::error::AppError,
    db::CalendarRepository,
    models::calendar::{month_range, CalendarEvent, CalendarEventPatch, NewCalendarEvent},
};

#[derive(Clone)]
pub struct CalendarService {
    repo: CalendarRepository,
}

impl CalendarService {
    pub fn new(repo: CalendarRepository) -> Self {
        Self { repo }
    }

    /// `year` e `month` vêm juntos ou nenhum dos dois.
    pub async fn list_events<'e, E>(
        &self,
        executor: E,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<CalendarEvent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let range = resolve_filter(year, month)?;
        self.repo.list_events(executor, range).await
    }

    pub async fn create_event<'e, E>(&self, executor: E, event: NewCalendarEvent) -> Result<CalendarEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if event.title.trim().is_empty() {
            return Err(AppError::invalid_field("title", "required"));
        }
        self.repo.insert_event(executor, &event).await
    }

    pub async fn update_event<'e, E>(
        &self,
        executor: E,
        id: i64,
        patch: CalendarEventPatch,
    ) -> Result<CalendarEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(AppError::invalid_field("title", "required"));
        }
        self.repo
            .update_event(executor, id, &patch)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Evento {}", id)))
    }

    pub async fn delete_event<'e, E>(&self, executor: E, id: i64) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        match self.repo.delete_event(executor, id).await? {
            0 => Err(AppError::NotFound(format!("Evento {}", id))),
            _ => Ok(()),
        }
    }
}

fn resolve_filter(
    year: Option<i32>,
    month: Option<u32>,
) -> Result<Option<(chrono::NaiveDate, chrono::NaiveDate)>, AppError> {
    match (year, month) {
        (None, None) => Ok(None),
        (Some(year), Some(month)) => month_range(year, month)
            .map(Some)
            .ok_or_else(|| AppError::InvalidInput("invalid_calendar_filter".to_string())),
        _ => Err(AppError::InvalidInput("invalid_calendar_filter".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_requires_year_and_month_together() {
        assert!(matches!(resolve_filter(None, None), Ok(None)));
        assert!(matches!(resolve_filter(Some(2026), None), Err(AppError::InvalidInput(_))));
        assert!(matches!(resolve_filter(None, Some(3)), Err(AppError::InvalidInput(_))));
        assert!(matches!(resolve_filter(Some(2026), Some(13)), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn valid_filter_covers_whole_month() {
        let (from, to) = resolve_filter(Some(2026), Some(2)).unwrap().unwrap();
        assert_eq!(from.to_string(), "2026-02-01");
        assert_eq!(to.to_string(), "2026-03-01");
    }
}
