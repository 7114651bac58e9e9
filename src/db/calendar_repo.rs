// src/db/calendar_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::calendar::{CalendarEvent, CalendarEventPatch, NewCalendarEvent},
};

// Substitui o array em memória: os eventos agora sobrevivem a um restart
#[derive(Clone)]
pub struct CalendarRepository {
    pool: PgPool,
}

impl CalendarRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_event<'e, E>(&self, executor: E, event: &NewCalendarEvent) -> Result<CalendarEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, CalendarEvent>(
            r#"
            INSERT INTO calendar_events (
                event_type, title, description, event_date, customer_id, sale_record_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(event.event_type)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.event_date)
        .bind(event.customer_id)
        .bind(event.sale_record_id)
        .fetch_one(executor)
        .await?;

        Ok(created)
    }

    /// `range` = [início, fim). Sem intervalo devolve tudo.
    pub async fn list_events<'e, E>(
        &self,
        executor: E,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<CalendarEvent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (from, to) = match range {
            Some((from, to)) => (Some(from), Some(to)),
            None => (None, None),
        };

        let events = sqlx::query_as::<_, CalendarEvent>(
            r#"
            SELECT * FROM calendar_events
            WHERE ($1::DATE IS NULL OR event_date >= $1)
              AND ($2::DATE IS NULL OR event_date < $2)
            ORDER BY event_date ASC, id ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;

        Ok(events)
    }

    pub async fn update_event<'e, E>(
        &self,
        executor: E,
        id: i64,
        patch: &CalendarEventPatch,
    ) -> Result<Option<CalendarEvent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let updated = sqlx::query_as::<_, CalendarEvent>(
            r#"
            UPDATE calendar_events SET
                event_type = COALESCE($2, event_type),
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                event_date = COALESCE($5, event_date)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.event_type)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.event_date)
        .fetch_optional(executor)
        .await?;

        Ok(updated)
    }

    pub async fn delete_event<'e, E>(&self, executor: E, id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM calendar_events WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
