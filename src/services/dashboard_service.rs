// src/services/dashboard_service.rs

use sqlx::{Acquire, Postgres};

use crate::{common::error::AppError, db::DashboardRepository, models::dashboard::DashboardSummary};

#[derive(Clone)]
pub struct DashboardService {
    repo: DashboardRepository,
}

impl DashboardService {
    pub fn new(repo: DashboardRepository) -> Self {
        Self { repo }
    }

    pub async fn get_summary<'e, E>(&self, executor: E) -> Result<DashboardSummary, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        self.repo.get_summary(executor).await
    }
}
