// src/main.rs

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppConfig, AppState};
use crate::docs::ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG manda; sem ele, info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = AppConfig::from_env()?;
    let app_state = AppState::new(&config).await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if config.verifactu.api_key.is_none() {
        tracing::warn!("VERIFACTU_API_KEY ausente: integração fiscal em modo simulação");
    }

    let listener = TcpListener::bind(&config.server_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app(app_state)).await?;
    Ok(())
}

/// Router completo da API (sem listener), reaproveitado nos testes.
fn app(app_state: AppState) -> Router {
    let customer_routes = Router::new()
        .route(
            "/",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        // Sincronização: POST = um cliente, PUT = todos os pendentes
        .route(
            "/sync",
            post(handlers::customers::sync_customer).put(handlers::customers::sync_pending_customers),
        )
        .route(
            "/{id}",
            get(handlers::customers::get_customer)
                .put(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        );

    let catalog_routes = Router::new()
        .route(
            "/",
            get(handlers::catalog::list_services).post(handlers::catalog::create_service),
        )
        .route(
            "/{id}",
            get(handlers::catalog::get_service)
                .put(handlers::catalog::update_service)
                .delete(handlers::catalog::delete_service),
        );

    let sales_routes = Router::new()
        .route("/", get(handlers::sales::list_sales).post(handlers::sales::create_sale))
        .route(
            "/{id}",
            get(handlers::sales::get_sale)
                .put(handlers::sales::update_sale)
                .delete(handlers::sales::delete_sale),
        )
        .route("/{id}/status", post(handlers::sales::change_status))
        .route("/{id}/pdf", get(handlers::sales::sale_pdf));

    let calendar_routes = Router::new()
        .route(
            "/events",
            get(handlers::calendar::list_events).post(handlers::calendar::create_event),
        )
        .route(
            "/events/{id}",
            axum::routing::put(handlers::calendar::update_event).delete(handlers::calendar::delete_event),
        );

    let verifactu_routes = Router::new()
        .route("/", post(handlers::verifactu::execute_action))
        .route("/status", get(handlers::verifactu::connection_status));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/customers", customer_routes)
        .nest("/api/catalog", catalog_routes)
        .nest("/api/sales", sales_routes)
        .nest("/api/calendar", calendar_routes)
        .nest("/api/verifactu", verifactu_routes)
        .route("/api/dashboard/summary", get(handlers::dashboard::get_summary))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::StatusCode;
    use serde_json::{json, Value};

    use super::*;
    use crate::config::testing::{lazy_pool, test_config};
    use crate::models::customer::SyncStatus;
    use crate::services::sync_service::testing::{customer, FakeTaxClient, InMemoryStore};

    // Sobe o router numa porta efêmera; o pool nunca conecta
    async fn spawn(client: FakeTaxClient, store: Arc<InMemoryStore>) -> String {
        let config = test_config();
        let state = AppState::build(lazy_pool(&config), &config, Arc::new(client), store);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let base = spawn(FakeTaxClient::simulated("EXT-1"), Arc::new(InMemoryStore::default())).await;
        let body = reqwest::get(format!("{}/api/health", base)).await.unwrap().text().await.unwrap();
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn sync_customer_without_id_is_bad_request() {
        let base = spawn(FakeTaxClient::simulated("EXT-1"), Arc::new(InMemoryStore::default())).await;
        let res = reqwest::Client::new()
            .post(format!("{}/api/customers/sync", base))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn sync_unknown_or_non_numeric_customer_is_not_found() {
        let store = Arc::new(InMemoryStore::with(vec![customer(42, None, None)]));
        let base = spawn(FakeTaxClient::simulated("EXT-1"), store.clone()).await;
        let client = reqwest::Client::new();

        for id in [json!(999), json!("abc")] {
            let res = client
                .post(format!("{}/api/customers/sync", base))
                .json(&json!({ "customerId": id }))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn sync_customer_in_simulation_returns_updated_customer() {
        let store = Arc::new(InMemoryStore::with(vec![customer(42, None, None)]));
        let base = spawn(FakeTaxClient::simulated("EXT-1"), store.clone()).await;

        let res = reqwest::Client::new()
            .post(format!("{}/api/customers/sync", base))
            .json(&json!({ "customerId": 42 }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["simulated"], json!(true));
        assert_eq!(body["customer"]["externalId"], json!("EXT-1"));
        assert_eq!(body["customer"]["syncStatus"], json!("simulated"));
        assert_eq!(store.get(42).sync_status, Some(SyncStatus::Simulated));
    }

    #[tokio::test]
    async fn failed_remote_sync_is_bad_gateway_with_customer() {
        let mut failing = customer(7, None, None);
        failing.name = "Rechazado S.L.".into();
        let store = Arc::new(InMemoryStore::with(vec![failing]));
        let base = spawn(FakeTaxClient::live("EXT-9").failing_for("Rechazado S.L."), store.clone()).await;

        let res = reqwest::Client::new()
            .post(format!("{}/api/customers/sync", base))
            .json(&json!({ "customerId": 7 }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["customer"]["syncStatus"], json!("error"));
    }

    #[tokio::test]
    async fn bulk_sync_reports_per_customer_summary() {
        let mut broken = customer(3, None, Some(SyncStatus::Pending));
        broken.name = "Roto".into();
        let store = Arc::new(InMemoryStore::with(vec![
            customer(1, None, None),
            customer(2, None, Some(SyncStatus::Pending)),
            broken,
            customer(4, Some("EXT-4"), Some(SyncStatus::Synced)),
        ]));
        let base = spawn(FakeTaxClient::live("EXT-1").failing_for("Roto"), store.clone()).await;

        let res = reqwest::Client::new()
            .put(format!("{}/api/customers/sync", base))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = res.json().await.unwrap();
        assert_eq!(body["summary"], json!({ "total": 3, "success": 2, "errors": 1 }));
        assert_eq!(body["results"].as_array().unwrap().len(), 3);
        // O já sincronizado não é tocado
        assert_eq!(store.get(4).sync_status, Some(SyncStatus::Synced));
    }

    #[tokio::test]
    async fn unknown_verifactu_action_is_bad_request() {
        let base = spawn(FakeTaxClient::simulated("EXT-1"), Arc::new(InMemoryStore::default())).await;
        let res = reqwest::Client::new()
            .post(format!("{}/api/verifactu", base))
            .header("accept-language", "en")
            .json(&json!({ "action": "format-disk" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], json!("Unknown or malformed Verifactu action."));
    }

    #[tokio::test]
    async fn verifactu_action_with_missing_fields_is_bad_request() {
        let base = spawn(FakeTaxClient::simulated("EXT-1"), Arc::new(InMemoryStore::default())).await;
        let res = reqwest::Client::new()
            .post(format!("{}/api/verifactu", base))
            .json(&json!({ "action": "create-customer", "name": "Sin NIF" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert!(body["details"]["nif"].is_array());
    }

    #[tokio::test]
    async fn calendar_filter_needs_year_and_month_together() {
        let base = spawn(FakeTaxClient::simulated("EXT-1"), Arc::new(InMemoryStore::default())).await;
        let client = reqwest::Client::new();

        for query in ["year=2026", "month=3", "year=2026&month=13"] {
            let res = client
                .get(format!("{}/api/calendar/events?{}", base, query))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "query {}", query);
        }
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let base = spawn(FakeTaxClient::simulated("EXT-1"), Arc::new(InMemoryStore::default())).await;
        let doc: Value = reqwest::get(format!("{}/api-docs/openapi.json", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(doc["paths"]["/api/customers/sync"].is_object());
    }
}
