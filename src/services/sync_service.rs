// src/services/sync_service.rs
//
// Reconcilia o estado de cada cliente com o serviço fiscal e mantém o
// `sync_status` correto. É o único lugar que escreve os campos de sync.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{error, info, instrument, warn};

use crate::{
    common::error::AppError,
    models::{
        customer::{Customer, SyncStatus},
        sync::{BulkSyncItem, BulkSyncReport, SyncOutcome},
        verifactu::{TaxCustomerData, TaxServiceResult},
    },
    services::tax_client::TaxServiceClient,
};

/// O que o workflow grava no cliente ao fim de cada tentativa.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUpdate {
    pub status: SyncStatus,
    // None = mantém o external_id atual
    pub external_id: Option<String>,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Acesso ao Record Store que o workflow precisa.
#[async_trait]
pub trait CustomerSyncStore: Send + Sync {
    async fn find_customer(&self, id: i64) -> Result<Option<Customer>, AppError>;
    async fn list_pending_customers(&self) -> Result<Vec<Customer>, AppError>;
    async fn record_sync_result(&self, id: i64, update: &SyncUpdate) -> Result<Customer, AppError>;
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub call_timeout: Duration,
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(15),
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncCall {
    Create,
    Update,
}

#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn CustomerSyncStore>,
    client: Arc<dyn TaxServiceClient>,
    options: SyncOptions,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn CustomerSyncStore>,
        client: Arc<dyn TaxServiceClient>,
        options: SyncOptions,
    ) -> Self {
        Self { store, client, options }
    }

    /// Sincroniza um cliente: update se já tem external_id, senão create.
    #[instrument(skip(self))]
    pub async fn sync_one(&self, customer_id: i64) -> Result<SyncOutcome, AppError> {
        let customer = self
            .store
            .find_customer(customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cliente {}", customer_id)))?;

        let call = match customer.linked_external_id() {
            Some(_) => SyncCall::Update,
            None => SyncCall::Create,
        };

        self.run_sync(customer, call).await
    }

    /// Sincroniza todos os pendentes (só create). Falhas ficam isoladas por cliente.
    #[instrument(skip(self))]
    pub async fn sync_all_pending(&self) -> Result<BulkSyncReport, AppError> {
        let pending = self.store.list_pending_customers().await?;
        info!(total = pending.len(), "🔄 Sincronização em lote iniciada");

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, customer) in pending.into_iter().enumerate() {
            let service = self.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let customer_id = customer.id;
                let customer_name = customer.name.clone();

                // O semáforo nunca é fechado, então acquire não falha
                let _permit = semaphore.acquire_owned().await.ok();
                let item = match service.run_sync(customer, SyncCall::Create).await {
                    Ok(outcome) => BulkSyncItem {
                        customer_id,
                        customer_name,
                        success: outcome.success,
                        simulated: Some(outcome.simulated),
                        message: outcome.message,
                        error: outcome.error,
                    },
                    // Falha ao gravar o status: conta como erro deste cliente só
                    Err(e) => BulkSyncItem {
                        customer_id,
                        customer_name,
                        success: false,
                        simulated: None,
                        message: None,
                        error: Some(e.to_string()),
                    },
                };
                (index, item)
            });
        }

        let mut results: Vec<(usize, BulkSyncItem)> = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => error!("🔥 Tarefa de sincronização abortada: {}", e),
            }
        }

        // Mantém a ordem de leitura do banco
        results.sort_by_key(|(index, _)| *index);
        let report = BulkSyncReport::from_results(results.into_iter().map(|(_, item)| item).collect());

        info!(
            total = report.summary.total,
            success = report.summary.success,
            errors = report.summary.errors,
            "✅ Sincronização em lote concluída"
        );
        Ok(report)
    }

    async fn run_sync(&self, customer: Customer, call: SyncCall) -> Result<SyncOutcome, AppError> {
        let payload = TaxCustomerData::from(&customer);

        let remote = match (call, customer.linked_external_id()) {
            (SyncCall::Update, Some(external_id)) => {
                self.with_timeout(self.client.update_customer(external_id, &payload))
                    .await
            }
            _ => self.with_timeout(self.client.create_customer(&payload)).await,
        };

        let update = build_update(remote, Utc::now());
        if update.status == SyncStatus::Error {
            warn!(
                customer_id = customer.id,
                error = update.message.as_deref().unwrap_or_default(),
                "⚠️ Falha ao sincronizar cliente"
            );
        }

        // Escrita única, independente do resultado remoto
        let saved = self.store.record_sync_result(customer.id, &update).await?;

        let success = update.status != SyncStatus::Error;
        Ok(SyncOutcome {
            success,
            simulated: update.status == SyncStatus::Simulated,
            message: success.then(|| update.message.clone()).flatten(),
            error: (!success).then(|| update.message.clone()).flatten(),
            customer: saved,
        })
    }

    async fn with_timeout<F>(&self, call: F) -> Result<TaxServiceResult, String>
    where
        F: std::future::Future<Output = Result<TaxServiceResult, crate::services::tax_client::TaxServiceError>>,
    {
        match tokio::time::timeout(self.options.call_timeout, call).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("timeout".to_string()),
        }
    }
}

/// Resultado remoto → o que gravar. external_id só muda em sucesso.
fn build_update(remote: Result<TaxServiceResult, String>, now: DateTime<Utc>) -> SyncUpdate {
    match remote {
        Ok(result) if result.success => {
            let status = if result.simulated {
                SyncStatus::Simulated
            } else {
                SyncStatus::Synced
            };
            let message = result.message.clone().unwrap_or_else(|| match status {
                SyncStatus::Simulated => "Cliente sincronizado en modo simulación".to_string(),
                _ => "Cliente sincronizado con Verifactu".to_string(),
            });
            SyncUpdate {
                status,
                external_id: result.external_id(),
                message: Some(message),
                timestamp: now,
            }
        }
        Ok(result) => SyncUpdate {
            status: SyncStatus::Error,
            external_id: None,
            message: Some(
                result
                    .error
                    .or(result.message)
                    .unwrap_or_else(|| "Verifactu rechazó la operación".to_string()),
            ),
            timestamp: now,
        },
        Err(error) => SyncUpdate {
            status: SyncStatus::Error,
            external_id: None,
            message: Some(error),
            timestamp: now,
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes em memória para o store e para o cliente fiscal.

    use super::*;
    use crate::models::verifactu::TaxInvoiceData;
    use crate::services::tax_client::TaxServiceError;
    use serde_json::json;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    pub fn customer(id: i64, external_id: Option<&str>, status: Option<SyncStatus>) -> Customer {
        let now = Utc::now();
        Customer {
            id,
            name: format!("Cliente {}", id),
            tax_id: "12345678Z".into(),
            email: None,
            phone: None,
            address: Some("Calle Mayor, 1".into()),
            city: Some("Madrid".into()),
            postal_code: None,
            province: None,
            country: "ES".into(),
            sector: None,
            notes: None,
            external_id: external_id.map(str::to_string),
            sync_status: status,
            sync_message: None,
            sync_timestamp: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[derive(Default)]
    pub struct InMemoryStore {
        pub customers: Mutex<BTreeMap<i64, Customer>>,
        pub writes: Mutex<Vec<(i64, SyncUpdate)>>,
    }

    impl InMemoryStore {
        pub fn with(customers: Vec<Customer>) -> Self {
            let store = Self::default();
            {
                let mut map = store.customers.lock().unwrap();
                for c in customers {
                    map.insert(c.id, c);
                }
            }
            store
        }

        pub fn get(&self, id: i64) -> Customer {
            self.customers.lock().unwrap()[&id].clone()
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CustomerSyncStore for InMemoryStore {
        async fn find_customer(&self, id: i64) -> Result<Option<Customer>, AppError> {
            Ok(self.customers.lock().unwrap().get(&id).cloned())
        }

        async fn list_pending_customers(&self) -> Result<Vec<Customer>, AppError> {
            Ok(self
                .customers
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.effective_sync_status() == SyncStatus::Pending)
                .cloned()
                .collect())
        }

        async fn record_sync_result(&self, id: i64, update: &SyncUpdate) -> Result<Customer, AppError> {
            self.writes.lock().unwrap().push((id, update.clone()));
            let mut map = self.customers.lock().unwrap();
            let c = map
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Cliente {}", id)))?;
            c.sync_status = Some(update.status);
            if let Some(ext) = &update.external_id {
                c.external_id = Some(ext.clone());
            }
            c.sync_message = update.message.clone();
            c.sync_timestamp = Some(update.timestamp);
            Ok(c.clone())
        }
    }

    /// Cliente fiscal programável: registra as chamadas e falha para NIFs marcados.
    pub struct FakeTaxClient {
        pub simulated: bool,
        pub create_id: String,
        pub failing_names: HashSet<String>,
        pub delay: Option<Duration>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeTaxClient {
        pub fn simulated(create_id: &str) -> Self {
            Self {
                simulated: true,
                create_id: create_id.to_string(),
                failing_names: HashSet::new(),
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn live(create_id: &str) -> Self {
            Self {
                simulated: false,
                ..Self::simulated(create_id)
            }
        }

        pub fn failing_for(mut self, name: &str) -> Self {
            self.failing_names.insert(name.to_string());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn respond(&self, id: &str) -> TaxServiceResult {
            let data = Some(json!({ "id": id }));
            if self.simulated {
                TaxServiceResult::simulated(data, "simulado")
            } else {
                TaxServiceResult::ok(data, "ok")
            }
        }

        async fn pause(&self) {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl TaxServiceClient for FakeTaxClient {
        fn is_simulated(&self) -> bool {
            self.simulated
        }

        async fn create_customer(&self, data: &TaxCustomerData) -> Result<TaxServiceResult, TaxServiceError> {
            self.calls.lock().unwrap().push(format!("create:{}", data.name));
            self.pause().await;
            if self.failing_names.contains(&data.name) {
                return Err(TaxServiceError::Api {
                    status: 500,
                    message: "remote exploded".into(),
                });
            }
            Ok(self.respond(&self.create_id))
        }

        async fn update_customer(
            &self,
            external_id: &str,
            data: &TaxCustomerData,
        ) -> Result<TaxServiceResult, TaxServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update:{}:{}", external_id, data.name));
            self.pause().await;
            if self.failing_names.contains(&data.name) {
                return Ok(TaxServiceResult::failed("NIF rechazado"));
            }
            Ok(self.respond(external_id))
        }

        async fn list_customers(&self) -> Result<TaxServiceResult, TaxServiceError> {
            Ok(self.respond("list"))
        }

        async fn create_invoice(&self, data: &TaxInvoiceData) -> Result<TaxServiceResult, TaxServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create_invoice:{}", data.invoice_number));
            Ok(self.respond("INV-1"))
        }

        async fn send_to_hacienda(&self, invoice_id: &str) -> Result<TaxServiceResult, TaxServiceError> {
            Ok(self.respond(invoice_id))
        }

        async fn cancel_invoice(
            &self,
            invoice_id: &str,
            _reason: Option<&str>,
        ) -> Result<TaxServiceResult, TaxServiceError> {
            self.calls.lock().unwrap().push(format!("cancel:{}", invoice_id));
            Ok(self.respond(invoice_id))
        }

        async fn list_invoices(&self) -> Result<TaxServiceResult, TaxServiceError> {
            Ok(self.respond("list"))
        }

        async fn check_hacienda_status(&self, invoice_id: &str) -> Result<TaxServiceResult, TaxServiceError> {
            Ok(self.respond(invoice_id))
        }

        async fn get_invoice_pdf(&self, _invoice_id: &str) -> Result<Option<Vec<u8>>, TaxServiceError> {
            Ok(None)
        }

        async fn test_connection(&self) -> Result<TaxServiceResult, TaxServiceError> {
            Ok(self.respond("health"))
        }
    }
}
