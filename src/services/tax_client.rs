// src/services/tax_client.rs
//
// Cliente da API fiscal (Verifactu). Sem credencial configurada, todas as
// chamadas respondem em "modo simulação" para o resto do sistema funcionar.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Method, Url,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    config::VerifactuConfig,
    models::verifactu::{TaxCustomerData, TaxInvoiceData, TaxServiceResult},
};

#[derive(Debug, Error)]
pub enum TaxServiceError {
    /// Falha de transporte (DNS, conexão, timeout do reqwest...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A API respondeu com status != 2xx.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Identificador que não pode virar um segmento de caminho.
    #[error("Invalid identifier: {0:?}")]
    InvalidId(String),
}

/// O conjunto de capacidades do serviço fiscal.
#[async_trait]
pub trait TaxServiceClient: Send + Sync {
    /// true quando não há credencial válida (respostas fabricadas localmente).
    fn is_simulated(&self) -> bool;

    async fn create_customer(&self, data: &TaxCustomerData) -> Result<TaxServiceResult, TaxServiceError>;

    async fn update_customer(
        &self,
        external_id: &str,
        data: &TaxCustomerData,
    ) -> Result<TaxServiceResult, TaxServiceError>;

    async fn list_customers(&self) -> Result<TaxServiceResult, TaxServiceError>;

    async fn create_invoice(&self, data: &TaxInvoiceData) -> Result<TaxServiceResult, TaxServiceError>;

    async fn send_to_hacienda(&self, invoice_id: &str) -> Result<TaxServiceResult, TaxServiceError>;

    async fn cancel_invoice(
        &self,
        invoice_id: &str,
        reason: Option<&str>,
    ) -> Result<TaxServiceResult, TaxServiceError>;

    async fn list_invoices(&self) -> Result<TaxServiceResult, TaxServiceError>;

    async fn check_hacienda_status(&self, invoice_id: &str) -> Result<TaxServiceResult, TaxServiceError>;

    /// Bytes do PDF oficial. `None` em simulação (o PDF é gerado localmente).
    async fn get_invoice_pdf(&self, invoice_id: &str) -> Result<Option<Vec<u8>>, TaxServiceError>;

    async fn test_connection(&self) -> Result<TaxServiceResult, TaxServiceError>;
}

// =============================================================================
//  Implementação HTTP
// =============================================================================

#[derive(Clone)]
pub struct VerifactuClient {
    inner: Arc<VerifactuClientInner>,
}

struct VerifactuClientInner {
    http: reqwest::Client,
    base_url: Url,
    // None = modo simulação
    api_key: Option<String>,
}

impl std::fmt::Debug for VerifactuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifactuClient")
            .field("base_url", &self.inner.base_url)
            .field("api_key", &self.inner.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl VerifactuClient {
    pub fn new(config: &VerifactuConfig) -> Result<Self, TaxServiceError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        let mut headers = HeaderMap::new();
        if let Some(key) = &api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| TaxServiceError::Config(format!("API key inválida: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let base_url = Url::parse(config.api_url.trim())
            .map_err(|e| TaxServiceError::Config(format!("VERIFACTU_API_URL inválida: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TaxServiceError::Config(format!("VERIFACTU_API_URL inválida: {}", base_url)));
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        if api_key.is_none() {
            warn!("⚠️ VERIFACTU_API_KEY ausente: cliente fiscal em modo simulação");
        }

        Ok(Self {
            inner: Arc::new(VerifactuClientInner {
                http,
                base_url,
                api_key,
            }),
        })
    }

    /// URL base + segmentos. Cada id vira um único segmento codificado
    /// (`/`, `?` e `#` não escapam do caminho).
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TaxServiceError> {
        if let Some(bad) = segments.iter().find(|s| matches!(s.trim(), "" | "." | "..")) {
            return Err(TaxServiceError::InvalidId((*bad).to_string()));
        }

        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TaxServiceError::Config(format!("URL base inválida: {}", self.inner.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> Result<TaxServiceResult, TaxServiceError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "verifactu request");

        let mut request = self.inner.http.request(method, url);
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TaxServiceError::Api {
                status: status.as_u16(),
                message: error_message_from_body(&text),
            });
        }

        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| TaxServiceError::Parse(format!("Resposta inválida: {e}")))?
        };

        Ok(normalize_response(body))
    }

    fn simulated_id(prefix: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("SIM-{}-{}", prefix, &id[..12])
    }
}

/// Resposta 2xx → TaxServiceResult. Aceita `{success, data, message, error}`
/// ou o objeto "cru" (tratado como `data`).
fn normalize_response(body: Value) -> TaxServiceResult {
    let success = body.get("success").and_then(Value::as_bool).unwrap_or(true);
    let message = body.get("message").and_then(Value::as_str).map(str::to_string);
    let error = body.get("error").and_then(Value::as_str).map(str::to_string);
    let data = match body.get("data") {
        Some(data) => Some(data.clone()),
        None if body.is_null() => None,
        None => Some(body.clone()),
    };

    if success {
        TaxServiceResult {
            success: true,
            simulated: false,
            data,
            message,
            error: None,
        }
    } else {
        TaxServiceResult {
            data,
            message,
            ..TaxServiceResult::failed(error.unwrap_or_else(|| "Error desconocido de Verifactu".to_string()))
        }
    }
}

fn error_message_from_body(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.chars().take(200).collect())
}

#[async_trait]
impl TaxServiceClient for VerifactuClient {
    fn is_simulated(&self) -> bool {
        self.inner.api_key.is_none()
    }

    #[instrument(skip(self, data), fields(nif = %data.nif))]
    async fn create_customer(&self, data: &TaxCustomerData) -> Result<TaxServiceResult, TaxServiceError> {
        if self.is_simulated() {
            return Ok(TaxServiceResult::simulated(
                Some(json!({ "id": Self::simulated_id("CUS"), "nif": data.nif })),
                "Cliente creado en modo simulación",
            ));
        }
        let body = serde_json::to_value(data).map_err(|e| TaxServiceError::Parse(e.to_string()))?;
        self.call(Method::POST, &["customers"], Some(body)).await
    }

    #[instrument(skip(self, data), fields(external_id = %external_id))]
    async fn update_customer(
        &self,
        external_id: &str,
        data: &TaxCustomerData,
    ) -> Result<TaxServiceResult, TaxServiceError> {
        if self.is_simulated() {
            // Ecoa o mesmo id: repetir a sincronização não muda o vínculo
            return Ok(TaxServiceResult::simulated(
                Some(json!({ "id": external_id, "nif": data.nif })),
                "Cliente actualizado en modo simulación",
            ));
        }
        let body = serde_json::to_value(data).map_err(|e| TaxServiceError::Parse(e.to_string()))?;
        self.call(Method::PUT, &["customers", external_id], Some(body))
            .await
    }

    async fn list_customers(&self) -> Result<TaxServiceResult, TaxServiceError> {
        if self.is_simulated() {
            return Ok(TaxServiceResult::simulated(Some(json!([])), "Listado simulado"));
        }
        self.call(Method::GET, &["customers"], None).await
    }

    #[instrument(skip(self, data), fields(invoice_number = %data.invoice_number))]
    async fn create_invoice(&self, data: &TaxInvoiceData) -> Result<TaxServiceResult, TaxServiceError> {
        if self.is_simulated() {
            return Ok(TaxServiceResult::simulated(
                Some(json!({
                    "id": Self::simulated_id("INV"),
                    "invoiceNumber": data.invoice_number,
                    "status": "registered",
                })),
                "Factura registrada en modo simulación",
            ));
        }
        let body = serde_json::to_value(data).map_err(|e| TaxServiceError::Parse(e.to_string()))?;
        self.call(Method::POST, &["invoices"], Some(body)).await
    }

    async fn send_to_hacienda(&self, invoice_id: &str) -> Result<TaxServiceResult, TaxServiceError> {
        if self.is_simulated() {
            return Ok(TaxServiceResult::simulated(
                Some(json!({ "id": invoice_id, "status": "accepted" })),
                "Envío a Hacienda simulado",
            ));
        }
        self.call(Method::POST, &["invoices", invoice_id, "send"], None)
            .await
    }

    async fn cancel_invoice(
        &self,
        invoice_id: &str,
        reason: Option<&str>,
    ) -> Result<TaxServiceResult, TaxServiceError> {
        if self.is_simulated() {
            return Ok(TaxServiceResult::simulated(
                Some(json!({ "id": invoice_id, "status": "cancelled" })),
                "Anulación simulada",
            ));
        }
        self.call(
            Method::POST,
            &["invoices", invoice_id, "cancel"],
            Some(json!({ "reason": reason })),
        )
        .await
    }

    async fn list_invoices(&self) -> Result<TaxServiceResult, TaxServiceError> {
        if self.is_simulated() {
            return Ok(TaxServiceResult::simulated(Some(json!([])), "Listado simulado"));
        }
        self.call(Method::GET, &["invoices"], None).await
    }

    async fn check_hacienda_status(&self, invoice_id: &str) -> Result<TaxServiceResult, TaxServiceError> {
        if self.is_simulated() {
            return Ok(TaxServiceResult::simulated(
                Some(json!({ "id": invoice_id, "status": "accepted" })),
                "Estado simulado",
            ));
        }
        self.call(Method::GET, &["invoices", invoice_id, "status"], None)
            .await
    }

    async fn get_invoice_pdf(&self, invoice_id: &str) -> Result<Option<Vec<u8>>, TaxServiceError> {
        if self.is_simulated() {
            return Ok(None);
        }
        let url = self.endpoint(&["invoices", invoice_id, "pdf"])?;
        let response = self.inner.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TaxServiceError::Api {
                status: status.as_u16(),
                message: error_message_from_body(&text),
            });
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn test_connection(&self) -> Result<TaxServiceResult, TaxServiceError> {
        if self.is_simulated() {
            return Ok(TaxServiceResult::simulated(
                None,
                "Modo simulación activo: configure VERIFACTU_API_KEY para conectar",
            ));
        }
        let mut result = self.call(Method::GET, &["health"], None).await?;
        if result.message.is_none() {
            result.message = Some("Conexión con Verifactu correcta".to_string());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Request},
        http::StatusCode,
        routing::{get, post, put},
        Json, Router,
    };
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn sample_customer() -> TaxCustomerData {
        TaxCustomerData {
            nif: "B12345674".into(),
            name: "Talleres García S.L.".into(),
            address: "Calle Mayor, 1".into(),
            city: "Madrid".into(),
            postal_code: Some("28013".into()),
            province: None,
            country: "ES".into(),
            email: None,
            phone: None,
        }
    }

    fn config(api_url: &str, api_key: Option<&str>) -> VerifactuConfig {
        VerifactuConfig {
            api_url: api_url.to_string(),
            api_key: api_key.map(str::to_string),
            timeout: Duration::from_secs(5),
        }
    }

    /// Sobe um "Verifactu" falso numa porta efêmera.
    async fn spawn_fake_api() -> String {
        let app = Router::new()
            .route(
                "/customers",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "success": true, "data": { "id": 991, "nif": body["nif"] }, "message": "created" }))
                }),
            )
            .route(
                "/customers/{id}",
                put(|Path(id): Path<String>| async move {
                    if id == "BROKEN" {
                        (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": "NIF rechazado" })))
                    } else {
                        (StatusCode::OK, Json(json!({ "id": id })))
                    }
                }),
            )
            .route("/health", get(|| async { Json(json!({ "success": true })) }));

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn blank_key_means_simulation() {
        let client = VerifactuClient::new(&config("http://unused", Some("   "))).unwrap();
        assert!(client.is_simulated());

        let created = client.create_customer(&sample_customer()).await.unwrap();
        assert!(created.success && created.simulated);
        assert!(created.external_id().unwrap().starts_with("SIM-CUS-"));

        let updated = client.update_customer("EXT-1", &sample_customer()).await.unwrap();
        assert_eq!(updated.external_id().as_deref(), Some("EXT-1"));

        let pdf = client.get_invoice_pdf("SIM-INV-1").await.unwrap();
        assert!(pdf.is_none());

        let conn = client.test_connection().await.unwrap();
        assert!(conn.simulated);
    }

    #[tokio::test]
    async fn real_mode_parses_remote_ids() {
        let base = spawn_fake_api().await;
        let client = VerifactuClient::new(&config(&base, Some("secret"))).unwrap();
        assert!(!client.is_simulated());

        let created = client.create_customer(&sample_customer()).await.unwrap();
        assert!(created.success);
        assert!(!created.simulated);
        assert_eq!(created.external_id().as_deref(), Some("991"));
        assert_eq!(created.message.as_deref(), Some("created"));

        // Objeto "cru" vira data
        let updated = client.update_customer("EXT-9", &sample_customer()).await.unwrap();
        assert_eq!(updated.external_id().as_deref(), Some("EXT-9"));

        let health = client.test_connection().await.unwrap();
        assert!(health.success);
    }

    #[tokio::test]
    async fn non_2xx_becomes_api_error() {
        let base = spawn_fake_api().await;
        let client = VerifactuClient::new(&config(&base, Some("secret"))).unwrap();

        let err = client
            .update_customer("BROKEN", &sample_customer())
            .await
            .unwrap_err();
        match err {
            TaxServiceError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "NIF rechazado");
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[test]
    fn normalize_reads_success_false() {
        let r = normalize_response(json!({ "success": false, "error": "duplicado" }));
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("duplicado"));
    }

    /// Servidor que só anota o caminho bruto de cada requisição.
    async fn spawn_path_recorder() -> (String, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().fallback(move |req: Request| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(req.uri().path().to_string());
                Json(json!({ "success": true }))
            }
        });

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1/", addr), seen)
    }

    #[tokio::test]
    async fn ids_are_encoded_as_single_path_segments() {
        let (base, seen) = spawn_path_recorder().await;
        let client = VerifactuClient::new(&config(&base, Some("secret"))).unwrap();

        client.send_to_hacienda("../customers/EXT-1").await.unwrap();
        client.check_hacienda_status("INV 7?x=1#frag").await.unwrap();
        client.update_customer("EXT-2", &sample_customer()).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "/v1/invoices/..%2Fcustomers%2FEXT-1/send".to_string(),
                "/v1/invoices/INV%207%3Fx=1%23frag/status".to_string(),
                "/v1/customers/EXT-2".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn dot_segments_are_rejected_before_any_request() {
        let (base, seen) = spawn_path_recorder().await;
        let client = VerifactuClient::new(&config(&base, Some("secret"))).unwrap();

        for id in ["..", ".", " "] {
            let err = client.cancel_invoice(id, None).await.unwrap_err();
            assert!(matches!(err, TaxServiceError::InvalidId(_)), "id {:?}", id);
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = VerifactuClient::new(&config("not a url", None)).unwrap_err();
        assert!(matches!(err, TaxServiceError::Config(_)));
    }
}
