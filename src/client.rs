//! HTTP client for a running analyzer service
//!
//! Connection failures, timeouts and 5xx responses are retried with
//! exponential backoff. 4xx responses fail immediately.

use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::analyzer::ClassificationResult;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::wallet::WalletRequest;

/// `GET /health` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub indexed_wallets: usize,
    pub classes: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

pub struct AnalyzerClient {
    client: Client,
    base_url: Url,
    max_elapsed: Duration,
}

impl AnalyzerClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid base_url {}: {}", config.base_url, e)))?;
        // Keep any path prefix when joining endpoints
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url,
            max_elapsed: Duration::from_millis(config.max_elapsed_ms),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Submit a wallet for analysis
    pub async fn analyze(&self, request: &WalletRequest) -> Result<ClassificationResult> {
        let url = &self.endpoint("analyze")?;
        self.with_retry("analyze", move || async move {
            let response = self.client.post(url.clone()).json(request).send().await?;
            Self::decode(response).await
        })
        .await
    }

    /// Query service health
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = &self.endpoint("health")?;
        self.with_retry("health", move || async move {
            let response = self.client.get(url.clone()).send().await?;
            Self::decode(response).await
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(1_000),
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let call = &call;
        retry(backoff, move || async move {
            match call().await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!(operation, "Retryable analyzer error: {}", e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => {
                    error!(operation, "Permanent analyzer error: {}", e);
                    Err(backoff::Error::permanent(e))
                }
            }
        })
        .await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "Analyzer response");

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| Error::Deserialization(e.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.detail)
            .unwrap_or(text);
        Err(Error::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{DecisionSource, WalletAnalyzer};
    use crate::api::{self, AppState};
    use crate::config::{DecisionConfig, ServerConfig};
    use crate::model::tests::count_split_bundle;
    use crate::similarity::engine::tests::built_engine;
    use crate::wallet::WalletTransaction;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn spawn_analyzer() -> String {
        let analyzer = WalletAnalyzer::new(count_split_bundle(0.9), built_engine(), DecisionConfig::default());
        let router = api::router(AppState::new(analyzer, None), &ServerConfig::default()).unwrap();
        spawn(router).await
    }

    fn client(base_url: String, max_elapsed_ms: u64) -> AnalyzerClient {
        AnalyzerClient::new(&ClientConfig {
            base_url,
            timeout_ms: 2_000,
            max_elapsed_ms,
        })
        .unwrap()
    }

    fn request(address: &str) -> WalletRequest {
        let txs = (0..5)
            .map(|i| WalletTransaction::new(i * 3600, 0.08, "mint").with_to("0xopensea"))
            .collect();
        WalletRequest::new(address, txs)
    }

    #[test]
    fn test_base_url_keeps_prefix() {
        let client = client("http://analyzer.local/api".into(), 100);
        assert_eq!(client.endpoint("analyze").unwrap().as_str(), "http://analyzer.local/api/analyze");
        assert!(AnalyzerClient::new(&ClientConfig {
            base_url: "::nope".into(),
            timeout_ms: 100,
            max_elapsed_ms: 100,
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_analyze_and_health() {
        let client = client(spawn_analyzer().await, 1_000);

        let health = tokio_test::assert_ok!(client.health().await);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.indexed_wallets, 3);

        let result = client
            .analyze(&request("0xdddd000000000000000000000000000000000004"))
            .await
            .unwrap();
        assert_eq!(result.predicted_class, "regular_user");
        assert_eq!(result.source, DecisionSource::Classifier);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let client = client(spawn_analyzer().await, 1_000);
        let err = tokio_test::assert_err!(client.analyze(&request("0x123")).await);
        match err {
            Error::Remote { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("0x123"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/health",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(StatusCode::SERVICE_UNAVAILABLE)
                    } else {
                        Ok(Json(serde_json::json!({
                            "status": "healthy",
                            "indexed_wallets": 0,
                            "classes": []
                        })))
                    }
                }
            }),
        );

        let client = client(spawn(router).await, 3_000);
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_gives_up() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(format!("http://{}", addr), 200);
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
