//! HTTP API
//!
//! ```text
//! POST /analyze   WalletRequest -> ClassificationResult
//! GET  /health    service status
//! ```
//!
//! Client mistakes map to 400, everything else to 500, both with a
//! `{"detail": "..."}` body.

pub mod handlers;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analyzer::WalletAnalyzer;
use crate::cache::AnalysisCache;
use crate::config::ServerConfig;
use crate::error::{Error, Result};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<WalletAnalyzer>,
    pub cache: Option<Arc<AnalysisCache>>,
}

impl AppState {
    pub fn new(analyzer: WalletAnalyzer, cache: Option<AnalysisCache>) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            cache: cache.map(Arc::new),
        }
    }
}

fn json_error(code: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (code, Json(serde_json::json!({ "detail": message })))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = self.to_string();
        if self.is_client_error() {
            warn!(error = %message, "Rejected request");
            json_error(StatusCode::BAD_REQUEST, &message).into_response()
        } else {
            error!(error = %message, "Request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &message).into_response()
        }
    }
}

/// Tag each request with a fresh id, in the tracing span and the response
async fn request_id(request: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    let span = info_span!("request", request_id = %id);

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o)
                .map_err(|_| Error::Config(format!("invalid CORS origin: {}", o)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Build the application router
pub fn router(state: AppState, config: &ServerConfig) -> Result<Router> {
    let routes = Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/health", get(handlers::health))
        .with_state(state);
    with_layers(routes, config)
}

/// Timeout, CORS, tracing and request ids around the routes
fn with_layers(routes: Router, config: &ServerConfig) -> Result<Router> {
    Ok(routes
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(cors_layer(&config.cors_allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id)))
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let app = router(state, config)?;
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Wallet analyzer listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, DecisionConfig};
    use crate::model::tests::{count_split_bundle, undecided_bundle};
    use crate::model::ModelBundle;
    use crate::similarity::engine::tests::{built_engine, COLLECTOR};
    use axum::body::Body;
    use axum::http;
    use tower::ServiceExt;

    const UNSEEN: &str = "0xdddd000000000000000000000000000000000004";

    fn app(purity: f64) -> (Router, AppState) {
        app_with(count_split_bundle(purity))
    }

    fn app_with(model: ModelBundle) -> (Router, AppState) {
        let analyzer = WalletAnalyzer::new(model, built_engine(), DecisionConfig::default());
        let state = AppState::new(analyzer, Some(AnalysisCache::new(&CacheConfig::default())));
        let router = router(state.clone(), &ServerConfig::default()).unwrap();
        (router, state)
    }

    fn mint_history() -> serde_json::Value {
        let txs: Vec<_> = (0..5)
            .map(|i| {
                serde_json::json!({
                    "timestamp": i * 3600,
                    "value": 0.08,
                    "method": "mint",
                    "to": "0xopensea"
                })
            })
            .collect();
        serde_json::Value::Array(txs)
    }

    fn post_json(uri: &str, body: String) -> Request {
        http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(0.9);
        let response = app
            .oneshot(http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let json = read_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["indexed_wallets"], 3);
        assert_eq!(json["classes"], serde_json::json!(["drop_hunter", "regular_user"]));
    }

    #[tokio::test]
    async fn test_analyze_similarity_fallback() {
        let (app, state) = app_with(undecided_bundle());
        let body = serde_json::json!({ "address": UNSEEN, "transactions": mint_history() });
        let response = app.oneshot(post_json("/analyze", body.to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["predicted_class"], "nft_collector");
        assert_eq!(json["source"], "similarity");
        assert_eq!(json["confidence"], 0.4);
        assert_eq!(json["similar_wallets"][0]["address"], COLLECTOR);
        assert_eq!(state.cache.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_served_from_cache() {
        let (app, state) = app(0.9);
        let body = serde_json::json!({ "address": UNSEEN, "transactions": mint_history() }).to_string();

        let first = app.clone().oneshot(post_json("/analyze", body.clone())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(post_json("/analyze", body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);

        let stats = state.cache.as_ref().unwrap().stats();
        assert_eq!(stats.hits.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_analyze_invalid_address() {
        let (app, _) = app(0.9);
        let body = serde_json::json!({ "address": "0x123", "transactions": mint_history() });
        let response = app.oneshot(post_json("/analyze", body.to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert!(json["detail"].as_str().unwrap().contains("0x123"));
    }

    #[tokio::test]
    async fn test_analyze_empty_history() {
        let (app, _) = app(0.9);
        let body = serde_json::json!({ "address": UNSEEN, "transactions": [] });
        let response = app.oneshot(post_json("/analyze", body.to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_malformed_body() {
        let (app, _) = app(0.9);
        let response = app
            .oneshot(post_json("/analyze", "{\"address\": 42".into()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert!(json["detail"].is_string());
    }

    #[tokio::test]
    async fn test_server_errors_are_500() {
        let response = Error::Index("corrupt".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["detail"], "Index error: corrupt");
    }

    #[tokio::test]
    async fn test_cors_any_origin() {
        let (app, _) = app(0.9);
        let response = app
            .oneshot(
                http::Request::builder()
                    .uri("/health")
                    .header("origin", "http://dashboard.local")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let config = ServerConfig {
            request_timeout_secs: 1,
            ..ServerConfig::default()
        };
        let routes = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "done"
            }),
        );
        let app = with_layers(routes, &config).unwrap();

        let response = app
            .oneshot(http::Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[test]
    fn test_invalid_cors_origin() {
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
        assert!(cors_layer(&["http://localhost:3000".to_string()]).is_ok());
    }
}
