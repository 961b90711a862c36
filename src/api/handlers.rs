//! Request handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::debug;

use crate::analyzer::ClassificationResult;
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::wallet::WalletRequest;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub indexed_wallets: usize,
    pub classes: Vec<String>,
}

/// `POST /analyze`
pub async fn analyze(
    State(state): State<AppState>,
    payload: std::result::Result<Json<WalletRequest>, JsonRejection>,
) -> Result<Json<ClassificationResult>> {
    let Json(request) = payload.map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;

    if let Some(cache) = &state.cache {
        if let Some(hit) = cache.get(&request) {
            debug!(address = %request.address, "Analysis cache hit");
            return Ok(Json(hit));
        }
    }

    // Feature extraction and the index scan are CPU-bound
    let analyzer = state.analyzer.clone();
    let (request, result) = tokio::task::spawn_blocking(move || {
        let result = analyzer.analyze(&request);
        (request, result)
    })
    .await
    .map_err(|e| Error::Internal(format!("analysis task failed: {}", e)))?;
    let result = result?;

    if let Some(cache) = &state.cache {
        cache.insert(&request, result.clone());
    }

    Ok(Json(result))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        indexed_wallets: state.analyzer.indexed_wallets(),
        classes: state.analyzer.classes().to_vec(),
    })
}
