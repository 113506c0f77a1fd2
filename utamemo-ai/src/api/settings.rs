//! Settings API endpoint
//!
//! Provides POST /api/settings/llm_api_key for configuring the language
//! model credentials at runtime.

use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Request payload for setting the language model API key
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetApiKeyRequest {
    #[serde(alias = "api_key")]
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/settings/llm_api_key
///
/// **Request:** `{"apiKey": "sk-..."}`
/// **Response:** `{"success": true, "message": "..."}`
///
/// The database copy is authoritative; the TOML copy is best-effort. The
/// running model is not swapped, the key applies from the next start.
pub async fn set_llm_api_key(
    State(state): State<AppState>,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    if !crate::config::is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }

    let api_key = payload.api_key.trim().to_string();

    crate::db::settings::set_llm_api_key(&state.db, api_key.clone())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save API key to database: {}", e)))?;

    info!("LLM API key configured via settings endpoint");

    if let Some(toml_path) = &state.config_path {
        let mut settings = HashMap::new();
        settings.insert("llm_api_key".to_string(), api_key);

        if let Err(e) = crate::config::sync_settings_to_toml(settings, toml_path) {
            warn!("TOML sync failed (database write succeeded): {}", e);
        }
    }

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: "LLM API key saved; it takes effect after restart".to_string(),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings/llm_api_key", post(set_llm_api_key))
}
