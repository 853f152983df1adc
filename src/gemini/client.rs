/**
 * ============================================================================
 * GEMINI API CLIENT MODULE
 * ============================================================================
 *
 * PURPOSE: HTTP client for Google Gemini image generation and transcription
 *
 * API ENDPOINT:
 * POST https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent
 *
 * REQUEST FLOW:
 * 1. Convert GenerationRequest parts to the wire format
 * 2. POST JSON with the API key as query parameter
 * 3. Classify non-success statuses
 * 4. Decode the body into GenerateContentResponse
 *
 * The client performs exactly one round trip per call. Ordering and rate
 * limiting belong to the dispatcher.
 *
 * ============================================================================
 */

use crate::gemini::types::{
    GeminiConfig, GeminiError, GenerateContentResponse, GenerationRequest, InlineData, RequestPart,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

// =============================================================================
// Backend Contract
// =============================================================================

/**
 * Generation collaborator
 * One call = one network round trip, no retries
 */
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_content(
        &self,
        api_key: &str,
        request: GenerationRequest,
    ) -> Result<GenerateContentResponse, GeminiError>;
}

// =============================================================================
// API Request Structures
// =============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    contents: Vec<WireContent>,
}

#[derive(Debug, Serialize)]
struct WireContent {
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl From<RequestPart> for WirePart {
    fn from(part: RequestPart) -> Self {
        match part {
            RequestPart::Text(text) => WirePart::Text { text },
            RequestPart::InlineData { mime_type, data } => WirePart::InlineData {
                inline_data: InlineData { mime_type, data },
            },
        }
    }
}

fn to_wire(request: GenerationRequest) -> WireRequest {
    WireRequest {
        contents: vec![WireContent {
            parts: request.parts.into_iter().map(WirePart::from).collect(),
        }],
    }
}

// =============================================================================
// Client
// =============================================================================

pub struct GeminiClient {
    http: Client,
    api_base: String,
}

impl GeminiClient {
    /**
     * Build a client from configuration
     * Fails only if the TLS backend cannot be initialized
     */
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| GeminiError::Transport {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model_id: &str, api_key: &str) -> String {
        format!("{}/{}:generateContent?key={}", self.api_base, model_id, api_key)
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate_content(
        &self,
        api_key: &str,
        request: GenerationRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let model_id = request.model_id.clone();
        let url = self.endpoint(&model_id, api_key);

        log::info!(
            "[GEMINI] Sending request (model: {}, inline payloads: {})",
            model_id,
            request.inline_count()
        );

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&to_wire(request))
            .send()
            .await
            .map_err(|e| GeminiError::Transport {
                message: format!("Gemini API request failed: {}", e.without_url()),
            })?;

        let status = response.status();
        log::info!("[GEMINI] Response status: {}", status);

        let body = response.text().await.map_err(|e| GeminiError::Transport {
            message: format!("Failed to read response: {}", e.without_url()),
        })?;

        log::debug!("[GEMINI] Raw response length: {} bytes", body.len());

        if !status.is_success() {
            let message = api_error_message(&body)
                .unwrap_or_else(|| format!("Request failed with status {}", status));
            log::warn!("[GEMINI] API error ({}): {}", status.as_u16(), message);
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parse_response(&body)
    }
}

// =============================================================================
// Internal Functions
// =============================================================================

/**
 * Extract the API's own error message from an error body
 * Returns None when the body is not the documented error shape
 */
fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<GenerateContentResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map(|e| e.message)
        .filter(|m| !m.trim().is_empty())
}

fn parse_response(body: &str) -> Result<GenerateContentResponse, GeminiError> {
    serde_json::from_str(body).map_err(|e| {
        log::error!("[GEMINI] Failed to parse response: {}", e);
        GeminiError::InvalidResponse {
            message: format!("Failed to parse Gemini response: {}", e),
        }
    })
}

// =============================================================================
// Tests
// =============================================================================
