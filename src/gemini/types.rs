/**
 * ============================================================================
 * GEMINI TYPES MODULE
 * ============================================================================
 *
 * PURPOSE: Data structures for Gemini image generation and transcription
 *
 * TYPES:
 * - GeminiError: Classified failures surfaced by the dispatcher
 * - GenerationRequest / RequestPart: Model id plus prompt and inline payloads
 * - GenerateContentResponse: Decoded generateContent response
 * - GeneratedArtifact: Image returned by a settled generate/edit/fuse call
 * - QueueStats / DispatcherStatus: Dispatcher bookkeeping for the UI
 * - GeminiConfig: Configuration for the Gemini integration
 *
 * ============================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message used when a failure carries no description of its own
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";

/// Message used when the API key is missing
pub const MISSING_API_KEY_MESSAGE: &str = "API key is required";

// =============================================================================
// Error Types
// =============================================================================

/**
 * Gemini error types
 * Every variant renders as a single human-readable message for the UI
 */
#[derive(Debug, Clone, PartialEq)]
pub enum GeminiError {
    /// No API key configured - raised before anything is queued
    MissingApiKey,

    /// Network failure talking to the API
    Transport { message: String },

    /// API answered with a non-success status
    Api { status: u16, message: String },

    /// Body could not be decoded
    InvalidResponse { message: String },

    /// Response decoded but carried no usable payload
    NoData { message: String },

    /// Failure without a description
    Unknown,
}

impl std::fmt::Display for GeminiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeminiError::MissingApiKey => write!(f, "{}", MISSING_API_KEY_MESSAGE),
            GeminiError::Transport { message } => write!(f, "{}", message),
            GeminiError::Api { status, message } => {
                write!(f, "Gemini API error ({}): {}", status, message)
            }
            GeminiError::InvalidResponse { message } => write!(f, "{}", message),
            GeminiError::NoData { message } => write!(f, "{}", message),
            GeminiError::Unknown => write!(f, "{}", UNKNOWN_ERROR_MESSAGE),
        }
    }
}

impl std::error::Error for GeminiError {}

impl GeminiError {
    /**
     * Normalize an error before it is handed back to a caller
     * Errors whose message is blank collapse into `Unknown`
     */
    pub fn normalized(self) -> GeminiError {
        if self.to_string().trim().is_empty() {
            GeminiError::Unknown
        } else {
            self
        }
    }
}

// =============================================================================
// Request Structures
// =============================================================================

/// One piece of request content
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPart {
    Text(String),
    InlineData { mime_type: String, data: String },
}

/**
 * Single generateContent request
 * Built by the service call shapes, sent by a GenerationBackend
 */
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model_id: String,
    pub parts: Vec<RequestPart>,
}

impl GenerationRequest {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            parts: Vec::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(RequestPart::Text(text.into()));
        self
    }

    pub fn inline_data(mut self, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        self.parts.push(RequestPart::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        });
        self
    }

    /// Number of inline payloads attached to the request
    pub fn inline_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, RequestPart::InlineData { .. }))
            .count()
    }
}

// =============================================================================
// Response Structures
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

/// Error body the API returns next to a non-success status
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub code: Option<i32>,
}

/**
 * Decoded generateContent response
 */
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

impl GenerateContentResponse {
    /// Response with a single candidate holding the given parts
    pub fn from_parts(parts: Vec<ResponsePart>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(CandidateContent { parts }),
            }],
            error: None,
        }
    }

    /// Parts of the first candidate, if there is one with content
    pub fn first_candidate_parts(&self) -> Option<&[ResponsePart]> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
    }

    /**
     * Extract the first inline payload of the first candidate
     *
     * # Arguments
     * * `missing_message` - Message used when the candidate carries no inline data
     */
    pub fn first_inline_data(&self, missing_message: &str) -> Result<String, GeminiError> {
        let parts = self.first_candidate_parts().ok_or_else(|| GeminiError::NoData {
            message: "No response received from API".to_string(),
        })?;

        parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| !d.data.is_empty())
            .map(|d| d.data.clone())
            .ok_or_else(|| GeminiError::NoData {
                message: missing_message.to_string(),
            })
    }

    /// Concatenated text of the first candidate (empty when none)
    pub fn text(&self) -> String {
        self.first_candidate_parts()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// Artifacts
// =============================================================================

/**
 * Image produced by a settled generate/edit/fuse call
 * Owned by the presentation layer once returned
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArtifact {
    pub id: Uuid,

    /// Base64 image bytes as returned by the API
    pub encoded_image: String,

    pub prompt: String,

    pub created_at: DateTime<Utc>,
}

impl GeneratedArtifact {
    pub fn new(encoded_image: String, prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            encoded_image,
            prompt: prompt.into(),
            created_at: Utc::now(),
        }
    }

    /// Download name: `<prefix>-<artifact-id>.png`
    pub fn download_file_name(&self, prefix: &str) -> String {
        format!("{}-{}.png", prefix, self.id)
    }
}

// =============================================================================
// Dispatcher Bookkeeping
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_pending: u64,
    /// Number of times a drain loop was started
    pub drain_starts: u64,
    pub last_error: Option<String>,
}

/// State the UI observes while requests are in flight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherStatus {
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub pending: u64,
}

// =============================================================================
// Configuration
// =============================================================================

/**
 * Configuration for the Gemini integration
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiConfig {
    /// API base URL (model and method are appended)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model used for generate/edit/fuse
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Model used for audio transcription
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    /// Minimum spacing between dispatch starts (milliseconds)
    #[serde(default = "default_min_dispatch_interval_ms")]
    pub min_dispatch_interval_ms: u64,

    /// HTTP request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image-preview".to_string()
}

fn default_transcription_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_min_dispatch_interval_ms() -> u64 {
    3000
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            image_model: default_image_model(),
            transcription_model: default_transcription_model(),
            min_dispatch_interval_ms: default_min_dispatch_interval_ms(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
