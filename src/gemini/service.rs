/**
 * ============================================================================
 * GEMINI SERVICE MODULE
 * ============================================================================
 *
 * PURPOSE: The request shapes that share the dispatcher
 *
 * CALL SHAPES:
 * - generate_image: prompt only
 * - edit_image: prior image + prompt
 * - fuse_images: two images + prompt
 * - transcribe_audio: short audio clip, returns text
 *
 * Every shape validates the API key before enqueuing. A missing key fails
 * synchronously and the request never reaches the queue.
 *
 * ============================================================================
 */

use crate::gemini::client::GenerationBackend;
use crate::gemini::dispatcher::{Dispatched, Dispatcher};
use crate::gemini::prompt;
use crate::gemini::types::{GeminiConfig, GeminiError, GeneratedArtifact, GenerationRequest};
use crate::media::device::Transcriber;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Inline image payloads are sent as PNG
const IMAGE_MIME_TYPE: &str = "image/png";

#[derive(Clone)]
pub struct GeminiService {
    backend: Arc<dyn GenerationBackend>,
    dispatcher: Dispatcher,
    api_key: Arc<RwLock<String>>,
    image_model: String,
    transcription_model: String,
}

impl GeminiService {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        dispatcher: Dispatcher,
        config: &GeminiConfig,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            api_key: Arc::new(RwLock::new(api_key.into())),
            image_model: config.image_model.clone(),
            transcription_model: config.transcription_model.clone(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Replace the API key used by subsequent calls
    pub fn set_api_key(&self, api_key: impl Into<String>) {
        let mut key = self.api_key.write().unwrap_or_else(|e| e.into_inner());
        *key = api_key.into();
    }

    pub fn has_api_key(&self) -> bool {
        !self.current_key().trim().is_empty()
    }

    fn current_key(&self) -> String {
        self.api_key.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn require_key(&self) -> Result<String, GeminiError> {
        let key = self.current_key();
        if key.trim().is_empty() {
            log::warn!("[GEMINI] ⚠ No API key configured, request rejected");
            return Err(GeminiError::MissingApiKey);
        }
        Ok(key)
    }

    // =========================================================================
    // Call Shapes
    // =========================================================================

    pub fn generate_image(&self, prompt_text: &str) -> Result<Dispatched<GeneratedArtifact>, GeminiError> {
        let request = GenerationRequest::new(&self.image_model)
            .text(prompt::build_generate_prompt(prompt_text));

        self.enqueue_image(request, prompt_text, "No image data received from API")
    }

    pub fn edit_image(
        &self,
        base64_image: &str,
        prompt_text: &str,
    ) -> Result<Dispatched<GeneratedArtifact>, GeminiError> {
        let request = GenerationRequest::new(&self.image_model)
            .text(prompt::build_edit_prompt(prompt_text))
            .inline_data(IMAGE_MIME_TYPE, base64_image);

        self.enqueue_image(request, prompt_text, "No edited image data received from API")
    }

    pub fn fuse_images(
        &self,
        first_image: &str,
        second_image: &str,
        prompt_text: &str,
    ) -> Result<Dispatched<GeneratedArtifact>, GeminiError> {
        let request = GenerationRequest::new(&self.image_model)
            .text(prompt::build_fuse_prompt(prompt_text))
            .inline_data(IMAGE_MIME_TYPE, first_image)
            .inline_data(IMAGE_MIME_TYPE, second_image);

        self.enqueue_image(request, prompt_text, "No fused image data received from API")
    }

    /**
     * Transcribe a short audio clip
     * Resolves to the model's text, which may be empty when nothing was said
     */
    pub fn transcribe_audio(&self, base64_audio: &str, mime_type: &str) -> Result<Dispatched<String>, GeminiError> {
        let api_key = self.require_key()?;
        let request = GenerationRequest::new(&self.transcription_model)
            .text(prompt::build_transcription_prompt())
            .inline_data(mime_type, base64_audio);
        let backend = self.backend.clone();

        Ok(self.dispatcher.enqueue(move || async move {
            let response = backend.generate_content(&api_key, request).await?;
            if response.first_candidate_parts().is_none() {
                return Err(GeminiError::NoData {
                    message: "No response received from API".to_string(),
                });
            }
            Ok(response.text().trim().to_string())
        }))
    }

    fn enqueue_image(
        &self,
        request: GenerationRequest,
        prompt_text: &str,
        missing_message: &'static str,
    ) -> Result<Dispatched<GeneratedArtifact>, GeminiError> {
        let api_key = self.require_key()?;
        let backend = self.backend.clone();
        let prompt_text = prompt_text.to_string();

        Ok(self.dispatcher.enqueue(move || async move {
            let response = backend.generate_content(&api_key, request).await?;
            let encoded = response.first_inline_data(missing_message)?;
            Ok(GeneratedArtifact::new(encoded, prompt_text))
        }))
    }
}

#[async_trait]
impl Transcriber for GeminiService {
    async fn transcribe(&self, base64_audio: String, mime_type: String) -> Result<String, String> {
        let pending = self
            .transcribe_audio(&base64_audio, &mime_type)
            .map_err(|e| e.to_string())?;
        pending.await.map_err(|e| e.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
