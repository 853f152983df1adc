/**
 * ============================================================================
 * LIVE TRANSFORM MODULE
 * ============================================================================
 *
 * PURPOSE: Apply spoken or typed commands to the live camera view
 *
 * FLOW:
 * 1. Capture a still from the streaming camera
 * 2. First command: edit the captured still
 *    Later commands: edit the previous result so effects stack
 * 3. Keep the result as the processed frame overlay
 *
 * Voice commands record a short clip; the transcript arrives as a
 * MediaEvent and is fed back through handle_event().
 *
 * ============================================================================
 */

use crate::gemini::{prompt, GeminiService};
use crate::media::{MediaEvent, MediaSessionManager};

pub const NO_SPEECH_MESSAGE: &str = "No speech detected. Please try speaking louder.";

pub struct LiveTransform {
    service: GeminiService,
    media: MediaSessionManager,
    processed_frame: Option<String>,
    last_command: Option<String>,
}

impl LiveTransform {
    pub fn new(service: GeminiService, media: MediaSessionManager) -> Self {
        Self {
            service,
            media,
            processed_frame: None,
            last_command: None,
        }
    }

    pub fn processed_frame(&self) -> Option<&str> {
        self.processed_frame.as_deref()
    }

    pub fn last_command(&self) -> Option<&str> {
        self.last_command.as_deref()
    }

    /**
     * Transform the camera view with a command
     *
     * # Returns
     * * `Ok(Some(frame))` - New processed frame (base64)
     * * `Ok(None)` - Blank command or camera not streaming, nothing sent
     * * `Err(message)` - Capture or generation failed
     */
    pub async fn process_command(&mut self, command: &str) -> Result<Option<String>, String> {
        let command = command.trim();
        if command.is_empty() || !self.media.is_streaming() {
            return Ok(None);
        }

        self.last_command = Some(command.to_string());

        let captured = self
            .media
            .capture_frame()
            .ok_or_else(|| "Could not capture camera frame".to_string())?;

        let pending = match self.processed_frame.as_deref() {
            Some(previous) => self
                .service
                .edit_image(previous, &prompt::build_live_refine_prompt(command)),
            None => self
                .service
                .edit_image(&captured, &prompt::build_live_transform_prompt(command)),
        }
        .map_err(|e| e.to_string())?;

        let artifact = pending.await.map_err(|e| {
            log::error!("[LIVE] Command '{}' failed: {}", command, e);
            e.to_string()
        })?;

        log::info!("[LIVE] ✓ Applied '{}'", command);
        self.processed_frame = Some(artifact.encoded_image.clone());
        Ok(Some(artifact.encoded_image))
    }

    pub fn clear_effects(&mut self) {
        self.processed_frame = None;
    }

    /// Record a voice clip; the transcript comes back as a MediaEvent
    pub fn start_voice_command(&self) -> Result<(), String> {
        self.media.start_audio_recording().map_err(|e| e.to_string())
    }

    /**
     * React to a media event
     * Transcripts become commands; other events are reported or ignored
     */
    pub async fn handle_event(&mut self, event: MediaEvent) -> Result<Option<String>, String> {
        match event {
            MediaEvent::Transcript(text) => {
                log::info!("[LIVE] Voice command: {}", text);
                self.process_command(&text).await
            }
            MediaEvent::NoSpeechDetected => Err(NO_SPEECH_MESSAGE.to_string()),
            MediaEvent::Error(e) => Err(e.to_string()),
            MediaEvent::RecordingSaved(_) => Ok(None),
        }
    }
}
