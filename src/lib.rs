/**
 * ============================================================================
 * REALITYFLUX CORE
 * ============================================================================
 *
 * PURPOSE: Rate-limited Gemini image/transcription calls and camera
 * session management for the RealityFlux and PanelFlash front ends
 *
 * MODULES:
 * - config: Persistent configuration
 * - gemini: Client, dispatcher and call shapes
 * - media: Camera, recording and transcription sessions
 * - studio: Image workbench (generate / edit / fuse)
 * - live: Live camera transformations
 * - logging: Log level policy for the host
 *
 * ============================================================================
 */

pub mod config;
pub mod gemini;
pub mod live;
pub mod logging;
pub mod media;
pub mod studio;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::FluxConfig;
use crate::gemini::{Dispatcher, GeminiClient, GeminiService};
use crate::media::{EncoderFactory, MediaDevices, MediaSessionManager, Transcriber};
use std::sync::Arc;
use std::time::Duration;

/**
 * Everything a front end needs, wired from one configuration
 *
 * The dispatcher is created once here and shared by every caller; the
 * media manager transcribes voice clips through the same service.
 */
#[derive(Clone)]
pub struct FluxRuntime {
    pub service: GeminiService,
    pub media: MediaSessionManager,
    pub config: FluxConfig,
}

impl FluxRuntime {
    /**
     * Wire the runtime with the HTTP Gemini client
     *
     * # Arguments
     * * `config` - Validated configuration
     * * `api_key` - Gemini API key (may be empty; calls then fail fast)
     * * `devices` / `encoders` - Platform capture backends
     */
    pub fn new(
        config: FluxConfig,
        api_key: impl Into<String>,
        devices: Arc<dyn MediaDevices>,
        encoders: Arc<dyn EncoderFactory>,
    ) -> Result<Self, String> {
        config.validate()?;
        let client = GeminiClient::new(&config.gemini).map_err(|e| e.to_string())?;
        Ok(Self::with_backend(config, api_key, Arc::new(client), devices, encoders))
    }

    pub fn with_backend(
        config: FluxConfig,
        api_key: impl Into<String>,
        backend: Arc<dyn gemini::GenerationBackend>,
        devices: Arc<dyn MediaDevices>,
        encoders: Arc<dyn EncoderFactory>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Duration::from_millis(config.gemini.min_dispatch_interval_ms));
        let service = GeminiService::new(backend, dispatcher, &config.gemini, api_key);

        let transcriber: Arc<dyn Transcriber> = Arc::new(service.clone());
        let media = MediaSessionManager::new(config.media.clone(), devices, encoders, Some(transcriber));

        log::info!(
            "[RUNTIME] Initialized (min dispatch interval {}ms)",
            config.gemini.min_dispatch_interval_ms
        );

        Self { service, media, config }
    }

    /// Load config from disk and take the API key from the environment
    pub fn from_environment(
        devices: Arc<dyn MediaDevices>,
        encoders: Arc<dyn EncoderFactory>,
    ) -> Result<Self, String> {
        let config = config::load_config()?;
        Self::new(config, config::get_api_key(), devices, encoders)
    }

    pub fn studio(&self) -> studio::Studio {
        studio::Studio::new(self.service.clone(), self.config.media.artifact_prefix.clone())
    }

    pub fn live(&self) -> live::LiveTransform {
        live::LiveTransform::new(self.service.clone(), self.media.clone())
    }

    /// Release hardware; queued Gemini calls still settle
    pub fn shutdown(&self) {
        self.media.shutdown();
    }
}
