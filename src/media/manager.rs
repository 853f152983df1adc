/**
 * ============================================================================
 * MEDIA SESSION MANAGER MODULE
 * ============================================================================
 *
 * PURPOSE: Owns the camera/microphone stream and the recording sessions
 *
 * RESPONSIBILITIES:
 * - Acquire the combined audio+video stream (rear camera first, then any)
 * - Capture stills from the live stream
 * - Video and audio recording on the same stream, one session per kind
 * - Hard ceilings (30s video / 5s audio) enforced by timer tasks
 * - Teardown: recordings stop before the stream is released
 *
 * STATE MACHINE (camera):
 * Idle -> Starting -> Streaming -> Stopping -> Idle
 * Error is entered on a failed start and falls straight back to Idle
 *
 * No queuing: overlapping start/stop calls race on the shared session and
 * callers gate their controls on MediaStatus.
 *
 * ============================================================================
 */

use crate::media::device::{EncoderFactory, HardwareStream, MediaDevices, Transcriber};
use crate::media::frame::FrameSurface;
use crate::media::recording::{save_recording, RecordedMedia, RecordingSession};
use crate::media::types::*;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};

// =============================================================================
// State
// =============================================================================

struct CameraSession {
    state: CaptureState,
    stream: Option<Arc<dyn HardwareStream>>,
    surface: Option<FrameSurface>,
}

struct Inner {
    config: MediaConfig,
    devices: Arc<dyn MediaDevices>,
    encoders: Arc<dyn EncoderFactory>,
    transcriber: Option<Arc<dyn Transcriber>>,
    camera: Mutex<CameraSession>,
    video: Mutex<Option<RecordingSession>>,
    audio: Mutex<Option<RecordingSession>>,
    // Incremented on every stop; a start that sees a different value lost the race
    camera_generation: AtomicU64,
    // Incremented on every recording start; stale ceiling timers compare against it
    recording_generation: AtomicU64,
    status: watch::Sender<MediaStatus>,
    events_tx: mpsc::UnboundedSender<MediaEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<MediaEvent>>>,
}

/**
 * Handle to the media session manager
 * Clones share the same hardware session
 */
#[derive(Clone)]
pub struct MediaSessionManager {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MediaSessionManager {
    pub fn new(
        config: MediaConfig,
        devices: Arc<dyn MediaDevices>,
        encoders: Arc<dyn EncoderFactory>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Self {
        let (status, _) = watch::channel(MediaStatus::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let surface = FrameSurface::from_config(&config);

        Self {
            inner: Arc::new(Inner {
                config,
                devices,
                encoders,
                transcriber,
                camera: Mutex::new(CameraSession {
                    state: CaptureState::Idle,
                    stream: None,
                    surface: Some(surface),
                }),
                video: Mutex::new(None),
                audio: Mutex::new(None),
                camera_generation: AtomicU64::new(0),
                recording_generation: AtomicU64::new(0),
                status,
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.inner.config
    }

    // =========================================================================
    // Observable State
    // =========================================================================

    pub fn status(&self) -> MediaStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MediaStatus> {
        self.inner.status.subscribe()
    }

    /**
     * Take the event receiver
     * Only one consumer; later calls return None
     */
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<MediaEvent>> {
        lock(&self.inner.events_rx).take()
    }

    pub fn capture_state(&self) -> CaptureState {
        lock(&self.inner.camera).state
    }

    pub fn is_streaming(&self) -> bool {
        self.capture_state() == CaptureState::Streaming
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.inner.video).is_some()
    }

    pub fn is_recording_audio(&self) -> bool {
        lock(&self.inner.audio).is_some()
    }

    fn set_capture_state(&self, state: CaptureState) {
        lock(&self.inner.camera).state = state;
        self.inner.status.send_modify(|s| {
            s.capture_state = state;
            s.is_streaming = state == CaptureState::Streaming;
        });
    }

    fn emit(&self, event: MediaEvent) {
        // No receiver is fine: nobody is listening
        let _ = self.inner.events_tx.send(event);
    }

    // =========================================================================
    // Camera
    // =========================================================================

    /**
     * Acquire the camera + microphone stream
     *
     * Tries the rear camera first, then any camera at the same resolution.
     * On total failure the manager stays Idle.
     */
    pub async fn start_camera(&self) -> Result<(), MediaError> {
        let generation = {
            let mut camera = lock(&self.inner.camera);
            if matches!(camera.state, CaptureState::Starting | CaptureState::Streaming) {
                return Err(MediaError::CameraBusy);
            }
            camera.state = CaptureState::Starting;
            self.inner.camera_generation.load(Ordering::SeqCst)
        };
        self.inner.status.send_modify(|s| s.capture_state = CaptureState::Starting);

        log::info!("[MEDIA] Starting camera");

        let config = &self.inner.config;
        let preferred = StreamConstraints {
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
            facing_mode: Some(FacingMode::Environment),
            audio: true,
        };

        let first_attempt = self.inner.devices.acquire(&preferred).await;
        let acquired = match first_attempt {
            Ok(stream) => Ok(stream),
            Err(e) => {
                log::warn!("[MEDIA] Rear camera unavailable ({}), trying any camera", e);
                let fallback = StreamConstraints {
                    facing_mode: None,
                    ..preferred.clone()
                };
                self.inner.devices.acquire(&fallback).await
            }
        };

        let stream = match acquired {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("[MEDIA] Camera access failed: {}", e);
                // A stop (and maybe a newer start) ran meanwhile; that session owns the state now
                if self.inner.camera_generation.load(Ordering::SeqCst) != generation {
                    return Err(MediaError::Interrupted);
                }
                self.set_capture_state(CaptureState::Error);
                self.set_capture_state(CaptureState::Idle);
                return Err(match e {
                    MediaError::PermissionDenied(_) => e,
                    other => MediaError::PermissionDenied(other.to_string()),
                });
            }
        };

        {
            let mut camera = lock(&self.inner.camera);
            let superseded = self.inner.camera_generation.load(Ordering::SeqCst) != generation
                || camera.state != CaptureState::Starting;
            if superseded {
                drop(camera);
                log::info!("[MEDIA] Camera stopped while starting, releasing stream {}", stream.id());
                stream.stop();
                return Err(MediaError::Interrupted);
            }
            camera.stream = Some(stream.clone());
            camera.state = CaptureState::Streaming;
        }
        self.inner.status.send_modify(|s| {
            s.capture_state = CaptureState::Streaming;
            s.is_streaming = true;
        });

        log::info!("[MEDIA] ✓ Camera streaming ({})", stream.id());
        Ok(())
    }

    /**
     * Stop every track and clear the session
     * Safe to call from any state
     */
    pub fn stop_camera(&self) {
        self.inner.camera_generation.fetch_add(1, Ordering::SeqCst);

        let stream = {
            let mut camera = lock(&self.inner.camera);
            if camera.state == CaptureState::Idle && camera.stream.is_none() {
                return;
            }
            camera.state = CaptureState::Stopping;
            camera.stream.take()
        };
        self.inner.status.send_modify(|s| s.capture_state = CaptureState::Stopping);

        if let Some(stream) = stream {
            log::info!("[MEDIA] Stopping camera stream {}", stream.id());
            stream.stop();
        }

        self.set_capture_state(CaptureState::Idle);
    }

    /// Current stream handle, shared with recording and rendering
    pub fn get_stream(&self) -> Option<Arc<dyn HardwareStream>> {
        lock(&self.inner.camera).stream.clone()
    }

    pub fn attach_surface(&self, surface: FrameSurface) {
        lock(&self.inner.camera).surface = Some(surface);
    }

    pub fn detach_surface(&self) {
        lock(&self.inner.camera).surface = None;
    }

    /**
     * Capture a still from the live stream
     *
     * # Returns
     * * `Some(base64 JPEG)` of the surface raster
     * * `None` without a streaming session, a surface or a frame
     */
    pub fn capture_frame(&self) -> Option<String> {
        let (stream, surface) = {
            let camera = lock(&self.inner.camera);
            if camera.state != CaptureState::Streaming {
                return None;
            }
            (camera.stream.clone()?, camera.surface?)
        };

        let frame = stream.current_frame()?;
        surface.draw(&frame)
    }

    // =========================================================================
    // Recording
    // =========================================================================

    fn slot(&self, kind: RecordingKind) -> &Mutex<Option<RecordingSession>> {
        match kind {
            RecordingKind::Video => &self.inner.video,
            RecordingKind::Audio => &self.inner.audio,
        }
    }

    fn publish_recording(&self, kind: RecordingKind, active: bool) {
        self.inner.status.send_modify(|s| match kind {
            RecordingKind::Video => s.is_recording = active,
            RecordingKind::Audio => s.is_recording_audio = active,
        });
    }

    fn start_session(&self, kind: RecordingKind) -> Result<(), MediaError> {
        let stream = self.get_stream().ok_or(MediaError::NoActiveStream)?;

        let generation = {
            let mut slot = lock(self.slot(kind));
            if slot.is_some() {
                return Err(MediaError::AlreadyRecording(kind));
            }
            let generation = self.inner.recording_generation.fetch_add(1, Ordering::SeqCst) + 1;
            *slot = Some(RecordingSession::start(
                kind,
                stream,
                self.inner.encoders.as_ref(),
                generation,
            )?);
            generation
        };
        self.publish_recording(kind, true);

        // Ceiling: stop this session if it is still the active one
        let manager = self.clone();
        let ceiling = self.inner.config.max_duration(kind);
        tokio::spawn(async move {
            tokio::time::sleep(ceiling).await;
            if manager.stop_generation(kind, Some(generation)) {
                log::info!(
                    "[RECORDING] {} recording reached its {}ms ceiling",
                    kind,
                    ceiling.as_millis()
                );
            }
        });

        Ok(())
    }

    /**
     * Stop the session of `kind`
     * With `generation` set, only a session with that generation is stopped
     */
    fn stop_generation(&self, kind: RecordingKind, generation: Option<u64>) -> bool {
        let session = {
            let mut slot = lock(self.slot(kind));
            let current = slot
                .as_ref()
                .is_some_and(|s| generation.is_none_or(|g| g == s.generation()));
            if current { slot.take() } else { None }
        };

        let Some(session) = session else {
            return false;
        };

        self.publish_recording(kind, false);

        match session.finish() {
            Ok(media) => self.deliver(media),
            Err(e) => {
                log::error!("[RECORDING] {} recording failed: {}", kind, e);
                self.emit(MediaEvent::Error(e));
            }
        }
        true
    }

    fn deliver(&self, media: RecordedMedia) {
        match media.kind {
            RecordingKind::Video => {
                let manager = self.clone();
                let dir = self.inner.config.resolve_output_dir();
                let prefix = self.inner.config.recording_prefix.clone();

                // File writes stay off the async workers
                tokio::spawn(async move {
                    let saved = tokio::task::spawn_blocking(move || save_recording(&dir, &prefix, &media))
                        .await
                        .unwrap_or_else(|e| Err(MediaError::Storage(format!("Save task failed: {}", e))));
                    match saved {
                        Ok(path) => manager.emit(MediaEvent::RecordingSaved(path)),
                        Err(e) => {
                            log::error!("[RECORDING] {}", e);
                            manager.emit(MediaEvent::Error(e));
                        }
                    }
                });
            }
            RecordingKind::Audio => self.transcribe(media),
        }
    }

    /**
     * Hand a finished audio clip to the transcriber
     * Runs as its own task; the outcome arrives as a MediaEvent
     */
    fn transcribe(&self, media: RecordedMedia) {
        let Some(transcriber) = self.inner.transcriber.clone() else {
            log::warn!("[MEDIA] No transcriber configured, audio clip discarded");
            self.emit(MediaEvent::Error(MediaError::Transcription(
                "Voice commands are not available: no transcriber configured".to_string(),
            )));
            return;
        };

        let manager = self.clone();
        let size = media.bytes.len();
        let encoded = BASE64.encode(&media.bytes);
        let mime_type = media.mime_type;
        self.inner.status.send_modify(|s| s.is_transcribing = true);

        tokio::spawn(async move {
            log::info!("[MEDIA] Transcribing {} bytes of {}", size, mime_type);
            let event = match transcriber.transcribe(encoded, mime_type).await {
                Ok(text) if text.trim().is_empty() => {
                    log::info!("[MEDIA] No speech detected");
                    MediaEvent::NoSpeechDetected
                }
                Ok(text) => MediaEvent::Transcript(text.trim().to_string()),
                Err(message) => {
                    log::error!("[MEDIA] Transcription failed: {}", message);
                    let message = if message.trim().is_empty() {
                        "Transcription failed".to_string()
                    } else {
                        message
                    };
                    MediaEvent::Error(MediaError::Transcription(message))
                }
            };
            manager.inner.status.send_modify(|s| s.is_transcribing = false);
            manager.emit(event);
        });
    }

    /// Start a video recording on the current stream
    pub fn start_recording(&self) -> Result<(), MediaError> {
        self.start_session(RecordingKind::Video)
    }

    /// Returns false when nothing was recording
    pub fn stop_recording(&self) -> bool {
        self.stop_generation(RecordingKind::Video, None)
    }

    /// Start a voice clip on the current stream's microphone track
    pub fn start_audio_recording(&self) -> Result<(), MediaError> {
        self.start_session(RecordingKind::Audio)
    }

    pub fn stop_audio_recording(&self) -> bool {
        self.stop_generation(RecordingKind::Audio, None)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /**
     * Release everything
     * Encoders finalize before the stream they read from is stopped
     */
    pub fn shutdown(&self) {
        log::info!("[MEDIA] Shutting down media session");
        self.stop_recording();
        self.stop_audio_recording();
        self.stop_camera();
        log::info!("[MEDIA] Media session shut down");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevices, FakeEncoders, FakeTranscriber};
    use image::GenericImageView;
    use std::path::PathBuf;
    use std::time::Duration;
    use uuid::Uuid;

    fn temp_output_dir() -> PathBuf {
        std::env::temp_dir().join(format!("realityflux-test-{}", Uuid::new_v4()))
    }

    fn manager_with(devices: Arc<FakeDevices>, encoders: Arc<FakeEncoders>, transcript: Option<&str>) -> MediaSessionManager {
        let config = MediaConfig {
            output_dir: Some(temp_output_dir()),
            ..MediaConfig::default()
        };
        let transcriber: Option<Arc<dyn Transcriber>> =
            transcript.map(|t| Arc::new(FakeTranscriber::returning(t)) as Arc<dyn Transcriber>);
        MediaSessionManager::new(config, devices, encoders, transcriber)
    }

    fn default_manager() -> MediaSessionManager {
        manager_with(
            Arc::new(FakeDevices::working()),
            Arc::new(FakeEncoders::supporting(&["video/webm", "audio/wav"])),
            Some(""),
        )
    }

    #[tokio::test]
    async fn test_start_camera_reaches_streaming() {
        let manager = default_manager();
        manager.start_camera().await.unwrap();

        assert_eq!(manager.capture_state(), CaptureState::Streaming);
        assert!(manager.status().is_streaming);
        assert!(manager.get_stream().is_some());
    }

    #[tokio::test]
    async fn test_rear_camera_failure_falls_back() {
        let devices = Arc::new(FakeDevices::without_rear_camera());
        let manager = manager_with(devices.clone(), Arc::new(FakeEncoders::supporting(&[])), None);

        manager.start_camera().await.unwrap();
        assert!(manager.is_streaming());

        let attempts = devices.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].facing_mode, Some(FacingMode::Environment));
        assert_eq!(attempts[1].facing_mode, None);
        assert_eq!((attempts[1].ideal_width, attempts[1].ideal_height), (1280, 720));
        assert!(attempts.iter().all(|c| c.audio));
    }

    #[tokio::test]
    async fn test_denied_camera_stays_idle() {
        let devices = Arc::new(FakeDevices::denied());
        let manager = manager_with(devices.clone(), Arc::new(FakeEncoders::supporting(&[])), None);

        let err = manager.start_camera().await.unwrap_err();
        assert!(matches!(err, MediaError::PermissionDenied(_)));
        assert_eq!(manager.capture_state(), CaptureState::Idle);
        assert!(manager.get_stream().is_none());
        // One fallback, no more
        assert_eq!(devices.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_start_camera_twice_is_busy() {
        let manager = default_manager();
        manager.start_camera().await.unwrap();
        assert_eq!(manager.start_camera().await.unwrap_err(), MediaError::CameraBusy);
    }

    #[tokio::test]
    async fn test_stop_camera_idempotent() {
        let manager = default_manager();
        manager.stop_camera();
        assert_eq!(manager.capture_state(), CaptureState::Idle);

        manager.start_camera().await.unwrap();
        let stream = manager.get_stream().unwrap();
        manager.stop_camera();
        manager.stop_camera();

        assert!(!stream.is_live());
        assert!(manager.get_stream().is_none());
        assert!(!manager.status().is_streaming);
    }

    #[tokio::test]
    async fn test_capture_frame_requires_stream() {
        let manager = default_manager();
        assert!(manager.capture_frame().is_none());

        manager.start_camera().await.unwrap();
        let encoded = manager.capture_frame().unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        let still = image::load_from_memory(&bytes).unwrap();
        assert_eq!(still.dimensions(), (512, 288));

        manager.detach_surface();
        assert!(manager.capture_frame().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_recording_stops_at_ceiling() {
        let manager = default_manager();
        let mut events = manager.take_events().unwrap();
        manager.start_camera().await.unwrap();

        manager.start_recording().unwrap();
        assert!(manager.status().is_recording);

        tokio::time::sleep(Duration::from_millis(29_000)).await;
        assert!(manager.is_recording());

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(!manager.is_recording());
        assert!(!manager.status().is_recording);

        match events.recv().await.unwrap() {
            MediaEvent::RecordingSaved(path) => {
                let name = path.file_name().unwrap().to_string_lossy().to_string();
                assert!(name.starts_with("realityflux-") && name.ends_with(".webm"));
                assert_eq!(std::fs::read(&path).unwrap(), b"tail".to_vec());
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Already stopped by the ceiling
        assert!(!manager.stop_recording());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_recording_twice() {
        let manager = default_manager();
        manager.start_camera().await.unwrap();
        manager.start_recording().unwrap();

        assert!(manager.stop_recording());
        assert!(!manager.stop_recording());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_ceiling_timer_does_not_stop_new_session() {
        let manager = default_manager();
        manager.start_camera().await.unwrap();

        manager.start_recording().unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        manager.stop_recording();
        manager.start_recording().unwrap();

        // First session's timer fires at 30s; the second session runs until 50s
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(manager.is_recording());
    }

    #[tokio::test]
    async fn test_recording_requires_stream() {
        let manager = default_manager();
        assert_eq!(manager.start_recording().unwrap_err(), MediaError::NoActiveStream);
        assert_eq!(manager.start_audio_recording().unwrap_err(), MediaError::NoActiveStream);
        assert!(!manager.stop_audio_recording());
    }

    #[tokio::test]
    async fn test_one_session_per_kind() {
        let manager = default_manager();
        manager.start_camera().await.unwrap();
        manager.start_recording().unwrap();
        manager.start_audio_recording().unwrap();

        assert_eq!(
            manager.start_recording().unwrap_err(),
            MediaError::AlreadyRecording(RecordingKind::Video)
        );
        assert!(manager.status().is_recording && manager.status().is_recording_audio);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_audio_reports_no_speech() {
        let manager = default_manager();
        let mut events = manager.take_events().unwrap();
        manager.start_camera().await.unwrap();

        manager.start_audio_recording().unwrap();
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert!(!manager.is_recording_audio());

        assert_eq!(events.recv().await.unwrap(), MediaEvent::NoSpeechDetected);
        assert!(!manager.status().is_transcribing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_transcript_forwarded() {
        let manager = manager_with(
            Arc::new(FakeDevices::working()),
            Arc::new(FakeEncoders::supporting(&["audio/webm"])),
            Some(" make it rain "),
        );
        let mut events = manager.take_events().unwrap();
        manager.start_camera().await.unwrap();

        manager.start_audio_recording().unwrap();
        assert!(manager.stop_audio_recording());

        assert_eq!(
            events.recv().await.unwrap(),
            MediaEvent::Transcript("make it rain".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transcription_failure_is_distinct_from_no_speech() {
        let transcriber: Arc<dyn Transcriber> = Arc::new(FakeTranscriber::failing("503 overloaded"));
        let manager = MediaSessionManager::new(
            MediaConfig::default(),
            Arc::new(FakeDevices::working()),
            Arc::new(FakeEncoders::supporting(&["audio/wav"])),
            Some(transcriber),
        );
        let mut events = manager.take_events().unwrap();
        manager.start_camera().await.unwrap();
        manager.start_audio_recording().unwrap();
        manager.stop_audio_recording();

        assert_eq!(
            events.recv().await.unwrap(),
            MediaEvent::Error(MediaError::Transcription("503 overloaded".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_without_transcriber_reports_error() {
        let manager = manager_with(
            Arc::new(FakeDevices::working()),
            Arc::new(FakeEncoders::supporting(&["audio/wav"])),
            None,
        );
        let mut events = manager.take_events().unwrap();
        manager.start_camera().await.unwrap();
        manager.start_audio_recording().unwrap();
        assert!(manager.stop_audio_recording());

        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("no event after stopping audio")
            .unwrap();
        assert!(matches!(event, MediaEvent::Error(MediaError::Transcription(_))));
        assert!(!manager.status().is_transcribing);
    }

    #[tokio::test]
    async fn test_manual_stop_saves_video() {
        let encoders = Arc::new(FakeEncoders::supporting(&["video/webm"]));
        let manager = manager_with(Arc::new(FakeDevices::working()), encoders.clone(), None);
        let mut events = manager.take_events().unwrap();
        manager.start_camera().await.unwrap();

        manager.start_recording().unwrap();
        encoders.emit(b"head");
        assert!(manager.stop_recording());

        match events.recv().await.unwrap() {
            MediaEvent::RecordingSaved(path) => {
                assert_eq!(std::fs::read(&path).unwrap(), b"headtail".to_vec());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_stale_start_leaves_newer_start_alone() {
        // Call 0: first start, rear camera (held, then denied)
        // Call 1: second start, rear camera (held, then granted)
        // Call 2: first start, fallback (denied)
        let devices = Arc::new(FakeDevices::scripted(&[(true, false), (true, true), (false, false)]));
        let manager = manager_with(devices.clone(), Arc::new(FakeEncoders::supporting(&[])), None);

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.start_camera().await })
        };
        devices.wait_for_request().await;
        manager.stop_camera();

        let second = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.start_camera().await })
        };
        devices.wait_for_request().await;

        devices.release_call(0);
        assert_eq!(first.await.unwrap().unwrap_err(), MediaError::Interrupted);
        assert_eq!(manager.capture_state(), CaptureState::Starting);

        devices.release_call(1);
        second.await.unwrap().unwrap();
        assert!(manager.is_streaming());
        assert!(manager.get_stream().is_some_and(|s| s.is_live()));
    }

    #[tokio::test]
    async fn test_audio_without_microphone() {
        let manager = manager_with(
            Arc::new(FakeDevices::video_only()),
            Arc::new(FakeEncoders::supporting(&["audio/wav"])),
            None,
        );
        manager.start_camera().await.unwrap();
        assert_eq!(manager.start_audio_recording().unwrap_err(), MediaError::NoAudioTrack);
        assert!(!manager.status().is_recording_audio);
    }

    #[tokio::test]
    async fn test_unsupported_encoder_does_not_start() {
        let manager = manager_with(Arc::new(FakeDevices::working()), Arc::new(FakeEncoders::failing()), None);
        manager.start_camera().await.unwrap();

        let err = manager.start_recording().unwrap_err();
        assert!(matches!(err, MediaError::EncodingUnsupported(_)));
        assert!(!manager.is_recording());
    }

    #[tokio::test]
    async fn test_shutdown_finalizes_encoders_before_stream() {
        let encoders = Arc::new(FakeEncoders::supporting(&["video/webm", "audio/wav"]));
        let manager = manager_with(Arc::new(FakeDevices::working()), encoders.clone(), Some("hi"));
        manager.start_camera().await.unwrap();
        manager.start_recording().unwrap();
        manager.start_audio_recording().unwrap();

        manager.shutdown();

        assert_eq!(encoders.stops_on_live_stream(), 2);
        assert_eq!(encoders.stops_on_dead_stream(), 0);
        assert!(!manager.is_recording() && !manager.is_recording_audio());
        assert_eq!(manager.capture_state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_stop_during_start_releases_stream() {
        let devices = Arc::new(FakeDevices::gated());
        let manager = manager_with(devices.clone(), Arc::new(FakeEncoders::supporting(&[])), None);

        let starting = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.start_camera().await })
        };
        devices.wait_for_request().await;
        assert_eq!(manager.capture_state(), CaptureState::Starting);

        manager.stop_camera();
        devices.release();

        assert_eq!(starting.await.unwrap().unwrap_err(), MediaError::Interrupted);
        assert_eq!(manager.capture_state(), CaptureState::Idle);
        assert!(devices.last_stream().map(|s| !s.is_live()).unwrap_or(false));
    }
}
