//! In-memory collaborators for unit tests.

use crate::gemini::client::GenerationBackend;
use crate::gemini::types::{GeminiError, GenerateContentResponse, GenerationRequest, InlineData, ResponsePart};
use crate::media::device::{
    ChunkSink, EncoderFactory, HardwareStream, MediaDevices, MediaEncoder, TrackSelection, Transcriber,
};
use crate::media::types::{FacingMode, MediaError, StreamConstraints};
use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

// =============================================================================
// Gemini
// =============================================================================

pub struct FakeBackend {
    response: Result<GenerateContentResponse, GeminiError>,
    requests: Mutex<Vec<GenerationRequest>>,
    keys: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn new(response: Result<GenerateContentResponse, GeminiError>) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn with_image(data: &str) -> Self {
        Self::new(Ok(GenerateContentResponse::from_parts(vec![ResponsePart {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/png".to_string(),
                data: data.to_string(),
            }),
        }])))
    }

    pub fn with_text(text: &str) -> Self {
        Self::new(Ok(GenerateContentResponse::from_parts(vec![ResponsePart {
            text: Some(text.to_string()),
            inline_data: None,
        }])))
    }

    pub fn failing(error: GeminiError) -> Self {
        Self::new(Err(error))
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn generate_content(
        &self,
        api_key: &str,
        request: GenerationRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        self.keys.lock().unwrap().push(api_key.to_string());
        self.requests.lock().unwrap().push(request);
        self.response.clone()
    }
}

// =============================================================================
// Hardware
// =============================================================================

pub struct FakeStream {
    id: String,
    has_audio: bool,
    live: AtomicBool,
}

impl FakeStream {
    pub fn new(has_audio: bool) -> Arc<Self> {
        Arc::new(Self {
            id: format!("fake-{}", Uuid::new_v4()),
            has_audio,
            live: AtomicBool::new(true),
        })
    }
}

impl HardwareStream for FakeStream {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn has_video(&self) -> bool {
        true
    }

    fn has_audio(&self) -> bool {
        self.has_audio
    }

    fn current_frame(&self) -> Option<DynamicImage> {
        if !self.is_live() {
            return None;
        }
        Some(DynamicImage::ImageRgb8(RgbImage::from_pixel(1280, 720, Rgb([30, 90, 160]))))
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum DeviceMode {
    Working,
    NoRearCamera,
    Denied,
    VideoOnly,
    Gated,
    Scripted,
}

pub struct FakeDevices {
    mode: DeviceMode,
    attempts: Mutex<Vec<StreamConstraints>>,
    last: Mutex<Option<Arc<FakeStream>>>,
    requested: Notify,
    gate: Notify,
    // Scripted mode: per-call (held until released, granted)
    script: Vec<(bool, bool)>,
    call_gates: Vec<Notify>,
}

impl FakeDevices {
    fn new(mode: DeviceMode) -> Self {
        Self {
            mode,
            attempts: Mutex::new(Vec::new()),
            last: Mutex::new(None),
            requested: Notify::new(),
            gate: Notify::new(),
            script: Vec::new(),
            call_gates: Vec::new(),
        }
    }

    pub fn working() -> Self {
        Self::new(DeviceMode::Working)
    }

    pub fn without_rear_camera() -> Self {
        Self::new(DeviceMode::NoRearCamera)
    }

    pub fn denied() -> Self {
        Self::new(DeviceMode::Denied)
    }

    pub fn video_only() -> Self {
        Self::new(DeviceMode::VideoOnly)
    }

    /// acquire() blocks until release() is called
    pub fn gated() -> Self {
        Self::new(DeviceMode::Gated)
    }

    /// Call `i` follows `steps[i]`: (held until release_call(i), granted)
    pub fn scripted(steps: &[(bool, bool)]) -> Self {
        Self {
            script: steps.to_vec(),
            call_gates: steps.iter().map(|_| Notify::new()).collect(),
            ..Self::new(DeviceMode::Scripted)
        }
    }

    pub fn release_call(&self, index: usize) {
        self.call_gates[index].notify_one();
    }

    pub fn attempts(&self) -> Vec<StreamConstraints> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn last_stream(&self) -> Option<Arc<FakeStream>> {
        self.last.lock().unwrap().clone()
    }

    pub async fn wait_for_request(&self) {
        self.requested.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<Arc<dyn HardwareStream>, MediaError> {
        let index = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(constraints.clone());
            attempts.len() - 1
        };

        if self.mode == DeviceMode::Scripted {
            let (held, granted) = self.script.get(index).copied().unwrap_or((false, true));
            if held {
                self.requested.notify_one();
                self.call_gates[index].notified().await;
            }
            if !granted {
                return Err(MediaError::PermissionDenied("NotAllowedError".to_string()));
            }
        }

        match self.mode {
            DeviceMode::Denied => return Err(MediaError::PermissionDenied("NotAllowedError".to_string())),
            DeviceMode::NoRearCamera if constraints.facing_mode == Some(FacingMode::Environment) => {
                return Err(MediaError::PermissionDenied("OverconstrainedError".to_string()));
            }
            DeviceMode::Gated => {
                self.requested.notify_one();
                self.gate.notified().await;
            }
            _ => {}
        }

        let stream = FakeStream::new(self.mode != DeviceMode::VideoOnly);
        *self.last.lock().unwrap() = Some(stream.clone());
        Ok(stream)
    }
}

// =============================================================================
// Encoders
// =============================================================================

#[derive(Default)]
struct EncoderProbe {
    sink: Mutex<Option<ChunkSink>>,
    stops_live: AtomicUsize,
    stops_dead: AtomicUsize,
}

pub struct FakeEncoders {
    supported: Vec<String>,
    failing: bool,
    probe: Arc<EncoderProbe>,
}

impl FakeEncoders {
    pub fn supporting(mime_types: &[&str]) -> Self {
        Self {
            supported: mime_types.iter().map(|m| m.to_string()).collect(),
            failing: false,
            probe: Arc::new(EncoderProbe::default()),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::supporting(&[])
        }
    }

    /// Push a fragment through the most recently started encoder
    pub fn emit(&self, bytes: &[u8]) {
        if let Some(sink) = self.probe.sink.lock().unwrap().as_ref() {
            let _ = sink.send(bytes.to_vec());
        }
    }

    pub fn stops_on_live_stream(&self) -> usize {
        self.probe.stops_live.load(Ordering::SeqCst)
    }

    pub fn stops_on_dead_stream(&self) -> usize {
        self.probe.stops_dead.load(Ordering::SeqCst)
    }
}

impl EncoderFactory for FakeEncoders {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    fn create(
        &self,
        stream: Arc<dyn HardwareStream>,
        _tracks: TrackSelection,
        _mime_type: Option<&str>,
    ) -> Result<Box<dyn MediaEncoder>, MediaError> {
        if self.failing {
            return Err(MediaError::EncodingUnsupported("NotSupportedError".to_string()));
        }
        Ok(Box::new(FakeEncoder {
            stream,
            sink: None,
            probe: self.probe.clone(),
        }))
    }
}

struct FakeEncoder {
    stream: Arc<dyn HardwareStream>,
    sink: Option<ChunkSink>,
    probe: Arc<EncoderProbe>,
}

impl MediaEncoder for FakeEncoder {
    fn start(&mut self, sink: ChunkSink) -> Result<(), MediaError> {
        *self.probe.sink.lock().unwrap() = Some(sink.clone());
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        if self.stream.is_live() {
            self.probe.stops_live.fetch_add(1, Ordering::SeqCst);
        } else {
            self.probe.stops_dead.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(sink) = self.sink.take() {
            let _ = sink.send(b"tail".to_vec());
        }
        Ok(())
    }
}

// =============================================================================
// Transcription
// =============================================================================

pub struct FakeTranscriber {
    result: Result<String, String>,
}

impl FakeTranscriber {
    pub fn returning(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _base64_audio: String, _mime_type: String) -> Result<String, String> {
        self.result.clone()
    }
}
