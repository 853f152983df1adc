/**
 * ============================================================================
 * MEDIA TYPES MODULE
 * ============================================================================
 *
 * PURPOSE: Data structures for camera capture and recording sessions
 *
 * TYPES:
 * - MediaConfig: Capture/recording configuration
 * - MediaError: Hardware, encoding and transcription failures
 * - CaptureState: Camera lifecycle state
 * - StreamConstraints / FacingMode: Acquisition request
 * - RecordingKind / RecordingFormat: What is recorded and how
 * - MediaStatus / MediaEvent: What the UI observes
 *
 * ============================================================================
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    // Ideal camera resolution requested at acquisition
    #[serde(default = "default_ideal_width")]
    pub ideal_width: u32,
    #[serde(default = "default_ideal_height")]
    pub ideal_height: u32,

    // Raster used by capture_frame
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,

    // JPEG quality for captured frames (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    // Hard ceilings after which recordings stop themselves
    #[serde(default = "default_video_max_ms")]
    pub video_max_duration_ms: u64,
    #[serde(default = "default_audio_max_ms")]
    pub audio_max_duration_ms: u64,

    // File name prefixes: <prefix>-<epoch-millis>.webm / <prefix>-<id>.png
    #[serde(default = "default_recording_prefix")]
    pub recording_prefix: String,
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,

    // Where saved recordings go; the user's download dir when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_ideal_width() -> u32 {
    1280
}

fn default_ideal_height() -> u32 {
    720
}

fn default_frame_width() -> u32 {
    512
}

fn default_frame_height() -> u32 {
    288
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_video_max_ms() -> u64 {
    30_000
}

fn default_audio_max_ms() -> u64 {
    5_000
}

fn default_recording_prefix() -> String {
    "realityflux".to_string()
}

fn default_artifact_prefix() -> String {
    "panelflash".to_string()
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ideal_width: default_ideal_width(),
            ideal_height: default_ideal_height(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            jpeg_quality: default_jpeg_quality(),
            video_max_duration_ms: default_video_max_ms(),
            audio_max_duration_ms: default_audio_max_ms(),
            recording_prefix: default_recording_prefix(),
            artifact_prefix: default_artifact_prefix(),
            output_dir: None,
        }
    }
}

impl MediaConfig {
    pub fn max_duration(&self, kind: RecordingKind) -> Duration {
        match kind {
            RecordingKind::Video => Duration::from_millis(self.video_max_duration_ms),
            RecordingKind::Audio => Duration::from_millis(self.audio_max_duration_ms),
        }
    }

    /**
     * Directory recordings are saved into
     * Falls back to the download dir, then the temp dir
     */
    pub fn resolve_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(std::env::temp_dir)
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MediaError {
    /// Camera/microphone denied or unavailable
    PermissionDenied(String),

    /// start_camera while already starting or streaming
    CameraBusy,

    /// stop_camera ran while acquisition was pending
    Interrupted,

    /// Operation needs a live stream
    NoActiveStream,

    /// Stream has no microphone track
    NoAudioTrack,

    /// Encoder unavailable for the requested format
    EncodingUnsupported(String),

    /// A session of this kind is already running
    AlreadyRecording(RecordingKind),

    /// Encoder reported a failure mid-session
    Recording(String),

    /// Saving a finished recording failed
    Storage(String),

    /// Transcription collaborator failed
    Transcription(String),
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::PermissionDenied(message) => write!(f, "Camera access failed: {}", message),
            MediaError::CameraBusy => write!(f, "Camera is already starting or streaming"),
            MediaError::Interrupted => write!(f, "Camera start was interrupted by a stop request"),
            MediaError::NoActiveStream => write!(f, "No active camera stream"),
            MediaError::NoAudioTrack => {
                write!(f, "No audio track available. Please allow microphone access.")
            }
            MediaError::EncodingUnsupported(message) => write!(f, "{}", message),
            MediaError::AlreadyRecording(kind) => write!(f, "{} recording already in progress", kind),
            MediaError::Recording(message) => write!(f, "Recording failed: {}", message),
            MediaError::Storage(message) => write!(f, "Failed to save recording: {}", message),
            MediaError::Transcription(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for MediaError {}

// =============================================================================
// Capture State
// =============================================================================

/// Idle -> Starting -> Streaming -> Stopping -> Idle; Error falls back to Idle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    #[default]
    Idle,
    Starting,
    Streaming,
    Stopping,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera on mobile devices
    Environment,
    User,
}

/// What start_camera asks the hardware for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: Option<FacingMode>,
    pub audio: bool,
}

// =============================================================================
// Recording
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordingKind {
    Video,
    Audio,
}

impl std::fmt::Display for RecordingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingKind::Video => write!(f, "Video"),
            RecordingKind::Audio => write!(f, "Audio"),
        }
    }
}

/**
 * Format chosen once when a session starts
 * `requested` is None when the platform default encoder is used
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingFormat {
    pub requested: Option<String>,
    pub mime_type: String,
}

// =============================================================================
// Observable State
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatus {
    pub capture_state: CaptureState,
    pub is_streaming: bool,
    pub is_recording: bool,
    pub is_recording_audio: bool,
    pub is_transcribing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Video recording packaged and written to disk
    RecordingSaved(PathBuf),

    /// Voice clip transcribed to non-empty text
    Transcript(String),

    /// Voice clip transcribed to nothing
    NoSpeechDetected,

    Error(MediaError),
}
