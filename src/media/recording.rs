/**
 * ============================================================================
 * RECORDING SESSION MODULE
 * ============================================================================
 *
 * PURPOSE: One time-bounded encoder session bound to the camera stream
 *
 * FLOW:
 * 1. Resolve the format once (video: fixed; audio: ordered preference list)
 * 2. Create the encoder on the shared stream and start it with a chunk sink
 * 3. Fragments accumulate in memory
 * 4. finish(): stop the encoder, drain the remaining fragments, package
 *
 * Saving (video) and transcription (audio) happen in the manager once the
 * session has been packaged.
 *
 * ============================================================================
 */

use crate::media::device::{EncoderFactory, HardwareStream, MediaEncoder, TrackSelection};
use crate::media::types::{MediaError, RecordingFormat, RecordingKind};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

/// Video always records to this container
pub const VIDEO_MIME_TYPE: &str = "video/webm";

/// Audio formats in order of preference
pub const AUDIO_MIME_PREFERENCES: &[&str] = &["audio/wav", "audio/webm;codecs=opus", "audio/webm"];

/// Recorded MIME type when the platform default encoder is used
pub const AUDIO_FALLBACK_MIME_TYPE: &str = "audio/webm";

// =============================================================================
// Format Selection
// =============================================================================

/**
 * Pick the recording format for a session kind
 * Audio walks the preference list; an empty match means platform default
 */
pub fn select_format(kind: RecordingKind, encoders: &dyn EncoderFactory) -> RecordingFormat {
    match kind {
        RecordingKind::Video => RecordingFormat {
            requested: Some(VIDEO_MIME_TYPE.to_string()),
            mime_type: VIDEO_MIME_TYPE.to_string(),
        },
        RecordingKind::Audio => {
            match AUDIO_MIME_PREFERENCES
                .iter()
                .find(|mime| encoders.is_type_supported(mime))
            {
                Some(mime) => RecordingFormat {
                    requested: Some(mime.to_string()),
                    mime_type: mime.to_string(),
                },
                None => {
                    log::warn!("[RECORDING] No supported audio format found, using default");
                    RecordingFormat {
                        requested: None,
                        mime_type: AUDIO_FALLBACK_MIME_TYPE.to_string(),
                    }
                }
            }
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Packaged output of a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMedia {
    pub kind: RecordingKind,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub fragment_count: usize,
}

pub struct RecordingSession {
    id: Uuid,
    kind: RecordingKind,
    format: RecordingFormat,
    encoder: Box<dyn MediaEncoder>,
    chunks_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    chunks: Vec<Vec<u8>>,
    started_at: Instant,
    generation: u64,
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordingSession({}, {}, {})", self.kind, self.id, self.format.mime_type)
    }
}

impl RecordingSession {
    /**
     * Create and start a session on an existing stream
     * The stream is shared, never re-acquired
     */
    pub fn start(
        kind: RecordingKind,
        stream: Arc<dyn HardwareStream>,
        encoders: &dyn EncoderFactory,
        generation: u64,
    ) -> Result<Self, MediaError> {
        let tracks = match kind {
            RecordingKind::Video => TrackSelection::AudioAndVideo,
            RecordingKind::Audio => {
                if !stream.has_audio() {
                    return Err(MediaError::NoAudioTrack);
                }
                TrackSelection::AudioOnly
            }
        };

        let format = select_format(kind, encoders);

        let mut encoder = encoders
            .create(stream, tracks, format.requested.as_deref())
            .map_err(|e| unsupported(kind, e))?;

        let (tx, rx) = mpsc::unbounded_channel();
        encoder.start(tx).map_err(|e| unsupported(kind, e))?;

        let session = Self {
            id: Uuid::new_v4(),
            kind,
            format,
            encoder,
            chunks_rx: rx,
            chunks: Vec::new(),
            started_at: Instant::now(),
            generation,
        };

        log::info!("[RECORDING] Started {:?}", session);
        Ok(session)
    }

    pub fn kind(&self) -> RecordingKind {
        self.kind
    }

    pub fn format(&self) -> &RecordingFormat {
        &self.format
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Move delivered fragments into the buffer, dropping empty ones
    fn collect_chunks(&mut self) {
        while let Ok(chunk) = self.chunks_rx.try_recv() {
            if !chunk.is_empty() {
                self.chunks.push(chunk);
            }
        }
    }

    /**
     * Stop the encoder and package all buffered fragments
     * The encoder is finalized first so its last fragment is included
     */
    pub fn finish(mut self) -> Result<RecordedMedia, MediaError> {
        let stop_result = self.encoder.stop();
        self.collect_chunks();

        log::info!(
            "[RECORDING] Stopped {:?} after {:.1}s ({} fragments)",
            self,
            self.started_at.elapsed().as_secs_f64(),
            self.chunks.len()
        );

        stop_result?;

        let fragment_count = self.chunks.len();
        Ok(RecordedMedia {
            kind: self.kind,
            mime_type: self.format.mime_type,
            bytes: self.chunks.concat(),
            fragment_count,
        })
    }
}

fn unsupported(kind: RecordingKind, err: MediaError) -> MediaError {
    log::error!("[RECORDING] Could not start {} encoder: {}", kind, err);
    match kind {
        RecordingKind::Video => {
            MediaError::EncodingUnsupported("Recording not supported on this platform".to_string())
        }
        RecordingKind::Audio => {
            MediaError::EncodingUnsupported("Could not start audio recording".to_string())
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// `<prefix>-<epoch-millis>.webm`
pub fn recording_file_name(prefix: &str) -> String {
    format!("{}-{}.webm", prefix, Utc::now().timestamp_millis())
}

/**
 * Write a packaged video recording into `dir`
 * Creates the directory if needed
 */
pub fn save_recording(dir: &Path, prefix: &str, media: &RecordedMedia) -> Result<PathBuf, MediaError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| MediaError::Storage(format!("Failed to create {:?}: {}", dir, e)))?;

    let path = dir.join(recording_file_name(prefix));
    std::fs::write(&path, &media.bytes)
        .map_err(|e| MediaError::Storage(format!("Failed to write {:?}: {}", path, e)))?;

    log::info!("[RECORDING] Saved {} bytes to {:?}", media.bytes.len(), path);
    Ok(path)
}

// =============================================================================
// Tests
// =============================================================================
