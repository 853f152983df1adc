//! Hardware and encoder collaborators.
//!
//! The manager never talks to a camera, microphone or encoder directly;
//! platform backends implement these traits.

use crate::media::types::{MediaError, StreamConstraints};
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Encoded fragments flow from an encoder to its session through this sink.
pub type ChunkSink = mpsc::UnboundedSender<Vec<u8>>;

/// Grants access to capture hardware.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire a stream matching `constraints`. May prompt for permission.
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<Arc<dyn HardwareStream>, MediaError>;
}

/// A live camera (+ microphone) stream.
pub trait HardwareStream: Send + Sync {
    fn id(&self) -> String;

    fn has_video(&self) -> bool;

    fn has_audio(&self) -> bool;

    /// Latest decoded video frame, if the stream has produced one.
    fn current_frame(&self) -> Option<DynamicImage>;

    /// Stop every track. Idempotent.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// Which tracks of a stream an encoder consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSelection {
    AudioAndVideo,
    AudioOnly,
}

pub trait EncoderFactory: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// `mime_type` None asks for the platform default format.
    fn create(
        &self,
        stream: Arc<dyn HardwareStream>,
        tracks: TrackSelection,
        mime_type: Option<&str>,
    ) -> Result<Box<dyn MediaEncoder>, MediaError>;
}

pub trait MediaEncoder: Send {
    /// Begin encoding; fragments are pushed to `sink` as they become available.
    fn start(&mut self, sink: ChunkSink) -> Result<(), MediaError>;

    /// Finish encoding. The final fragment must be in the sink when this returns.
    fn stop(&mut self) -> Result<(), MediaError>;
}

/// Speech-to-text collaborator used by voice commands.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the transcript, possibly empty.
    async fn transcribe(&self, base64_audio: String, mime_type: String) -> Result<String, String>;
}
