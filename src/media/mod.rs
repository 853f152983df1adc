/**
 * ============================================================================
 * MEDIA MODULE
 * ============================================================================
 *
 * PURPOSE: Camera, microphone and recording lifecycle
 *
 * SUBMODULES:
 * - device: Hardware/encoder/transcriber collaborator traits
 * - frame: Still capture raster
 * - manager: MediaSessionManager (camera + recording state machines)
 * - recording: Format selection and encoder sessions
 * - types: Configuration, errors, observable state
 *
 * ============================================================================
 */

pub mod device;
pub mod frame;
pub mod manager;
pub mod recording;
pub mod types;

pub use device::{EncoderFactory, HardwareStream, MediaDevices, MediaEncoder, Transcriber};
pub use frame::FrameSurface;
pub use manager::MediaSessionManager;
pub use types::{CaptureState, MediaConfig, MediaError, MediaEvent, MediaStatus, RecordingKind};
