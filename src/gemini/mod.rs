/**
 * ============================================================================
 * GEMINI MODULE
 * ============================================================================
 *
 * PURPOSE: Every call to the Google Gemini API goes through here
 *
 * SUBMODULES:
 * - client: HTTP transport (one round trip per call)
 * - dispatcher: FIFO, rate-limited queue shared by all callers
 * - prompt: Instruction text for each call shape
 * - service: generate / edit / fuse / transcribe call shapes
 * - types: Requests, responses, errors, configuration
 *
 * ============================================================================
 */

pub mod client;
pub mod dispatcher;
pub mod prompt;
pub mod service;
pub mod types;

pub use client::{GeminiClient, GenerationBackend};
pub use dispatcher::{Dispatched, Dispatcher};
pub use service::GeminiService;
pub use types::{DispatcherStatus, GeminiConfig, GeminiError, GeneratedArtifact, QueueStats};
