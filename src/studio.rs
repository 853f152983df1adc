/**
 * ============================================================================
 * STUDIO MODULE
 * ============================================================================
 *
 * PURPOSE: Image workbench on top of the Gemini service
 *
 * FUNCTIONALITY:
 * - Generate a new image from a prompt
 * - Edit the current image with a follow-up prompt
 * - Fuse two uploaded images
 * - Upload images from disk and download the current image
 *
 * Every operation goes through the shared dispatcher; the Studio only keeps
 * the current artifact and the two upload slots.
 *
 * ============================================================================
 */

use crate::gemini::{GeminiService, GeneratedArtifact};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::path::{Path, PathBuf};

/// Largest image accepted by upload()
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSlot {
    First,
    Second,
}

pub struct Studio {
    service: GeminiService,
    artifact_prefix: String,
    current: Option<GeneratedArtifact>,
    uploads: [Option<String>; 2],
}

impl Studio {
    pub fn new(service: GeminiService, artifact_prefix: impl Into<String>) -> Self {
        Self {
            service,
            artifact_prefix: artifact_prefix.into(),
            current: None,
            uploads: [None, None],
        }
    }

    pub fn current(&self) -> Option<&GeneratedArtifact> {
        self.current.as_ref()
    }

    pub fn has_uploads(&self) -> bool {
        self.uploads.iter().all(Option::is_some)
    }

    // =========================================================================
    // Generation
    // =========================================================================

    pub async fn generate(&mut self, prompt: &str) -> Result<GeneratedArtifact, String> {
        let prompt = require_prompt(prompt)?;

        let artifact = self
            .service
            .generate_image(prompt)
            .map_err(|e| e.to_string())?
            .await
            .map_err(|e| e.to_string())?;

        log::info!("[STUDIO] ✓ Generated image {}", artifact.id);
        Ok(self.set_current(artifact))
    }

    /**
     * Edit the current image
     * The new artifact's prompt records the edit chain: "previous → prompt"
     */
    pub async fn edit(&mut self, prompt: &str) -> Result<GeneratedArtifact, String> {
        let prompt = require_prompt(prompt)?;
        let Some(previous) = self.current.as_ref() else {
            return Err("No image to edit. Generate an image first.".to_string());
        };

        let chained = format!("{} → {}", previous.prompt, prompt);
        let mut artifact = self
            .service
            .edit_image(&previous.encoded_image, prompt)
            .map_err(|e| e.to_string())?
            .await
            .map_err(|e| e.to_string())?;
        artifact.prompt = chained;

        log::info!("[STUDIO] ✓ Edited image {}", artifact.id);
        Ok(self.set_current(artifact))
    }

    pub async fn fuse(&mut self, prompt: &str) -> Result<GeneratedArtifact, String> {
        let prompt = require_prompt(prompt)?;
        let (Some(first), Some(second)) = (&self.uploads[0], &self.uploads[1]) else {
            return Err("Please upload two images to fuse.".to_string());
        };

        let mut artifact = self
            .service
            .fuse_images(first, second, prompt)
            .map_err(|e| e.to_string())?
            .await
            .map_err(|e| e.to_string())?;
        artifact.prompt = format!("Fused: {}", prompt);

        log::info!("[STUDIO] ✓ Fused images into {}", artifact.id);
        Ok(self.set_current(artifact))
    }

    fn set_current(&mut self, artifact: GeneratedArtifact) -> GeneratedArtifact {
        self.current = Some(artifact.clone());
        artifact
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Read an image file into an upload slot
    pub fn upload(&mut self, slot: UploadSlot, path: &Path) -> Result<(), String> {
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_image {
            return Err("Please select a valid image file".to_string());
        }

        let metadata = std::fs::metadata(path).map_err(|e| format!("Error processing image file: {}", e))?;
        if metadata.len() > MAX_UPLOAD_BYTES {
            return Err("Image file is too large (max 20 MB)".to_string());
        }

        let bytes = std::fs::read(path).map_err(|e| format!("Error processing image file: {}", e))?;
        let index = match slot {
            UploadSlot::First => 0,
            UploadSlot::Second => 1,
        };
        self.uploads[index] = Some(BASE64.encode(&bytes));

        log::info!("[STUDIO] Uploaded {:?} into {:?} ({} bytes)", path, slot, bytes.len());
        Ok(())
    }

    /**
     * Write the current image to `dir` as `<prefix>-<id>.png`
     *
     * # Returns
     * * Path of the written file
     */
    pub fn download_current(&self, dir: &Path) -> Result<PathBuf, String> {
        let artifact = self.current.as_ref().ok_or_else(|| "No image to download".to_string())?;

        let bytes = BASE64
            .decode(&artifact.encoded_image)
            .map_err(|e| format!("Image data is not valid base64: {}", e))?;

        std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create {:?}: {}", dir, e))?;
        let path = dir.join(artifact.download_file_name(&self.artifact_prefix));
        std::fs::write(&path, bytes).map_err(|e| format!("Failed to write {:?}: {}", path, e))?;

        log::info!("[STUDIO] Downloaded image to {:?}", path);
        Ok(path)
    }
}

/// Blank prompts are refused; anything else is sent as typed
fn require_prompt(prompt: &str) -> Result<&str, String> {
    if prompt.trim().is_empty() {
        return Err("Please enter a prompt".to_string());
    }
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::types::RequestPart;
    use crate::gemini::{Dispatcher, GeminiConfig, GeminiError};
    use crate::testing::FakeBackend;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn studio(backend: Arc<FakeBackend>) -> Studio {
        let service = GeminiService::new(
            backend,
            Dispatcher::new(Duration::from_millis(3000)),
            &GeminiConfig::default(),
            "key",
        );
        Studio::new(service, "panelflash")
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("realityflux-studio-{}", Uuid::new_v4()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_chains_prompts() {
        let backend = Arc::new(FakeBackend::with_image("aGVsbG8="));
        let mut studio = studio(backend);

        assert_eq!(
            studio.edit("add snow").await.unwrap_err(),
            "No image to edit. Generate an image first."
        );

        studio.generate("a lighthouse").await.unwrap();
        let edited = studio.edit("add snow").await.unwrap();
        assert_eq!(edited.prompt, "a lighthouse → add snow");
        assert_eq!(studio.current().unwrap().id, edited.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_prompt_never_enqueued() {
        let backend = Arc::new(FakeBackend::with_image("aGVsbG8="));
        let mut studio = studio(backend.clone());

        assert!(studio.generate("   ").await.is_err());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_sent_as_typed() {
        let backend = Arc::new(FakeBackend::with_image("aGVsbG8="));
        let mut studio = studio(backend.clone());

        let artifact = studio.generate(" a lighthouse ").await.unwrap();
        assert_eq!(artifact.prompt, " a lighthouse ");
        assert_eq!(
            backend.requests()[0].parts,
            vec![RequestPart::Text(
                "Generate an image based on this prompt:  a lighthouse ".to_string()
            )]
        );

        let edited = studio.edit("add snow ").await.unwrap();
        assert_eq!(edited.prompt, " a lighthouse  → add snow ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fuse_requires_two_uploads() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let image_path = dir.join("a.png");
        std::fs::write(&image_path, b"png bytes").unwrap();

        let backend = Arc::new(FakeBackend::with_image("aGVsbG8="));
        let mut studio = studio(backend.clone());

        studio.upload(UploadSlot::First, &image_path).unwrap();
        assert_eq!(studio.fuse("blend").await.unwrap_err(), "Please upload two images to fuse.");

        studio.upload(UploadSlot::Second, &image_path).unwrap();
        let fused = studio.fuse("blend").await.unwrap();
        assert_eq!(fused.prompt, "Fused: blend");
        assert_eq!(backend.requests()[0].inline_count(), 2);
    }

    #[test]
    fn test_upload_rejects_non_images() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let text_path = dir.join("notes.txt");
        std::fs::write(&text_path, b"hello").unwrap();

        let mut studio = studio(Arc::new(FakeBackend::with_image("x")));
        assert_eq!(
            studio.upload(UploadSlot::First, &text_path).unwrap_err(),
            "Please select a valid image file"
        );
        assert!(!studio.has_uploads());
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_current_writes_png() {
        let backend = Arc::new(FakeBackend::with_image("aGVsbG8="));
        let mut studio = studio(backend);
        let dir = temp_dir();

        assert!(studio.download_current(&dir).is_err());

        let artifact = studio.generate("a lighthouse").await.unwrap();
        let path = studio.download_current(&dir).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("panelflash-{}.png", artifact.id)
        );
        assert_eq!(std::fs::read(path).unwrap(), b"hello".to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_message() {
        let backend = Arc::new(FakeBackend::failing(GeminiError::Api {
            status: 429,
            message: "Resource exhausted".to_string(),
        }));
        let mut studio = studio(backend);

        let err = studio.generate("a lighthouse").await.unwrap_err();
        assert_eq!(err, "Gemini API error (429): Resource exhausted");
        assert!(studio.current().is_none());
    }
}
