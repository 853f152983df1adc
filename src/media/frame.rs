/**
 * ============================================================================
 * FRAME SURFACE MODULE
 * ============================================================================
 *
 * PURPOSE: Offscreen drawing surface for still captures
 *
 * A live frame is scaled into a fixed raster (512x288 by default), encoded
 * as JPEG and returned base64 encoded, ready to attach to a request.
 *
 * ============================================================================
 */

use crate::media::types::MediaConfig;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSurface {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
}

impl FrameSurface {
    pub fn new(width: u32, height: u32, jpeg_quality: u8) -> Self {
        Self {
            width,
            height,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.frame_width, config.frame_height, config.jpeg_quality)
    }

    /**
     * Draw a frame into the raster and encode it
     *
     * # Returns
     * * `Some(base64 JPEG)` on success
     * * `None` if the surface is degenerate or encoding fails
     */
    pub fn draw(&self, frame: &DynamicImage) -> Option<String> {
        if self.width == 0 || self.height == 0 {
            return None;
        }

        let raster = frame
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();

        let mut jpeg = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality);
        if let Err(e) = encoder.encode_image(&raster) {
            log::warn!("[MEDIA] Failed to encode captured frame: {}", e);
            return None;
        }

        log::debug!(
            "[MEDIA] Captured {}x{} frame ({} bytes JPEG)",
            self.width,
            self.height,
            jpeg.len()
        );
        Some(BASE64.encode(&jpeg))
    }
}

impl Default for FrameSurface {
    fn default() -> Self {
        Self::from_config(&MediaConfig::default())
    }
}
