//! Image-generation collaborator

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    /// Encoded PNG bytes
    pub bytes: Vec<u8>,
    pub cost: f64,
}

/// Trait for raster image generation.
///
/// Callers never retry indefinitely: on any failure the asset generator
/// substitutes a placeholder of the requested size.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str, width: u32, height: u32)
        -> Result<GeneratedImage>;
}
