//! Image generator stubs

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::abstractions::{GeneratedImage, ImageGenerator};
use crate::content::color::Rgb;
use crate::content::png;
use crate::error::{FactoryError, FailureKind, Result};

/// Returns a solid PNG of the requested size
#[derive(Debug, Default)]
pub struct SolidImageGenerator {
    cost: f64,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl SolidImageGenerator {
    pub fn new(cost: f64) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }

    /// Sleep before answering, to trip per-call timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for SolidImageGenerator {
    async fn generate_image(
        &self,
        _prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(GeneratedImage {
            bytes: png::encode_placeholder(
                width,
                height,
                Rgb::new(0x1e, 0x88, 0xe5),
                Rgb::new(0xff, 0xff, 0xff),
            ),
            cost: self.cost,
        })
    }
}

/// Fails every call with a fixed failure kind
#[derive(Debug)]
pub struct FailingImageGenerator {
    kind: FailureKind,
}

impl FailingImageGenerator {
    pub fn permanent() -> Self {
        Self {
            kind: FailureKind::Permanent,
        }
    }

    pub fn transient() -> Self {
        Self {
            kind: FailureKind::Transient,
        }
    }
}

#[async_trait]
impl ImageGenerator for FailingImageGenerator {
    async fn generate_image(
        &self,
        _prompt: &str,
        _width: u32,
        _height: u32,
    ) -> Result<GeneratedImage> {
        Err(FactoryError::collaborator(
            "image",
            self.kind,
            "image service refused the request",
        ))
    }
}
