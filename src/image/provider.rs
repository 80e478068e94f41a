//! Image provider trait.

use crate::error::Result;
use crate::image::types::GenerationRequest;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for image generation providers.
///
/// One attempt per call; retrying is the caller's decision.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image and returns it as a data URI.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Model identifier used for display.
    fn model(&self) -> &str;
}

#[async_trait]
impl<P: ImageProvider + ?Sized> ImageProvider for Arc<P> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        (**self).generate(request).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

#[async_trait]
impl<P: ImageProvider + ?Sized> ImageProvider for Box<P> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        (**self).generate(request).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}
